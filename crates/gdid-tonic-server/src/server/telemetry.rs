//! Log/tracing initialization for the authority daemon.
//!
//! Structured logging via `tracing`, filtered through `RUST_LOG` (default
//! `info`). Allocation-path events (block requests, location failures, era
//! promotions) reach these logs through [`gdid::TracingSink`]; total
//! location failures are emitted at `error!` severity for alerting.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub fn init_telemetry() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    Ok(())
}

//! Client-side authority endpoint selection and failover.
//!
//! The registry maps a scope to one or more physical authority endpoints.
//! Each call picks the most-preferred endpoint whose circuit breaker is
//! closed, wraps the attempt in a timeout, and on failure trips that
//! endpoint's breaker for a cool-down window before moving to the next.
//! The registry does not interpret a timeout beyond "this attempt failed";
//! the semantic consequence (the block is indeterminate and must be
//! abandoned) is the generator's concern.

use crate::client::AllocationClient;
use crate::error::{Error, Result};
use crate::id::{BlockGrant, SequenceKey};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;

/// Tunables for endpoint selection.
#[derive(Clone, Debug)]
pub struct RegistryConfig {
    /// Deadline applied to every single endpoint attempt.
    pub call_timeout: Duration,
    /// How long a tripped breaker keeps its endpoint out of preference
    /// order.
    pub breaker_cooldown: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(5),
            breaker_cooldown: Duration::from_secs(30),
        }
    }
}

struct BreakerState {
    open_until: Option<Instant>,
}

struct HostSlot<C> {
    name: String,
    priority: u32,
    client: C,
    breaker: parking_lot::Mutex<BreakerState>,
}

impl<C> HostSlot<C> {
    /// `None` when the breaker is closed, otherwise the instant it reopens.
    fn open_until(&self, now: Instant) -> Option<Instant> {
        self.breaker.lock().open_until.filter(|t| *t > now)
    }

    fn trip(&self, cooldown: Duration) {
        self.breaker.lock().open_until = Some(Instant::now() + cooldown);
    }

    fn reset(&self) {
        self.breaker.lock().open_until = None;
    }
}

/// Scope-to-endpoint table with per-endpoint circuit breakers.
///
/// Constructed explicitly and injected into the generator; there is no
/// ambient global registry, which keeps generators unit-testable against a
/// mock authority.
pub struct AuthorityHostRegistry<C> {
    config: RegistryConfig,
    routes: parking_lot::RwLock<HashMap<String, Vec<Arc<HostSlot<C>>>>>,
}

impl<C: AllocationClient> AuthorityHostRegistry<C> {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            routes: parking_lot::RwLock::new(HashMap::new()),
        }
    }

    /// Registers an endpoint for `scope`. Lower `priority` values are
    /// preferred; 0 is the primary.
    ///
    /// Alternate endpoints must serve the *same* shard's durable state
    /// (e.g. a standby): distinct shards own disjoint counter namespaces,
    /// so failing over between them is not a substitute.
    pub fn register(&self, scope: impl Into<String>, name: impl Into<String>, priority: u32, client: C) {
        let slot = Arc::new(HostSlot {
            name: name.into(),
            priority,
            client,
            breaker: parking_lot::Mutex::new(BreakerState { open_until: None }),
        });
        let mut routes = self.routes.write();
        let hosts = routes.entry(scope.into()).or_default();
        hosts.push(slot);
        hosts.sort_by_key(|h| h.priority);
    }

    /// Calls `AllocateBlock` against the scope's failover set.
    ///
    /// Closed-breaker endpoints are tried in priority order first; if every
    /// breaker is open, endpoints are probed in order of soonest breaker
    /// expiry so a recovered endpoint is still found during a total outage.
    /// Each endpoint is attempted at most once per call, and the last
    /// failure is surfaced after exhaustion.
    pub async fn allocate(&self, key: &SequenceKey, requested_size: u64) -> Result<BlockGrant> {
        let hosts: Vec<Arc<HostSlot<C>>> = self
            .routes
            .read()
            .get(key.scope())
            .cloned()
            .unwrap_or_default();

        if hosts.is_empty() {
            return Err(Error::HostsExhausted {
                scope: key.scope().to_string(),
            });
        }

        let now = Instant::now();
        let (mut closed, mut open): (Vec<_>, Vec<_>) = (Vec::new(), Vec::new());
        for host in hosts {
            match host.open_until(now) {
                None => closed.push(host),
                Some(reopens) => open.push((reopens, host)),
            }
        }
        open.sort_by_key(|(reopens, _)| *reopens);

        let mut last_error = None;
        for host in closed.into_iter().chain(open.into_iter().map(|(_, h)| h)) {
            match timeout(
                self.config.call_timeout,
                host.client.allocate_block(key, requested_size),
            )
            .await
            {
                Ok(Ok(grant)) => {
                    host.reset();
                    return Ok(grant);
                }
                Ok(Err(error)) => {
                    tracing::warn!(%key, host = %host.name, %error, "authority attempt failed");
                    host.trip(self.config.breaker_cooldown);
                    last_error = Some(error);
                }
                Err(_) => {
                    tracing::warn!(%key, host = %host.name, "authority attempt timed out");
                    host.trip(self.config.breaker_cooldown);
                    last_error = Some(Error::Timeout {
                        host: host.name.clone(),
                        millis: self.config.call_timeout.as_millis() as u64,
                    });
                }
            }
        }

        Err(last_error.unwrap_or(Error::HostsExhausted {
            scope: key.scope().to_string(),
        }))
    }
}

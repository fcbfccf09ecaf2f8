//! Observability events emitted by the generator and authority.
//!
//! The taxonomy is closed: every operationally interesting transition in the
//! allocation path maps to exactly one [`GdidEvent`] variant. Events are
//! delivered through [`EventSink::record`], which is synchronous and
//! fire-and-forget: a sink must never block or fail the allocation path.

use crate::id::{BlockGrant, SequenceKey};

/// One structured event from the allocation path.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum GdidEvent {
    /// A generator is about to call an authority for a fresh block.
    BlockRequested { key: SequenceKey, requested: u64 },
    /// A generator received and cached a block.
    BlockSuccess { key: SequenceKey, grant: BlockGrant },
    /// A generator's refill failed after exhausting its failover set.
    BlockFailure { key: SequenceKey, reason: String },
    /// An authority began serving an allocation request.
    AuthorityCalled { key: SequenceKey, requested: u64 },
    /// One location failed a sequence-state read; a lower-priority location
    /// will be tried.
    LocationReadFailure { key: SequenceKey, location: String },
    /// Every location failed the read; the allocation was refused.
    LocationReadTotalFailure { key: SequenceKey },
    /// One location failed the post-grant write; tolerated while any other
    /// write succeeds.
    LocationWriteFailure { key: SequenceKey, location: String },
    /// Every location failed the write; the grant was withheld.
    LocationWriteTotalFailure { key: SequenceKey },
    /// The counter would have overflowed, so the sequence moved to a new era.
    EraPromoted {
        key: SequenceKey,
        old_era: u32,
        new_era: u32,
    },
}

/// Destination for [`GdidEvent`]s.
///
/// Implementations must be cheap and infallible: `record` is called inline
/// on the allocation path (including inside the authority's per-sequence
/// critical section) and is never awaited or retried.
pub trait EventSink: Send + Sync {
    fn record(&self, event: GdidEvent);
}

/// Sink that forwards events to [`tracing`], with total failures at
/// `error!` severity for operational alerting.
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, event: GdidEvent) {
        match event {
            GdidEvent::BlockRequested { key, requested } => {
                tracing::debug!(%key, requested, "requesting block from authority");
            }
            GdidEvent::BlockSuccess { key, grant } => {
                tracing::debug!(%key, %grant, "block cached");
            }
            GdidEvent::BlockFailure { key, reason } => {
                tracing::warn!(%key, reason, "block allocation failed");
            }
            GdidEvent::AuthorityCalled { key, requested } => {
                tracing::trace!(%key, requested, "authority allocation requested");
            }
            GdidEvent::LocationReadFailure { key, location } => {
                tracing::warn!(%key, location, "location read failed, falling back");
            }
            GdidEvent::LocationReadTotalFailure { key } => {
                tracing::error!(%key, "sequence state unreadable from every location");
            }
            GdidEvent::LocationWriteFailure { key, location } => {
                tracing::warn!(%key, location, "location write failed, tolerated");
            }
            GdidEvent::LocationWriteTotalFailure { key } => {
                tracing::error!(%key, "sequence state unwritable to every location");
            }
            GdidEvent::EraPromoted {
                key,
                old_era,
                new_era,
            } => {
                tracing::info!(%key, old_era, new_era, "era promoted");
            }
        }
    }
}

/// Sink that drops every event.
pub struct NullSink;

impl EventSink for NullSink {
    fn record(&self, _event: GdidEvent) {}
}

//! Durable backends for sequence state.
//!
//! A [`Location`] is one redundant store of `(era, counter)` per sequence.
//! The trait is deliberately minimal (read, write, and a name for log
//! attribution) so storage technology stays pluggable. Redundancy policy
//! (priority-ordered first-success reads, best-effort fan-out writes) lives
//! in the [`Authority`](crate::Authority), not here.

use crate::error::Result;
use crate::id::{SequenceKey, SequenceState};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;

/// One durable backend holding sequence counter state.
pub trait Location: Send + Sync + 'static {
    /// Stable name used in events and logs.
    fn name(&self) -> &str;

    /// Reads the current state for `key`.
    ///
    /// `Ok(None)` means the location has no record for the key (NotFound);
    /// `Err` means the location could not answer at all. Callers treat the
    /// two very differently, so implementations must not conflate them.
    fn read(
        &self,
        key: &SequenceKey,
    ) -> impl Future<Output = Result<Option<SequenceState>>> + Send;

    /// Durably replaces the state for `key`.
    fn write(
        &self,
        key: &SequenceKey,
        state: SequenceState,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// In-memory [`Location`] backed by a `HashMap`.
///
/// Not persisted across restarts; intended for tests and embedded
/// single-process deployments.
#[derive(Clone)]
pub struct MemoryLocation {
    name: Arc<str>,
    states: Arc<RwLock<HashMap<SequenceKey, SequenceState>>>,
}

impl MemoryLocation {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            states: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Snapshot of the current state for `key`, bypassing the trait. Test
    /// helper for asserting what was actually persisted.
    pub async fn snapshot(&self, key: &SequenceKey) -> Option<SequenceState> {
        self.states.read().await.get(key).copied()
    }
}

impl Location for MemoryLocation {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read(&self, key: &SequenceKey) -> Result<Option<SequenceState>> {
        Ok(self.states.read().await.get(key).copied())
    }

    async fn write(&self, key: &SequenceKey, state: SequenceState) -> Result<()> {
        self.states.write().await.insert(key.clone(), state);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_location_round_trips_state() {
        let loc = MemoryLocation::new("mem");
        let key = SequenceKey::new("sky", "sky_log").unwrap();

        assert_eq!(loc.read(&key).await.unwrap(), None);

        loc.write(&key, SequenceState::new(2, 4096)).await.unwrap();
        assert_eq!(
            loc.read(&key).await.unwrap(),
            Some(SequenceState::new(2, 4096))
        );
    }
}

//! The authority: sole durable owner of `(era, counter)` per sequence.
//!
//! One authority shard serializes all grants for a given [`SequenceKey`]
//! through a lazily-created per-key lock, reads the authoritative state from
//! its [`Location`]s (first success wins, priority order), computes a
//! disjoint block, and fans the post-grant state out to every location
//! before the grant leaves the process. Requests for different keys run
//! fully in parallel.

use crate::client::AllocationClient;
use crate::error::{Error, Result};
use crate::event::{EventSink, GdidEvent};
use crate::id::{BlockGrant, MAX_COUNTER, SequenceKey, SequenceState};
use crate::location::Location;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;

/// Tunables for one authority shard.
#[derive(Clone, Debug)]
pub struct AuthorityConfig {
    /// Shard identifier embedded in every issued GDID. Distinct shards are
    /// independent counter namespaces; their output can never collide.
    pub shard_id: u16,
    /// Grants are never smaller than this, regardless of what the client
    /// asked for. Amortizes the durable write over many IDs.
    pub min_block_size: u64,
    /// Largest request the shard will serve. Oversized requests are
    /// rejected, not clamped: batch contiguity depends on the full size.
    pub max_block_size: u64,
    /// Highest counter value the shard will persist before promoting the
    /// era. Defaults to [`MAX_COUNTER`]; lowered only in tests.
    pub counter_limit: u64,
}

impl AuthorityConfig {
    pub fn new(shard_id: u16) -> Self {
        Self {
            shard_id,
            min_block_size: 16,
            max_block_size: 1 << 20,
            counter_limit: MAX_COUNTER,
        }
    }
}

/// A single authority shard.
///
/// Generic over its storage backend; deployments choose a durable
/// [`Location`] while tests use [`MemoryLocation`](crate::MemoryLocation).
/// The `locations` vector is the deployment's priority order: reads try the
/// front first, writes fan out to all.
pub struct Authority<L: Location> {
    config: AuthorityConfig,
    locations: Vec<L>,
    sink: Arc<dyn EventSink>,
    locks: parking_lot::Mutex<HashMap<SequenceKey, Arc<AsyncMutex<()>>>>,
}

impl<L: Location> Authority<L> {
    pub fn new(
        config: AuthorityConfig,
        locations: Vec<L>,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self> {
        if locations.is_empty() {
            return Err(Error::Rejected {
                reason: "authority requires at least one location".into(),
            });
        }
        if config.min_block_size == 0 || config.min_block_size > config.max_block_size {
            return Err(Error::Rejected {
                reason: format!(
                    "invalid block size bounds [{}, {}]",
                    config.min_block_size, config.max_block_size
                ),
            });
        }
        if config.counter_limit > MAX_COUNTER {
            return Err(Error::Rejected {
                reason: format!("counter limit exceeds {MAX_COUNTER}"),
            });
        }
        Ok(Self {
            config,
            locations,
            sink,
            locks: parking_lot::Mutex::new(HashMap::new()),
        })
    }

    pub fn shard_id(&self) -> u16 {
        self.config.shard_id
    }

    /// Grants a fresh, durably-reserved counter block for `key`.
    ///
    /// `requested_size` of zero is raised to the configured minimum. The
    /// returned range has never been issued before and never will be again:
    /// the post-grant state is persisted to at least one location before
    /// this returns.
    pub async fn allocate_block(&self, key: &SequenceKey, requested_size: u64) -> Result<BlockGrant> {
        self.sink.record(GdidEvent::AuthorityCalled {
            key: key.clone(),
            requested: requested_size,
        });

        if requested_size > self.config.max_block_size {
            return Err(Error::Rejected {
                reason: format!(
                    "requested {} exceeds maximum block size {}",
                    requested_size, self.config.max_block_size
                ),
            });
        }
        let size = requested_size.max(self.config.min_block_size);
        if size > self.config.counter_limit {
            return Err(Error::Rejected {
                reason: format!("block of {size} cannot fit in one era"),
            });
        }

        // Serialize per key; unrelated sequences proceed in parallel.
        let lock = self.sequence_lock(key);
        let _guard = lock.lock().await;

        let state = self.read_state(key).await?;
        let (grant, new_state) = self.compute_grant(key, state, size)?;
        self.write_state(key, new_state).await?;
        Ok(grant)
    }

    /// Returns the per-key lock, creating it on first use.
    fn sequence_lock(&self, key: &SequenceKey) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock();
        locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Reads the authoritative state: first successful read wins.
    ///
    /// NotFound falls through to the next location, since a record missing
    /// here may still exist on a lower-priority store. The key counts as
    /// fresh (era 0, counter 0) only when every location answered a clean
    /// NotFound; any read error with no data found fails the request
    /// instead; a lost store must never look like a counter at zero.
    async fn read_state(&self, key: &SequenceKey) -> Result<SequenceState> {
        let mut errored = false;
        for location in &self.locations {
            match location.read(key).await {
                Ok(Some(state)) => return Ok(state),
                Ok(None) => {}
                Err(error) => {
                    errored = true;
                    tracing::warn!(%key, location = location.name(), %error, "location read failed");
                    self.sink.record(GdidEvent::LocationReadFailure {
                        key: key.clone(),
                        location: location.name().to_string(),
                    });
                }
            }
        }
        if errored {
            self.sink
                .record(GdidEvent::LocationReadTotalFailure { key: key.clone() });
            return Err(Error::ReadTotalFailure {
                key: key.to_string(),
            });
        }
        Ok(SequenceState::default())
    }

    /// Computes the next grant, promoting the era when the counter would
    /// pass the limit.
    fn compute_grant(
        &self,
        key: &SequenceKey,
        state: SequenceState,
        size: u64,
    ) -> Result<(BlockGrant, SequenceState)> {
        let authority = self.config.shard_id;
        match state.counter.checked_add(size) {
            Some(candidate) if candidate <= self.config.counter_limit => Ok((
                BlockGrant {
                    era: state.era,
                    authority,
                    start: state.counter,
                    count: size,
                },
                SequenceState::new(state.era, candidate),
            )),
            _ => {
                let new_era = state.era.checked_add(1).ok_or_else(|| Error::EraExhausted {
                    key: key.to_string(),
                })?;
                self.sink.record(GdidEvent::EraPromoted {
                    key: key.clone(),
                    old_era: state.era,
                    new_era,
                });
                Ok((
                    BlockGrant {
                        era: new_era,
                        authority,
                        start: 0,
                        count: size,
                    },
                    SequenceState::new(new_era, size),
                ))
            }
        }
    }

    /// Fans the post-grant state out to every location, best effort.
    ///
    /// Succeeds while at least one write lands; otherwise the grant must be
    /// withheld or a crash could re-derive a stale counter and re-issue
    /// already-granted values.
    async fn write_state(&self, key: &SequenceKey, state: SequenceState) -> Result<()> {
        let mut wrote = false;
        for location in &self.locations {
            match location.write(key, state).await {
                Ok(()) => wrote = true,
                Err(error) => {
                    tracing::warn!(%key, location = location.name(), %error, "location write failed");
                    self.sink.record(GdidEvent::LocationWriteFailure {
                        key: key.clone(),
                        location: location.name().to_string(),
                    });
                }
            }
        }
        if !wrote {
            self.sink
                .record(GdidEvent::LocationWriteTotalFailure { key: key.clone() });
            return Err(Error::WriteTotalFailure {
                key: key.to_string(),
            });
        }
        Ok(())
    }
}

/// In-process wiring: a generator can talk to an embedded authority without
/// any transport.
impl<L: Location> AllocationClient for Authority<L> {
    fn allocate_block(
        &self,
        key: &SequenceKey,
        requested_size: u64,
    ) -> impl Future<Output = Result<BlockGrant>> + Send {
        Authority::allocate_block(self, key, requested_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::NullSink;
    use crate::location::MemoryLocation;
    use std::sync::Mutex;

    /// Sink that retains every event for assertions.
    pub(crate) struct CollectingSink {
        pub events: Mutex<Vec<GdidEvent>>,
    }

    impl CollectingSink {
        pub fn new() -> Arc<Self> {
            Arc::new(Self {
                events: Mutex::new(Vec::new()),
            })
        }

        pub fn count(&self, pred: impl Fn(&GdidEvent) -> bool) -> usize {
            self.events.lock().unwrap().iter().filter(|e| pred(e)).count()
        }
    }

    impl EventSink for CollectingSink {
        fn record(&self, event: GdidEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    fn key() -> SequenceKey {
        SequenceKey::new("sky", "sky_log").unwrap()
    }

    fn small_config() -> AuthorityConfig {
        AuthorityConfig {
            shard_id: 7,
            min_block_size: 4,
            max_block_size: 64,
            counter_limit: 100,
        }
    }

    #[tokio::test]
    async fn grants_are_monotonic_and_disjoint() {
        let authority = Authority::new(
            AuthorityConfig::new(1),
            vec![MemoryLocation::new("a")],
            Arc::new(NullSink),
        )
        .unwrap();

        let mut grants = Vec::new();
        for requested in [16, 100, 32, 1, 0] {
            grants.push(authority.allocate_block(&key(), requested).await.unwrap());
        }
        for pair in grants.windows(2) {
            assert!(pair[0].start < pair[1].start);
            assert_eq!(pair[0].end(), pair[1].start);
            assert!(!pair[0].overlaps(&pair[1]));
        }
    }

    #[tokio::test]
    async fn respects_minimum_and_rejects_oversize() {
        let authority = Authority::new(
            small_config(),
            vec![MemoryLocation::new("a")],
            Arc::new(NullSink),
        )
        .unwrap();

        let grant = authority.allocate_block(&key(), 1).await.unwrap();
        assert_eq!(grant.count, 4);

        let err = authority.allocate_block(&key(), 65).await.unwrap_err();
        assert!(matches!(err, Error::Rejected { .. }));
    }

    #[tokio::test]
    async fn era_promotion_resets_counter_and_fires_once() {
        let sink = CollectingSink::new();
        let location = MemoryLocation::new("a");
        let authority =
            Authority::new(small_config(), vec![location.clone()], sink.clone()).unwrap();

        // Walk the counter up to 96 of 100.
        for _ in 0..3 {
            authority.allocate_block(&key(), 32).await.unwrap();
        }
        // 96 + 32 > 100: must promote, restarting at the granted size.
        let grant = authority.allocate_block(&key(), 32).await.unwrap();
        assert_eq!(grant.era, 1);
        assert_eq!(grant.start, 0);
        assert_eq!(grant.count, 32);

        assert_eq!(
            sink.count(|e| matches!(e, GdidEvent::EraPromoted { .. })),
            1
        );
        assert_eq!(
            location.snapshot(&key()).await,
            Some(SequenceState::new(1, 32))
        );
    }

    #[tokio::test]
    async fn resumes_from_highest_priority_location_with_data() {
        let primary = MemoryLocation::new("primary");
        let standby = MemoryLocation::new("standby");
        let k = key();

        // Primary lost its record; standby still has the durable counter.
        standby.write(&k, SequenceState::new(0, 500)).await.unwrap();

        let authority = Authority::new(
            AuthorityConfig::new(1),
            vec![primary.clone(), standby],
            Arc::new(NullSink),
        )
        .unwrap();

        let grant = authority.allocate_block(&k, 16).await.unwrap();
        assert_eq!(grant.start, 500);
        // The fan-out write repaired the primary.
        assert_eq!(
            primary.snapshot(&k).await,
            Some(SequenceState::new(0, 516))
        );
    }

    #[tokio::test]
    async fn unseen_key_starts_at_zero_only_when_all_locations_agree() {
        let authority = Authority::new(
            AuthorityConfig::new(1),
            vec![MemoryLocation::new("a"), MemoryLocation::new("b")],
            Arc::new(NullSink),
        )
        .unwrap();

        let grant = authority.allocate_block(&key(), 16).await.unwrap();
        assert_eq!(grant.era, 0);
        assert_eq!(grant.start, 0);
    }

    #[tokio::test]
    async fn keys_are_independent_counter_spaces() {
        let authority = Authority::new(
            AuthorityConfig::new(1),
            vec![MemoryLocation::new("a")],
            Arc::new(NullSink),
        )
        .unwrap();

        let a = SequenceKey::new("sky", "aseq").unwrap();
        let b = SequenceKey::new("sky", "bseq").unwrap();

        let ga = authority.allocate_block(&a, 64).await.unwrap();
        let gb = authority.allocate_block(&b, 64).await.unwrap();
        assert_eq!(ga.start, 0);
        assert_eq!(gb.start, 0);
    }
}

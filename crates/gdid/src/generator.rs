//! Client-embedded GDID allocator.
//!
//! The generator hides the authority round-trip behind a per-sequence block
//! cache: the fast path takes the next counter from the cached remainder of
//! the most recent grant, and only an empty cache triggers a refill through
//! the [`AuthorityHostRegistry`]. The cache is purely in-memory and is
//! discarded without remorse on restart or on any round-trip whose outcome
//! is uncertain. Gaps in the ID space are the accepted cost of never
//! re-issuing a value.
//!
//! "Check cache, consume or refill" is one atomic step under a per-key
//! async mutex. That same mutex provides single-flight refills: callers
//! that arrive during an in-flight refill for the same `(scope, sequence)`
//! await its result instead of issuing redundant authority calls, which
//! bounds authority load under a thundering herd and avoids needlessly
//! burning counter space. Unrelated sequences never contend.

use crate::client::AllocationClient;
use crate::error::{Error, Result};
use crate::event::{EventSink, GdidEvent};
use crate::id::{BlockGrant, Gdid, SequenceKey};
use crate::registry::AuthorityHostRegistry;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;

/// Tunables for the generator side.
#[derive(Clone, Debug)]
pub struct GeneratorConfig {
    /// Block size requested when a caller does not pass an explicit hint.
    /// Larger blocks mean fewer round-trips and larger restart gaps.
    pub default_block_size: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            default_block_size: 1024,
        }
    }
}

/// Unconsumed remainder of the most recent grant for one sequence.
struct CacheSlot {
    era: u32,
    authority: u16,
    next: u64,
    remaining: u64,
}

impl CacheSlot {
    fn from_grant(grant: BlockGrant) -> Self {
        Self {
            era: grant.era,
            authority: grant.authority,
            next: grant.start,
            remaining: grant.count,
        }
    }

    /// Takes the next counter. Callers check `remaining` first.
    fn take(&mut self) -> Gdid {
        debug_assert!(self.remaining > 0);
        let id = Gdid::new(self.era, self.authority, self.next);
        self.next += 1;
        self.remaining -= 1;
        id
    }

    /// Takes `count` consecutive counters. Callers check `remaining` first.
    fn take_many(&mut self, count: u64) -> Vec<Gdid> {
        let mut ids = Vec::with_capacity(count as usize);
        for _ in 0..count {
            ids.push(self.take());
        }
        ids
    }
}

/// Allocates GDIDs for application callers, leasing counter blocks from an
/// authority as needed.
///
/// The registry and event sink are injected at construction; the generator
/// keeps no global state and is cheap to share behind an `Arc` across
/// tasks.
pub struct GdidGenerator<C: AllocationClient> {
    registry: Arc<AuthorityHostRegistry<C>>,
    sink: Arc<dyn EventSink>,
    config: GeneratorConfig,
    slots: parking_lot::Mutex<HashMap<SequenceKey, Arc<AsyncMutex<Option<CacheSlot>>>>>,
}

impl<C: AllocationClient> GdidGenerator<C> {
    pub fn new(
        registry: Arc<AuthorityHostRegistry<C>>,
        sink: Arc<dyn EventSink>,
        config: GeneratorConfig,
    ) -> Self {
        Self {
            registry,
            sink,
            config,
            slots: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    /// Returns one unique GDID for `(scope, sequence)`, refilling the block
    /// cache with the default block size when it runs dry.
    pub async fn generate_one(&self, scope: &str, sequence: &str) -> Result<Gdid> {
        self.generate_one_sized(scope, sequence, self.config.default_block_size)
            .await
    }

    /// [`generate_one`](Self::generate_one) with an explicit block size
    /// hint for the refill, for callers that know their burn rate.
    pub async fn generate_one_sized(
        &self,
        scope: &str,
        sequence: &str,
        block_size_hint: u64,
    ) -> Result<Gdid> {
        let key = SequenceKey::new(scope, sequence)?;
        let slot = self.cache_slot(&key);
        let mut guard = slot.lock().await;

        if let Some(cache) = guard.as_mut().filter(|cache| cache.remaining > 0) {
            return Ok(cache.take());
        }
        let mut fresh = self.refill(&key, block_size_hint.max(1)).await?;
        let id = fresh.take();
        *guard = Some(fresh);
        Ok(id)
    }

    /// Returns exactly `count` strictly consecutive GDIDs as one unit.
    ///
    /// Served wholly from the cache when it has `count` left; otherwise a
    /// single fresh grant of at least `count` replaces the cache, and the
    /// old remainder is abandoned (an accepted gap; contiguity from one
    /// grant beats density). A partially satisfied batch is never
    /// returned.
    pub async fn try_generate_many(
        &self,
        scope: &str,
        sequence: &str,
        count: u64,
    ) -> Result<Vec<Gdid>> {
        if count == 0 {
            return Err(Error::Rejected {
                reason: "batch count must be greater than 0".into(),
            });
        }
        let key = SequenceKey::new(scope, sequence)?;
        let slot = self.cache_slot(&key);
        let mut guard = slot.lock().await;

        if let Some(cache) = guard.as_mut().filter(|cache| cache.remaining >= count) {
            return Ok(cache.take_many(count));
        }

        let size = count.max(self.config.default_block_size);
        let mut fresh = self.refill(&key, size).await?;
        if fresh.remaining < count {
            // An authority never under-grants; guard against a misbehaving
            // endpoint rather than hand out a gapped batch.
            *guard = None;
            return Err(Error::Rejected {
                reason: format!("grant of {} cannot satisfy batch of {count}", fresh.remaining),
            });
        }
        let ids = fresh.take_many(count);
        *guard = Some(fresh);
        Ok(ids)
    }

    /// Returns the cache slot for `key`, creating it on first use.
    fn cache_slot(&self, key: &SequenceKey) -> Arc<AsyncMutex<Option<CacheSlot>>> {
        let mut slots = self.slots.lock();
        slots
            .entry(key.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(None)))
            .clone()
    }

    /// One authority round-trip through the registry's failover set.
    ///
    /// Runs while holding only the key's own cache lock, so a slow refill
    /// never blocks unrelated sequences. On any failure nothing is cached:
    /// an uncertain outcome (timeout) must not leave a possibly-duplicated
    /// block behind.
    async fn refill(&self, key: &SequenceKey, requested_size: u64) -> Result<CacheSlot> {
        self.sink.record(GdidEvent::BlockRequested {
            key: key.clone(),
            requested: requested_size,
        });

        match self.registry.allocate(key, requested_size).await {
            Ok(grant) if grant.count > 0 => {
                self.sink.record(GdidEvent::BlockSuccess {
                    key: key.clone(),
                    grant,
                });
                Ok(CacheSlot::from_grant(grant))
            }
            Ok(_) => {
                let error = Error::Rejected {
                    reason: "authority returned an empty grant".into(),
                };
                self.sink.record(GdidEvent::BlockFailure {
                    key: key.clone(),
                    reason: error.to_string(),
                });
                Err(error)
            }
            Err(error) => {
                self.sink.record(GdidEvent::BlockFailure {
                    key: key.clone(),
                    reason: error.to_string(),
                });
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::NullSink;
    use crate::registry::RegistryConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Counter-backed mock authority endpoint: every grant is disjoint,
    /// optionally failing or stalling first.
    #[derive(Clone)]
    struct MockAuthority {
        inner: Arc<MockState>,
    }

    struct MockState {
        counter: parking_lot::Mutex<u64>,
        calls: AtomicUsize,
        fail_first: AtomicUsize,
        delay: parking_lot::Mutex<Duration>,
    }

    impl MockAuthority {
        fn new() -> Self {
            Self {
                inner: Arc::new(MockState {
                    counter: parking_lot::Mutex::new(0),
                    calls: AtomicUsize::new(0),
                    fail_first: AtomicUsize::new(0),
                    delay: parking_lot::Mutex::new(Duration::ZERO),
                }),
            }
        }

        fn calls(&self) -> usize {
            self.inner.calls.load(Ordering::SeqCst)
        }

        fn fail_next(&self, n: usize) {
            self.inner.fail_first.store(n, Ordering::SeqCst);
        }

        fn set_delay(&self, delay: Duration) {
            *self.inner.delay.lock() = delay;
        }
    }

    impl AllocationClient for MockAuthority {
        async fn allocate_block(&self, _key: &SequenceKey, requested: u64) -> Result<BlockGrant> {
            self.inner.calls.fetch_add(1, Ordering::SeqCst);
            if self
                .inner
                .fail_first
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(Error::Transport {
                    host: "mock".into(),
                    context: "injected".into(),
                });
            }
            // Commit the counter move before any reply delay, like a real
            // authority persisting state ahead of the response. A timed-out
            // caller therefore leaves a durable gap behind.
            let start = {
                let mut counter = self.inner.counter.lock();
                let start = *counter;
                *counter += requested;
                start
            };
            let delay = *self.inner.delay.lock();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            Ok(BlockGrant {
                era: 0,
                authority: 1,
                start,
                count: requested,
            })
        }
    }

    fn generator_with(
        authority: MockAuthority,
        timeout: Duration,
    ) -> GdidGenerator<MockAuthority> {
        let registry = Arc::new(AuthorityHostRegistry::new(RegistryConfig {
            call_timeout: timeout,
            breaker_cooldown: Duration::from_millis(10),
        }));
        registry.register("sky", "mock", 0, authority);
        GdidGenerator::new(registry, Arc::new(NullSink), GeneratorConfig::default())
    }

    #[tokio::test]
    async fn cache_serves_ids_without_extra_round_trips() {
        let authority = MockAuthority::new();
        let generator = generator_with(authority.clone(), Duration::from_secs(1));

        let mut previous = generator.generate_one("sky", "sky_log").await.unwrap();
        for _ in 0..100 {
            let id = generator.generate_one("sky", "sky_log").await.unwrap();
            assert!(previous < id);
            previous = id;
        }
        assert_eq!(authority.calls(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_share_a_single_refill() {
        let authority = MockAuthority::new();
        let generator = Arc::new(generator_with(authority.clone(), Duration::from_secs(1)));

        let mut handles = Vec::new();
        for _ in 0..64 {
            let generator = Arc::clone(&generator);
            handles.push(tokio::spawn(async move {
                generator.generate_one("sky", "sky_log").await.unwrap()
            }));
        }

        let mut seen = std::collections::HashSet::new();
        for handle in handles {
            assert!(seen.insert(handle.await.unwrap()));
        }
        // 64 callers, default block of 1024: exactly one authority call.
        assert_eq!(authority.calls(), 1);
    }

    #[tokio::test]
    async fn batch_is_contiguous_or_nothing() {
        let authority = MockAuthority::new();
        let generator = generator_with(authority.clone(), Duration::from_secs(1));

        let ids = generator
            .try_generate_many("sky", "sky_log", 500)
            .await
            .unwrap();
        assert_eq!(ids.len(), 500);
        for pair in ids.windows(2) {
            assert_eq!(pair[1].counter, pair[0].counter + 1);
            assert_eq!(pair[0].era, pair[1].era);
        }

        authority.fail_next(1);
        let err = generator
            .try_generate_many("sky", "sky_log", 5000)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport { .. }));
    }

    #[tokio::test]
    async fn batch_larger_than_cache_gets_one_fresh_grant() {
        let authority = MockAuthority::new();
        let generator = generator_with(authority.clone(), Duration::from_secs(1));

        // Leave a partial remainder of 1023 in the cache...
        generator.generate_one("sky", "sky_log").await.unwrap();
        // ...then ask for more than it holds: one new grant, no stitching.
        let ids = generator
            .try_generate_many("sky", "sky_log", 2000)
            .await
            .unwrap();
        assert_eq!(authority.calls(), 2);
        assert_eq!(ids.first().unwrap().counter, 1024);
        assert_eq!(ids.last().unwrap().counter, 1024 + 1999);
    }

    #[tokio::test]
    async fn failure_caches_nothing() {
        let authority = MockAuthority::new();
        let generator = generator_with(authority.clone(), Duration::from_secs(1));

        authority.fail_next(1);
        generator.generate_one("sky", "sky_log").await.unwrap_err();

        // The failed call left no partial state behind, on either side: the
        // next call performs a fresh allocation starting from zero.
        let id = generator.generate_one("sky", "sky_log").await.unwrap();
        assert_eq!(id.counter, 0);
        assert_eq!(authority.calls(), 2);
    }

    #[tokio::test]
    async fn timed_out_block_is_abandoned() {
        let authority = MockAuthority::new();
        let generator = generator_with(authority.clone(), Duration::from_millis(20));

        authority.set_delay(Duration::from_millis(100));
        let err = generator.generate_one("sky", "sky_log").await.unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));

        // The first grant may have committed on the authority after the
        // deadline; the generator must not touch it. A retry gets a fresh,
        // non-overlapping block.
        authority.set_delay(Duration::ZERO);
        tokio::time::sleep(Duration::from_millis(150)).await;
        let id = generator.generate_one("sky", "sky_log").await.unwrap();
        assert_eq!(id.counter, 1024);
    }

    #[tokio::test]
    async fn invalid_names_never_reach_the_network() {
        let authority = MockAuthority::new();
        let generator = generator_with(authority.clone(), Duration::from_secs(1));

        let err = generator.generate_one("sky", "no spaces").await.unwrap_err();
        assert!(matches!(err, Error::InvalidKey { .. }));
        let err = generator
            .try_generate_many("", "sky_log", 10)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidKey { .. }));
        assert_eq!(authority.calls(), 0);
    }
}

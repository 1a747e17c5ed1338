//! Bounded LRU cache of decoded regions in front of a [`RegionSource`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread;
use std::time::Duration;

use log::{debug, trace, warn};
use tilewalk_core::{RegionId, Tile};

use crate::error::{CollisionError, FetchError};
use crate::region::CollisionRegion;
use crate::source::RegionSource;
use crate::view::{CollisionView, Transition, Walkability};

type LoadResult = Result<Arc<CollisionRegion>, CollisionError>;

/// Construction-time settings of a [`CollisionStore`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StoreConfig {
    /// Maximum number of regions kept in memory (about 4 KiB each).
    pub capacity: usize,
    /// Attempts per region load before giving up on a failing source.
    pub load_attempts: u32,
    /// Wait before retry `n` is `retry_backoff * n`.
    pub retry_backoff: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            capacity: 50,
            load_attempts: 3,
            retry_backoff: Duration::from_millis(50),
        }
    }
}

impl StoreConfig {
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_load_attempts(mut self, attempts: u32) -> Self {
        self.load_attempts = attempts;
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }
}

/// Snapshot of cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CacheStats {
    pub cached: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl CacheStats {
    /// Fraction of lookups served from the cache, in `[0, 1]`.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct Slot {
    // One cell per slot: concurrent loaders of the same region wait on the
    // single in-flight initialisation.
    cell: Arc<OnceLock<LoadResult>>,
    last_used: u64,
    pins: usize,
}

#[derive(Default)]
struct Inner {
    slots: HashMap<RegionId, Slot>,
    tick: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
}

/// Shared, thread-safe cache of collision regions.
///
/// Construct one per process (or per archive) and hand it to every
/// pathfinder by reference or [`Arc`].
pub struct CollisionStore {
    source: Box<dyn RegionSource>,
    config: StoreConfig,
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for CollisionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollisionStore")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

impl CollisionStore {
    /// Create a store with the default configuration.
    pub fn new(source: impl RegionSource + 'static) -> Self {
        Self::with_config(source, StoreConfig::default())
    }

    /// Create a store with an explicit configuration.
    pub fn with_config(source: impl RegionSource + 'static, config: StoreConfig) -> Self {
        Self {
            source: Box::new(source),
            config,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// The configuration this store was built with.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Load (or fetch from cache) the region `id`.
    ///
    /// Fails with [`CollisionError::DataUnavailable`] when the archive has no
    /// entry for the region; callers should degrade rather than abort.
    pub fn load(&self, id: RegionId) -> Result<Arc<CollisionRegion>, CollisionError> {
        self.acquire(id, false)
    }

    /// Open a query view that pins the regions it touches until dropped.
    pub fn view(&self) -> CollisionView<'_> {
        CollisionView::new(self)
    }

    /// Tri-state walkability of a single tile.
    pub fn is_walkable(&self, t: Tile) -> Walkability {
        self.view().is_walkable(t)
    }

    /// Tri-state legality of one step between adjacent tiles.
    pub fn transition(&self, from: Tile, to: Tile) -> Transition {
        self.view().transition(from, to)
    }

    /// Whether one step from `from` to `to` is known to be legal.
    pub fn can_transition(&self, from: Tile, to: Tile) -> bool {
        self.transition(from, to) == Transition::Open
    }

    /// Whether `id` currently has a slot in the cache.
    pub fn contains(&self, id: RegionId) -> bool {
        self.lock().slots.contains_key(&id)
    }

    /// Current counters.
    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            cached: inner.slots.len(),
            capacity: self.config.capacity,
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
        }
    }

    /// Drop every unpinned region and reset the counters.
    pub fn clear(&self) {
        let mut guard = self.lock();
        let inner = &mut *guard;
        inner.slots.retain(|_, s| s.pins > 0);
        inner.hits = 0;
        inner.misses = 0;
        inner.evictions = 0;
    }

    /// Load `id` and pin it until a matching [`unpin_all`](Self::unpin_all).
    ///
    /// A transient failure drops the slot along with its pin, so the caller
    /// holds a pin only on success or on a permanent error.
    pub(crate) fn pin(&self, id: RegionId) -> LoadResult {
        self.acquire(id, true)
    }

    pub(crate) fn unpin_all(&self, ids: impl IntoIterator<Item = RegionId>) {
        let mut guard = self.lock();
        let inner = &mut *guard;
        for id in ids {
            if let Some(slot) = inner.slots.get_mut(&id) {
                slot.pins = slot.pins.saturating_sub(1);
            }
        }
        evict_excess(inner, self.config.capacity);
    }

    fn acquire(&self, id: RegionId, pin: bool) -> LoadResult {
        let cell = {
            let mut guard = self.lock();
            let inner = &mut *guard;
            inner.tick += 1;
            let tick = inner.tick;
            let cell = match inner.slots.get_mut(&id) {
                Some(slot) => {
                    inner.hits += 1;
                    slot.last_used = tick;
                    slot.pins += usize::from(pin);
                    slot.cell.clone()
                }
                None => {
                    inner.misses += 1;
                    let cell = Arc::new(OnceLock::new());
                    inner.slots.insert(
                        id,
                        Slot {
                            cell: cell.clone(),
                            last_used: tick,
                            pins: usize::from(pin),
                        },
                    );
                    cell
                }
            };
            evict_excess(inner, self.config.capacity);
            cell
        };

        let result = cell.get_or_init(|| self.fetch(id)).clone();

        if let Err(e) = &result {
            if !e.is_permanent() {
                // Forget transient failures so a later query retries.
                let mut guard = self.lock();
                let same = guard
                    .slots
                    .get(&id)
                    .is_some_and(|s| Arc::ptr_eq(&s.cell, &cell));
                if same {
                    guard.slots.remove(&id);
                }
            }
        }
        result
    }

    fn fetch(&self, id: RegionId) -> LoadResult {
        let attempts = self.config.load_attempts.max(1);
        let mut last_error = String::new();
        for attempt in 1..=attempts {
            match self.source.fetch_region(id) {
                Ok(data) => {
                    debug!("loaded {id} ({} bytes)", data.len());
                    return CollisionRegion::decode(id, &data).map(Arc::new);
                }
                Err(FetchError::NotFound) => {
                    debug!("{id} is not in the collision archive");
                    return Err(CollisionError::DataUnavailable(id));
                }
                Err(FetchError::Io(e)) => {
                    warn!("loading {id} failed (attempt {attempt}/{attempts}): {e}");
                    last_error = e.to_string();
                    if attempt < attempts {
                        thread::sleep(self.config.retry_backoff * attempt);
                    }
                }
            }
        }
        Err(CollisionError::Fetch {
            region: id,
            attempts,
            message: last_error,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Evict least-recently-used regions until the cache fits its capacity.
///
/// Pinned slots and slots still loading are never evicted, so the cache may
/// stay above capacity until they are released.
fn evict_excess(inner: &mut Inner, capacity: usize) {
    while inner.slots.len() > capacity {
        let victim = inner
            .slots
            .iter()
            .filter(|(_, s)| s.pins == 0 && s.cell.get().is_some())
            .min_by_key(|(_, s)| s.last_used)
            .map(|(id, _)| *id);
        let Some(id) = victim else {
            break;
        };
        inner.slots.remove(&id);
        inner.evictions += 1;
        trace!("evicted {id}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;
    use std::io;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn open_source(ids: &[RegionId]) -> MemorySource {
        let mut src = MemorySource::new();
        for &id in ids {
            src.insert_region(&CollisionRegion::open(id));
        }
        src
    }

    /// Counts fetches and optionally fails the first `fail_first` of them.
    struct CountingSource {
        inner: MemorySource,
        fetches: Arc<AtomicU32>,
        fail_first: u32,
        delay: Duration,
    }

    impl RegionSource for CountingSource {
        fn fetch_region(&self, id: RegionId) -> Result<Vec<u8>, FetchError> {
            let n = self.fetches.fetch_add(1, Ordering::SeqCst);
            thread::sleep(self.delay);
            if n < self.fail_first {
                return Err(FetchError::Io(io::Error::other("flaky read")));
            }
            self.inner.fetch_region(id)
        }
    }

    const A: RegionId = RegionId::new(0, 0);
    const B: RegionId = RegionId::new(1, 0);
    const C: RegionId = RegionId::new(2, 0);

    #[test]
    fn second_load_is_a_hit() {
        let store = CollisionStore::new(open_source(&[A]));
        store.load(A).unwrap();
        store.load(A).unwrap();
        let stats = store.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
        assert!((stats.hit_rate() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn lru_evicts_least_recently_used() {
        let store = CollisionStore::with_config(
            open_source(&[A, B, C]),
            StoreConfig::default().with_capacity(2),
        );
        store.load(A).unwrap();
        store.load(B).unwrap();
        store.load(A).unwrap();
        store.load(C).unwrap();
        assert!(store.contains(A));
        assert!(!store.contains(B));
        assert!(store.contains(C));
        assert_eq!(store.stats().evictions, 1);
    }

    #[test]
    fn missing_region_is_data_unavailable() {
        let store = CollisionStore::new(MemorySource::new());
        assert_eq!(store.load(A).unwrap_err(), CollisionError::DataUnavailable(A));
        // The absence is remembered.
        assert_eq!(store.load(A).unwrap_err(), CollisionError::DataUnavailable(A));
        assert_eq!(store.stats().misses, 1);
    }

    #[test]
    fn transient_failures_are_retried_within_bound() {
        let fetches = Arc::new(AtomicU32::new(0));
        let src = CountingSource {
            inner: open_source(&[A]),
            fetches: fetches.clone(),
            fail_first: 2,
            delay: Duration::ZERO,
        };
        let store = CollisionStore::with_config(
            src,
            StoreConfig::default().with_retry_backoff(Duration::ZERO),
        );
        assert!(store.load(A).is_ok());
        assert_eq!(fetches.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn exhausted_retries_are_not_cached() {
        let fetches = Arc::new(AtomicU32::new(0));
        let src = CountingSource {
            inner: open_source(&[A]),
            fetches: fetches.clone(),
            fail_first: 2,
            delay: Duration::ZERO,
        };
        let store = CollisionStore::with_config(
            src,
            StoreConfig::default()
                .with_load_attempts(2)
                .with_retry_backoff(Duration::ZERO),
        );
        let err = store.load(A).unwrap_err();
        assert!(matches!(err, CollisionError::Fetch { attempts: 2, .. }));
        assert!(!store.contains(A));
        // The next call goes back to the source and succeeds.
        assert!(store.load(A).is_ok());
        assert_eq!(fetches.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn concurrent_loads_are_single_flight() {
        let fetches = Arc::new(AtomicU32::new(0));
        let src = CountingSource {
            inner: open_source(&[A]),
            fetches: fetches.clone(),
            fail_first: 0,
            delay: Duration::from_millis(30),
        };
        let store = CollisionStore::new(src);
        thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    assert!(store.load(A).is_ok());
                });
            }
        });
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn pinned_regions_survive_eviction() {
        let store = CollisionStore::with_config(
            open_source(&[A, B, C]),
            StoreConfig::default().with_capacity(1),
        );
        {
            let view = store.view();
            assert_eq!(view.is_walkable(A.base_tile(0).shift(10, 10)), Walkability::Open);
            store.load(B).unwrap();
            store.load(C).unwrap();
            assert!(store.contains(A), "pinned region evicted mid-query");
            assert!(store.stats().cached > 1);
        }
        // Released: the cache shrinks back to capacity.
        assert_eq!(store.stats().cached, 1);
        assert!(!store.contains(A));
    }

    #[test]
    fn failed_pin_does_not_release_another_views_pin() {
        let fetches = Arc::new(AtomicU32::new(0));
        let src = CountingSource {
            inner: open_source(&[A, B]),
            fetches: fetches.clone(),
            fail_first: 1,
            delay: Duration::ZERO,
        };
        let store = CollisionStore::with_config(
            src,
            StoreConfig::default()
                .with_capacity(1)
                .with_load_attempts(1)
                .with_retry_backoff(Duration::ZERO),
        );
        let probe = A.base_tile(0).shift(10, 10);
        let first = store.view();
        assert_eq!(first.is_walkable(probe), Walkability::Unknown);
        assert_eq!(first.pinned(), 0);
        let second = store.view();
        assert_eq!(second.is_walkable(probe), Walkability::Open);
        drop(first);
        store.load(B).unwrap();
        assert!(store.contains(A), "region evicted while a live view pins it");
        drop(second);
        assert!(!store.contains(A));
    }

    #[test]
    fn clear_resets_counters() {
        let store = CollisionStore::new(open_source(&[A, B]));
        store.load(A).unwrap();
        store.load(B).unwrap();
        store.clear();
        assert_eq!(store.stats(), CacheStats {
            capacity: 50,
            ..CacheStats::default()
        });
    }
}

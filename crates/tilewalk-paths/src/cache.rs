use std::collections::{HashMap, VecDeque};

use tilewalk_core::Tile;

use crate::path::Path;

/// Counters reported by [`PathCache::stats`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PathCacheStats {
    pub cached: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
}

impl PathCacheStats {
    /// Fraction of lookups served from the cache, 0 when nothing was looked up.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Logical routes keyed by `(start, end)`, evicted oldest-inserted first.
///
/// A capacity of zero disables caching.
#[derive(Debug, Clone)]
pub struct PathCache {
    capacity: usize,
    paths: HashMap<(Tile, Tile), Path>,
    order: VecDeque<(Tile, Tile)>,
    hits: u64,
    misses: u64,
}

impl PathCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            paths: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            hits: 0,
            misses: 0,
        }
    }

    /// Look up a route, counting the hit or miss.
    pub fn get(&mut self, start: Tile, end: Tile) -> Option<Path> {
        match self.paths.get(&(start, end)) {
            Some(p) => {
                self.hits += 1;
                Some(p.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Store a route. Replacing an existing entry keeps its age.
    pub fn insert(&mut self, start: Tile, end: Tile, path: Path) {
        if self.capacity == 0 {
            return;
        }
        let key = (start, end);
        if self.paths.insert(key, path).is_some() {
            return;
        }
        self.order.push_back(key);
        while self.order.len() > self.capacity {
            if let Some(old) = self.order.pop_front() {
                self.paths.remove(&old);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> PathCacheStats {
        PathCacheStats {
            cached: self.paths.len(),
            capacity: self.capacity,
            hits: self.hits,
            misses: self.misses,
        }
    }

    /// Drop every route and reset the counters.
    pub fn clear(&mut self) {
        self.paths.clear();
        self.order.clear();
        self.hits = 0;
        self.misses = 0;
    }
}

impl Default for PathCache {
    fn default() -> Self {
        Self::new(100)
    }
}

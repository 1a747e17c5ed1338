use std::sync::Arc;

use log::{debug, trace};
use rand::{Rng, RngExt};
use tilewalk_collision::{CollisionStore, CollisionView, Walkability};
use tilewalk_core::{Bounds, Tile};

use crate::cache::{PathCache, PathCacheStats};
use crate::path::{Path, Unreachable};
use crate::range::SearchRange;
use crate::variance::{UnknownPolicy, VarianceGraph, VarianceLevel, VarianceProfile};

/// A single routing request.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PathRequest {
    pub start: Tile,
    pub end: Tile,
    pub variance: VarianceLevel,
}

impl PathRequest {
    pub fn new(start: Tile, end: Tile, variance: VarianceLevel) -> Self {
        Self {
            start,
            end,
            variance,
        }
    }
}

/// Tuning for [`VariancePathfinder`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PathfinderConfig {
    pub unknown: UnknownPolicy,
    /// Routes kept by the logical-route cache. Zero disables it.
    pub cache_capacity: usize,
    /// Tiles added around the start/end rectangle before the first search.
    pub search_margin: i32,
    /// How many times the margin is doubled before giving up.
    pub max_expansions: u32,
    /// Base routes shorter than this many tiles are never bent.
    pub waypoint_min_tiles: usize,
    /// Candidates drawn per waypoint before that waypoint is skipped.
    pub waypoint_attempts: u32,
    /// Largest search box, in tiles. Requests needing more are unreachable.
    pub max_search_tiles: usize,
}

impl Default for PathfinderConfig {
    fn default() -> Self {
        Self {
            unknown: UnknownPolicy::default(),
            cache_capacity: 100,
            search_margin: 16,
            max_expansions: 3,
            waypoint_min_tiles: 15,
            waypoint_attempts: 5,
            max_search_tiles: 1 << 20,
        }
    }
}

impl PathfinderConfig {
    pub fn with_unknown(mut self, unknown: UnknownPolicy) -> Self {
        self.unknown = unknown;
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    pub fn with_search_margin(mut self, margin: i32) -> Self {
        self.search_margin = margin.max(1);
        self
    }

    pub fn with_max_expansions(mut self, n: u32) -> Self {
        self.max_expansions = n;
        self
    }

    pub fn with_max_search_tiles(mut self, tiles: usize) -> Self {
        self.max_search_tiles = tiles;
        self
    }
}

/// Randomized-weight router over a shared [`CollisionStore`].
///
/// Every search draws fresh edge weights, so identical requests produce
/// different routes. On top of that, long routes are bent through one to
/// three random waypoints offset sideways from the straight line.
pub struct VariancePathfinder {
    store: Arc<CollisionStore>,
    config: PathfinderConfig,
    range: SearchRange,
    cache: PathCache,
}

impl VariancePathfinder {
    pub fn new(store: Arc<CollisionStore>) -> Self {
        Self::with_config(store, PathfinderConfig::default())
    }

    pub fn with_config(store: Arc<CollisionStore>, config: PathfinderConfig) -> Self {
        let cache = PathCache::new(config.cache_capacity);
        Self {
            store,
            config,
            range: SearchRange::default(),
            cache,
        }
    }

    pub fn store(&self) -> &Arc<CollisionStore> {
        &self.store
    }

    pub fn config(&self) -> &PathfinderConfig {
        &self.config
    }

    /// Route from `start` to `end`, served from the route cache when possible.
    pub fn find_path(
        &mut self,
        start: Tile,
        end: Tile,
        variance: VarianceLevel,
    ) -> Result<Path, Unreachable> {
        self.find_path_with_rng(PathRequest::new(start, end, variance), &mut rand::rng())
    }

    /// Route from `start` to `end`, always searched afresh. The result is not
    /// cached either.
    pub fn find_path_uncached(
        &mut self,
        start: Tile,
        end: Tile,
        variance: VarianceLevel,
    ) -> Result<Path, Unreachable> {
        self.compute(PathRequest::new(start, end, variance), &mut rand::rng())
    }

    /// [`find_path_uncached`](Self::find_path_uncached) with a caller-supplied
    /// random source.
    pub fn find_path_uncached_with_rng<R: Rng + ?Sized>(
        &mut self,
        req: PathRequest,
        rng: &mut R,
    ) -> Result<Path, Unreachable> {
        self.compute(req, rng)
    }

    /// [`find_path`](Self::find_path) with a caller-supplied random source.
    pub fn find_path_with_rng<R: Rng + ?Sized>(
        &mut self,
        req: PathRequest,
        rng: &mut R,
    ) -> Result<Path, Unreachable> {
        if let Some(path) = self.cache.get(req.start, req.end) {
            debug!("route cache hit {} -> {}", req.start, req.end);
            return Ok(path);
        }
        let path = self.compute(req, rng)?;
        self.cache.insert(req.start, req.end, path.clone());
        Ok(path)
    }

    pub fn cache_stats(&self) -> PathCacheStats {
        self.cache.stats()
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    fn compute<R: Rng + ?Sized>(
        &mut self,
        req: PathRequest,
        rng: &mut R,
    ) -> Result<Path, Unreachable> {
        let PathRequest {
            start,
            end,
            variance,
        } = req;
        let unreachable = Unreachable { start, end };
        if start == end {
            return Ok(Path::single(start));
        }
        if start.plane != end.plane {
            debug!("{start} -> {end}: plane change");
            return Err(unreachable);
        }

        let store = Arc::clone(&self.store);
        let view = store.view();
        match view.is_walkable(end) {
            Walkability::Blocked => {
                debug!("{start} -> {end}: destination is blocked");
                return Err(unreachable);
            }
            Walkability::Unknown if self.config.unknown == UnknownPolicy::Deny => {
                debug!("{start} -> {end}: destination has no collision data");
                return Err(unreachable);
            }
            _ => {}
        }

        let profile = variance.profile();
        let Some((tiles, cost)) = self.search(&view, start, end, profile, rng) else {
            debug!("{start} -> {end}: no route");
            return Err(unreachable);
        };
        let base = Path::new(tiles, Vec::new(), cost);
        if base.len() < self.config.waypoint_min_tiles {
            trace!("{start} -> {end}: {} tiles, no waypoints", base.len());
            return Ok(base);
        }
        Ok(self.bend(&view, base, profile, rng))
    }

    /// Dijkstra inside a bounding box, doubling its margin on failure.
    fn search<R: Rng + ?Sized>(
        &mut self,
        view: &CollisionView<'_>,
        from: Tile,
        to: Tile,
        profile: VarianceProfile,
        rng: &mut R,
    ) -> Option<(Vec<Tile>, f64)> {
        let mut margin = self.config.search_margin.max(1);
        for attempt in 0..=self.config.max_expansions {
            let bounds = Bounds::around(from, to, margin);
            if bounds.len() > self.config.max_search_tiles {
                debug!(
                    "{from} -> {to}: {bounds} exceeds {} tiles",
                    self.config.max_search_tiles
                );
                break;
            }
            self.range.set_bounds(bounds);
            let mut graph = VarianceGraph::new(view, rng, profile, self.config.unknown);
            if let Some(found) = self.range.dijkstra_path(&mut graph, from, to) {
                return Some(found);
            }
            trace!("{from} -> {to}: nothing inside {bounds} (attempt {attempt})");
            margin = margin.saturating_mul(2);
        }
        None
    }

    /// Reroute `base` through random waypoints off the straight line.
    ///
    /// Returns `base` unchanged if no waypoint is accepted or the final leg
    /// cannot be routed.
    fn bend<R: Rng + ?Sized>(
        &mut self,
        view: &CollisionView<'_>,
        base: Path,
        profile: VarianceProfile,
        rng: &mut R,
    ) -> Path {
        let (start, end) = (base.start(), base.end());
        let candidates = self.pick_waypoints(view, start, end, profile, rng);
        if candidates.is_empty() {
            return base;
        }

        let mut tiles = vec![start];
        let mut waypoints = Vec::with_capacity(candidates.len());
        let mut cost = 0.0;
        for wp in candidates {
            let from = tiles[tiles.len() - 1];
            match self.search(view, from, wp, profile, rng) {
                Some((leg, c)) => {
                    tiles.extend_from_slice(&leg[1..]);
                    cost += c;
                    waypoints.push(wp);
                }
                None => debug!("dropping waypoint {wp}: no route from {from}"),
            }
        }
        let from = tiles[tiles.len() - 1];
        let Some((leg, c)) = self.search(view, from, end, profile, rng) else {
            debug!("keeping base route: no final leg from {from} to {end}");
            return base;
        };
        tiles.extend_from_slice(&leg[1..]);
        cost += c;
        debug!(
            "{start} -> {end}: {} tiles through {} waypoint(s)",
            tiles.len(),
            waypoints.len()
        );
        Path::new(tiles, waypoints, cost)
    }

    /// Draw walkable waypoints at evenly spaced anchors along `start -> end`,
    /// pushed sideways by a random perpendicular offset.
    fn pick_waypoints<R: Rng + ?Sized>(
        &self,
        view: &CollisionView<'_>,
        start: Tile,
        end: Tile,
        profile: VarianceProfile,
        rng: &mut R,
    ) -> Vec<Tile> {
        let dx = (end.x - start.x) as f64;
        let dy = (end.y - start.y) as f64;
        let len = dx.hypot(dy);
        let max_offset = profile.max_offset.max(1);
        let most = profile.max_waypoints.max(profile.min_waypoints);
        let count = rng.random_range(profile.min_waypoints..=most);
        if len == 0.0 || count == 0 {
            return Vec::new();
        }
        let (px, py) = (-dy / len, dx / len);

        let mut accepted = Vec::with_capacity(count);
        for i in 1..=count {
            let frac = i as f64 / (count + 1) as f64;
            let (ax, ay) = (start.x as f64 + dx * frac, start.y as f64 + dy * frac);
            for _ in 0..self.config.waypoint_attempts {
                let mag = rng.random_range(1..=max_offset) as f64;
                let sign = if rng.random_bool(0.5) { 1.0 } else { -1.0 };
                let candidate = Tile::new(
                    (ax + px * mag * sign).round() as i32,
                    (ay + py * mag * sign).round() as i32,
                    start.plane,
                );
                if candidate != start
                    && candidate != end
                    && view.is_walkable(candidate) == Walkability::Open
                {
                    trace!("waypoint {i}/{count}: {candidate}");
                    accepted.push(candidate);
                    break;
                }
            }
        }
        accepted
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use tilewalk_collision::{CollisionRegion, MemorySource, TileFlags};
    use tilewalk_core::RegionId;

    use super::*;

    fn t(x: i32, y: i32) -> Tile {
        Tile::new(x, y, 0)
    }

    /// Four open regions around the origin, so searches near (0, 0) never
    /// touch missing data.
    fn open_store() -> Arc<CollisionStore> {
        let mut src = MemorySource::new();
        for (rx, ry) in [(0, 0), (-1, 0), (0, -1), (-1, -1)] {
            src.insert_region(&CollisionRegion::open(RegionId::new(rx, ry)));
        }
        Arc::new(CollisionStore::new(src))
    }

    /// Region (0, 0) with `blocked` tiles fully closed, everything else open.
    fn store_with_blocked(blocked: impl Fn(i32, i32) -> bool) -> Arc<CollisionStore> {
        let id = RegionId::new(0, 0);
        let region = CollisionRegion::from_fn(id, |tile| {
            let mut f = TileFlags::NONE;
            if !blocked(tile.x, tile.y) && !blocked(tile.x, tile.y + 1) {
                f = f | TileFlags::NORTH;
            }
            if !blocked(tile.x, tile.y) && !blocked(tile.x + 1, tile.y) {
                f = f | TileFlags::EAST;
            }
            f
        });
        Arc::new(CollisionStore::new(MemorySource::new().with_region(&region)))
    }

    fn assert_legal(store: &CollisionStore, path: &Path) {
        assert!(path.is_contiguous(), "{:?}", path.tiles());
        for w in path.tiles().windows(2) {
            assert!(store.can_transition(w[0], w[1]), "{} -> {}", w[0], w[1]);
        }
    }

    #[test]
    fn every_step_is_legal() {
        // Two offset walls force a zig-zag.
        let store = store_with_blocked(|x, y| (x == 20 && y < 40) || (x == 35 && y > 10));
        let cfg = PathfinderConfig::default().with_unknown(UnknownPolicy::Deny);
        let mut pf = VariancePathfinder::with_config(Arc::clone(&store), cfg);
        for level in [
            VarianceLevel::Conservative,
            VarianceLevel::Moderate,
            VarianceLevel::Aggressive,
        ] {
            let p = pf.find_path_uncached(t(10, 20), t(50, 20), level).unwrap();
            assert_eq!(p.start(), t(10, 20));
            assert_eq!(p.end(), t(50, 20));
            assert_legal(&store, &p);
        }
    }

    #[test]
    fn identical_requests_vary() {
        let store = open_store();
        let mut pf = VariancePathfinder::new(Arc::clone(&store));
        let mut costs = Vec::new();
        for _ in 0..5 {
            let p = pf
                .find_path_uncached(t(2, 2), t(40, 30), VarianceLevel::Moderate)
                .unwrap();
            assert_legal(&store, &p);
            costs.push(p.cost());
        }
        costs.sort_by(f64::total_cmp);
        costs.dedup_by(|a, b| (*a - *b).abs() < 1e-9);
        assert!(costs.len() >= 4, "only {} distinct costs", costs.len());
    }

    #[test]
    fn short_corridor_gets_no_waypoints() {
        let store = store_with_blocked(|x, y| !(y == 5 && (5..=9).contains(&x)));
        let mut pf = VariancePathfinder::new(store);
        let mut rng = StdRng::seed_from_u64(11);
        let req = PathRequest::new(t(5, 5), t(9, 5), VarianceLevel::Aggressive);
        let p = pf.find_path_with_rng(req, &mut rng).unwrap();
        assert_eq!(p.len(), 5);
        assert!(p.waypoints().is_empty());
    }

    #[test]
    fn long_routes_pass_through_waypoints() {
        let store = open_store();
        let mut pf = VariancePathfinder::new(Arc::clone(&store));
        let mut rng = StdRng::seed_from_u64(5);
        let req = PathRequest::new(t(0, 0), t(40, 0), VarianceLevel::Aggressive);
        let p = pf.find_path_with_rng(req, &mut rng).unwrap();
        assert!((2..=3).contains(&p.waypoints().len()));
        for wp in p.waypoints() {
            assert!(p.tiles().contains(wp));
            assert!(wp.y != 0);
            assert!(wp.y.abs() <= 8);
        }
        assert_legal(&store, &p);
    }

    #[test]
    fn conservative_open_grid_length() {
        let store = open_store();
        let mut pf = VariancePathfinder::new(store);
        for _ in 0..10 {
            let p = pf
                .find_path_uncached(t(0, 0), t(20, 0), VarianceLevel::Conservative)
                .unwrap();
            assert!((20..=23).contains(&p.len()), "{} tiles", p.len());
        }
    }

    #[test]
    fn blocked_destination_is_unreachable() {
        let store = store_with_blocked(|x, y| (x, y) == (30, 30));
        let mut pf = VariancePathfinder::new(store);
        let err = pf
            .find_path(t(10, 10), t(30, 30), VarianceLevel::Moderate)
            .unwrap_err();
        assert_eq!(
            err,
            Unreachable {
                start: t(10, 10),
                end: t(30, 30)
            }
        );
        assert!(
            pf.find_path(t(10, 10), Tile::new(12, 10, 1), VarianceLevel::Moderate)
                .is_err()
        );
    }

    #[test]
    fn enclosed_room_is_unreachable_after_expansions() {
        // A 2x2 room at (30..=31, 30..=31) behind a closed ring.
        let ring = |x: i32, y: i32| {
            let outer = (29..=32).contains(&x) && (29..=32).contains(&y);
            let room = (30..=31).contains(&x) && (30..=31).contains(&y);
            outer && !room
        };
        let store = store_with_blocked(ring);
        let cfg = PathfinderConfig::default().with_unknown(UnknownPolicy::Deny);
        let mut pf = VariancePathfinder::with_config(Arc::clone(&store), cfg);
        assert_eq!(store.view().is_walkable(t(30, 30)), Walkability::Open);
        assert!(
            pf.find_path(t(5, 5), t(30, 30), VarianceLevel::Moderate)
                .is_err()
        );
        // Inside the room everything still works.
        let p = pf
            .find_path(t(30, 30), t(31, 31), VarianceLevel::Moderate)
            .unwrap();
        assert_legal(&store, &p);
        assert!(p.len() <= 3);
    }

    #[test]
    fn search_box_grows_around_long_walls() {
        // A wall far wider than the initial margin.
        let store = store_with_blocked(|x, y| y == 32 && (2..62).contains(&x));
        let cfg = PathfinderConfig::default()
            .with_search_margin(4)
            .with_unknown(UnknownPolicy::Deny);
        let mut pf = VariancePathfinder::with_config(Arc::clone(&store), cfg);
        let p = pf
            .find_path(t(30, 28), t(30, 36), VarianceLevel::Conservative)
            .unwrap();
        assert_legal(&store, &p);
        assert!(p.len() > 20);
    }

    #[test]
    fn oversized_search_boxes_are_refused() {
        let cfg = PathfinderConfig::default()
            .with_search_margin(4)
            .with_max_search_tiles(2_000);
        let mut pf = VariancePathfinder::with_config(open_store(), cfg);
        let near = pf.find_path_uncached(t(0, 0), t(40, 0), VarianceLevel::Conservative);
        assert!(near.is_ok());
        let far = pf.find_path_uncached(t(-60, -60), t(60, 60), VarianceLevel::Conservative);
        assert_eq!(
            far.unwrap_err(),
            Unreachable {
                start: t(-60, -60),
                end: t(60, 60)
            }
        );

        // A margin that bypassed the setter clamps to the box limit.
        let cfg = PathfinderConfig {
            search_margin: i32::MAX,
            ..PathfinderConfig::default()
        };
        let mut pf = VariancePathfinder::with_config(open_store(), cfg);
        assert!(pf.find_path_uncached(t(0, 0), t(5, 0), VarianceLevel::Moderate).is_err());
    }

    #[test]
    fn unknown_data_is_penalized_or_denied() {
        let store = Arc::new(CollisionStore::new(MemorySource::new()));
        let mut lenient = VariancePathfinder::new(Arc::clone(&store));
        let p = lenient
            .find_path(t(3, 3), t(8, 3), VarianceLevel::Moderate)
            .unwrap();
        assert!(p.is_contiguous());
        assert!(p.cost() >= 25.0 * 5.0);

        let cfg = PathfinderConfig::default().with_unknown(UnknownPolicy::Deny);
        let mut strict = VariancePathfinder::with_config(store, cfg);
        assert!(
            strict
                .find_path(t(3, 3), t(8, 3), VarianceLevel::Moderate)
                .is_err()
        );
    }

    #[test]
    fn repeat_requests_hit_the_route_cache() {
        let store = open_store();
        let mut pf = VariancePathfinder::new(store);
        let a = pf.find_path(t(1, 1), t(30, 12), VarianceLevel::Moderate).unwrap();
        let b = pf.find_path(t(1, 1), t(30, 12), VarianceLevel::Moderate).unwrap();
        assert_eq!(a, b);
        let s = pf.cache_stats();
        assert_eq!((s.hits, s.misses, s.cached), (1, 1, 1));
        pf.clear_cache();
        assert_eq!(pf.cache_stats().cached, 0);
    }

    #[test]
    fn same_tile_is_a_single_tile_route() {
        let mut pf = VariancePathfinder::new(open_store());
        let p = pf.find_path(t(4, 4), t(4, 4), VarianceLevel::Aggressive).unwrap();
        assert_eq!(p.tiles(), &[t(4, 4)]);
        assert_eq!(p.steps(), 0);
    }
}

//! Movement queries over a pinned set of regions.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use tilewalk_core::{Direction, RegionId, Tile};

use crate::region::{CollisionRegion, TileFlags};
use crate::store::CollisionStore;

/// Whether a tile can be stood on.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Walkability {
    /// At least one orthogonal move out of the tile is open.
    Open,
    /// Every orthogonal move out of the tile is blocked.
    Blocked,
    /// The collision data needed to decide is unavailable.
    Unknown,
}

/// Whether a single step between adjacent tiles is legal.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Transition {
    Open,
    Blocked,
    /// No edge is known blocked, but at least one depends on missing data.
    Unknown,
}

impl Transition {
    /// Fold edge states: any known-blocked edge wins, then any unknown one.
    fn all(edges: impl IntoIterator<Item = Option<bool>>) -> Self {
        let mut unknown = false;
        for edge in edges {
            match edge {
                Some(true) => {}
                Some(false) => return Transition::Blocked,
                None => unknown = true,
            }
        }
        if unknown {
            Transition::Unknown
        } else {
            Transition::Open
        }
    }
}

/// A query handle over a [`CollisionStore`].
///
/// Every region the view touches stays pinned in the store (and memoized
/// locally) until the view is dropped, so a long search sees consistent data
/// and never races an eviction. Views are cheap; open one per search.
pub struct CollisionView<'a> {
    store: &'a CollisionStore,
    regions: RefCell<HashMap<RegionId, Memo>>,
}

/// What a view remembers about one region it asked for.
struct Memo {
    region: Option<Arc<CollisionRegion>>,
    // A transient load failure leaves no pin in the store.
    pinned: bool,
}

impl<'a> CollisionView<'a> {
    pub(crate) fn new(store: &'a CollisionStore) -> Self {
        Self {
            store,
            regions: RefCell::new(HashMap::new()),
        }
    }

    /// The store this view reads from.
    pub fn store(&self) -> &'a CollisionStore {
        self.store
    }

    /// Number of regions pinned by this view (including known-missing ones).
    pub fn pinned(&self) -> usize {
        self.regions.borrow().values().filter(|m| m.pinned).count()
    }

    fn region(&self, id: RegionId) -> Option<Arc<CollisionRegion>> {
        if let Some(m) = self.regions.borrow().get(&id) {
            return m.region.clone();
        }
        let memo = match self.store.pin(id) {
            Ok(r) => Memo {
                region: Some(r),
                pinned: true,
            },
            Err(e) => Memo {
                region: None,
                pinned: e.is_permanent(),
            },
        };
        let loaded = memo.region.clone();
        self.regions.borrow_mut().insert(id, memo);
        loaded
    }

    /// Flags of `t`, or `None` if its region is unavailable.
    pub fn flags(&self, t: Tile) -> Option<TileFlags> {
        self.region(t.region()).map(|r| r.flags(t))
    }

    fn edge(&self, t: Tile, flag: TileFlags) -> Option<bool> {
        self.flags(t).map(|f| f.contains(flag))
    }

    /// State of the single orthogonal edge from `t` towards `(dx, dy)`.
    ///
    /// South and west edges are stored on the neighbouring tile.
    fn orthogonal(&self, t: Tile, dx: i32, dy: i32) -> Option<bool> {
        match (dx, dy) {
            (0, 1) => self.edge(t, TileFlags::NORTH),
            (0, -1) => self.edge(t.shift(0, -1), TileFlags::NORTH),
            (1, 0) => self.edge(t, TileFlags::EAST),
            (-1, 0) => self.edge(t.shift(-1, 0), TileFlags::EAST),
            _ => Some(false),
        }
    }

    /// Tri-state walkability of `t`.
    pub fn is_walkable(&self, t: Tile) -> Walkability {
        if self.region(t.region()).is_none() {
            return Walkability::Unknown;
        }
        let mut unknown = false;
        for dir in [
            Direction::North,
            Direction::East,
            Direction::South,
            Direction::West,
        ] {
            let (dx, dy) = dir.delta();
            match self.orthogonal(t, dx, dy) {
                Some(true) => return Walkability::Open,
                Some(false) => {}
                None => unknown = true,
            }
        }
        if unknown {
            Walkability::Unknown
        } else {
            Walkability::Blocked
        }
    }

    /// Tri-state legality of one step from `from` to `to`.
    ///
    /// Non-adjacent tiles and plane changes are `Blocked`. A diagonal step
    /// needs all four edges of the 2×2 square it crosses, so it can never cut
    /// a corner even when the diagonal tile itself is open.
    pub fn transition(&self, from: Tile, to: Tile) -> Transition {
        let Some(dir) = Direction::between(from, to) else {
            return Transition::Blocked;
        };
        let (dx, dy) = dir.delta();
        if !dir.is_diagonal() {
            return Transition::all([self.orthogonal(from, dx, dy)]);
        }
        let beside = from.shift(dx, 0);
        let above = from.shift(0, dy);
        Transition::all([
            self.orthogonal(from, 0, dy),
            self.orthogonal(above, dx, 0),
            self.orthogonal(from, dx, 0),
            self.orthogonal(beside, 0, dy),
        ])
    }

    /// Whether one step from `from` to `to` is known to be legal.
    pub fn can_transition(&self, from: Tile, to: Tile) -> bool {
        self.transition(from, to) == Transition::Open
    }

    /// Append every neighbour reachable from `t` in one known-legal step.
    pub fn walkable_neighbors(&self, t: Tile, buf: &mut Vec<Tile>) {
        for n in t.neighbors_8() {
            if self.can_transition(t, n) {
                buf.push(n);
            }
        }
    }

    /// Whether `a` and `b` are joined by a straight, known-legal line of steps.
    ///
    /// Walks the Bresenham line between the two tiles and requires every step
    /// along it to be open. Tiles on different planes are never in sight.
    pub fn line_of_sight(&self, a: Tile, b: Tile) -> bool {
        if a.plane != b.plane {
            return false;
        }
        let dx = (b.x - a.x).abs();
        let dy = (b.y - a.y).abs();
        let sx = if a.x < b.x { 1 } else { -1 };
        let sy = if a.y < b.y { 1 } else { -1 };
        let mut err = dx - dy;
        let mut cur = a;
        while cur != b {
            let e2 = 2 * err;
            let mut next = cur;
            if e2 > -dy {
                err -= dy;
                next.x += sx;
            }
            if e2 < dx {
                err += dx;
                next.y += sy;
            }
            if !self.can_transition(cur, next) {
                return false;
            }
            cur = next;
        }
        true
    }
}

impl Drop for CollisionView<'_> {
    fn drop(&mut self) {
        let ids: Vec<RegionId> = self
            .regions
            .get_mut()
            .iter()
            .filter(|(_, m)| m.pinned)
            .map(|(id, _)| *id)
            .collect();
        self.store.unpin_all(ids);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;

    const ID: RegionId = RegionId::new(0, 0);

    /// Store over a single region where `blocked` tiles have all four of
    /// their edges closed and everything else is open.
    fn store_with_blocked(blocked: &[(i32, i32)]) -> CollisionStore {
        let is_blocked = |x: i32, y: i32| blocked.contains(&(x, y));
        let region = CollisionRegion::from_fn(ID, |t| {
            let mut f = TileFlags::NONE;
            if !is_blocked(t.x, t.y) && !is_blocked(t.x, t.y + 1) {
                f = f | TileFlags::NORTH;
            }
            if !is_blocked(t.x, t.y) && !is_blocked(t.x + 1, t.y) {
                f = f | TileFlags::EAST;
            }
            f
        });
        CollisionStore::new(MemorySource::new().with_region(&region))
    }

    fn t(x: i32, y: i32) -> Tile {
        Tile::new(x, y, 0)
    }

    #[test]
    fn orthogonal_moves_follow_edges() {
        let store = store_with_blocked(&[(5, 6)]);
        let view = store.view();
        assert!(view.can_transition(t(5, 5), t(6, 5)));
        assert!(view.can_transition(t(6, 5), t(5, 5)));
        assert!(!view.can_transition(t(5, 5), t(5, 6)));
        assert!(!view.can_transition(t(5, 6), t(5, 5)));
        assert_eq!(view.is_walkable(t(5, 6)), Walkability::Blocked);
        assert_eq!(view.is_walkable(t(5, 5)), Walkability::Open);
    }

    #[test]
    fn diagonal_cannot_cut_blocked_corners() {
        // . # .
        // . c #    c = (11, 11); both tiles flanking its NE step are blocked
        // . . .
        let store = store_with_blocked(&[(11, 12), (12, 11)]);
        let view = store.view();
        let centre = t(11, 11);
        let ne = t(12, 12);
        assert_eq!(view.is_walkable(ne), Walkability::Open);
        assert!(!view.can_transition(centre, ne));
        assert!(!view.can_transition(ne, centre));
        // One blocked flank is already enough.
        let store = store_with_blocked(&[(12, 11)]);
        assert!(!store.can_transition(centre, ne));
        // Other diagonals are unaffected.
        assert!(store.can_transition(centre, t(10, 12)));
        assert!(store.can_transition(centre, t(10, 10)));
    }

    #[test]
    fn non_adjacent_and_cross_plane_steps_are_blocked() {
        let store = store_with_blocked(&[]);
        assert_eq!(store.transition(t(3, 3), t(5, 3)), Transition::Blocked);
        assert_eq!(store.transition(t(3, 3), t(3, 3)), Transition::Blocked);
        assert_eq!(
            store.transition(t(3, 3), Tile::new(3, 4, 1)),
            Transition::Blocked
        );
    }

    #[test]
    fn missing_regions_read_unknown() {
        let store = store_with_blocked(&[]);
        let view = store.view();
        let outside = t(100, 10);
        assert_eq!(view.is_walkable(outside), Walkability::Unknown);
        // Crossing the region border eastwards reads the edge from the
        // loaded region, so it is known; the step after that is not.
        assert_eq!(view.transition(t(63, 10), t(64, 10)), Transition::Open);
        assert_eq!(view.transition(t(64, 10), t(65, 10)), Transition::Unknown);
        // A known-blocked edge wins over missing data.
        let store = store_with_blocked(&[(63, 10)]);
        assert_eq!(store.transition(t(63, 11), t(64, 10)), Transition::Blocked);
    }

    #[test]
    fn walkable_neighbors_skip_blocked() {
        let store = store_with_blocked(&[(20, 21)]);
        let view = store.view();
        let mut buf = Vec::new();
        view.walkable_neighbors(t(20, 20), &mut buf);
        // North is blocked, and with it both northern diagonals.
        assert_eq!(buf.len(), 5);
        assert!(!buf.contains(&t(20, 21)));
        assert!(!buf.contains(&t(21, 21)));
    }

    #[test]
    fn line_of_sight_stops_at_walls() {
        let store = store_with_blocked(&[(15, 10)]);
        let view = store.view();
        assert!(view.line_of_sight(t(10, 20), t(20, 20)));
        assert!(view.line_of_sight(t(10, 10), t(14, 14)));
        assert!(!view.line_of_sight(t(10, 10), t(20, 10)));
        assert!(!view.line_of_sight(t(10, 10), Tile::new(12, 10, 1)));
    }

    #[test]
    fn view_pins_until_dropped() {
        let store = store_with_blocked(&[]);
        {
            let view = store.view();
            view.is_walkable(t(30, 30));
            assert_eq!(view.pinned(), 1);
        }
        assert!(store.contains(ID));
    }
}

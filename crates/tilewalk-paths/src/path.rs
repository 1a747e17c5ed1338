use std::fmt;

use tilewalk_collision::CollisionView;
use tilewalk_core::Tile;

use crate::variance::base_cost;

/// Tiles the player can cover with a single click, and the default lookahead.
pub const DEFAULT_LOOKAHEAD: usize = 12;

/// A logical route: contiguous tiles from start to end, both included.
///
/// Every consecutive pair is adjacent (Chebyshev distance 1, same plane).
/// A `Path` is never empty.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Path {
    tiles: Vec<Tile>,
    waypoints: Vec<Tile>,
    cost: f64,
}

impl Path {
    pub(crate) fn new(tiles: Vec<Tile>, waypoints: Vec<Tile>, cost: f64) -> Self {
        debug_assert!(!tiles.is_empty());
        Self {
            tiles,
            waypoints,
            cost,
        }
    }

    /// The trivial route of a tile to itself.
    pub fn single(t: Tile) -> Self {
        Self::new(vec![t], Vec::new(), 0.0)
    }

    /// Straight-line route ignoring collision, for walking without data.
    ///
    /// Moves diagonally while both axes differ, interpolated so the route
    /// hugs the true line. `start` and `end` must share a plane.
    pub fn direct_line(start: Tile, end: Tile) -> Self {
        let n = start.chebyshev(end);
        if n == 0 || start.plane != end.plane {
            return Self::single(start);
        }
        let dx = (end.x - start.x) as f64;
        let dy = (end.y - start.y) as f64;
        let mut tiles = Vec::with_capacity(n as usize + 1);
        let mut cost = 0.0;
        for i in 0..=n {
            let f = i as f64 / n as f64;
            let t = Tile::new(
                start.x + (dx * f).round() as i32,
                start.y + (dy * f).round() as i32,
                start.plane,
            );
            if let Some(&prev) = tiles.last() {
                cost += base_cost(prev, t);
            }
            tiles.push(t);
        }
        Self::new(tiles, Vec::new(), cost)
    }

    #[inline]
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn into_tiles(self) -> Vec<Tile> {
        self.tiles
    }

    #[inline]
    pub fn start(&self) -> Tile {
        self.tiles[0]
    }

    #[inline]
    pub fn end(&self) -> Tile {
        self.tiles[self.tiles.len() - 1]
    }

    /// Number of tiles, endpoints included.
    #[inline]
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    /// Always false; present for API symmetry with `len`.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Number of moves, i.e. `len() - 1`.
    #[inline]
    pub fn steps(&self) -> usize {
        self.tiles.len() - 1
    }

    /// Intermediate tiles injected to bend the route, in visiting order.
    pub fn waypoints(&self) -> &[Tile] {
        &self.waypoints
    }

    /// Sum of the randomized edge weights this route was found with.
    pub fn cost(&self) -> f64 {
        self.cost
    }

    /// Whether every consecutive pair of tiles is adjacent.
    pub fn is_contiguous(&self) -> bool {
        self.tiles.windows(2).all(|w| w[0].is_adjacent(w[1]))
    }

    /// Index of the tile at or after `from` that is closest to `pos`.
    ///
    /// Ties go to the later tile. Returns the index and its Chebyshev distance.
    pub fn nearest_index(&self, pos: Tile, from: usize) -> (usize, i32) {
        let from = from.min(self.tiles.len() - 1);
        let mut best = (from, i32::MAX);
        for (i, t) in self.tiles.iter().enumerate().skip(from) {
            let d = if t.plane == pos.plane {
                t.chebyshev(pos)
            } else {
                i32::MAX
            };
            if d <= best.1 {
                best = (i, d);
            }
        }
        best
    }

    /// Index of the farthest tile, at most `max_ahead` past `from_index`, that
    /// is still in straight sight of `tiles[from_index]`.
    ///
    /// Without a view every tile counts as in sight. Never returns less than
    /// `from_index + 1` unless `from_index` is already the last tile.
    pub fn lookahead_target(
        &self,
        from_index: usize,
        max_ahead: usize,
        view: Option<&CollisionView<'_>>,
    ) -> usize {
        let last = self.tiles.len() - 1;
        let from_index = from_index.min(last);
        if from_index == last {
            return last;
        }
        let far = from_index.saturating_add(max_ahead.max(1)).min(last);
        let Some(view) = view else {
            return far;
        };
        let origin = self.tiles[from_index];
        (from_index + 2..=far)
            .rev()
            .find(|&j| line_of_sight(view, origin, self.tiles[j]))
            .unwrap_or(from_index + 1)
    }
}

/// Whether `a` and `b` are joined by a straight line of known-open steps.
pub fn line_of_sight(view: &CollisionView<'_>, a: Tile, b: Tile) -> bool {
    view.line_of_sight(a, b)
}

/// No route could be found between two tiles.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Unreachable {
    pub start: Tile,
    pub end: Tile,
}

impl fmt::Display for Unreachable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no path from {} to {}", self.start, self.end)
    }
}

impl std::error::Error for Unreachable {}

//! Geometry primitives: [`Tile`], [`Direction`] and [`Bounds`].

use std::fmt;

use crate::region::RegionId;

/// Highest vertical plane present in the world (planes are `0..=MAX_PLANE`).
pub const MAX_PLANE: u8 = 3;

// ---------------------------------------------------------------------------
// Tile
// ---------------------------------------------------------------------------

/// A world tile. X grows east, Y grows north, `plane` selects the vertical level.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tile {
    pub x: i32,
    pub y: i32,
    pub plane: u8,
}

impl Tile {
    /// Create a new tile.
    #[inline]
    pub const fn new(x: i32, y: i32, plane: u8) -> Self {
        Self { x, y, plane }
    }

    /// Return a tile shifted by (dx, dy) on the same plane.
    #[inline]
    pub const fn shift(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            plane: self.plane,
        }
    }

    /// The neighbouring tile in direction `dir`.
    #[inline]
    pub const fn step(self, dir: Direction) -> Self {
        let (dx, dy) = dir.delta();
        self.shift(dx, dy)
    }

    /// All eight neighbours, in [`Direction::ALL`] order.
    #[inline]
    pub fn neighbors_8(self) -> [Tile; 8] {
        Direction::ALL.map(|d| self.step(d))
    }

    /// Chebyshev (L∞) distance on the x/y axes. The plane is ignored.
    #[inline]
    pub fn chebyshev(self, other: Tile) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }

    /// Straight-line distance on the x/y axes. The plane is ignored.
    #[inline]
    pub fn euclidean(self, other: Tile) -> f64 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        dx.hypot(dy)
    }

    /// Whether `other` is one of the eight neighbours of `self` on the same plane.
    #[inline]
    pub fn is_adjacent(self, other: Tile) -> bool {
        self.plane == other.plane && self.chebyshev(other) == 1
    }

    /// Region block containing this tile.
    #[inline]
    pub fn region(self) -> RegionId {
        RegionId::containing(self)
    }
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.plane)
    }
}

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// One of the eight compass directions of grid movement.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Direction {
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
}

impl Direction {
    /// Clockwise from north.
    pub const ALL: [Direction; 8] = [
        Direction::North,
        Direction::NorthEast,
        Direction::East,
        Direction::SouthEast,
        Direction::South,
        Direction::SouthWest,
        Direction::West,
        Direction::NorthWest,
    ];

    /// `(dx, dy)` offset of one step in this direction.
    #[inline]
    pub const fn delta(self) -> (i32, i32) {
        match self {
            Direction::North => (0, 1),
            Direction::NorthEast => (1, 1),
            Direction::East => (1, 0),
            Direction::SouthEast => (1, -1),
            Direction::South => (0, -1),
            Direction::SouthWest => (-1, -1),
            Direction::West => (-1, 0),
            Direction::NorthWest => (-1, 1),
        }
    }

    /// Whether the step moves along both axes.
    #[inline]
    pub const fn is_diagonal(self) -> bool {
        let (dx, dy) = self.delta();
        dx != 0 && dy != 0
    }

    /// The direction of a single step `(dx, dy)`, or `None` if it is not one.
    pub fn from_delta(dx: i32, dy: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.delta() == (dx, dy))
    }

    /// The direction leading from `from` to the adjacent tile `to`.
    pub fn between(from: Tile, to: Tile) -> Option<Self> {
        if from.plane != to.plane {
            return None;
        }
        Self::from_delta(to.x - from.x, to.y - from.y)
    }
}

// ---------------------------------------------------------------------------
// Bounds
// ---------------------------------------------------------------------------

/// A half-open rectangle `[min, max)` of tiles on a single plane.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bounds {
    pub min_x: i32,
    pub min_y: i32,
    pub max_x: i32,
    pub max_y: i32,
    pub plane: u8,
}

impl Bounds {
    /// Create bounds from two corners, canonicalized so that min ≤ max.
    #[inline]
    pub fn new(x0: i32, y0: i32, x1: i32, y1: i32, plane: u8) -> Self {
        Self {
            min_x: x0.min(x1),
            min_y: y0.min(y1),
            max_x: x0.max(x1),
            max_y: y0.max(y1),
            plane,
        }
    }

    /// Smallest bounds holding both `a` and `b`, grown by `margin` on every side.
    ///
    /// Uses the plane of `a`.
    pub fn around(a: Tile, b: Tile, margin: i32) -> Self {
        Self {
            min_x: a.x.min(b.x),
            min_y: a.y.min(b.y),
            max_x: a.x.max(b.x).saturating_add(1),
            max_y: a.y.max(b.y).saturating_add(1),
            plane: a.plane,
        }
        .expand(margin)
    }

    /// Grow the bounds by `margin` tiles on every side, clamped to the
    /// coordinate range.
    #[inline]
    pub fn expand(self, margin: i32) -> Self {
        Self {
            min_x: self.min_x.saturating_sub(margin),
            min_y: self.min_y.saturating_sub(margin),
            max_x: self.max_x.saturating_add(margin),
            max_y: self.max_y.saturating_add(margin),
            plane: self.plane,
        }
    }

    /// Width of the bounds.
    #[inline]
    pub fn width(self) -> i32 {
        self.max_x.saturating_sub(self.min_x)
    }

    /// Height of the bounds.
    #[inline]
    pub fn height(self) -> i32 {
        self.max_y.saturating_sub(self.min_y)
    }

    /// Whether the bounds have zero or negative area.
    #[inline]
    pub fn is_empty(self) -> bool {
        self.min_x >= self.max_x || self.min_y >= self.max_y
    }

    /// Total number of tiles inside.
    #[inline]
    pub fn len(self) -> usize {
        if self.is_empty() {
            return 0;
        }
        (self.width() as usize).saturating_mul(self.height() as usize)
    }

    /// Whether `t` lies inside (same plane, within the half-open rectangle).
    #[inline]
    pub fn contains(self, t: Tile) -> bool {
        t.plane == self.plane
            && t.x >= self.min_x
            && t.x < self.max_x
            && t.y >= self.min_y
            && t.y < self.max_y
    }
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[({}, {})-({}, {})) plane {}",
            self.min_x, self.min_y, self.max_x, self.max_y, self.plane
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tile_neighbors_are_adjacent() {
        let t = Tile::new(10, 10, 1);
        for n in t.neighbors_8() {
            assert!(t.is_adjacent(n), "{n} should neighbour {t}");
        }
        assert!(!t.is_adjacent(t));
        assert!(!t.is_adjacent(Tile::new(10, 11, 0)));
        assert!(!t.is_adjacent(Tile::new(12, 10, 1)));
    }

    #[test]
    fn distances() {
        let a = Tile::new(0, 0, 0);
        let b = Tile::new(3, 4, 0);
        assert_eq!(a.chebyshev(b), 4);
        assert!((a.euclidean(b) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn direction_round_trip() {
        for d in Direction::ALL {
            let (dx, dy) = d.delta();
            assert_eq!(Direction::from_delta(dx, dy), Some(d));
        }
        assert_eq!(Direction::from_delta(0, 0), None);
        assert_eq!(Direction::from_delta(2, 0), None);
        assert!(Direction::NorthEast.is_diagonal());
        assert!(!Direction::West.is_diagonal());
    }

    #[test]
    fn direction_between_tiles() {
        let a = Tile::new(5, 5, 0);
        assert_eq!(Direction::between(a, a.shift(0, 1)), Some(Direction::North));
        assert_eq!(Direction::between(a, a.shift(-1, -1)), Some(Direction::SouthWest));
        assert_eq!(Direction::between(a, Tile::new(5, 6, 1)), None);
    }

    #[test]
    fn bounds_around_includes_both_ends() {
        let a = Tile::new(5, 2, 0);
        let b = Tile::new(1, 8, 0);
        let r = Bounds::around(a, b, 0);
        assert!(r.contains(a));
        assert!(r.contains(b));
        assert_eq!(r.width(), 5);
        assert_eq!(r.height(), 7);
        assert_eq!(r.len(), 35);

        let grown = Bounds::around(a, b, 3);
        assert_eq!(grown.width(), 11);
        assert!(grown.contains(Tile::new(-2, -1, 0)));
        assert!(!grown.contains(Tile::new(-3, 0, 0)));
    }

    #[test]
    fn huge_margins_clamp_instead_of_overflowing() {
        let a = Tile::new(3200, 3200, 0);
        let b = Tile::new(3300, 3250, 0);
        let r = Bounds::around(a, b, i32::MAX);
        assert_eq!(r.max_x, i32::MAX);
        assert_eq!(r.min_y, 3200 - i32::MAX);
        assert_eq!(r.width(), i32::MAX);
        assert!(r.contains(a));
        assert!(r.len() > 0);
        let edge = Bounds::around(Tile::new(i32::MAX, 0, 0), Tile::new(i32::MAX, 0, 0), 0);
        assert_eq!(edge.max_x, i32::MAX);
    }

    #[test]
    fn bounds_respect_plane() {
        let r = Bounds::new(0, 0, 4, 4, 2);
        assert!(r.contains(Tile::new(1, 1, 2)));
        assert!(!r.contains(Tile::new(1, 1, 0)));
    }

    #[test]
    fn bounds_auto_canonicalize() {
        let r = Bounds::new(4, 3, 0, 0, 0);
        assert_eq!((r.min_x, r.min_y, r.max_x, r.max_y), (0, 0, 4, 3));
        assert!(Bounds::new(1, 1, 1, 5, 0).is_empty());
    }
}

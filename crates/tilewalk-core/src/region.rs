//! Region addressing: the world is split into fixed [`REGION_SIZE`]² blocks.

use std::fmt;

use crate::geom::Tile;

/// Edge length of a region, in tiles.
pub const REGION_SIZE: i32 = 64;

/// Identifier of a 64×64 block of tiles. One region covers every plane.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegionId {
    pub x: i32,
    pub y: i32,
}

impl RegionId {
    /// Create a region id from region coordinates.
    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The region containing `t`. Negative coordinates floor toward -∞.
    #[inline]
    pub fn containing(t: Tile) -> Self {
        Self {
            x: t.x.div_euclid(REGION_SIZE),
            y: t.y.div_euclid(REGION_SIZE),
        }
    }

    /// South-west corner of the region on `plane`.
    #[inline]
    pub const fn base_tile(self, plane: u8) -> Tile {
        Tile::new(self.x * REGION_SIZE, self.y * REGION_SIZE, plane)
    }

    /// Offset of `t` inside its region, as `(local_x, local_y)`.
    #[inline]
    pub fn local(t: Tile) -> (usize, usize) {
        (
            t.x.rem_euclid(REGION_SIZE) as usize,
            t.y.rem_euclid(REGION_SIZE) as usize,
        )
    }

    /// Entry name of this region inside the collision archive.
    pub fn archive_name(self) -> String {
        format!("{}_{}", self.x, self.y)
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "region({}, {})", self.x, self.y)
    }
}

//! Decoded per-region walkability flags.
//!
//! ## Wire format
//!
//! A region blob is a little-endian bit array with two bits per tile:
//! ```text
//! bit index = ((plane * 64 + local_y) * 64 + local_x) * 2 + flag
//! flag 0: the edge to the northern neighbour is open
//! flag 1: the edge to the eastern neighbour is open
//! ```
//! Bit `i` lives in byte `i / 8` at position `i % 8`. Blobs shorter than
//! [`REGION_BYTES`] are zero-padded, i.e. the missing tiles are blocked.

use std::ops::BitOr;

use tilewalk_core::{MAX_PLANE, REGION_SIZE, RegionId, Tile};

use crate::error::CollisionError;

/// Number of planes stored in every region blob.
pub const PLANES: usize = MAX_PLANE as usize + 1;

const TILES_PER_PLANE: usize = (REGION_SIZE * REGION_SIZE) as usize;

/// Size of a fully populated region blob.
pub const REGION_BYTES: usize = PLANES * TILES_PER_PLANE * 2 / 8;

/// The two movement flags stored for each tile.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TileFlags(pub u8);

impl TileFlags {
    pub const NONE: Self = Self(0);
    /// The edge to `(x, y + 1)` is open.
    pub const NORTH: Self = Self(1 << 0);
    /// The edge to `(x + 1, y)` is open.
    pub const EAST: Self = Self(1 << 1);
    pub const ALL: Self = Self(0b11);

    /// Whether this mask contains all the bits from `other`.
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Whether no edge is open.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for TileFlags {
    type Output = Self;
    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Immutable walkability data for one 64×64 region, all planes.
#[derive(Clone, PartialEq, Eq)]
pub struct CollisionRegion {
    id: RegionId,
    bits: Box<[u8]>,
}

impl std::fmt::Debug for CollisionRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollisionRegion")
            .field("id", &self.id)
            .field("open_bits", &self.bits.iter().map(|b| b.count_ones()).sum::<u32>())
            .finish()
    }
}

impl CollisionRegion {
    /// Decode a blob fetched from the archive.
    pub fn decode(id: RegionId, data: &[u8]) -> Result<Self, CollisionError> {
        if data.len() > REGION_BYTES {
            return Err(CollisionError::Malformed {
                region: id,
                len: data.len(),
            });
        }
        let mut bits = vec![0u8; REGION_BYTES];
        bits[..data.len()].copy_from_slice(data);
        Ok(Self {
            id,
            bits: bits.into_boxed_slice(),
        })
    }

    /// Encode back into the archive format. Inverse of [`decode`](Self::decode).
    pub fn to_bytes(&self) -> Vec<u8> {
        self.bits.to_vec()
    }

    /// Build a region by asking `f` for the flags of every tile on every plane.
    pub fn from_fn(id: RegionId, mut f: impl FnMut(Tile) -> TileFlags) -> Self {
        let mut bits = vec![0u8; REGION_BYTES];
        for plane in 0..=MAX_PLANE {
            for ly in 0..REGION_SIZE {
                for lx in 0..REGION_SIZE {
                    let t = id.base_tile(plane).shift(lx, ly);
                    let flags = f(t);
                    let base = bit_index(t);
                    for flag in 0..2 {
                        if flags.0 & (1 << flag) != 0 {
                            let i = base + flag;
                            bits[i / 8] |= 1 << (i % 8);
                        }
                    }
                }
            }
        }
        Self {
            id,
            bits: bits.into_boxed_slice(),
        }
    }

    /// A region where every edge on every plane is open.
    pub fn open(id: RegionId) -> Self {
        Self {
            id,
            bits: vec![0xFF; REGION_BYTES].into_boxed_slice(),
        }
    }

    /// The region this data belongs to.
    #[inline]
    pub fn id(&self) -> RegionId {
        self.id
    }

    /// Flags of tile `t`, which must lie inside this region.
    ///
    /// Planes above [`MAX_PLANE`] read as fully blocked.
    #[inline]
    pub fn flags(&self, t: Tile) -> TileFlags {
        debug_assert_eq!(t.region(), self.id, "{t} is outside {}", self.id);
        if t.plane > MAX_PLANE {
            return TileFlags::NONE;
        }
        let i = bit_index(t);
        TileFlags((self.bits[i / 8] >> (i % 8)) & 0b11)
    }

    /// Heap footprint of the decoded data.
    #[inline]
    pub fn size_bytes(&self) -> usize {
        self.bits.len()
    }
}

/// Index of the first of the two bits belonging to `t`.
///
/// Two-bit pairs never straddle a byte since the index is always even.
#[inline]
fn bit_index(t: Tile) -> usize {
    let (lx, ly) = RegionId::local(t);
    let tile = (t.plane as usize * REGION_SIZE as usize + ly) * REGION_SIZE as usize + lx;
    tile * 2
}

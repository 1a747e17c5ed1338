//! Collision data for tile-world navigation.
//!
//! Walkability is published as a pre-built, read-only archive with one
//! bit-packed blob per 64×64 region. This crate decodes those blobs
//! ([`CollisionRegion`]), keeps a bounded LRU cache of them
//! ([`CollisionStore`]) and answers movement queries:
//!
//! - [`CollisionStore::is_walkable`]: tri-state [`Walkability`], so a region
//!   that is missing from the archive reads as `Unknown` rather than blocked.
//! - [`CollisionStore::can_transition`]: whether one step between adjacent
//!   tiles is legal, including the corner-cutting rule for diagonals.
//!
//! Searches should go through a [`CollisionView`], which pins every region it
//! touches until dropped so the cache never evicts data mid-query.
//!
//! Region blobs come from a [`RegionSource`]. The `zip` feature adds
//! `ZipSource`, which reads the packed archive in place.

mod error;
mod region;
mod source;
mod store;
mod view;

pub use error::{CollisionError, FetchError};
pub use region::{CollisionRegion, PLANES, REGION_BYTES, TileFlags};
pub use source::{DirectorySource, MemorySource, RegionSource};
#[cfg(feature = "zip")]
pub use source::ZipSource;
pub use store::{CacheStats, CollisionStore, StoreConfig};
pub use view::{CollisionView, Transition, Walkability};

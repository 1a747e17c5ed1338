//! **tilewalk-core**: coordinate types shared across the *tilewalk* crates.
//!
//! The world is a grid of [`Tile`]s spread over a handful of vertical planes.
//! Collision data is organised in 64×64 [`RegionId`] blocks, and searches are
//! confined to a [`Bounds`] rectangle on a single plane.

pub mod geom;
pub mod region;

pub use geom::{Bounds, Direction, MAX_PLANE, Tile};
pub use region::{REGION_SIZE, RegionId};

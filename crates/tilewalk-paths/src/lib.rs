//! Randomized-weight routing over tile-world collision data.
//!
//! The entry point is [`VariancePathfinder`], which answers
//! `start -> end` requests with a [`Path`] whose exact shape changes from
//! call to call:
//!
//! - edge weights are `base * (1 + U(-v, v))`, drawn fresh per edge and per
//!   search, with `v` set by the [`VarianceLevel`];
//! - routes of 15 tiles or more are bent through random sideways waypoints;
//! - the search runs Dijkstra inside a bounding box that grows on failure.
//!
//! Searches run on a [`SearchRange`], which owns and reuses the node array
//! so repeated queries do not allocate after warm-up.
//!
//! # Trait hierarchy
//!
//! | Trait | Required for |
//! |---|---|
//! | [`Pather`] | neighbour enumeration |
//! | [`WeightedPather`] : [`Pather`] | Dijkstra |

mod cache;
mod dijkstra;
mod path;
mod pathfinder;
mod range;
mod traits;
mod variance;

pub use cache::{PathCache, PathCacheStats};
pub use path::{DEFAULT_LOOKAHEAD, Path, Unreachable, line_of_sight};
pub use pathfinder::{PathRequest, PathfinderConfig, VariancePathfinder};
pub use range::SearchRange;
pub use traits::{Pather, WeightedPather};
pub use variance::{UnknownPolicy, VarianceGraph, VarianceLevel, VarianceProfile, base_cost};

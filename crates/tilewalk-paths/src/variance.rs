//! Randomness bands and the randomized-weight grid graph.

use std::f64::consts::SQRT_2;

use log::trace;
use rand::{Rng, RngExt};
use tilewalk_collision::{CollisionView, Transition};
use tilewalk_core::{Direction, Tile};

use crate::traits::{Pather, WeightedPather};

/// How much randomness a route gets.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum VarianceLevel {
    Conservative,
    #[default]
    Moderate,
    Aggressive,
}

impl VarianceLevel {
    /// The parameters this level stands for.
    pub const fn profile(self) -> VarianceProfile {
        match self {
            Self::Conservative => VarianceProfile {
                spread: 0.12,
                min_waypoints: 1,
                max_waypoints: 1,
                max_offset: 3,
            },
            Self::Moderate => VarianceProfile {
                spread: 0.20,
                min_waypoints: 1,
                max_waypoints: 2,
                max_offset: 5,
            },
            Self::Aggressive => VarianceProfile {
                spread: 0.30,
                min_waypoints: 2,
                max_waypoints: 3,
                max_offset: 8,
            },
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Conservative => "conservative",
            Self::Moderate => "moderate",
            Self::Aggressive => "aggressive",
        }
    }
}

impl std::fmt::Display for VarianceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Concrete randomization parameters.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VarianceProfile {
    /// Half-width `v` of the uniform multiplier `1 + U(-v, v)` on edge weights.
    pub spread: f64,
    pub min_waypoints: usize,
    pub max_waypoints: usize,
    /// Largest perpendicular distance of an injected waypoint, in tiles.
    pub max_offset: i32,
}

impl VarianceProfile {
    /// Draw a randomized weight for a step with unit base cost `base`.
    pub fn weight(&self, base: f64, rng: &mut (impl Rng + ?Sized)) -> f64 {
        let v = self.spread.clamp(0.0, 0.9);
        base * (1.0 + rng.random_range(-v..=v))
    }
}

/// What the search does with edges whose collision data is missing.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UnknownPolicy {
    /// Traverse them, adding this cost on top of the randomized weight.
    Penalize(f64),
    /// Never traverse them.
    Deny,
}

impl Default for UnknownPolicy {
    fn default() -> Self {
        Self::Penalize(25.0)
    }
}

/// Unit cost of one step: 1 orthogonal, √2 diagonal.
pub fn base_cost(from: Tile, to: Tile) -> f64 {
    match Direction::between(from, to) {
        Some(d) if d.is_diagonal() => SQRT_2,
        _ => 1.0,
    }
}

/// The grid graph gated by collision data, with weights drawn fresh from
/// `rng` every time an edge is relaxed.
pub struct VarianceGraph<'v, 'a, R: ?Sized> {
    view: &'v CollisionView<'a>,
    rng: &'v mut R,
    profile: VarianceProfile,
    unknown: UnknownPolicy,
}

impl<'v, 'a, R: Rng + ?Sized> VarianceGraph<'v, 'a, R> {
    pub fn new(
        view: &'v CollisionView<'a>,
        rng: &'v mut R,
        profile: VarianceProfile,
        unknown: UnknownPolicy,
    ) -> Self {
        Self {
            view,
            rng,
            profile,
            unknown,
        }
    }
}

impl<R: Rng + ?Sized> Pather for VarianceGraph<'_, '_, R> {
    fn neighbors(&self, t: Tile, buf: &mut Vec<Tile>) {
        for n in t.neighbors_8() {
            match self.view.transition(t, n) {
                Transition::Open => buf.push(n),
                Transition::Unknown if self.unknown != UnknownPolicy::Deny => buf.push(n),
                _ => {}
            }
        }
    }
}

impl<R: Rng + ?Sized> WeightedPather for VarianceGraph<'_, '_, R> {
    fn cost(&mut self, from: Tile, to: Tile) -> f64 {
        let w = self.profile.weight(base_cost(from, to), &mut *self.rng);
        match self.unknown {
            UnknownPolicy::Penalize(penalty)
                if self.view.transition(from, to) == Transition::Unknown =>
            {
                trace!("unknown edge {from} -> {to}, penalty {penalty}");
                w + penalty
            }
            _ => w,
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use tilewalk_collision::{CollisionRegion, CollisionStore, MemorySource};
    use tilewalk_core::RegionId;

    use super::*;

    #[test]
    fn weights_stay_inside_band() {
        let mut rng = StdRng::seed_from_u64(3);
        for level in [
            VarianceLevel::Conservative,
            VarianceLevel::Moderate,
            VarianceLevel::Aggressive,
        ] {
            let p = level.profile();
            for _ in 0..200 {
                let w = p.weight(SQRT_2, &mut rng);
                assert!(w >= SQRT_2 * (1.0 - p.spread) - 1e-12);
                assert!(w <= SQRT_2 * (1.0 + p.spread) + 1e-12);
            }
        }
    }

    #[test]
    fn levels_widen_monotonically() {
        let c = VarianceLevel::Conservative.profile();
        let m = VarianceLevel::Moderate.profile();
        let a = VarianceLevel::Aggressive.profile();
        assert!(c.spread < m.spread && m.spread < a.spread);
        assert!(c.max_offset < m.max_offset && m.max_offset < a.max_offset);
        assert!(a.max_waypoints <= 3 && c.min_waypoints >= 1);
        assert_eq!(VarianceLevel::default(), VarianceLevel::Moderate);
    }

    #[test]
    fn graph_respects_unknown_policy() {
        let id = RegionId::new(0, 0);
        let store = CollisionStore::new(MemorySource::new().with_region(&CollisionRegion::open(id)));
        let view = store.view();
        let mut rng = StdRng::seed_from_u64(9);
        let profile = VarianceLevel::Moderate.profile();
        let edge = Tile::new(64, 10, 0);
        let mut buf = Vec::new();

        let mut lenient = VarianceGraph::new(&view, &mut rng, profile, UnknownPolicy::Penalize(25.0));
        lenient.neighbors(edge, &mut buf);
        assert_eq!(buf.len(), 8);
        let c = lenient.cost(edge, edge.shift(1, 0));
        assert!(c > 25.0);
        let c = lenient.cost(Tile::new(10, 10, 0), Tile::new(11, 10, 0));
        assert!(c < 2.0);

        buf.clear();
        let strict = VarianceGraph::new(&view, &mut rng, profile, UnknownPolicy::Deny);
        strict.neighbors(edge, &mut buf);
        // Only the westward steps read entirely from the loaded region.
        assert!(buf.contains(&Tile::new(63, 10, 0)));
        assert!(!buf.contains(&Tile::new(65, 10, 0)));
    }
}

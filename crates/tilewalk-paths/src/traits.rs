use tilewalk_core::Tile;

/// Minimal pathfinding interface: neighbour enumeration.
pub trait Pather {
    /// Append neighbors of `t` into `buf`. The caller clears `buf` before calling.
    fn neighbors(&self, t: Tile, buf: &mut Vec<Tile>);
}

/// Pather with weighted (positive-cost) edges.
///
/// `cost` takes `&mut self` so implementations may draw a fresh random
/// weight every time an edge is relaxed.
pub trait WeightedPather: Pather {
    /// Cost of moving from `from` to adjacent `to`. Must be > 0.
    fn cost(&mut self, from: Tile, to: Tile) -> f64;
}

use tilewalk_core::{Bounds, Tile};

#[derive(Clone)]
pub(crate) struct Node {
    pub(crate) g: f64,
    pub(crate) parent: usize,
    pub(crate) generation: u32,
    pub(crate) open: bool,
}

impl Default for Node {
    fn default() -> Self {
        Self {
            g: f64::INFINITY,
            parent: usize::MAX,
            generation: 0,
            open: false,
        }
    }
}

/// Reference into the node array, ordered by `g` for use in `BinaryHeap`.
#[derive(Clone, Copy)]
pub(crate) struct NodeRef {
    pub(crate) idx: usize,
    pub(crate) g: f64,
}

impl PartialEq for NodeRef {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other).is_eq()
    }
}

impl Eq for NodeRef {}

impl Ord for NodeRef {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Reverse so BinaryHeap (max-heap) pops smallest g first.
        other.g.total_cmp(&self.g).then(other.idx.cmp(&self.idx))
    }
}

impl PartialOrd for NodeRef {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Reusable search workspace over a rectangle of one plane.
///
/// `SearchRange` owns the node array and scratch buffers so that repeated
/// searches (bounding-box retries, waypoint legs, replans) incur no
/// allocations once the array has grown to the largest box seen.
pub struct SearchRange {
    pub(crate) bounds: Bounds,
    pub(crate) width: usize,
    pub(crate) nodes: Vec<Node>,
    pub(crate) generation: u32,
    pub(crate) nbuf: Vec<Tile>,
}

impl SearchRange {
    /// Create a workspace covering `bounds`.
    pub fn new(bounds: Bounds) -> Self {
        Self {
            bounds,
            width: bounds.width() as usize,
            nodes: vec![Node::default(); bounds.len()],
            generation: 0,
            nbuf: Vec::with_capacity(8),
        }
    }

    /// Replace the searched rectangle.
    ///
    /// If the new rectangle fits in the current node array only the
    /// generation counter is bumped; otherwise the array is reallocated.
    pub fn set_bounds(&mut self, bounds: Bounds) {
        let new_len = bounds.len();
        self.bounds = bounds;
        self.width = bounds.width() as usize;
        if new_len <= self.nodes.len() {
            self.generation = self.generation.wrapping_add(1);
            return;
        }
        self.nodes.clear();
        self.nodes.resize(new_len, Node::default());
        self.generation = 0;
    }

    /// The rectangle being searched.
    #[inline]
    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Convert a tile to a flat index. Returns `None` if out of bounds.
    #[inline]
    pub(crate) fn idx(&self, t: Tile) -> Option<usize> {
        if !self.bounds.contains(t) {
            return None;
        }
        let x = (t.x - self.bounds.min_x) as usize;
        let y = (t.y - self.bounds.min_y) as usize;
        Some(y * self.width + x)
    }

    /// Convert a flat index back to a tile.
    #[inline]
    pub(crate) fn tile(&self, idx: usize) -> Tile {
        let x = (idx % self.width) as i32 + self.bounds.min_x;
        let y = (idx / self.width) as i32 + self.bounds.min_y;
        Tile::new(x, y, self.bounds.plane)
    }
}

impl Default for SearchRange {
    fn default() -> Self {
        Self::new(Bounds::new(0, 0, 0, 0, 0))
    }
}

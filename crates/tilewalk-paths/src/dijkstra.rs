use std::collections::BinaryHeap;

use tilewalk_core::Tile;

use crate::range::{NodeRef, SearchRange};
use crate::traits::WeightedPather;

impl SearchRange {
    /// Compute the cheapest path from `from` to `to` with Dijkstra's algorithm.
    ///
    /// Every edge cost is asked from `pather` exactly once, when its source
    /// tile is settled, so randomized weights stay consistent within a single
    /// search. Returns the full path (both endpoints included) and its total
    /// cost, or `None` if `to` cannot be reached inside the current bounds.
    pub fn dijkstra_path<P: WeightedPather>(
        &mut self,
        pather: &mut P,
        from: Tile,
        to: Tile,
    ) -> Option<(Vec<Tile>, f64)> {
        let start_idx = self.idx(from)?;
        let goal_idx = self.idx(to)?;

        if start_idx == goal_idx {
            return Some((vec![from], 0.0));
        }

        self.generation = self.generation.wrapping_add(1);
        let cur_gen = self.generation;

        {
            let node = &mut self.nodes[start_idx];
            node.g = 0.0;
            node.parent = usize::MAX;
            node.generation = cur_gen;
            node.open = true;
        }

        let mut open: BinaryHeap<NodeRef> = BinaryHeap::new();
        open.push(NodeRef {
            idx: start_idx,
            g: 0.0,
        });

        let mut nbuf = std::mem::take(&mut self.nbuf);

        let found = 'search: loop {
            let Some(current) = open.pop() else {
                break 'search false;
            };
            let ci = current.idx;

            // Skip stale entries.
            let cn = &self.nodes[ci];
            if cn.generation != cur_gen || !cn.open {
                continue;
            }
            if ci == goal_idx {
                break 'search true;
            }

            let current_g = cn.g;
            self.nodes[ci].open = false;
            let cp = self.tile(ci);

            nbuf.clear();
            pather.neighbors(cp, &mut nbuf);

            for &np in nbuf.iter() {
                let Some(ni) = self.idx(np) else {
                    continue;
                };
                if self.nodes[ni].generation == cur_gen && !self.nodes[ni].open {
                    // Already settled.
                    continue;
                }
                let tentative = current_g + pather.cost(cp, np);

                let n = &mut self.nodes[ni];
                if n.generation == cur_gen {
                    if tentative >= n.g {
                        continue;
                    }
                } else {
                    n.generation = cur_gen;
                }

                n.g = tentative;
                n.parent = ci;
                n.open = true;
                open.push(NodeRef {
                    idx: ni,
                    g: tentative,
                });
            }
        };

        self.nbuf = nbuf;

        if !found {
            return None;
        }

        let cost = self.nodes[goal_idx].g;
        let mut path = Vec::new();
        let mut ci = goal_idx;
        while ci != usize::MAX {
            path.push(self.tile(ci));
            ci = self.nodes[ci].parent;
        }
        path.reverse();
        Some((path, cost))
    }
}

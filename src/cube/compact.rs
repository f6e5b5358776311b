//! Compaction: reclaiming the storage held by free slots.
//!
//! Insertion and release never shrink a dimension's node arena or the
//! summary arena on their own — a released slot just joins that arena's
//! free list for the next `insert` to reuse. Over a long-lived cube with a
//! lot of churn, free slots can still end up interleaved with live ones
//! (e.g. after a burst of inserts followed by a burst of releases), so
//! `Cube::compact` is exposed as an on-demand pass that physically drops
//! every free slot and rewrites every handle that pointed past it.
//!
//! Compaction works back-to-front: the summary arena has nothing pointing
//! into it, so it compacts first; then each dimension from last to first,
//! since only the *previous* dimension's `next` edges and that dimension's
//! own `left`/`right`/parent edges can reference a handle inside it.

use std::collections::HashMap;

use log::{trace, warn};

use crate::handle::Handle;
use crate::summary::Summary;

use super::Cube;

fn remap_handle(remap: &HashMap<Handle, Handle>, h: Option<Handle>) -> Option<Handle> {
    h.map(|h| *remap.get(&h).unwrap_or(&h))
}

impl<S: Summary> Cube<S> {
    /// Physically removes every free slot from every arena, rewriting all
    /// internal handles (dimension nodes, `next` edges, parent lists, and
    /// the root) to match. A no-op, returning without allocating, if
    /// nothing needs to move.
    ///
    /// Mirrors the original `refcounted_vec`'s compaction: applied to an
    /// already-compact cube it changes nothing observable. Any handle a
    /// caller is holding onto from outside the cube (e.g. from a prior
    /// [`Cube::self_check`] or [`Cube::dump_internals`] call) is invalidated
    /// and must be treated as stale.
    ///
    /// Safe to call between inserts but not meaningful mid-insert — the
    /// public API only ever hands out `&mut Cube<S>` for the duration of a
    /// single call, so there is no way to observe a cube mid-insert from
    /// outside the crate.
    pub fn compact(&mut self) {
        let summary_remap = self.summaries.compact();
        if !summary_remap.is_empty() {
            trace!("compact: summaries moved {} entries", summary_remap.len());
            let last = self.dims.len() - 1;
            for h in self.dims[last].nodes.iter_live().collect::<Vec<_>>() {
                let next = self.dims[last].nodes.at(h).next;
                let remapped = remap_handle(&summary_remap, next);
                if remapped != next {
                    self.dims[last].nodes.at_mut(h).next = remapped;
                }
            }
        }

        let mut any_moved = !summary_remap.is_empty();
        for dim in (0..self.dims.len()).rev() {
            let remap = self.dims[dim].nodes.compact();
            if remap.is_empty() {
                continue;
            }
            any_moved = true;
            trace!("compact: dimension {dim} moved {} entries", remap.len());

            for h in self.dims[dim].nodes.iter_live().collect::<Vec<_>>() {
                let node = self.dims[dim].nodes.at(h);
                let left = remap_handle(&remap, node.left);
                let right = remap_handle(&remap, node.right);
                let parents: Vec<Handle> = node
                    .parents
                    .iter()
                    .map(|&p| *remap.get(&p).unwrap_or(&p))
                    .collect();
                let n = self.dims[dim].nodes.at_mut(h);
                n.left = left;
                n.right = right;
                n.parents = parents;
            }

            if dim == 0 {
                self.root = remap_handle(&remap, self.root);
            } else {
                for h in self.dims[dim - 1].nodes.iter_live().collect::<Vec<_>>() {
                    let next = self.dims[dim - 1].nodes.at(h).next;
                    let remapped = remap_handle(&remap, next);
                    if remapped != next {
                        self.dims[dim - 1].nodes.at_mut(h).next = remapped;
                    }
                }
            }
        }

        if !any_moved {
            warn!("compact: nothing to do, cube was already compact");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compacting_an_already_compact_cube_is_a_no_op() {
        let mut cube: Cube<u64> = Cube::new(&[3, 2]).unwrap();
        for (x, y) in [(0, 0), (1, 1), (5, 3)] {
            cube.insert_in_place(&[x, y], &1).unwrap();
        }
        let before = cube.dump_internals();
        cube.compact();
        let after = cube.dump_internals();
        assert_eq!(before, after);
        assert_eq!(cube.self_check(), Vec::new());
    }

    #[test]
    fn compaction_preserves_query_results_after_churn() {
        let mut cube: Cube<u64> = Cube::new(&[4, 4]).unwrap();
        let points: [(u64, u64); 8] = [(0, 0), (1, 1), (2, 8), (8, 14), (3, 13), (8, 5), (12, 2), (3, 7)];
        for (x, y) in points {
            cube.insert_in_place(&[x, y], &1).unwrap();
        }
        // Churn: overwrite several cells repeatedly via the merge baseline
        // so the node and summary arenas accumulate garbage from
        // intermediate merges, then compact.
        for (x, y) in points {
            cube.insert_via_merge(&[x, y], &1).unwrap();
        }

        let before = cube.range_query(&[0, 0], &[16, 16]).unwrap();
        cube.compact();
        let after = cube.range_query(&[0, 0], &[16, 16]).unwrap();
        assert_eq!(before, after);
        assert_eq!(cube.self_check(), Vec::new());

        for (x, y) in points {
            assert_eq!(cube.range_query(&[x, y], &[x + 1, y + 1]).unwrap(), 2);
        }
    }
}

//! In-place insertion: the same end result as [`Cube::insert_via_merge`],
//! reached by mutating existing structure wherever it is exclusively owned
//! by the record being inserted, instead of building and then discarding a
//! full fresh spine.
//!
//! The traversal descends one dimension at a time. Within a dimension it
//! walks bit by bit toward the target address, keeping a frontier of node
//! handles that are safe to mutate directly (initially just the root, which
//! is always exclusively owned). At each bit:
//!
//! - a frontier node missing the needed child gets a freshly built spine
//!   suffix attached;
//! - a frontier node whose needed child is shared with some node outside
//!   the frontier gets that child replaced by a merge of the child with a
//!   fresh spine suffix (copy-on-write, same idea as the merge baseline but
//!   scoped to just the affected subtree);
//! - a frontier node whose needed child has no *other* live parents is
//!   safe to descend into directly, so the child joins the next bit's
//!   frontier with no copy at all.
//!
//! A fork's `next` summarizes both children and can't simply mirror one of
//! them (unlike a singleton's), so it can't be fixed up just by continuing
//! the in-place descent. Instead, whenever a fork stays on the safe/in-place
//! path for its matching child, its `next` handle is deferred into `forks`
//! and update the same way one dimension over, once this dimension's bit
//! scan is done. `next`-edges aren't parent-tracked, so safety there is
//! decided by comparing refcount against how many of the deferred entries
//! point at the same handle rather than by consulting a parents list.

use std::collections::HashMap;

use crate::handle::Handle;
use crate::summary::Summary;

use super::spine::SpineCache;
use super::Cube;

impl<S: Summary> Cube<S> {
    /// Inserts `(address, summary)` by mutating shared structure in place
    /// wherever doing so is safe, falling back to localized copies
    /// otherwise.
    pub fn insert_in_place(&mut self, address: &[u64], summary: &S) -> Result<(), crate::error::Error> {
        self.check_address(address)?;
        match self.root {
            None => {
                let fresh = self.fresh_spine(address, summary);
                self.retain_node(0, Some(fresh));
                self.root = Some(fresh);
            }
            Some(root) => {
                let mut spine = SpineCache::new();
                self.update_dim(0, 0, address, summary, &mut spine, vec![root]);
            }
        }
        Ok(())
    }

    fn update_dim(
        &mut self,
        dim: usize,
        mut bit: u32,
        address: &[u64],
        summary: &S,
        spine: &mut SpineCache,
        mut nodes: Vec<Handle>,
    ) {
        if dim == self.dims.len() {
            for h in nodes {
                let combined = self.summaries.at(h).combine(summary);
                self.summaries.set(h, combined);
            }
            return;
        }

        let width = self.dims[dim].width;
        let mut forks: Vec<(Handle, Handle)> = Vec::new();

        loop {
            if nodes.is_empty() {
                break;
            }
            if bit == width {
                for n in &nodes {
                    if let Some(next) = self.dims[dim].nodes.at(*n).next {
                        forks.push((*n, next));
                    }
                }
                break;
            }

            let right = Self::bit(address[dim], width, bit);
            let mut groups: HashMap<Option<Handle>, Vec<Handle>> = HashMap::new();
            for n in &nodes {
                let c = self.dims[dim].nodes.at(*n).child(right);
                groups.entry(c).or_default().push(*n);
            }

            let mut next_nodes = Vec::new();
            for (c, parents) in groups {
                match c {
                    None => {
                        let spine_h = spine.get_or_build(self, dim, bit + 1, address, summary);
                        for &p in &parents {
                            self.set_child(dim, p, right, Some(spine_h));
                            self.fix_next_after_attach(dim, p, right);
                        }
                    }
                    Some(c) => {
                        let live_parents = self.dims[dim].nodes.at(c).parents.clone();
                        if Self::same_multiset(&live_parents, &parents) {
                            next_nodes.push(c);
                            for &p in &parents {
                                if self.dims[dim].nodes.at(p).is_fork() {
                                    let next = self.dims[dim].nodes.at(p).next.expect("existing node always has a next");
                                    forks.push((p, next));
                                }
                            }
                        } else {
                            let spine_h = spine.get_or_build(self, dim, bit + 1, address, summary);
                            let merged = self
                                .merge_at(dim, Some(c), Some(spine_h))
                                .expect("merging two present operands always yields Some");
                            for &p in &parents {
                                self.set_child(dim, p, right, Some(merged));
                                self.fix_next_after_attach(dim, p, right);
                            }
                        }
                    }
                }
            }

            nodes = next_nodes;
            bit += 1;
        }

        if !forks.is_empty() {
            self.flush_forks(dim, address, summary, spine, forks);
        }
    }

    /// After attaching a (possibly new) child on `right`'s side of `parent`,
    /// recomputes `parent`'s `next` so invariants 3/4 keep holding: shared
    /// with the lone child if `parent` is still a singleton, or the
    /// combination of both children if it is now a fork.
    fn fix_next_after_attach(&mut self, dim: usize, parent: Handle, right: bool) {
        if self.dims[dim].nodes.at(parent).is_fork() {
            self.refresh_fork_next(dim, parent);
        } else {
            let child = self.dims[dim].nodes.at(parent).child(right);
            let child_next = child.and_then(|c| self.dims[dim].nodes.at(c).next);
            self.set_next(dim, parent, child_next);
        }
    }

    /// Groups deferred `(owner, next_handle)` pairs by `next_handle`, decides
    /// per group whether that shared next-subtree is exclusively ours (by
    /// comparing its refcount against how many of our owners point at it),
    /// and recurses one dimension over with the resulting frontier.
    fn flush_forks(
        &mut self,
        dim: usize,
        address: &[u64],
        summary: &S,
        spine: &mut SpineCache,
        forks: Vec<(Handle, Handle)>,
    ) {
        let mut groups: HashMap<Handle, Vec<Handle>> = HashMap::new();
        for (owner, next) in forks {
            groups.entry(next).or_default().push(owner);
        }

        let next_dim = dim + 1;
        let mut frontier = Vec::with_capacity(groups.len());
        for (h, owners) in groups {
            let refcount = if next_dim == self.dims.len() {
                self.summaries.ref_count(h)
            } else {
                self.dims[next_dim].nodes.ref_count(h)
            };
            if refcount as usize == owners.len() {
                frontier.push(h);
            } else {
                // `merge_at` already folds the record's fresh spine into `h`
                // here, so `merged` contains the summary exactly once; unlike
                // the exclusive branch above, it must not also be handed to
                // `update_dim` below, or the record would be added a second
                // time by the recursive descent.
                let spine_h = spine.get_or_build(self, next_dim, 0, address, summary);
                let merged = self
                    .merge_at(next_dim, Some(h), Some(spine_h))
                    .expect("merging two present operands always yields Some");
                for owner in owners {
                    self.set_next(dim, owner, Some(merged));
                }
            }
        }

        self.update_dim(next_dim, 0, address, summary, spine, frontier);
    }

    fn same_multiset(a: &[Handle], b: &[Handle]) -> bool {
        if a.len() != b.len() {
            return false;
        }
        let mut a = a.to_vec();
        let mut b = b.to_vec();
        a.sort_unstable();
        b.sort_unstable();
        a == b
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_insert_creates_root() {
        let mut cube: Cube<u64> = Cube::new(&[2]).unwrap();
        cube.insert_in_place(&[1], &7).unwrap();
        assert_eq!(cube.range_query(&[1], &[2]).unwrap(), 7);
    }

    #[test]
    fn repeated_insert_accumulates_in_place() {
        let mut cube: Cube<u64> = Cube::new(&[3]).unwrap();
        for _ in 0..4 {
            cube.insert_in_place(&[5], &1).unwrap();
        }
        assert_eq!(cube.range_query(&[5], &[6]).unwrap(), 4);
    }

    #[test]
    fn divergent_inserts_keep_each_cell_independent() {
        let mut cube: Cube<u64> = Cube::new(&[3]).unwrap();
        cube.insert_in_place(&[1], &1).unwrap();
        cube.insert_in_place(&[6], &1).unwrap();
        assert_eq!(cube.range_query(&[1], &[2]).unwrap(), 1);
        assert_eq!(cube.range_query(&[6], &[7]).unwrap(), 1);
        assert_eq!(cube.range_query(&[0], &[8]).unwrap(), 2);
    }

    #[test]
    fn multi_dimensional_shared_prefix_stays_consistent() {
        let mut cube: Cube<u64> = Cube::new(&[2, 2]).unwrap();
        cube.insert_in_place(&[1, 1], &1).unwrap();
        cube.insert_in_place(&[1, 2], &1).unwrap();
        cube.insert_in_place(&[2, 1], &1).unwrap();
        assert_eq!(cube.range_query(&[1, 1], &[2, 2]).unwrap(), 1);
        assert_eq!(cube.range_query(&[1, 0], &[2, 4]).unwrap(), 2);
        assert_eq!(cube.range_query(&[0, 0], &[4, 4]).unwrap(), 3);
    }
}

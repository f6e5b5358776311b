//! Construction of brand-new refinement chains ("fresh spines").

use std::collections::HashMap;

use log::trace;

use crate::handle::Handle;
use crate::summary::Summary;

use super::Cube;

impl<S: Summary> Cube<S> {
    /// Builds, bottom-up, the chain of singleton nodes that exactly
    /// represents `address[dim..]` under `summary`, starting partway
    /// through dimension `dim` at refinement depth `bit`. The returned
    /// handle has refcount 0: every internal edge within the new chain is
    /// already retained, but nothing outside it points at the chain yet.
    pub(crate) fn fresh_spine_from(&mut self, dim: usize, bit: u32, address: &[u64], summary: &S) -> Handle {
        if dim == self.dims.len() {
            return self.summaries.insert(summary.clone());
        }
        let width = self.dims[dim].width;
        if bit == width {
            let next = self.fresh_spine_from(dim + 1, 0, address, summary);
            return self.add_node(dim, None, None, next);
        }
        let child = self.fresh_spine_from(dim, bit + 1, address, summary);
        let child_next = self.dims[dim].nodes.at(child).next;
        let right = Self::bit(address[dim], width, bit);
        if right {
            self.add_node(dim, None, Some(child), child_next)
        } else {
            self.add_node(dim, Some(child), None, child_next)
        }
    }

    /// Builds a complete fresh cube of `widths` dimensions holding exactly
    /// one record. Used by [`Cube::insert_via_merge`] and
    /// [`Cube::insert_in_place`] to obtain the top of a fresh spine.
    pub(crate) fn fresh_spine(&mut self, address: &[u64], summary: &S) -> Handle {
        self.fresh_spine_from(0, 0, address, summary)
    }
}

/// Memoizes fresh-spine suffixes within a single insertion.
///
/// Several forks along an insertion's path can demand the identical fresh
/// suffix (the same `(dim, bit)` onward, built from the same address and
/// summary); without memoization that suffix would be reallocated once per
/// fork, which is exponential in the number of dimensions. Safe to reuse: a
/// cache hit returns the same handle, and attaching it to more than one
/// parent within the same insertion is exactly the structural sharing the
/// engine is built around.
#[derive(Default)]
pub(crate) struct SpineCache {
    cache: HashMap<(usize, u32), Handle>,
}

impl SpineCache {
    pub(crate) fn new() -> Self {
        SpineCache::default()
    }

    pub(crate) fn get_or_build<S: Summary>(
        &mut self,
        cube: &mut Cube<S>,
        dim: usize,
        bit: u32,
        address: &[u64],
        summary: &S,
    ) -> Handle {
        if let Some(&h) = self.cache.get(&(dim, bit)) {
            trace!("spine cache hit at (dim {dim}, bit {bit}) -> {h:?}");
            return h;
        }
        let h = cube.fresh_spine_from(dim, bit, address, summary);
        trace!("spine cache miss at (dim {dim}, bit {bit}): built {h:?}");
        self.cache.insert((dim, bit), h);
        h
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_spine_is_a_linear_chain_of_expected_length() {
        let mut cube: Cube<u64> = Cube::new(&[3, 4]).unwrap();
        let root = cube.fresh_spine(&[5, 9], &7);

        // Each dimension contributes width+1 nodes: width singleton decision
        // nodes plus the terminal leaf-of-dimension node holding the
        // forward `next` pointer.
        let mut seen_dim0 = 0;
        let mut h = Some(root);
        let mut next_into_dim1 = None;
        while let Some(node) = h {
            seen_dim0 += 1;
            let n = cube.dims[0].nodes.at(node);
            assert!(n.left.is_none() || n.right.is_none(), "every fresh-spine node is a singleton");
            h = n.left.or(n.right);
            if h.is_none() {
                next_into_dim1 = n.next;
            }
        }
        assert_eq!(seen_dim0, 4);

        let mut seen_dim1 = 0;
        let mut h = next_into_dim1;
        let mut summary_handle = None;
        while let Some(node) = h {
            seen_dim1 += 1;
            let n = cube.dims[1].nodes.at(node);
            assert!(n.left.is_none() || n.right.is_none());
            h = n.left.or(n.right);
            if h.is_none() {
                summary_handle = n.next;
            }
        }
        assert_eq!(seen_dim1, 5);
        assert_eq!(*cube.summaries.at(summary_handle.unwrap()), 7);
    }

    #[test]
    fn fresh_spine_follows_address_bits() {
        let mut cube: Cube<u64> = Cube::new(&[3]).unwrap();
        // 5 = 0b101: right(1), left(0), right(1) — matches bit(address, 3, b).
        let root = cube.fresh_spine(&[5], &1);
        let n0 = cube.dims[0].nodes.at(root);
        assert!(n0.left.is_none() && n0.right.is_some());
        let n1 = cube.dims[0].nodes.at(n0.right.unwrap());
        assert!(n1.left.is_some() && n1.right.is_none());
        let n2 = cube.dims[0].nodes.at(n1.left.unwrap());
        assert!(n2.left.is_none() && n2.right.is_some());
        let leaf = cube.dims[0].nodes.at(n2.right.unwrap());
        assert!(leaf.is_leaf());
    }

    #[test]
    fn spine_cache_returns_same_handle_for_repeated_coordinate() {
        let mut cube: Cube<u64> = Cube::new(&[4]).unwrap();
        let mut cache = SpineCache::new();
        let a = cache.get_or_build(&mut cube, 0, 2, &[9], &1);
        let b = cache.get_or_build(&mut cube, 0, 2, &[9], &1);
        assert_eq!(a, b, "a second request for the same (dim, bit) must reuse the cached handle");
    }
}

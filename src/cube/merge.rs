//! Structural merge of two sub-DAGs, and the merge-based baseline insert.

use log::trace;

use crate::handle::Handle;
use crate::summary::Summary;

use super::Cube;

impl<S: Summary> Cube<S> {
    /// Combines two (possibly absent) sub-DAGs rooted at `dim` into one that
    /// represents the union of what each described, sharing structure
    /// wherever one side doesn't add anything new.
    pub(crate) fn merge_at(&mut self, dim: usize, x: Option<Handle>, y: Option<Handle>) -> Option<Handle> {
        let (x, y) = match (x, y) {
            (None, None) => return None,
            (Some(x), None) => {
                trace!("merge dim {dim}: right side empty, sharing {x:?}");
                return Some(x);
            }
            (None, Some(y)) => {
                trace!("merge dim {dim}: left side empty, sharing {y:?}");
                return Some(y);
            }
            (Some(x), Some(y)) => (x, y),
        };

        if dim == self.dims.len() {
            let combined = self.summaries.at(x).combine(self.summaries.at(y));
            return Some(self.summaries.insert(combined));
        }

        let (xl, xr) = {
            let n = self.dims[dim].nodes.at(x);
            (n.left, n.right)
        };
        let (yl, yr) = {
            let n = self.dims[dim].nodes.at(y);
            (n.left, n.right)
        };

        if xl.is_none() && xr.is_none() && yl.is_none() && yr.is_none() {
            let xn = self.dims[dim].nodes.at(x).next;
            let yn = self.dims[dim].nodes.at(y).next;
            let next = self.merge_at(dim + 1, xn, yn);
            return Some(self.add_node(dim, None, None, next));
        }

        let left = self.merge_at(dim, xl, yl);
        let right = self.merge_at(dim, xr, yr);
        let next = match (left, right) {
            (Some(l), Some(r)) => {
                let ln = self.dims[dim].nodes.at(l).next;
                let rn = self.dims[dim].nodes.at(r).next;
                self.merge_at(dim + 1, ln, rn)
            }
            (Some(l), None) => self.dims[dim].nodes.at(l).next,
            (None, Some(r)) => self.dims[dim].nodes.at(r).next,
            (None, None) => unreachable!("merge of two non-leaves produced no children"),
        };
        Some(self.add_node(dim, left, right, next))
    }

    /// Inserts `(address, summary)` by building a complete fresh spine and
    /// merging it against the current root.
    ///
    /// Simpler than [`Cube::insert_in_place`] and easier to trust, but every
    /// call allocates a full fresh spine even though most of it is usually
    /// discarded immediately afterward as garbage once the merge decides it
    /// wasn't needed.
    pub fn insert_via_merge(&mut self, address: &[u64], summary: &S) -> Result<(), crate::error::Error> {
        self.check_address(address)?;
        let fresh = self.fresh_spine(address, summary);

        let merged = match self.root {
            Some(root) => self.merge_at(0, Some(fresh), Some(root)),
            None => Some(fresh),
        };

        self.retain_node(0, merged);
        let old_root = self.root;
        self.root = merged;
        self.release_node(0, old_root);

        if self.dims[0].nodes.ref_count(fresh) == 0 {
            // `fresh` was fully absorbed into shared structure during the
            // merge and nothing ended up retaining it; force it through the
            // normal release path so its unused chain is reclaimed.
            self.retain_node(0, Some(fresh));
            self.release_node(0, Some(fresh));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_of_disjoint_spines_keeps_both_cells() {
        let mut cube: Cube<u64> = Cube::new(&[2]).unwrap();
        cube.insert_via_merge(&[0], &1).unwrap();
        cube.insert_via_merge(&[3], &1).unwrap();
        assert_eq!(cube.range_query(&[0], &[1]).unwrap(), 1);
        assert_eq!(cube.range_query(&[3], &[4]).unwrap(), 1);
        assert_eq!(cube.range_query(&[0], &[4]).unwrap(), 2);
    }

    #[test]
    fn merge_accumulates_repeated_address() {
        let mut cube: Cube<u64> = Cube::new(&[3]).unwrap();
        for _ in 0..5 {
            cube.insert_via_merge(&[2], &1).unwrap();
        }
        assert_eq!(cube.range_query(&[2], &[3]).unwrap(), 5);
    }
}

//! Orthogonal range queries.

use crate::error::Error;
use crate::handle::Handle;
use crate::summary::Summary;

use super::Cube;

/// Receives summaries as a range query visits fully-contained nodes.
///
/// The default policy ([`CombineSummaryPolicy`]) just folds everything
/// through [`Summary::combine`], but a caller that wants something other
/// than a single combined total (e.g. to stream per-cell contributions, or
/// to early-exit past a threshold) can supply their own.
pub trait SummaryPolicy<S: Summary> {
    fn accumulate(&mut self, summary: &S);
}

/// The default query policy: folds every contributing summary into one
/// running total via [`Summary::combine`].
#[derive(Debug, Clone)]
pub struct CombineSummaryPolicy<S: Summary> {
    pub total: S,
}

impl<S: Summary> CombineSummaryPolicy<S> {
    pub fn new() -> Self {
        CombineSummaryPolicy { total: S::identity() }
    }
}

impl<S: Summary> Default for CombineSummaryPolicy<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Summary> SummaryPolicy<S> for CombineSummaryPolicy<S> {
    fn accumulate(&mut self, summary: &S) {
        self.total.combine_assign(summary);
    }
}

impl<S: Summary> Cube<S> {
    /// Sums the summaries of every cell whose address falls in
    /// `[lo[d], hi[d])` for every dimension `d`.
    pub fn range_query(&self, lo: &[u64], hi: &[u64]) -> Result<S, Error> {
        let mut policy = CombineSummaryPolicy::new();
        self.range_query_with_policy(lo, hi, &mut policy)?;
        Ok(policy.total)
    }

    /// Like [`Cube::range_query`], but delegates accumulation to a custom
    /// [`SummaryPolicy`] instead of building a single combined total.
    pub fn range_query_with_policy<P: SummaryPolicy<S>>(
        &self,
        lo: &[u64],
        hi: &[u64],
        policy: &mut P,
    ) -> Result<(), Error> {
        self.check_bounds(lo, hi)?;
        if let Some(root) = self.root {
            let width0 = self.dims[0].width;
            self.range_query_rec(0, Some(root), 0, 1u64 << width0, lo, hi, policy);
        }
        Ok(())
    }

    fn range_query_rec<P: SummaryPolicy<S>>(
        &self,
        dim: usize,
        node: Option<Handle>,
        node_lo: u64,
        node_hi: u64,
        lo: &[u64],
        hi: &[u64],
        policy: &mut P,
    ) {
        let node = match node {
            Some(h) => h,
            None => return,
        };
        let (q_lo, q_hi) = (lo[dim], hi[dim]);
        if node_hi <= q_lo || q_hi <= node_lo {
            return;
        }
        if q_lo <= node_lo && node_hi <= q_hi {
            self.collect_next(dim, node, lo, hi, policy);
            return;
        }
        let n = self.dims[dim].nodes.at(node);
        let mid = node_lo + (node_hi - node_lo) / 2;
        let (left, right) = (n.left, n.right);
        if let Some(l) = left {
            self.range_query_rec(dim, Some(l), node_lo, mid, lo, hi, policy);
        }
        if let Some(r) = right {
            self.range_query_rec(dim, Some(r), mid, node_hi, lo, hi, policy);
        }
    }

    fn collect_next<P: SummaryPolicy<S>>(&self, dim: usize, node: Handle, lo: &[u64], hi: &[u64], policy: &mut P) {
        let next = self.dims[dim].nodes.at(node).next;
        if dim + 1 == self.dims.len() {
            if let Some(s) = next {
                policy.accumulate(self.summaries.at(s));
            }
        } else if let Some(next) = next {
            let width = self.dims[dim + 1].width;
            self.range_query_rec(dim + 1, Some(next), 0, 1u64 << width, lo, hi, policy);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_range_query_returns_total() {
        let mut cube: Cube<u64> = Cube::new(&[3, 3]).unwrap();
        cube.insert_via_merge(&[1, 1], &1).unwrap();
        cube.insert_via_merge(&[5, 5], &2).unwrap();
        let total = cube.range_query(&[0, 0], &[8, 8]).unwrap();
        assert_eq!(total, 3);
    }

    #[test]
    fn disjoint_range_query_excludes_other_cells() {
        let mut cube: Cube<u64> = Cube::new(&[3, 3]).unwrap();
        cube.insert_via_merge(&[1, 1], &1).unwrap();
        cube.insert_via_merge(&[5, 5], &2).unwrap();
        assert_eq!(cube.range_query(&[0, 0], &[3, 3]).unwrap(), 1);
        assert_eq!(cube.range_query(&[4, 4], &[8, 8]).unwrap(), 2);
        assert_eq!(cube.range_query(&[2, 2], &[4, 4]).unwrap(), 0);
    }
}

//! Test-only support code: the naive linear-scan oracle from §8/§10.4.
//!
//! Not part of the crate's public surface — `spec.md` lists it explicitly as
//! an out-of-scope collaborator, reproduced here only so the integration
//! tests have something simple enough to trust to compare the real engine
//! against.

use nanocube::Summary;

/// A flat `Vec<(address, summary)>` with an `O(n)` linear-scan range query.
///
/// Mirrors `examples/original_source/src/naivecube.h`: no sharing, no
/// invariants to maintain, just "does this address fall in the box".
pub struct NaiveCube<S: Summary> {
    widths: Vec<u32>,
    records: Vec<(Vec<u64>, S)>,
}

impl<S: Summary> NaiveCube<S> {
    pub fn new(widths: &[u32]) -> Self {
        NaiveCube {
            widths: widths.to_vec(),
            records: Vec::new(),
        }
    }

    pub fn insert(&mut self, address: Vec<u64>, summary: S) {
        debug_assert_eq!(address.len(), self.widths.len());
        self.records.push((address, summary));
    }

    pub fn range_query(&self, lo: &[u64], hi: &[u64]) -> S {
        let mut total = S::identity();
        for (address, summary) in &self.records {
            let contained = address
                .iter()
                .zip(lo.iter().zip(hi.iter()))
                .all(|(&a, (&l, &h))| l <= a && a < h);
            if contained {
                total.combine_assign(summary);
            }
        }
        total
    }
}

//! Diagnostic dumps and the invariant self-check.

use std::collections::HashSet;
use std::fmt::Write as _;

use serde::Serialize;

use crate::error::CheckFailure;
use crate::handle::Handle;
use crate::summary::Summary;

use super::Cube;

/// One live node, as reported by [`Cube::internals_report`].
#[derive(Debug, Clone, Serialize)]
pub struct NodeReport {
    pub handle: u32,
    pub ref_count: u32,
    pub left: Option<u32>,
    pub right: Option<u32>,
    pub next: Option<u32>,
    pub parents: Vec<u32>,
}

/// One live summary, as reported by [`Cube::internals_report`].
#[derive(Debug, Clone, Serialize)]
pub struct SummaryReport<S> {
    pub handle: u32,
    pub ref_count: u32,
    pub value: S,
}

/// A structured snapshot of every live node and summary, serializable so a
/// caller embedding this engine behind a JSON façade can hand it to
/// `serde_json` directly instead of parsing [`Cube::dump_internals`]'s
/// plain-text rendering.
#[derive(Debug, Clone, Serialize)]
pub struct InternalsReport<S> {
    pub dimensions: Vec<Vec<NodeReport>>,
    pub summaries: Vec<SummaryReport<S>>,
    pub root: Option<u32>,
}

impl<S: Summary> Cube<S> {
    /// Walks every live node and summary, checking each invariant from the
    /// design (reachability, refcount soundness, singleton-next sharing,
    /// fork partition sums) and collecting every violation found. An empty
    /// result means the structure is internally consistent; this is never
    /// returned from ordinary API calls, only invoked explicitly (tests,
    /// tooling) since it's `O(size of the structure)`.
    pub fn self_check(&self) -> Vec<CheckFailure> {
        let mut failures = Vec::new();
        let reachable_nodes = self.reachable_nodes();
        let reachable_summaries = self.reachable_summaries(&reachable_nodes);

        for (dim, d) in self.dims.iter().enumerate() {
            for h in d.nodes.iter_live() {
                let refcount = d.nodes.ref_count(h);
                if !reachable_nodes[dim].contains(&h) {
                    failures.push(CheckFailure::Unreachable {
                        dim,
                        node: h.0,
                        refcount,
                    });
                    continue;
                }
                let observed = self.observed_node_refs(dim, h);
                if observed != refcount {
                    failures.push(CheckFailure::RefcountMismatch {
                        dim,
                        node: h.0,
                        stored: refcount,
                        observed,
                    });
                }

                let node = d.nodes.at(h);
                if node.left.is_some() ^ node.right.is_some() {
                    let child = node.left.or(node.right).unwrap();
                    let child_next = d.nodes.at(child).next;
                    if node.next != child_next {
                        failures.push(CheckFailure::SingletonNextMismatch {
                            dim,
                            node: h.0,
                            next: node.next.map(|h| h.0),
                            child_next: child_next.map(|h| h.0),
                        });
                    }
                }
                if node.is_fork() {
                    let left_total = self.total_summary(dim + 1, node.left.and_then(|l| d.nodes.at(l).next));
                    let right_total = self.total_summary(dim + 1, node.right.and_then(|r| d.nodes.at(r).next));
                    let this_total = self.total_summary(dim + 1, node.next);
                    if left_total.combine(&right_total) != this_total {
                        failures.push(CheckFailure::PartitionMismatch { dim, node: h.0 });
                    }
                }
            }
        }

        for h in self.summaries.iter_live() {
            let refcount = self.summaries.ref_count(h);
            if !reachable_summaries.contains(&h) {
                failures.push(CheckFailure::Unreachable {
                    dim: self.dims.len(),
                    node: h.0,
                    refcount,
                });
            }
        }

        failures
    }

    fn total_summary(&self, dim: usize, node: Option<Handle>) -> S {
        let node = match node {
            Some(h) => h,
            None => return S::identity(),
        };
        if dim == self.dims.len() {
            return self.summaries.at(node).clone();
        }
        let next = self.dims[dim].nodes.at(node).next;
        self.total_summary(dim + 1, next)
    }

    fn reachable_nodes(&self) -> Vec<HashSet<Handle>> {
        let mut sets: Vec<HashSet<Handle>> = self.dims.iter().map(|_| HashSet::new()).collect();
        if let Some(root) = self.root {
            self.walk_nodes(0, root, &mut sets);
        }
        sets
    }

    fn walk_nodes(&self, dim: usize, node: Handle, sets: &mut Vec<HashSet<Handle>>) {
        if !sets[dim].insert(node) {
            return;
        }
        let n = self.dims[dim].nodes.at(node);
        if let Some(l) = n.left {
            self.walk_nodes(dim, l, sets);
        }
        if let Some(r) = n.right {
            self.walk_nodes(dim, r, sets);
        }
        if let Some(next) = n.next {
            if dim + 1 < self.dims.len() {
                self.walk_nodes(dim + 1, next, sets);
            }
        }
    }

    fn reachable_summaries(&self, reachable_nodes: &[HashSet<Handle>]) -> HashSet<Handle> {
        let mut result = HashSet::new();
        let last = self.dims.len() - 1;
        for h in &reachable_nodes[last] {
            if let Some(s) = self.dims[last].nodes.at(*h).next {
                result.insert(s);
            }
        }
        result
    }

    /// Counts live incoming edges to `(dim, node)`: same-dimension
    /// left/right edges from other nodes in the same dimension, `next`
    /// edges from the previous dimension, plus one if it is the root.
    fn observed_node_refs(&self, dim: usize, node: Handle) -> u32 {
        let mut count = 0;
        if dim == 0 && self.root == Some(node) {
            count += 1;
        }
        for h in self.dims[dim].nodes.iter_live() {
            let n = self.dims[dim].nodes.at(h);
            if n.left == Some(node) {
                count += 1;
            }
            if n.right == Some(node) {
                count += 1;
            }
        }
        if dim > 0 {
            for h in self.dims[dim - 1].nodes.iter_live() {
                if self.dims[dim - 1].nodes.at(h).next == Some(node) {
                    count += 1;
                }
            }
        }
        count
    }

    /// Renders the DAG as GraphViz `dot`. `next_edges` controls whether the
    /// (usually numerous) cross-dimension edges are drawn; omitting them
    /// keeps large cubes legible when only the per-dimension shape matters.
    pub fn to_dot(&self, next_edges: bool) -> String {
        let mut out = String::new();
        writeln!(out, "digraph nanocube {{").unwrap();
        writeln!(out, "  rankdir=TB;").unwrap();
        for (dim, d) in self.dims.iter().enumerate() {
            writeln!(out, "  subgraph cluster_dim{dim} {{").unwrap();
            writeln!(out, "    label=\"dim {dim} (width {})\";", d.width).unwrap();
            for h in d.nodes.iter_live() {
                writeln!(out, "    d{dim}_{} [label=\"{}\"];", h.0, h.0).unwrap();
            }
            writeln!(out, "  }}").unwrap();
        }
        writeln!(out, "  subgraph cluster_summaries {{").unwrap();
        writeln!(out, "    label=\"summaries\";").unwrap();
        for h in self.summaries.iter_live() {
            writeln!(out, "    s{} [label=\"{:?}\", shape=box];", h.0, self.summaries.at(h)).unwrap();
        }
        writeln!(out, "  }}").unwrap();

        for (dim, d) in self.dims.iter().enumerate() {
            for h in d.nodes.iter_live() {
                let n = d.nodes.at(h);
                if let Some(l) = n.left {
                    writeln!(out, "  d{dim}_{} -> d{dim}_{} [label=\"L\"];", h.0, l.0).unwrap();
                }
                if let Some(r) = n.right {
                    writeln!(out, "  d{dim}_{} -> d{dim}_{} [label=\"R\"];", h.0, r.0).unwrap();
                }
                if next_edges {
                    if let Some(next) = n.next {
                        if dim + 1 == self.dims.len() {
                            writeln!(out, "  d{dim}_{} -> s{} [style=dashed];", h.0, next.0).unwrap();
                        } else {
                            writeln!(out, "  d{dim}_{} -> d{}_{} [style=dashed];", h.0, dim + 1, next.0).unwrap();
                        }
                    }
                }
            }
        }
        writeln!(out, "}}").unwrap();
        out
    }

    /// A plain-text listing of every live node/summary and its fields, for
    /// ad hoc debugging.
    pub fn dump_internals(&self) -> String {
        let mut out = String::new();
        for (dim, d) in self.dims.iter().enumerate() {
            writeln!(out, "dimension {dim} (width {}):", d.width).unwrap();
            for h in d.nodes.iter_live() {
                let n = d.nodes.at(h);
                writeln!(
                    out,
                    "  {:?} rc={} left={:?} right={:?} next={:?} parents={:?}",
                    h,
                    d.nodes.ref_count(h),
                    n.left,
                    n.right,
                    n.next,
                    n.parents
                )
                .unwrap();
            }
        }
        writeln!(out, "summaries:").unwrap();
        for h in self.summaries.iter_live() {
            writeln!(out, "  {:?} rc={} value={:?}", h, self.summaries.ref_count(h), self.summaries.at(h)).unwrap();
        }
        writeln!(out, "root: {:?}", self.root).unwrap();
        out
    }

    /// A structured, `Serialize`-able counterpart to [`Cube::dump_internals`]
    /// for callers (e.g. the out-of-scope JSON façade) that want to hand the
    /// engine's internals to `serde_json` rather than parse formatted text.
    pub fn internals_report(&self) -> InternalsReport<S>
    where
        S: Serialize,
    {
        let dimensions = self
            .dims
            .iter()
            .map(|d| {
                d.nodes
                    .iter_live()
                    .map(|h| {
                        let n = d.nodes.at(h);
                        NodeReport {
                            handle: h.0,
                            ref_count: d.nodes.ref_count(h),
                            left: n.left.map(|h| h.0),
                            right: n.right.map(|h| h.0),
                            next: n.next.map(|h| h.0),
                            parents: n.parents.iter().map(|p| p.0).collect(),
                        }
                    })
                    .collect()
            })
            .collect();
        let summaries = self
            .summaries
            .iter_live()
            .map(|h| SummaryReport {
                handle: h.0,
                ref_count: self.summaries.ref_count(h),
                value: self.summaries.at(h).clone(),
            })
            .collect();
        InternalsReport {
            dimensions,
            summaries,
            root: self.root.map(|h| h.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_check_passes_after_several_inserts() {
        let mut cube: Cube<u64> = Cube::new(&[3, 2]).unwrap();
        for (x, y) in [(0, 0), (1, 1), (1, 2), (5, 3), (5, 0)] {
            cube.insert_in_place(&[x, y], &1).unwrap();
        }
        assert_eq!(cube.self_check(), Vec::new());
    }

    #[test]
    fn self_check_passes_for_merge_baseline_too() {
        let mut cube: Cube<u64> = Cube::new(&[4]).unwrap();
        for x in [0, 1, 1, 7, 15, 15, 15] {
            cube.insert_via_merge(&[x], &1).unwrap();
        }
        assert_eq!(cube.self_check(), Vec::new());
    }

    #[test]
    fn internals_report_matches_live_node_counts() {
        let mut cube: Cube<u64> = Cube::new(&[3, 2]).unwrap();
        for (x, y) in [(0, 0), (1, 1), (5, 3)] {
            cube.insert_in_place(&[x, y], &1).unwrap();
        }
        let report = cube.internals_report();
        assert_eq!(report.dimensions.len(), 2);
        for (dim, d) in cube.dims.iter().enumerate() {
            assert_eq!(report.dimensions[dim].len(), d.nodes.iter_live().count());
        }
        assert_eq!(report.summaries.len(), cube.summaries.iter_live().count());
        assert_eq!(report.root, cube.root.map(|h| h.0));

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"dimensions\""));
    }

    #[test]
    fn dot_output_mentions_every_dimension() {
        let mut cube: Cube<u64> = Cube::new(&[2, 2]).unwrap();
        cube.insert_in_place(&[1, 1], &1).unwrap();
        let dot = cube.to_dot(true);
        assert!(dot.contains("cluster_dim0"));
        assert!(dot.contains("cluster_dim1"));
        assert!(dot.contains("cluster_summaries"));
    }
}

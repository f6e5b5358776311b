//! The reference-counted, structurally-shared range-summary index.
//!
//! A [`Cube`] owns one [`crate::dimension::Dimension`] per address
//! component plus a shared summary arena. Every public mutation
//! (`insert`/`insert_in_place`) funnels through the edge-management
//! primitives in this module, which keep refcounts, parent lists and
//! singleton-sharing consistent; the actual algorithms live in the sibling
//! `spine`, `merge`, `update`, `query`, `debug` and `compact` modules.

mod compact;
mod debug;
mod merge;
mod query;
mod serde_support;
mod spine;
mod update;

pub use debug::{InternalsReport, NodeReport, SummaryReport};
pub use query::{CombineSummaryPolicy, SummaryPolicy};

use itertools::izip;
use log::{debug, trace};

use crate::arena::RefVec;
use crate::dimension::Dimension;
use crate::error::Error;
use crate::handle::Handle;
use crate::summary::Summary;

/// Largest dimension width accepted by [`Cube::new`].
///
/// Chosen so `1u64 << width` never overflows and so an exhaustive fresh
/// spine (`width` refinement levels) stays a sane allocation; real cubes
/// rarely refine past a few dozen bits per dimension.
pub const MAX_WIDTH: u32 = 56;

/// A reference-counted multi-dimensional range-summary index.
///
/// `S` is the per-cell payload; see [`Summary`] for the contract it must
/// satisfy. Construct with [`Cube::new`], populate with
/// [`Cube::insert_in_place`] (or [`Cube::insert_via_merge`] for the simpler,
/// more garbage-prone baseline strategy), and read back with
/// [`Cube::range_query`].
///
/// `Deserialize` is implemented by hand (see `serde_support`) rather than
/// derived: `Node::parents` and `RefVec`'s free list are derived state
/// deliberately excluded from the wire format, and have to be rebuilt after
/// deserialization instead of round-tripped.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Cube<S: Summary> {
    pub(crate) dims: Vec<Dimension>,
    pub(crate) summaries: RefVec<S>,
    pub(crate) root: Option<Handle>,
}

impl<S: Summary> Cube<S> {
    /// Creates an empty cube with one dimension per entry of `widths`.
    pub fn new(widths: &[u32]) -> Result<Self, Error> {
        if widths.is_empty() {
            return Err(Error::NoDimensions);
        }
        for (dim, &width) in widths.iter().enumerate() {
            if width == 0 || width > MAX_WIDTH {
                return Err(Error::WidthOutOfRange {
                    dim,
                    width,
                    max: MAX_WIDTH,
                });
            }
        }
        Ok(Cube {
            dims: widths.iter().map(|&w| Dimension::new(w)).collect(),
            summaries: RefVec::new(),
            root: None,
        })
    }

    /// Number of dimensions (address components).
    pub fn dimensions(&self) -> usize {
        self.dims.len()
    }

    /// Refinement width, in bits, of dimension `dim`.
    pub fn width(&self, dim: usize) -> u32 {
        self.dims[dim].width
    }

    /// Total number of live (summary) cells recorded so far is not tracked
    /// directly; `is_empty` reports whether any record has been inserted.
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub(crate) fn check_address(&self, address: &[u64]) -> Result<(), Error> {
        if address.len() != self.dims.len() {
            return Err(Error::WrongArity {
                expected: self.dims.len(),
                found: address.len(),
            });
        }
        for (dim, (&value, d)) in izip!(address, &self.dims).enumerate() {
            let bound = 1u64 << d.width;
            if value >= bound {
                return Err(Error::AddressOutOfRange {
                    dim,
                    value,
                    width: d.width,
                    bound,
                });
            }
        }
        Ok(())
    }

    pub(crate) fn check_bounds(&self, lo: &[u64], hi: &[u64]) -> Result<(), Error> {
        if lo.len() != self.dims.len() || hi.len() != self.dims.len() {
            return Err(Error::WrongArity {
                expected: self.dims.len(),
                found: lo.len().max(hi.len()),
            });
        }
        for (dim, (&lo, &hi, d)) in izip!(lo, hi, &self.dims).enumerate() {
            let bound = 1u64 << d.width;
            if lo > hi || hi > bound {
                return Err(Error::MalformedBounds {
                    dim,
                    lo,
                    hi,
                    width: d.width,
                });
            }
        }
        Ok(())
    }

    /// Bit `bit` (counting from the most significant of `width`) of `address`.
    pub(crate) fn bit(address: u64, width: u32, bit: u32) -> bool {
        (address >> (width - 1 - bit)) & 1 == 1
    }

    // -- edge-management primitives shared by merge/update ---------------

    /// `dim == self.dims.len()` addresses the summary arena; any smaller
    /// value addresses that dimension's node arena.
    pub(crate) fn retain_node(&mut self, dim: usize, h: Option<Handle>) {
        if let Some(h) = h {
            if dim == self.dims.len() {
                self.summaries.retain(h);
            } else {
                self.dims[dim].nodes.retain(h);
            }
        }
    }

    pub(crate) fn release_node(&mut self, dim: usize, h: Option<Handle>) {
        if let Some(h) = h {
            let count = if dim == self.dims.len() {
                self.summaries.release(h)
            } else {
                self.dims[dim].nodes.release(h)
            };
            if count == 0 && dim < self.dims.len() {
                self.clean_node(dim, h);
            }
        }
    }

    /// Called once `h`'s refcount in dimension `dim` has reached zero:
    /// detaches it from its own children/next so their refcounts stay
    /// honest, then clears its fields defensively.
    fn clean_node(&mut self, dim: usize, h: Handle) {
        let (left, right, next) = {
            let n = self.dims[dim].nodes.at(h);
            (n.left, n.right, n.next)
        };
        if let Some(l) = left {
            self.detach_parent(dim, l, h);
            self.release_node(dim, Some(l));
        }
        if let Some(r) = right {
            self.detach_parent(dim, r, h);
            self.release_node(dim, Some(r));
        }
        self.release_node(dim + 1, next);

        let n = self.dims[dim].nodes.at_mut(h);
        n.left = None;
        n.right = None;
        n.next = None;
        n.parents.clear();
    }

    fn detach_parent(&mut self, dim: usize, child: Handle, parent: Handle) {
        let parents = &mut self.dims[dim].nodes.at_mut(child).parents;
        if let Some(pos) = parents.iter().position(|&p| p == parent) {
            parents.swap_remove(pos);
        }
    }

    /// Creates a brand-new node, retaining (and parent-registering) its
    /// children and next. Mirrors the original `add_node`: the returned
    /// handle starts at refcount 0, owned by whoever attaches it next.
    pub(crate) fn add_node(
        &mut self,
        dim: usize,
        left: Option<Handle>,
        right: Option<Handle>,
        next: Option<Handle>,
    ) -> Handle {
        let h = self.dims[dim].nodes.insert(crate::node::Node {
            left,
            right,
            next,
            parents: Vec::new(),
        });
        if let Some(l) = left {
            self.dims[dim].nodes.at_mut(l).parents.push(h);
            self.retain_node(dim, Some(l));
        }
        if let Some(r) = right {
            self.dims[dim].nodes.at_mut(r).parents.push(h);
            self.retain_node(dim, Some(r));
        }
        self.retain_node(dim + 1, next);
        trace!("dim {dim}: allocated {h:?} left={left:?} right={right:?} next={next:?}");
        h
    }

    /// Redirects `parent`'s child on `right`'s side from whatever it was to
    /// `new_child`, retaining/releasing (and cascading) as needed.
    pub(crate) fn set_child(&mut self, dim: usize, parent: Handle, right: bool, new_child: Option<Handle>) {
        let old_child = self.dims[dim].nodes.at(parent).child(right);
        if let Some(old) = old_child {
            self.detach_parent(dim, old, parent);
            self.release_node(dim, Some(old));
        }
        if let Some(new) = new_child {
            self.dims[dim].nodes.at_mut(new).parents.push(parent);
            self.retain_node(dim, Some(new));
        }
        self.dims[dim].nodes.at_mut(parent).set_child(right, new_child);
    }

    /// Assigns `parent`'s `next` field, retaining/releasing as needed, and
    /// propagating the change upward through any singleton ancestors.
    pub(crate) fn set_next(&mut self, dim: usize, parent: Handle, new_next: Option<Handle>) {
        let old_next = self.dims[dim].nodes.at(parent).next;
        if old_next == new_next {
            return;
        }
        self.release_node(dim + 1, old_next);
        self.retain_node(dim + 1, new_next);
        self.dims[dim].nodes.at_mut(parent).next = new_next;
        self.propagate_singleton_next(dim, parent);
    }

    /// After `node`'s `next` changed, walk its same-dimension parents
    /// upward: every parent that is a singleton (invariant 3 requires its
    /// `next` to mirror its only child's) gets its `next` overwritten and is
    /// itself enqueued, since structural sharing can leave a node with more
    /// than one singleton parent needing the same fix. A parent that is a
    /// fork is left alone; its `next` is a combination of both children and
    /// is fixed up by its own caller instead. Drains to a fixpoint rather
    /// than stopping after the first parent found.
    fn propagate_singleton_next(&mut self, dim: usize, node: Handle) {
        let mut worklist = vec![node];
        while let Some(node) = worklist.pop() {
            let parents = self.dims[dim].nodes.at(node).parents.clone();
            let next = self.dims[dim].nodes.at(node).next;
            for parent in parents {
                let p = self.dims[dim].nodes.at(parent);
                if p.is_fork() {
                    continue;
                }
                if p.next == next {
                    continue;
                }
                let old = p.next;
                self.release_node(dim + 1, old);
                self.retain_node(dim + 1, next);
                self.dims[dim].nodes.at_mut(parent).next = next;
                worklist.push(parent);
            }
        }
    }

    /// Recomputes a fork's `next` as the combination of both children's
    /// `next` summaries (invariant 4), via a pure merge over dimension
    /// `dim + 1`.
    pub(crate) fn refresh_fork_next(&mut self, dim: usize, node: Handle) {
        let (left, right) = {
            let n = self.dims[dim].nodes.at(node);
            (n.left, n.right)
        };
        let left_next = left.map(|l| self.dims[dim].nodes.at(l).next).flatten();
        let right_next = right.map(|r| self.dims[dim].nodes.at(r).next).flatten();
        let merged = self.merge_at(dim + 1, left_next, right_next);
        self.set_next(dim, node, merged);
    }
}

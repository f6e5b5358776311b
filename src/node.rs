//! The node shape shared by every dimension's refinement tree.

use serde::{Deserialize, Serialize};

use crate::handle::Handle;

/// One node of a dimension's binary-refinement tree.
///
/// `left`/`right` point at children within the same dimension; `next`
/// points one dimension further along (or, in the last dimension, at a
/// summary). A node with both children `None` is a *leaf of its dimension*;
/// a node with exactly one is a *singleton*, whose `next` must always equal
/// that child's `next` (invariant 3); a node with both is a *fork*, whose
/// `next` summarizes the union of both children's ranges (invariant 4).
///
/// `parents` is a derived index, not canonical data: it records every live
/// same-dimension edge currently pointing at this node, so that merge-safety
/// during insertion can be decided without a full reachability scan, and so
/// that singleton-next propagation can walk upward. It is rebuilt after
/// deserialization rather than serialized, since it is fully determined by
/// the `left`/`right` edges of the rest of the dimension.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct Node {
    pub(crate) left: Option<Handle>,
    pub(crate) right: Option<Handle>,
    pub(crate) next: Option<Handle>,
    #[serde(skip)]
    pub(crate) parents: Vec<Handle>,
}

impl Node {
    pub(crate) fn is_leaf(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }

    pub(crate) fn is_fork(&self) -> bool {
        self.left.is_some() && self.right.is_some()
    }

    pub(crate) fn child(&self, right: bool) -> Option<Handle> {
        if right {
            self.right
        } else {
            self.left
        }
    }

    pub(crate) fn set_child(&mut self, right: bool, h: Option<Handle>) {
        if right {
            self.right = h;
        } else {
            self.left = h;
        }
    }
}

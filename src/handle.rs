//! Opaque references into a [`crate::arena::RefVec`] slab.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An index into a [`crate::arena::RefVec`].
///
/// The same `Handle` type is reused for dimension-node arenas and the
/// summary arena; its meaning is always contextual on which arena it was
/// handed out by. This mirrors the plain integer indices of the original
/// design, substituting `Option<Handle>` for its `-1` "no reference" marker.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Handle(pub(crate) u32);

impl Handle {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

//! Per-dimension storage: a node arena plus the bit-width it refines over.

use crate::arena::RefVec;
use crate::node::Node;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub(crate) struct Dimension {
    pub(crate) nodes: RefVec<Node>,
    /// Number of address bits this dimension refines over; addresses here
    /// range over `0..2^width`.
    pub(crate) width: u32,
}

impl Dimension {
    pub(crate) fn new(width: u32) -> Self {
        Dimension {
            nodes: RefVec::new(),
            width,
        }
    }
}

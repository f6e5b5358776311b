//! Manual `Deserialize` for [`Cube`], rebuilding the derived state that is
//! deliberately left out of the wire format.
//!
//! `RefVec`'s free list and `Node::parents` are both fully determined by the
//! rest of a cube's data (refcounts, and left/right edges respectively), so
//! neither is serialized — a plain `#[derive(Deserialize)]` would just leave
//! them at their `Default` (empty), which silently breaks every subsequent
//! insert. This module deserializes into a field-for-field copy of `Cube`'s
//! layout, then reconstructs both before handing back a real `Cube`.

use serde::{Deserialize, Deserializer};

use crate::arena::RefVec;
use crate::dimension::Dimension;
use crate::handle::Handle;
use crate::summary::Summary;

use super::Cube;

#[derive(Deserialize)]
#[serde(bound = "S: Summary + serde::de::DeserializeOwned")]
struct CubeRepr<S: Summary> {
    dims: Vec<Dimension>,
    summaries: RefVec<S>,
    root: Option<Handle>,
}

impl<'de, S> Deserialize<'de> for Cube<S>
where
    S: Summary + Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let repr = CubeRepr::<S>::deserialize(deserializer)?;
        let mut cube = Cube {
            dims: repr.dims,
            summaries: repr.summaries,
            root: repr.root,
        };
        cube.rebuild_derived_state();
        Ok(cube)
    }
}

impl<S: Summary> Cube<S> {
    fn rebuild_derived_state(&mut self) {
        self.summaries.rebuild_free_list();
        for dim in 0..self.dims.len() {
            self.dims[dim].nodes.rebuild_free_list();
            for h in self.dims[dim].nodes.iter_live().collect::<Vec<_>>() {
                self.dims[dim].nodes.at_mut(h).parents.clear();
            }
            let edges: Vec<(Handle, Handle)> = self.dims[dim]
                .nodes
                .iter_live()
                .flat_map(|parent| {
                    let n = self.dims[dim].nodes.at(parent);
                    [n.left, n.right].into_iter().flatten().map(move |child| (child, parent))
                })
                .collect();
            for (child, parent) in edges {
                self.dims[dim].nodes.at_mut(child).parents.push(parent);
            }
        }
    }
}

//! Quad connectivity for one 2D mesh layer.
//!
//! Winding: each face starts at the local bottom-left node of its cell and
//! runs counter-clockwise, `(x, y) -> (x+1, y) -> (x+1, y+1) -> (x, y+1)`,
//! where local `(x, y)` maps to `element_base + x * ny + y`. Every other
//! layer reuses the same table because node numbering inside a layer is
//! identical after reorganization.

use tracing::debug;

use crate::error::{MeshError, Result};
use crate::header::HeaderGeometry;
use crate::store::{MeshStore, NodeOrder};

pub const NODES_PER_FACE: usize = 4;

/// Four node indices into the store's node sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Face {
    indices: [usize; NODES_PER_FACE],
}

impl Face {
    pub fn new(indices: [usize; NODES_PER_FACE]) -> Self {
        Self { indices }
    }

    pub fn indices(&self) -> &[usize; NODES_PER_FACE] {
        &self.indices
    }
}

/// Builds the face table of the first 2D mesh layer.
#[derive(Debug, Clone, Copy)]
pub struct FaceBuilder<'a> {
    geometry: &'a HeaderGeometry,
}

impl<'a> FaceBuilder<'a> {
    pub fn new(geometry: &'a HeaderGeometry) -> Self {
        Self { geometry }
    }

    /// Faces for one layer of `nodes_per_2d_layer` nodes.
    ///
    /// Does not look at node data, only at index arithmetic.
    pub fn layer_faces(&self) -> Result<Vec<Face>> {
        let g = self.geometry;
        let [nx, ny, _] = g.nodes_per_axis;
        let block = g.nodes_per_2d_elem;

        let mut faces = Vec::with_capacity(g.faces_per_2d_layer);
        if block > 0 {
            for base in (0..g.nodes_per_2d_layer).step_by(block) {
                for x in 0..nx.saturating_sub(1) {
                    for y in 0..ny.saturating_sub(1) {
                        let at = |x: usize, y: usize| base + x * ny + y;
                        faces.push(Face::new([
                            at(x, y),
                            at(x + 1, y),
                            at(x + 1, y + 1),
                            at(x, y + 1),
                        ]));
                    }
                }
            }
        }

        if faces.len() != g.faces_per_2d_layer {
            return Err(MeshError::consistency(
                "faces per 2D layer",
                g.faces_per_2d_layer,
                faces.len(),
            ));
        }
        Ok(faces)
    }

    /// Build faces over a reorganized store and install them.
    pub fn build(&self, store: &mut MeshStore) -> Result<usize> {
        if store.order() != NodeOrder::Layered {
            return Err(MeshError::consistency(
                "face build requires layered node order",
                NodeOrder::Layered as usize,
                store.order() as usize,
            ));
        }
        if store.len() < self.geometry.nodes_per_2d_layer {
            return Err(MeshError::size_mismatch(
                "nodes available for the first 2D layer",
                self.geometry.nodes_per_2d_layer,
                store.len(),
            ));
        }

        let faces = self.layer_faces()?;
        let count = faces.len();
        store.set_faces(faces)?;

        debug!(faces = count, "Built layer faces");
        Ok(count)
    }
}

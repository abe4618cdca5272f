//! Owner of the node sequence and the face table built over it.

use bytemuck::Pod;
use rayon::prelude::*;
use tracing::debug;

use crate::error::{MeshError, Result};
use crate::faces::{Face, NODES_PER_FACE};
use crate::header::HeaderGeometry;
use crate::node::MeshNode;
use crate::reader::RawSample;
use crate::variables::{VariableTable, X, Y, Z};

/// Runtime dimension names exposed to the output schema.
pub mod dim_names {
    pub const NODES_PER_2D_LAYER: &str = "nNodesPer2DLayer";
    pub const FACES_PER_2D_LAYER: &str = "nFacesPer2DLayer";
    pub const N_2D_LAYERS: &str = "n2DLayers";
    pub const ELEMENT_LAYERS: &str = "nElemLayers";
    pub const MAX_FACE_NODES: &str = "nMaxFaceNodes";
    pub const TIMESTEPS: &str = "nTimesteps";
}

/// Where the node sequence is in the reorganization pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeOrder {
    /// As read: element-major.
    File,
    /// After the element-layer sort.
    ElementLayer,
    /// After the 2D-mesh-layer sort; faces may be built.
    Layered,
}

/// Output dimension sizes derived from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshDimensions {
    pub nodes_per_2d_layer: usize,
    pub faces_per_2d_layer: usize,
    pub n_2d_layers: usize,
    pub element_layers: usize,
    pub max_face_nodes: usize,
}

impl MeshDimensions {
    /// Named sizes, keyed by the names in [`dim_names`].
    pub fn entries(&self) -> [(&'static str, usize); 5] {
        [
            (dim_names::NODES_PER_2D_LAYER, self.nodes_per_2d_layer),
            (dim_names::FACES_PER_2D_LAYER, self.faces_per_2d_layer),
            (dim_names::N_2D_LAYERS, self.n_2d_layers),
            (dim_names::ELEMENT_LAYERS, self.element_layers),
            (dim_names::MAX_FACE_NODES, self.max_face_nodes),
        ]
    }
}

/// Ordered nodes plus the quad connectivity of one 2D mesh layer.
///
/// Faces hold indices into `nodes`, so any reordering drops them.
#[derive(Debug, Clone)]
pub struct MeshStore {
    geometry: HeaderGeometry,
    nodes: Vec<MeshNode>,
    faces: Vec<Face>,
    order: NodeOrder,
}

impl MeshStore {
    /// Build one node per sample position from the three coordinate files,
    /// tagging each with the x file's element layer IDs.
    pub fn from_grid<T>(
        x: &RawSample<T>,
        y: &RawSample<T>,
        z: &RawSample<T>,
        table: &VariableTable,
    ) -> Result<Self>
    where
        T: Pod + Into<f64> + Send + Sync,
    {
        Self::from_grid_with_layers(x, y, z, &x.element_layer_ids, table)
    }

    /// Like [`MeshStore::from_grid`] with caller-supplied element layer IDs.
    pub fn from_grid_with_layers<T>(
        x: &RawSample<T>,
        y: &RawSample<T>,
        z: &RawSample<T>,
        element_layer_ids: &[usize],
        table: &VariableTable,
    ) -> Result<Self>
    where
        T: Pod + Into<f64> + Send + Sync,
    {
        if x.len() != y.len() || x.len() != z.len() {
            return Err(MeshError::GridSizeMismatch {
                x: x.len(),
                y: y.len(),
                z: z.len(),
            });
        }
        if element_layer_ids.len() != x.len() {
            return Err(MeshError::size_mismatch(
                "element layer ids",
                x.len(),
                element_layer_ids.len(),
            ));
        }

        check_geometry(&x.geometry, y)?;
        check_geometry(&x.geometry, z)?;

        let slots = table.len();
        let (xs, ys, zs) = (table.slot(X)?, table.slot(Y)?, table.slot(Z)?);

        let nodes = (0..x.len())
            .into_par_iter()
            .map(|i| -> Result<MeshNode> {
                let mut node = MeshNode::new(slots, element_layer_ids[i], i);
                node.set_var(xs, x.values[i].into())?;
                node.set_var(ys, y.values[i].into())?;
                node.set_var(zs, z.values[i].into())?;
                Ok(node)
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(nodes = nodes.len(), slots, "Built mesh nodes");

        Ok(Self::from_nodes(x.geometry.clone(), nodes))
    }

    /// Wrap already-built nodes, assumed to be in file order.
    pub fn from_nodes(geometry: HeaderGeometry, nodes: Vec<MeshNode>) -> Self {
        Self {
            geometry,
            nodes,
            faces: Vec::new(),
            order: NodeOrder::File,
        }
    }

    /// Scatter a field file's values into `slot` of every node.
    ///
    /// Nodes keep their file position, so this works before or after
    /// reorganization.
    pub fn read_field_to_nodes<T>(&mut self, sample: &RawSample<T>, slot: usize) -> Result<()>
    where
        T: Pod + Into<f64> + Send + Sync,
    {
        if sample.len() != self.nodes.len() {
            return Err(MeshError::size_mismatch(
                format!("field file {}", sample.path.display()),
                self.nodes.len(),
                sample.len(),
            ));
        }

        check_geometry(&self.geometry, sample)?;

        let values = &sample.values;
        self.nodes.par_iter_mut().try_for_each(|node| {
            let value = values
                .get(node.origin())
                .copied()
                .ok_or(MeshError::IndexOutOfRange {
                    what: "field value",
                    index: node.origin(),
                    len: values.len(),
                })?;
            node.set_var(slot, value.into())
        })
    }

    /// Scatter a field file into the slot registered for `name`.
    pub fn read_field_by_name<T>(
        &mut self,
        sample: &RawSample<T>,
        name: &str,
        table: &VariableTable,
    ) -> Result<()>
    where
        T: Pod + Into<f64> + Send + Sync,
    {
        let slot = table.slot(name)?;
        self.read_field_to_nodes(sample, slot)
    }

    /// Set one node's variable by name.
    pub fn set_var_by_name(
        &mut self,
        index: usize,
        name: &str,
        value: f64,
        table: &VariableTable,
    ) -> Result<()> {
        let slot = table.slot(name)?;
        self.node_mut(index)?.set_var(slot, value)
    }

    /// Apply `f` to every node in parallel. Each worker owns a disjoint range
    /// and node order is untouched.
    pub fn update_nodes<F>(&mut self, f: F) -> Result<()>
    where
        F: Fn(&mut MeshNode) -> Result<()> + Sync + Send,
    {
        self.nodes.par_iter_mut().try_for_each(f)
    }

    /// Stable sort of the node sequence. Drops any built faces.
    pub(crate) fn stable_sort_by_key<K, F>(&mut self, key: F, order: NodeOrder)
    where
        K: Ord,
        F: FnMut(&MeshNode) -> K,
    {
        self.nodes.sort_by_key(key);
        self.faces.clear();
        self.order = order;
    }

    pub(crate) fn nodes_mut(&mut self) -> &mut [MeshNode] {
        &mut self.nodes
    }

    pub fn node(&self, index: usize) -> Result<&MeshNode> {
        let len = self.nodes.len();
        self.nodes.get(index).ok_or(MeshError::IndexOutOfRange {
            what: "node",
            index,
            len,
        })
    }

    fn node_mut(&mut self, index: usize) -> Result<&mut MeshNode> {
        let len = self.nodes.len();
        self.nodes.get_mut(index).ok_or(MeshError::IndexOutOfRange {
            what: "node",
            index,
            len,
        })
    }

    pub fn nodes(&self) -> &[MeshNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Values of `slot` for every node, in current node order.
    pub fn values(&self, slot: usize) -> Result<Vec<f64>> {
        self.nodes.iter().map(|n| n.var(slot)).collect()
    }

    pub fn geometry(&self) -> &HeaderGeometry {
        &self.geometry
    }

    pub fn order(&self) -> NodeOrder {
        self.order
    }

    /// Install a face table. Every index must address an existing node.
    pub fn set_faces(&mut self, faces: Vec<Face>) -> Result<()> {
        let len = self.nodes.len();
        if let Some(&index) = faces
            .iter()
            .flat_map(|f| f.indices().iter())
            .find(|&&i| i >= len)
        {
            return Err(MeshError::IndexOutOfRange {
                what: "face node",
                index,
                len,
            });
        }
        self.faces = faces;
        Ok(())
    }

    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    /// Face table flattened into runs of four node indices.
    pub fn face_indices(&self) -> Vec<usize> {
        self.faces
            .iter()
            .flat_map(|f| f.indices().iter().copied())
            .collect()
    }

    pub fn dimensions(&self) -> MeshDimensions {
        let g = &self.geometry;
        let n_2d_layers = if g.nodes_per_2d_layer == 0 {
            0
        } else {
            self.nodes.len() / g.nodes_per_2d_layer
        };
        MeshDimensions {
            nodes_per_2d_layer: g.nodes_per_2d_layer,
            faces_per_2d_layer: g.faces_per_2d_layer,
            n_2d_layers,
            element_layers: n_2d_layers.div_ceil(g.sub_layers.max(1)),
            max_face_nodes: NODES_PER_FACE,
        }
    }
}

/// A file must describe the same elements as the grid it is paired with.
fn check_geometry<T>(expected: &HeaderGeometry, sample: &RawSample<T>) -> Result<()> {
    let actual = &sample.geometry;
    let name = sample.path.display();
    let pairs = [
        ("element count", expected.element_count, actual.element_count),
        ("nodes along x", expected.nodes_per_axis[0], actual.nodes_per_axis[0]),
        ("nodes along y", expected.nodes_per_axis[1], actual.nodes_per_axis[1]),
        ("nodes along z", expected.nodes_per_axis[2], actual.nodes_per_axis[2]),
    ];
    for (what, want, got) in pairs {
        if want != got {
            return Err(MeshError::consistency(
                format!("{} of {}", what, name),
                want,
                got,
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::GridHeader;
    use crate::transform::CoordinateMode;
    use std::path::{Path, PathBuf};

    fn sample(n: usize, offset: f64) -> RawSample<f64> {
        let header = GridHeader {
            version: 1,
            dim: 2,
            element_count: 1,
            poly_order: vec![1, 1],
            grid_type: 0,
            time_cycle: 0,
            time_stamp: 0.0,
            has_mult_vars: 0,
            header_bytes: 48,
        };
        let geometry = header.geometry(1, Path::new("mem")).unwrap();
        RawSample {
            path: PathBuf::from("mem"),
            header,
            geometry,
            values: (0..n).map(|i| i as f64 + offset).collect(),
            element_layer_ids: vec![0; n],
        }
    }

    fn sample_with(element_count: u64, poly_order: Vec<u32>, n: usize) -> RawSample<f64> {
        let header = GridHeader {
            version: 1,
            dim: poly_order.len() as u32,
            element_count,
            poly_order,
            grid_type: 0,
            time_cycle: 0,
            time_stamp: 0.0,
            has_mult_vars: 0,
            header_bytes: 48,
        };
        let geometry = header.geometry(1, Path::new("other")).unwrap();
        RawSample {
            path: PathBuf::from("other"),
            header,
            geometry,
            values: vec![0.0; n],
            element_layer_ids: vec![0; n],
        }
    }

    fn table() -> VariableTable {
        VariableTable::for_job(CoordinateMode::Box, &["T".to_string()]).unwrap()
    }

    #[test]
    fn test_from_grid_fills_position() {
        let store =
            MeshStore::from_grid(&sample(4, 0.0), &sample(4, 10.0), &sample(4, 20.0), &table())
                .unwrap();

        assert_eq!(store.len(), 4);
        assert_eq!(store.node(2).unwrap().position().unwrap(), [2.0, 12.0, 22.0]);
        assert_eq!(store.order(), NodeOrder::File);
    }

    #[test]
    fn test_grid_size_mismatch_names_all_lengths() {
        let err = MeshStore::from_grid(&sample(10, 0.0), &sample(10, 0.0), &sample(9, 0.0), &table())
            .unwrap_err();

        assert!(matches!(err, MeshError::GridSizeMismatch { x: 10, y: 10, z: 9 }));
        let msg = err.to_string();
        assert!(msg.contains("x=10") && msg.contains("y=10") && msg.contains("z=9"));
    }

    #[test]
    fn test_grid_header_mismatch_is_consistency_error() {
        // same 4 values: one order-[1,1] element against four order-[0,0]
        let other = sample_with(4, vec![0, 0], 4);
        let err = MeshStore::from_grid(&sample(4, 0.0), &other, &sample(4, 0.0), &table())
            .unwrap_err();

        assert!(matches!(
            err,
            MeshError::Consistency { expected: 1, actual: 4, .. }
        ));
        assert!(err.to_string().contains("element count of other"));
    }

    #[test]
    fn test_field_header_mismatch_is_consistency_error() {
        let t = table();
        let mut store =
            MeshStore::from_grid(&sample(4, 0.0), &sample(4, 0.0), &sample(4, 0.0), &t).unwrap();

        let err = store
            .read_field_by_name(&sample_with(4, vec![0, 0], 4), "T", &t)
            .unwrap_err();
        assert!(matches!(err, MeshError::Consistency { .. }));
    }

    #[test]
    fn test_field_length_mismatch() {
        let t = table();
        let mut store =
            MeshStore::from_grid(&sample(4, 0.0), &sample(4, 0.0), &sample(4, 0.0), &t).unwrap();
        let err = store.read_field_by_name(&sample(3, 0.0), "T", &t).unwrap_err();
        assert!(matches!(err, MeshError::SizeMismatch { expected: 4, actual: 3, .. }));
    }

    #[test]
    fn test_field_follows_origin_after_reorder() {
        let t = table();
        let mut store =
            MeshStore::from_grid(&sample(4, 0.0), &sample(4, 0.0), &sample(4, 0.0), &t).unwrap();
        store.stable_sort_by_key(|n| std::cmp::Reverse(n.origin()), NodeOrder::ElementLayer);

        store.read_field_by_name(&sample(4, 100.0), "T", &t).unwrap();

        let slot = t.slot("T").unwrap();
        assert_eq!(store.values(slot).unwrap(), vec![103.0, 102.0, 101.0, 100.0]);
    }

    #[test]
    fn test_unknown_field_name() {
        let t = table();
        let mut store =
            MeshStore::from_grid(&sample(4, 0.0), &sample(4, 0.0), &sample(4, 0.0), &t).unwrap();
        assert!(matches!(
            store.read_field_by_name(&sample(4, 0.0), "rho", &t),
            Err(MeshError::UnknownVariable(_))
        ));
        assert!(store.set_var_by_name(9, "T", 1.0, &t).is_err());
    }

    #[test]
    fn test_set_faces_checks_bounds() {
        let t = table();
        let mut store =
            MeshStore::from_grid(&sample(4, 0.0), &sample(4, 0.0), &sample(4, 0.0), &t).unwrap();

        assert!(store.set_faces(vec![Face::new([0, 1, 2, 4])]).is_err());
        store.set_faces(vec![Face::new([0, 2, 3, 1])]).unwrap();
        assert_eq!(store.face_indices(), vec![0, 2, 3, 1]);

        store.stable_sort_by_key(|n| n.origin(), NodeOrder::ElementLayer);
        assert!(store.faces().is_empty());
    }
}

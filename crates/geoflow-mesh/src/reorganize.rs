//! Two-phase stable sort from element-major file order into layer-major
//! order.
//!
//! Phase 1 sorts by element layer ID. Phase 2 sorts by a computed key that
//! is unique per (element layer, z sub-layer, element) triple, so every 2D
//! mesh layer ends up contiguous with its elements in phase-1 order. Both
//! sorts must be stable: nodes sharing a key keep their intra-element order,
//! which is what face connectivity relies on.

use std::time::Instant;

use tracing::{debug, info};

use crate::error::{MeshError, Result};
use crate::header::HeaderGeometry;
use crate::store::{MeshStore, NodeOrder};

#[derive(Debug, Clone, Copy)]
pub struct MeshReorganizer<'a> {
    geometry: &'a HeaderGeometry,
}

impl<'a> MeshReorganizer<'a> {
    pub fn new(geometry: &'a HeaderGeometry) -> Self {
        Self { geometry }
    }

    /// Run both phases.
    pub fn reorganize(&self, store: &mut MeshStore) -> Result<()> {
        let start = Instant::now();

        self.sort_by_element_layer(store);
        self.assign_layer_keys(store)?;
        self.sort_by_layer_key(store)?;

        info!(
            nodes = store.len(),
            layers = store.dimensions().n_2d_layers,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Reorganized nodes into 2D mesh layers"
        );
        Ok(())
    }

    /// Phase 1.
    pub fn sort_by_element_layer(&self, store: &mut MeshStore) {
        store.stable_sort_by_key(|n| n.element_layer_id(), NodeOrder::ElementLayer);
    }

    /// Compute the phase-2 key of every node.
    ///
    /// The key of a node is
    /// `(layer * sub_layers + sub_layer) * elems_per_layer + ordinal`, where
    /// `ordinal` numbers elements inside their layer by first appearance in
    /// the current order. The key depends only on a node's own tags and the
    /// relative order of elements, so assigning it to an already layered
    /// sequence reproduces the same keys.
    pub fn assign_layer_keys(&self, store: &mut MeshStore) -> Result<()> {
        let g = self.geometry;
        let mut element_slot: Vec<Option<(usize, usize)>> = vec![None; g.element_count];
        let mut per_layer = vec![0usize; g.element_layers];

        for node in store.nodes_mut() {
            let layer = node.element_layer_id();
            if layer >= g.element_layers {
                return Err(MeshError::IndexOutOfRange {
                    what: "element layer",
                    index: layer,
                    len: g.element_layers,
                });
            }

            let element = g.element_of(node.origin());
            let entry = element_slot
                .get_mut(element)
                .ok_or(MeshError::IndexOutOfRange {
                    what: "element",
                    index: element,
                    len: g.element_count,
                })?;

            let ordinal = match *entry {
                Some((owner, ordinal)) => {
                    if owner != layer {
                        return Err(MeshError::consistency(
                            format!("element layer of element {}", element),
                            owner,
                            layer,
                        ));
                    }
                    ordinal
                }
                None => {
                    let ordinal = per_layer[layer];
                    per_layer[layer] += 1;
                    *entry = Some((layer, ordinal));
                    ordinal
                }
            };

            let sub_layer = g.sub_layer_of(node.origin());
            node.set_sort_key((layer * g.sub_layers + sub_layer) * g.elems_per_layer + ordinal);
        }

        // A layer is either absent (single-layer reads) or complete.
        for (layer, &count) in per_layer.iter().enumerate() {
            if count != 0 && count != g.elems_per_layer {
                return Err(MeshError::consistency(
                    format!("elements in element layer {}", layer),
                    g.elems_per_layer,
                    count,
                ));
            }
        }

        debug!(
            layers = per_layer.iter().filter(|&&c| c > 0).count(),
            "Assigned 2D mesh layer keys"
        );
        Ok(())
    }

    /// Phase 2. Every node must already carry a key.
    pub fn sort_by_layer_key(&self, store: &mut MeshStore) -> Result<()> {
        let unkeyed = store.nodes().iter().filter(|n| n.sort_key().is_none()).count();
        if unkeyed > 0 {
            return Err(MeshError::consistency("nodes with a layer sort key", store.len(), store.len() - unkeyed));
        }
        store.stable_sort_by_key(|n| n.sort_key(), NodeOrder::Layered);
        Ok(())
    }
}

//! Element layer assignment.
//!
//! The solver writes elements layer by layer, so by default an element's
//! layer follows from its file position. Radial mode recovers layers from
//! geometry for files that do not keep that order.

use bytemuck::Pod;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MeshError, Result};
use crate::reader::RawSample;
use crate::transform::{magnitude, CoordinateMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementLayerMode {
    /// Element `e` lies on layer `e / elems_per_layer`.
    #[default]
    Sequential,
    /// Elements ranked by mean radius (spherical) or mean z (box).
    Radial,
}

/// Per-node element layer IDs for the given mode.
pub fn element_layer_ids<T>(
    x: &RawSample<T>,
    y: &RawSample<T>,
    z: &RawSample<T>,
    mode: ElementLayerMode,
    coordinates: CoordinateMode,
) -> Result<Vec<usize>>
where
    T: Pod + Into<f64> + Send + Sync,
{
    match mode {
        ElementLayerMode::Sequential => Ok(x.element_layer_ids.clone()),
        ElementLayerMode::Radial => radial_element_layer_ids(x, y, z, coordinates),
    }
}

/// Rank elements by mean height and cut the ranking into layers of
/// `elems_per_layer`. Ties keep file order.
pub fn radial_element_layer_ids<T>(
    x: &RawSample<T>,
    y: &RawSample<T>,
    z: &RawSample<T>,
    coordinates: CoordinateMode,
) -> Result<Vec<usize>>
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

    let g = &x.geometry;
    let per_elem = g.nodes_per_elem;
    if per_elem == 0 || x.len() % per_elem != 0 {
        return Err(MeshError::consistency(
            "nodes per element in grid sample",
            per_elem,
            x.len(),
        ));
    }
    let elements = x.len() / per_elem;

    let heights: Vec<f64> = (0..elements)
        .into_par_iter()
        .map(|e| {
            let range = e * per_elem..(e + 1) * per_elem;
            let sum: f64 = range
                .map(|i| match coordinates {
                    CoordinateMode::Spherical => magnitude([
                        x.values[i].into(),
                        y.values[i].into(),
                        z.values[i].into(),
                    ]),
                    CoordinateMode::Box => z.values[i].into(),
                })
                .sum();
            sum / per_elem as f64
        })
        .collect();

    let mut ranked: Vec<usize> = (0..elements).collect();
    ranked.sort_by(|&a, &b| heights[a].total_cmp(&heights[b]));

    let mut element_layer = vec![0usize; elements];
    for (rank, &element) in ranked.iter().enumerate() {
        element_layer[element] = rank / g.elems_per_layer.max(1);
    }

    debug!(elements, layers = g.element_layers, "Assigned radial element layers");

    Ok((0..x.len())
        .map(|i| element_layer[g.element_of(i)])
        .collect())
}

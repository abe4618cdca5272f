//! Cartesian to spherical conversion for node positions.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MeshError, Result};
use crate::store::MeshStore;
use crate::variables::{VariableTable, LATITUDE, LONGITUDE, RADIUS};

/// How node positions are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoordinateMode {
    /// Positions on a sphere; nodes get lat, lon and radius slots.
    #[default]
    Spherical,
    /// Plain cartesian box; positions are exported as-is.
    Box,
}

pub fn magnitude(v: [f64; 3]) -> f64 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

/// Distance between `p` and `center`.
pub fn radius(p: [f64; 3], center: [f64; 3]) -> f64 {
    magnitude([p[0] - center[0], p[1] - center[1], p[2] - center[2]])
}

pub fn normalize(v: [f64; 3]) -> Result<[f64; 3]> {
    let m = magnitude(v);
    if m == 0.0 {
        return Err(MeshError::DegenerateVector);
    }
    Ok([v[0] / m, v[1] / m, v[2] / m])
}

/// Latitude and longitude in radians of a unit vector.
///
/// z is clamped to [-1, 1] so rounding in `normalize` cannot push `asin`
/// out of its domain.
pub fn to_lat_lon(unit: [f64; 3]) -> (f64, f64) {
    let lat = unit[2].clamp(-1.0, 1.0).asin();
    let lon = unit[1].atan2(unit[0]);
    (lat, lon)
}

pub fn to_degrees(radians: f64) -> f64 {
    radians.to_degrees()
}

/// Latitude and longitude in degrees plus radius from the origin.
pub fn xyz_to_lat_lon_radius(p: [f64; 3]) -> Result<(f64, f64, f64)> {
    let r = magnitude(p);
    let (lat, lon) = to_lat_lon(normalize(p)?);
    Ok((to_degrees(lat), to_degrees(lon), r))
}

/// Fill the lat, lon and radius slots of every node.
///
/// A no-op in box mode. Fails on the first node sitting at the origin.
pub fn apply_coordinate_transform(
    store: &mut MeshStore,
    table: &VariableTable,
    mode: CoordinateMode,
) -> Result<()> {
    if mode == CoordinateMode::Box {
        return Ok(());
    }

    let lat_slot = table.slot(LATITUDE)?;
    let lon_slot = table.slot(LONGITUDE)?;
    let r_slot = table.slot(RADIUS)?;

    store.update_nodes(|node| {
        let (lat, lon, r) = xyz_to_lat_lon_radius(node.position()?)?;
        node.set_var(lat_slot, lat)?;
        node.set_var(lon_slot, lon)?;
        node.set_var(r_slot, r)
    })?;

    debug!(nodes = store.len(), "Computed spherical coordinates");
    Ok(())
}

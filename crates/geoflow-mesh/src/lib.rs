//! Spectral-element grid files rebuilt as a layered quad mesh.
//!
//! A GeoFLOW run writes one binary file per coordinate axis (x, y, z) and one
//! per field variable and timestep. Each file holds a small header followed
//! by one value per node, stored element by element. This crate turns those
//! files into a node sequence grouped into horizontal 2D mesh layers, plus
//! the quad connectivity of one layer, ready for a gridded output writer.
//!
//! # Pipeline
//!
//! ```text
//! xgrid / ygrid / zgrid files
//!      │
//!      ▼
//! GridFileReader::read ──► RawSample (header + flat values)
//!      │
//!      ▼
//! MeshStore::from_grid ──► one MeshNode per value, element-major
//!      │
//!      ├─► apply_coordinate_transform (lat / lon / radius)
//!      │
//!      ▼
//! MeshReorganizer::reorganize
//!      │    phase 1: stable sort by element layer
//!      │    phase 2: stable sort by 2D layer key
//!      ▼
//! FaceBuilder::build ──► quads of the first 2D layer
//!      │
//!      ▼
//! MeshStore::read_field_by_name (per field file, per timestep)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use geoflow_mesh::{
//!     apply_coordinate_transform, CoordinateMode, FaceBuilder, GridFileReader, MeshReorganizer,
//!     MeshStore, VariableTable,
//! };
//!
//! let reader = GridFileReader::<f64>::new(1);
//! let (x, y, z) = (reader.read(&xp)?, reader.read(&yp)?, reader.read(&zp)?);
//! let table = VariableTable::for_job(CoordinateMode::Spherical, &["T".into()])?;
//!
//! let mut store = MeshStore::from_grid(&x, &y, &z, &table)?;
//! apply_coordinate_transform(&mut store, &table, CoordinateMode::Spherical)?;
//! MeshReorganizer::new(&x.geometry).reorganize(&mut store)?;
//! FaceBuilder::new(&x.geometry).build(&mut store)?;
//! ```

pub mod error;
pub mod faces;
pub mod header;
pub mod layers;
pub mod naming;
pub mod node;
pub mod reader;
pub mod reorganize;
pub mod store;
pub mod transform;
pub mod variables;

// Re-export commonly used types at crate root
pub use error::{MeshError, Result};
pub use faces::{Face, FaceBuilder, NODES_PER_FACE};
pub use header::{GridHeader, HeaderGeometry};
pub use layers::{element_layer_ids, radial_element_layer_ids, ElementLayerMode};
pub use naming::{discover_timesteps, FieldFileName};
pub use node::MeshNode;
pub use reader::{GridFileReader, RawSample, ReadScope};
pub use reorganize::MeshReorganizer;
pub use store::{dim_names, MeshDimensions, MeshStore, NodeOrder};
pub use transform::{
    apply_coordinate_transform, magnitude, normalize, radius, to_degrees, to_lat_lon,
    xyz_to_lat_lon_radius, CoordinateMode,
};
pub use variables::VariableTable;

//! Schema-driven export of a layered mesh to Zarr V3.
//!
//! The schema names the output dimensions and variables and says where each
//! variable's data comes from: a node slot, a per-timestep field, the face
//! table, or nothing (metadata only). Dimensions declared as 0 are sized
//! from the mesh at runtime.
//!
//! # Example
//!
//! ```ignore
//! use mesh_export::{runtime_dimensions, Schema, ZarrMeshWriter};
//!
//! let schema = Schema::from_file(&schema_path)?
//!     .resolve(&runtime_dimensions(&store.dimensions(), timesteps.len()))?;
//! let writer = ZarrMeshWriter::create(&out, schema)?;
//! writer.write_static(&store, &table, &timesteps)?;
//! ```

pub mod error;
pub mod schema;
pub mod writer;

// Re-export commonly used types at crate root
pub use error::{ExportError, Result};
pub use schema::{
    runtime_dimensions, DataSource, DimensionSpec, ResolvedSchema, ResolvedVariable, Schema,
    VariableSpec, VariableType,
};
pub use writer::{ZarrMeshWriter, DIMENSIONS_ATTRIBUTE};

//! Error types for mesh export.

use std::path::PathBuf;

use geoflow_mesh::MeshError;
use thiserror::Error;

/// Errors that can occur while resolving a schema or writing the store.
#[derive(Error, Debug)]
pub enum ExportError {
    /// Failure inside the mesh core, including shape consistency checks.
    #[error(transparent)]
    Mesh(#[from] MeshError),

    /// Schema JSON is malformed or references something undeclared.
    #[error("invalid schema: {0}")]
    Schema(String),

    /// A zero-valued dimension with no runtime value to fill it.
    #[error("dimension {0} has no value and is not filled at runtime")]
    UnresolvedDimension(String),

    /// Variable type name outside the supported set.
    #[error("unsupported type '{type_name}' for variable {variable}")]
    UnsupportedType { variable: String, type_name: String },

    /// Zarr storage failure.
    #[error("Zarr write error: {0}")]
    ZarrWrite(String),

    /// Schema file could not be read.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ExportError {
    /// Create a Schema error.
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }

    /// Create a ZarrWrite error.
    pub fn zarr(msg: impl Into<String>) -> Self {
        Self::ZarrWrite(msg.into())
    }
}

impl From<serde_json::Error> for ExportError {
    fn from(err: serde_json::Error) -> Self {
        Self::Schema(err.to_string())
    }
}

/// Result type for export operations.
pub type Result<T> = std::result::Result<T, ExportError>;

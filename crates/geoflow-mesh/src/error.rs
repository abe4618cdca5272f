//! Error types for mesh reconstruction.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reading grid files and rebuilding the mesh.
///
/// Every variant is fatal for the current conversion job. The one tolerated
/// failure, a missing per-timestep field file, is handled by the caller's
/// missing-file policy before a reader is ever opened.
#[derive(Error, Debug)]
pub enum MeshError {
    /// File could not be opened or read.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Header fields out of range or the value array is truncated.
    #[error("invalid grid file {path}: {reason}")]
    Format { path: PathBuf, reason: String },

    /// The three coordinate files disagree on their length.
    #[error("grid coordinate files differ in length: x={x}, y={y}, z={z}")]
    GridSizeMismatch { x: usize, y: usize, z: usize },

    /// A sample does not match the length of the collection it feeds.
    #[error("size mismatch in {context}: expected {expected}, got {actual}")]
    SizeMismatch {
        context: String,
        expected: usize,
        actual: usize,
    },

    /// Name not present in the variable table.
    #[error("unknown variable: {0}")]
    UnknownVariable(String),

    /// Name registered twice in the variable table.
    #[error("duplicate variable: {0}")]
    DuplicateVariable(String),

    /// Normalizing a zero-length vector.
    #[error("cannot normalize a zero-length vector")]
    DegenerateVector,

    /// Slot, node or face index beyond bounds.
    #[error("{what} index {index} out of range (len {len})")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },

    /// Derived counts disagree with header-derived expectations.
    #[error("consistency check failed for {what}: expected {expected}, got {actual}")]
    Consistency {
        what: String,
        expected: usize,
        actual: usize,
    },
}

impl MeshError {
    /// Create an Io error for the given path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a Format error for the given path.
    pub fn format(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Format {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a SizeMismatch error.
    pub fn size_mismatch(context: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::SizeMismatch {
            context: context.into(),
            expected,
            actual,
        }
    }

    /// Create a Consistency error.
    pub fn consistency(what: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::Consistency {
            what: what.into(),
            expected,
            actual,
        }
    }
}

/// Result type for mesh operations.
pub type Result<T> = std::result::Result<T, MeshError>;

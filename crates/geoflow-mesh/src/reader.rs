//! Reader for a single axis or field file.

use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use bytemuck::Pod;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MeshError, Result};
use crate::header::{GridHeader, HeaderGeometry, MAX_HEADER_BYTES};

/// How many values to read after the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadScope {
    /// One value per node of the full volume.
    #[default]
    Volume,
    /// One 2D mesh layer only. Only valid for 2D datasets, where the first
    /// layer's nodes are contiguous in the file.
    Layer,
}

/// One file's header plus its flat value array.
///
/// `element_layer_ids` runs parallel to `values`.
#[derive(Debug, Clone)]
pub struct RawSample<T> {
    pub path: PathBuf,
    pub header: GridHeader,
    pub geometry: HeaderGeometry,
    pub values: Vec<T>,
    pub element_layer_ids: Vec<usize>,
}

impl<T> RawSample<T> {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Reads grid files whose value array holds `T` (usually `f64`).
#[derive(Debug, Clone)]
pub struct GridFileReader<T> {
    element_layers: usize,
    scope: ReadScope,
    _value: PhantomData<T>,
}

impl<T: Pod> GridFileReader<T> {
    /// Create a reader for a volume split into `element_layers` layers.
    pub fn new(element_layers: usize) -> Self {
        Self {
            element_layers,
            scope: ReadScope::Volume,
            _value: PhantomData,
        }
    }

    pub fn with_scope(mut self, scope: ReadScope) -> Self {
        self.scope = scope;
        self
    }

    /// Read only the header of a grid file.
    pub fn read_header(path: &Path) -> Result<GridHeader> {
        let file = File::open(path).map_err(|e| MeshError::io(path, e))?;
        let mut head = Vec::with_capacity(MAX_HEADER_BYTES);
        file.take(MAX_HEADER_BYTES as u64)
            .read_to_end(&mut head)
            .map_err(|e| MeshError::io(path, e))?;
        GridHeader::parse(&head, path)
    }

    /// Read header and values.
    pub fn read(&self, path: &Path) -> Result<RawSample<T>> {
        let header = Self::read_header(path)?;
        let geometry = header.geometry(self.element_layers, path)?;

        let count = match self.scope {
            ReadScope::Volume => geometry.nodes_per_volume,
            ReadScope::Layer => {
                if geometry.dim != 2 {
                    return Err(MeshError::format(
                        path,
                        "layer scope requires a 2D dataset",
                    ));
                }
                geometry.nodes_per_2d_layer
            }
        };

        let values = read_values::<T>(path, header.header_bytes, count)?;
        let element_layer_ids = (0..count)
            .map(|i| geometry.element_of(i) / geometry.elems_per_layer)
            .collect();

        debug!(
            file = %path.display(),
            header = %header,
            geometry = %geometry,
            values = count,
            "Read grid file"
        );

        Ok(RawSample {
            path: path.to_path_buf(),
            header,
            geometry,
            values,
            element_layer_ids,
        })
    }
}

fn read_values<T: Pod>(path: &Path, offset: usize, count: usize) -> Result<Vec<T>> {
    let n_bytes = count
        .checked_mul(std::mem::size_of::<T>())
        .ok_or_else(|| MeshError::format(path, format!("data size of {} values overflows", count)))?;

    let mut file = File::open(path).map_err(|e| MeshError::io(path, e))?;
    let file_len = file.metadata().map_err(|e| MeshError::io(path, e))?.len();
    let available = file_len.saturating_sub(offset as u64);
    if n_bytes as u64 > available {
        return Err(MeshError::format(
            path,
            format!(
                "cannot read the requested {} bytes of data, only {} follow the header",
                n_bytes, available
            ),
        ));
    }

    file.seek(SeekFrom::Start(offset as u64))
        .map_err(|e| MeshError::io(path, e))?;
    let mut values = vec![T::zeroed(); count];
    file.read_exact(bytemuck::cast_slice_mut(&mut values))
        .map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => MeshError::format(
                path,
                format!("cannot read the requested {} bytes of data", n_bytes),
            ),
            _ => MeshError::io(path, e),
        })?;

    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::GridFileBuilder;

    #[test]
    fn test_read_roundtrip_geometry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("xgrid.000000.out");
        let values: Vec<f64> = (0..2 * 4).map(|v| v as f64).collect();
        GridFileBuilder::new(2, 2, vec![1, 1])
            .version(3)
            .grid_type(2)
            .time(40, 12.5)
            .values(values.clone())
            .write(&path)
            .unwrap();

        let sample = GridFileReader::<f64>::new(1).read(&path).unwrap();

        assert_eq!(sample.header.version, 3);
        assert_eq!(sample.header.grid_type, 2);
        assert_eq!(sample.header.time_cycle, 40);
        assert_eq!(sample.header.time_stamp, 12.5);
        assert_eq!(sample.header.element_count, 2);
        assert_eq!(sample.header.poly_order, vec![1, 1]);
        assert_eq!(sample.geometry.nodes_per_2d_layer, 8);
        assert_eq!(sample.geometry.faces_per_2d_layer, 2);
        assert_eq!(sample.values, values);
        assert_eq!(sample.element_layer_ids, vec![0; 8]);
    }

    #[test]
    fn test_element_layer_ids_follow_file_position() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.out");
        GridFileBuilder::new(2, 2, vec![1, 1])
            .values(vec![0.0; 8])
            .write(&path)
            .unwrap();

        let sample = GridFileReader::<f64>::new(2).read(&path).unwrap();
        assert_eq!(sample.element_layer_ids, vec![0, 0, 0, 0, 1, 1, 1, 1]);
    }

    #[test]
    fn test_truncated_values_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.out");
        GridFileBuilder::new(2, 2, vec![1, 1])
            .values(vec![0.0; 5])
            .write(&path)
            .unwrap();

        let err = GridFileReader::<f64>::new(1).read(&path).unwrap_err();
        assert!(matches!(err, MeshError::Format { .. }));
        assert!(err.to_string().contains("64 bytes"));
    }

    #[test]
    fn test_oversized_element_count_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.out");
        GridFileBuilder::new(2, 1 << 34, vec![1, 1])
            .values(vec![0.0; 4])
            .write(&path)
            .unwrap();

        // rejected from the file size, before any buffer is allocated
        let err = GridFileReader::<f64>::new(1).read(&path).unwrap_err();
        assert!(matches!(err, MeshError::Format { .. }));
        assert!(err.to_string().contains("only 32 follow the header"));
    }

    #[test]
    fn test_overflowing_header_counts_are_format_errors() {
        let dir = tempfile::tempdir().unwrap();

        let path = dir.path().join("elements.out");
        GridFileBuilder::new(2, u64::MAX / 2, vec![1, 1])
            .values(vec![0.0; 4])
            .write(&path)
            .unwrap();
        let err = GridFileReader::<f64>::new(1).read(&path).unwrap_err();
        assert!(matches!(err, MeshError::Format { .. }));
        assert!(err.to_string().contains("overflows"));

        let path = dir.path().join("orders.out");
        GridFileBuilder::new(2, 1, vec![u32::MAX, u32::MAX])
            .values(vec![0.0; 4])
            .write(&path)
            .unwrap();
        let err = GridFileReader::<f64>::new(1).read(&path).unwrap_err();
        assert!(matches!(err, MeshError::Format { .. }));
        assert!(err.to_string().contains("overflows"));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = GridFileReader::<f64>::read_header(Path::new("/nonexistent/x.out")).unwrap_err();
        assert!(matches!(err, MeshError::Io { .. }));
    }

    #[test]
    fn test_layer_scope_rejected_for_3d() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.out");
        GridFileBuilder::new(3, 1, vec![1, 1, 1])
            .values(vec![0.0; 8])
            .write(&path)
            .unwrap();

        let reader = GridFileReader::<f64>::new(1).with_scope(ReadScope::Layer);
        assert!(reader.read(&path).is_err());
    }

    #[test]
    fn test_f32_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.out");
        GridFileBuilder::new(2, 1, vec![1, 1])
            .values_f32(vec![1.5, 2.5, 3.5, 4.5])
            .write(&path)
            .unwrap();

        let sample = GridFileReader::<f32>::new(1).read(&path).unwrap();
        assert_eq!(sample.values, vec![1.5, 2.5, 3.5, 4.5]);
    }
}

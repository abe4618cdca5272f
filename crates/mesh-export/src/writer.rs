//! Zarr V3 writer for a reorganized mesh.
//!
//! Layout of the store:
//!
//! ```text
//! out.zarr/
//!   zarr.json              root group: global attributes, dimension table
//!   mesh/zarr.json         metadata-only variable (group with attributes)
//!   mesh_node_x/           array, one per data-backed variable
//!   T/                     [nTimesteps, n2DLayers, nNodesPer2DLayer]
//! ```
//!
//! Every array records its dimension names in `_ARRAY_DIMENSIONS`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use geoflow_mesh::{MeshError, MeshStore, VariableTable};
use serde_json::{json, Map, Value};
use tracing::{debug, info};
use zarrs::array::{Array, ArrayBuilder, DataType, FillValue};
use zarrs::array_subset::ArraySubset;
use zarrs::group::GroupBuilder;
use zarrs_filesystem::FilesystemStore;

use crate::error::{ExportError, Result};
use crate::schema::{DataSource, ResolvedSchema, ResolvedVariable, VariableType};

/// Attribute holding an array's dimension names.
pub const DIMENSIONS_ATTRIBUTE: &str = "_ARRAY_DIMENSIONS";

/// Values converted to a variable's declared element type.
#[derive(Debug, Clone, PartialEq)]
enum ArrayData {
    F64(Vec<f64>),
    F32(Vec<f32>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    U64(Vec<u64>),
}

impl ArrayData {
    /// Integer targets truncate toward zero; non-finite or out-of-range
    /// values are rejected rather than saturated.
    fn from_floats(var: &ResolvedVariable, values: Vec<f64>) -> Result<Self> {
        let to_int = |v: f64, min: f64, max_exclusive: f64| {
            let t = v.trunc();
            if v.is_finite() && t >= min && t < max_exclusive {
                Ok(t)
            } else {
                Err(ExportError::schema(format!(
                    "value {} does not fit type {} of variable {}",
                    v,
                    var.var_type.as_str(),
                    var.name
                )))
            }
        };
        Ok(match var.var_type {
            VariableType::Double => Self::F64(values),
            VariableType::Float => Self::F32(values.into_iter().map(|v| v as f32).collect()),
            VariableType::Int => Self::I32(
                values
                    .into_iter()
                    .map(|v| to_int(v, i32::MIN as f64, -(i32::MIN as f64)).map(|t| t as i32))
                    .collect::<Result<_>>()?,
            ),
            VariableType::Int64 => Self::I64(
                values
                    .into_iter()
                    .map(|v| to_int(v, i64::MIN as f64, -(i64::MIN as f64)).map(|t| t as i64))
                    .collect::<Result<_>>()?,
            ),
            VariableType::UInt64 => Self::U64(
                values
                    .into_iter()
                    .map(|v| to_int(v, 0.0, 2.0 * -(i64::MIN as f64)).map(|t| t as u64))
                    .collect::<Result<_>>()?,
            ),
        })
    }

    fn from_indices(var: &ResolvedVariable, values: Vec<u64>) -> Result<Self> {
        let overflow = |v: u64| {
            ExportError::schema(format!(
                "value {} does not fit type {} of variable {}",
                v,
                var.var_type.as_str(),
                var.name
            ))
        };
        Ok(match var.var_type {
            VariableType::Double => Self::F64(values.into_iter().map(|v| v as f64).collect()),
            VariableType::Float => Self::F32(values.into_iter().map(|v| v as f32).collect()),
            VariableType::Int => Self::I32(
                values
                    .into_iter()
                    .map(|v| i32::try_from(v).map_err(|_| overflow(v)))
                    .collect::<Result<_>>()?,
            ),
            VariableType::Int64 => Self::I64(
                values
                    .into_iter()
                    .map(|v| i64::try_from(v).map_err(|_| overflow(v)))
                    .collect::<Result<_>>()?,
            ),
            VariableType::UInt64 => Self::U64(values),
        })
    }

    fn len(&self) -> usize {
        match self {
            Self::F64(v) => v.len(),
            Self::F32(v) => v.len(),
            Self::I32(v) => v.len(),
            Self::I64(v) => v.len(),
            Self::U64(v) => v.len(),
        }
    }

    fn byte_len(&self) -> u64 {
        let width = match self {
            Self::F64(_) | Self::I64(_) | Self::U64(_) => 8,
            Self::F32(_) | Self::I32(_) => 4,
        };
        (self.len() * width) as u64
    }

    fn store(&self, array: &Array<FilesystemStore>, subset: &ArraySubset) -> Result<()> {
        let result = match self {
            Self::F64(v) => array.store_array_subset_elements(subset, v.as_slice()),
            Self::F32(v) => array.store_array_subset_elements(subset, v.as_slice()),
            Self::I32(v) => array.store_array_subset_elements(subset, v.as_slice()),
            Self::I64(v) => array.store_array_subset_elements(subset, v.as_slice()),
            Self::U64(v) => array.store_array_subset_elements(subset, v.as_slice()),
        };
        result.map_err(|e| ExportError::zarr(e.to_string()))
    }
}

fn zarr_type(var_type: VariableType) -> (DataType, FillValue) {
    match var_type {
        VariableType::Double => (DataType::Float64, FillValue::from(f64::NAN)),
        VariableType::Float => (DataType::Float32, FillValue::from(f32::NAN)),
        VariableType::Int => (DataType::Int32, FillValue::from(-1i32)),
        VariableType::Int64 => (DataType::Int64, FillValue::from(-1i64)),
        VariableType::UInt64 => (DataType::UInt64, FillValue::from(0u64)),
    }
}

/// Chunk shape: one slice per leading index, trailing two dimensions whole.
fn chunk_shape(shape: &[u64]) -> Vec<u64> {
    let lead = shape.len().saturating_sub(2);
    shape
        .iter()
        .enumerate()
        .map(|(i, &n)| if i < lead { 1 } else { n.max(1) })
        .collect()
}

/// Writes a [`ResolvedSchema`] and the mesh data it references.
pub struct ZarrMeshWriter {
    path: PathBuf,
    schema: ResolvedSchema,
    arrays: Vec<(usize, Array<FilesystemStore>)>,
}

impl ZarrMeshWriter {
    /// Create the store at `path`: root group, metadata groups and empty
    /// arrays for every data-backed variable.
    pub fn create(path: &Path, schema: ResolvedSchema) -> Result<Self> {
        fs::create_dir_all(path).map_err(|source| ExportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let store = Arc::new(
            FilesystemStore::new(path).map_err(|e| ExportError::zarr(e.to_string()))?,
        );

        let mut root_attrs = schema.attributes.clone();
        let dims: Map<String, Value> = schema
            .dimensions
            .iter()
            .map(|(name, value)| (name.clone(), json!(value)))
            .collect();
        root_attrs.insert("dimensions".to_string(), Value::Object(dims));
        root_attrs.insert("date_created".to_string(), json!(Utc::now().to_rfc3339()));

        GroupBuilder::new()
            .attributes(root_attrs)
            .build(store.clone(), "/")
            .map_err(|e| ExportError::zarr(e.to_string()))?
            .store_metadata()
            .map_err(|e| ExportError::zarr(e.to_string()))?;

        let mut arrays = Vec::new();
        for (index, var) in schema.variables.iter().enumerate() {
            let node_path = format!("/{}", var.name);
            let mut attrs = var.attributes.clone();
            attrs.insert(DIMENSIONS_ATTRIBUTE.to_string(), json!(var.dimensions));

            if var.source.is_none() {
                attrs.insert("type".to_string(), json!(var.var_type.as_str()));
                GroupBuilder::new()
                    .attributes(attrs)
                    .build(store.clone(), &node_path)
                    .map_err(|e| ExportError::zarr(e.to_string()))?
                    .store_metadata()
                    .map_err(|e| ExportError::zarr(e.to_string()))?;
                debug!(variable = %var.name, "Wrote metadata variable");
                continue;
            }

            let (data_type, fill_value) = zarr_type(var.var_type);
            let chunk_grid: zarrs::array::ChunkGrid = chunk_shape(&var.shape)
                .try_into()
                .map_err(|e| ExportError::zarr(format!("{:?}", e)))?;

            let array = ArrayBuilder::new(var.shape.clone(), data_type, chunk_grid, fill_value)
                .attributes(attrs)
                .build(store.clone(), &node_path)
                .map_err(|e| ExportError::zarr(e.to_string()))?;
            array
                .store_metadata()
                .map_err(|e| ExportError::zarr(e.to_string()))?;

            debug!(variable = %var.name, shape = ?var.shape, "Created array");
            arrays.push((index, array));
        }

        info!(
            path = %path.display(),
            dimensions = schema.dimensions.len(),
            variables = schema.variables.len(),
            "Created Zarr mesh store"
        );

        Ok(Self {
            path: path.to_path_buf(),
            schema,
            arrays,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn schema(&self) -> &ResolvedSchema {
        &self.schema
    }

    fn variables(&self) -> impl Iterator<Item = (&ResolvedVariable, &Array<FilesystemStore>)> {
        self.arrays
            .iter()
            .map(move |(index, array)| (&self.schema.variables[*index], array))
    }

    /// Write node, face and timestep variables. Returns bytes written.
    pub fn write_static(
        &self,
        mesh: &MeshStore,
        table: &VariableTable,
        timesteps: &[u64],
    ) -> Result<u64> {
        let mut bytes = 0;
        for (var, array) in self.variables() {
            let data = match &var.source {
                Some(DataSource::Node(name)) => {
                    ArrayData::from_floats(var, mesh.values(table.slot(name)?)?)?
                }
                Some(DataSource::Faces) => ArrayData::from_indices(
                    var,
                    mesh.face_indices().into_iter().map(|i| i as u64).collect(),
                )?,
                Some(DataSource::Timesteps) => ArrayData::from_indices(var, timesteps.to_vec())?,
                Some(DataSource::Field(_)) | None => continue,
            };
            bytes += write_whole(var, array, &data)?;
        }
        Ok(bytes)
    }

    /// Write every variable fed by `root` at timestep position `index`.
    /// Returns bytes written.
    pub fn write_field(
        &self,
        index: usize,
        root: &str,
        mesh: &MeshStore,
        table: &VariableTable,
    ) -> Result<u64> {
        let mut bytes = 0;
        for (var, array) in self.variables() {
            if !matches!(&var.source, Some(DataSource::Field(r)) if r == root) {
                continue;
            }

            let steps = var.shape.first().copied().unwrap_or(0);
            if index as u64 >= steps {
                return Err(MeshError::IndexOutOfRange {
                    what: "timestep",
                    index,
                    len: steps as usize,
                }
                .into());
            }

            let data = ArrayData::from_floats(var, mesh.values(table.slot(root)?)?)?;
            let per_step: u64 = var.shape[1..].iter().product();
            if data.len() as u64 != per_step {
                return Err(MeshError::consistency(
                    format!("values of field variable {}", var.name),
                    per_step as usize,
                    data.len(),
                )
                .into());
            }

            let mut start = vec![0u64; var.shape.len()];
            start[0] = index as u64;
            let mut shape = var.shape.clone();
            shape[0] = 1;
            let subset = ArraySubset::new_with_start_shape(start, shape)
                .map_err(|e| ExportError::zarr(e.to_string()))?;

            data.store(array, &subset)?;
            bytes += data.byte_len();
            debug!(variable = %var.name, timestep_index = index, "Wrote field slice");
        }
        Ok(bytes)
    }
}

fn write_whole(
    var: &ResolvedVariable,
    array: &Array<FilesystemStore>,
    data: &ArrayData,
) -> Result<u64> {
    if data.len() as u64 != var.element_count() {
        return Err(MeshError::consistency(
            format!("values of variable {}", var.name),
            var.element_count() as usize,
            data.len(),
        )
        .into());
    }

    let subset = ArraySubset::new_with_start_shape(vec![0; var.shape.len()], var.shape.clone())
        .map_err(|e| ExportError::zarr(e.to_string()))?;
    data.store(array, &subset)?;

    debug!(variable = %var.name, values = data.len(), "Wrote array");
    Ok(data.byte_len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_shape() {
        assert_eq!(chunk_shape(&[5, 3, 8]), vec![1, 3, 8]);
        assert_eq!(chunk_shape(&[2, 4]), vec![2, 4]);
        assert_eq!(chunk_shape(&[7]), vec![7]);
        assert_eq!(chunk_shape(&[0, 4]), vec![1, 4]);
    }

    fn variable(var_type: VariableType, source: DataSource) -> ResolvedVariable {
        ResolvedVariable {
            name: "v".to_string(),
            var_type,
            dimensions: vec![],
            shape: vec![2],
            attributes: Map::new(),
            source: Some(source),
        }
    }

    #[test]
    fn test_index_conversion_checks_range() {
        let var = variable(VariableType::Int, DataSource::Faces);
        assert_eq!(
            ArrayData::from_indices(&var, vec![1, 2]).unwrap(),
            ArrayData::I32(vec![1, 2])
        );
        assert!(ArrayData::from_indices(&var, vec![u64::MAX]).is_err());
    }

    #[test]
    fn test_float_conversion() {
        let var = variable(VariableType::Float, DataSource::Node("x".to_string()));
        let data = ArrayData::from_floats(&var, vec![1.5, 2.5]).unwrap();
        assert_eq!(data, ArrayData::F32(vec![1.5, 2.5]));
        assert_eq!(data.byte_len(), 8);
    }

    #[test]
    fn test_float_to_integer_truncates() {
        let var = variable(VariableType::Int, DataSource::Node("x".to_string()));
        assert_eq!(
            ArrayData::from_floats(&var, vec![2.9, -3.7]).unwrap(),
            ArrayData::I32(vec![2, -3])
        );

        let var = variable(VariableType::UInt64, DataSource::Node("x".to_string()));
        assert_eq!(
            ArrayData::from_floats(&var, vec![0.0, 7.0]).unwrap(),
            ArrayData::U64(vec![0, 7])
        );
    }

    #[test]
    fn test_float_to_integer_rejects_unrepresentable() {
        let int = variable(VariableType::Int, DataSource::Node("x".to_string()));
        assert!(ArrayData::from_floats(&int, vec![1.0, f64::NAN]).is_err());
        assert!(ArrayData::from_floats(&int, vec![f64::INFINITY]).is_err());
        assert!(ArrayData::from_floats(&int, vec![3.0e9]).is_err());

        let int64 = variable(VariableType::Int64, DataSource::Node("x".to_string()));
        assert!(ArrayData::from_floats(&int64, vec![1.0e19]).is_err());

        let uint64 = variable(VariableType::UInt64, DataSource::Node("x".to_string()));
        let err = ArrayData::from_floats(&uint64, vec![-1.0]).unwrap_err();
        assert!(err.to_string().contains("does not fit type uint64"));
    }
}

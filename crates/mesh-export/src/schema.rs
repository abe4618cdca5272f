//! Output schema: dimensions, variables and global attributes.
//!
//! ```json
//! {
//!   "attributes": { "Conventions": "UGRID-1.0" },
//!   "dimensions": [
//!     { "name": "nNodesPer2DLayer", "value": 0 },
//!     { "name": "nMaxFaceNodes", "value": 4 }
//!   ],
//!   "variables": [
//!     { "name": "mesh_node_lon", "type": "double",
//!       "dimensions": ["n2DLayers", "nNodesPer2DLayer"],
//!       "attributes": { "units": "degrees_east" },
//!       "source": { "node": "lon" } },
//!     { "name": "mesh_face_nodes", "type": "int",
//!       "dimensions": ["nFacesPer2DLayer", "nMaxFaceNodes"], "source": "faces" }
//!   ]
//! }
//! ```
//!
//! A dimension declared with value 0 is filled from the runtime sizes
//! (see [`runtime_dimensions`]).

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use geoflow_mesh::{dim_names, variables, CoordinateMode, MeshDimensions};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{ExportError, Result};

/// Element type of an output variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableType {
    Double,
    Float,
    Int,
    Int64,
    UInt64,
}

impl VariableType {
    /// Parse a schema type name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "double" => Some(Self::Double),
            "float" => Some(Self::Float),
            "int" => Some(Self::Int),
            "int64" => Some(Self::Int64),
            "uint64" => Some(Self::UInt64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Double => "double",
            Self::Float => "float",
            Self::Int => "int",
            Self::Int64 => "int64",
            Self::UInt64 => "uint64",
        }
    }
}

/// Where a variable's data comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    /// A node slot, shaped `[n2DLayers, nNodesPer2DLayer]`.
    Node(String),
    /// A field root, one leading timestep index per write.
    Field(String),
    /// The first layer's face table, `[nFacesPer2DLayer, 4]`.
    Faces,
    /// The timestep numbers being exported.
    Timesteps,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionSpec {
    pub name: String,
    #[serde(default)]
    pub value: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub dimensions: Vec<String>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    /// `None` declares a metadata-only variable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<DataSource>,
}

/// Schema as loaded from JSON, before runtime dimensions are filled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default)]
    pub attributes: Map<String, Value>,
    pub dimensions: Vec<DimensionSpec>,
    pub variables: Vec<VariableSpec>,
}

/// A variable with its type parsed and its shape known.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedVariable {
    pub name: String,
    pub var_type: VariableType,
    pub dimensions: Vec<String>,
    pub shape: Vec<u64>,
    pub attributes: Map<String, Value>,
    pub source: Option<DataSource>,
}

impl ResolvedVariable {
    pub fn element_count(&self) -> u64 {
        self.shape.iter().product()
    }
}

/// Schema with every dimension sized.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSchema {
    pub attributes: Map<String, Value>,
    /// Declaration order is kept.
    pub dimensions: Vec<(String, usize)>,
    pub variables: Vec<ResolvedVariable>,
}

impl ResolvedSchema {
    /// Field roots referenced by any variable.
    pub fn field_roots(&self) -> Vec<&str> {
        let mut roots: Vec<&str> = Vec::new();
        for v in &self.variables {
            if let Some(DataSource::Field(root)) = &v.source {
                if !roots.contains(&root.as_str()) {
                    roots.push(root);
                }
            }
        }
        roots
    }

    /// Node slots referenced by any variable.
    pub fn node_variables(&self) -> Vec<&str> {
        self.variables
            .iter()
            .filter_map(|v| match &v.source {
                Some(DataSource::Node(name)) => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Runtime dimension sizes keyed by the names in [`dim_names`].
pub fn runtime_dimensions(dims: &MeshDimensions, timesteps: usize) -> BTreeMap<String, usize> {
    let mut map: BTreeMap<String, usize> = dims
        .entries()
        .iter()
        .map(|&(name, value)| (name.to_string(), value))
        .collect();
    map.insert(dim_names::TIMESTEPS.to_string(), timesteps);
    map
}

impl Schema {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| ExportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// UGRID-style layout used when a job names no schema file: node
    /// coordinates, face connectivity, timesteps and one variable per field
    /// root, every dimension sized at runtime.
    pub fn ugrid(mode: CoordinateMode, field_roots: &[String]) -> Self {
        let layered = || {
            vec![
                dim_names::N_2D_LAYERS.to_string(),
                dim_names::NODES_PER_2D_LAYER.to_string(),
            ]
        };
        let node_var = |name: &str, slot: &str, attrs: Value| VariableSpec {
            name: name.to_string(),
            type_name: "double".to_string(),
            dimensions: layered(),
            attributes: object(attrs),
            source: Some(DataSource::Node(slot.to_string())),
        };

        let coordinates = match mode {
            CoordinateMode::Spherical => "mesh_node_lon mesh_node_lat",
            CoordinateMode::Box => "mesh_node_x mesh_node_y",
        };

        let mut vars = vec![VariableSpec {
            name: "mesh".to_string(),
            type_name: "int".to_string(),
            dimensions: Vec::new(),
            attributes: object(json!({
                "cf_role": "mesh_topology",
                "topology_dimension": 2,
                "node_coordinates": coordinates,
                "face_node_connectivity": "mesh_face_nodes",
            })),
            source: None,
        }];

        vars.push(node_var("mesh_node_x", variables::X, json!({ "long_name": "x" })));
        vars.push(node_var("mesh_node_y", variables::Y, json!({ "long_name": "y" })));
        vars.push(node_var("mesh_node_z", variables::Z, json!({ "long_name": "z" })));
        if mode == CoordinateMode::Spherical {
            vars.push(node_var(
                "mesh_node_lat",
                variables::LATITUDE,
                json!({ "standard_name": "latitude", "units": "degrees_north" }),
            ));
            vars.push(node_var(
                "mesh_node_lon",
                variables::LONGITUDE,
                json!({ "standard_name": "longitude", "units": "degrees_east" }),
            ));
            vars.push(node_var(
                "mesh_node_radius",
                variables::RADIUS,
                json!({ "long_name": "distance from the sphere center" }),
            ));
        }

        vars.push(VariableSpec {
            name: "mesh_face_nodes".to_string(),
            type_name: "int".to_string(),
            dimensions: vec![
                dim_names::FACES_PER_2D_LAYER.to_string(),
                dim_names::MAX_FACE_NODES.to_string(),
            ],
            attributes: object(json!({
                "cf_role": "face_node_connectivity",
                "start_index": 0,
                "_FillValue": -1,
            })),
            source: Some(DataSource::Faces),
        });
        vars.push(VariableSpec {
            name: "time".to_string(),
            type_name: "uint64".to_string(),
            dimensions: vec![dim_names::TIMESTEPS.to_string()],
            attributes: object(json!({ "long_name": "solver timestep" })),
            source: Some(DataSource::Timesteps),
        });
        for root in field_roots {
            let mut dims = vec![dim_names::TIMESTEPS.to_string()];
            dims.extend(layered());
            vars.push(VariableSpec {
                name: root.clone(),
                type_name: "double".to_string(),
                dimensions: dims,
                attributes: object(json!({ "mesh": "mesh", "location": "node" })),
                source: Some(DataSource::Field(root.clone())),
            });
        }

        let dimensions = [
            dim_names::NODES_PER_2D_LAYER,
            dim_names::FACES_PER_2D_LAYER,
            dim_names::N_2D_LAYERS,
            dim_names::ELEMENT_LAYERS,
            dim_names::MAX_FACE_NODES,
            dim_names::TIMESTEPS,
        ]
        .iter()
        .map(|name| DimensionSpec {
            name: name.to_string(),
            value: 0,
        })
        .collect();

        Self {
            attributes: object(json!({ "Conventions": "UGRID-1.0", "source": "GeoFLOW" })),
            dimensions,
            variables: vars,
        }
    }

    /// Fill every zero-valued dimension from `runtime`. Dimensions declared
    /// with a non-zero value keep it.
    pub fn fill_dimensions(&mut self, runtime: &BTreeMap<String, usize>) {
        for dim in self.dimensions.iter_mut().filter(|d| d.value == 0) {
            if let Some(&value) = runtime.get(&dim.name) {
                dim.value = value;
            }
        }
    }

    /// Fill dimensions, then check every name, type and reference.
    ///
    /// A runtime size of 0 (e.g. no timesteps) is allowed; only a dimension
    /// that neither the schema nor the runtime sizes is an error.
    pub fn resolve(&self, runtime: &BTreeMap<String, usize>) -> Result<ResolvedSchema> {
        let mut filled = self.clone();
        filled.fill_dimensions(runtime);

        let mut dimensions = Vec::with_capacity(filled.dimensions.len());
        let mut sizes = BTreeMap::new();
        for dim in &filled.dimensions {
            if dim.value == 0 && !runtime.contains_key(&dim.name) {
                return Err(ExportError::UnresolvedDimension(dim.name.clone()));
            }
            let value = dim.value;
            if sizes.insert(dim.name.clone(), value).is_some() {
                return Err(ExportError::schema(format!(
                    "dimension {} declared twice",
                    dim.name
                )));
            }
            dimensions.push((dim.name.clone(), value));
        }

        let mut seen = HashSet::new();
        let mut variables = Vec::with_capacity(self.variables.len());
        for var in &self.variables {
            if !seen.insert(var.name.as_str()) {
                return Err(ExportError::schema(format!(
                    "variable {} declared twice",
                    var.name
                )));
            }

            let var_type =
                VariableType::from_name(&var.type_name).ok_or_else(|| ExportError::UnsupportedType {
                    variable: var.name.clone(),
                    type_name: var.type_name.clone(),
                })?;

            let shape = var
                .dimensions
                .iter()
                .map(|d| {
                    sizes.get(d).map(|&v| v as u64).ok_or_else(|| {
                        ExportError::schema(format!(
                            "variable {} uses undeclared dimension {}",
                            var.name, d
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            if matches!(var.source, Some(DataSource::Field(_)))
                && var.dimensions.first().map(String::as_str) != Some(dim_names::TIMESTEPS)
            {
                return Err(ExportError::schema(format!(
                    "field variable {} must have {} as its first dimension",
                    var.name,
                    dim_names::TIMESTEPS
                )));
            }
            if var.source.is_some() && shape.is_empty() {
                return Err(ExportError::schema(format!(
                    "variable {} has data but no dimensions",
                    var.name
                )));
            }

            variables.push(ResolvedVariable {
                name: var.name.clone(),
                var_type,
                dimensions: var.dimensions.clone(),
                shape,
                attributes: var.attributes.clone(),
                source: var.source.clone(),
            });
        }

        Ok(ResolvedSchema {
            attributes: self.attributes.clone(),
            dimensions,
            variables,
        })
    }
}

//! Job configuration for a conversion run.
//!
//! Loaded from a JSON file. Relative paths resolve against the directory
//! containing that file.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use geoflow_mesh::{CoordinateMode, ElementLayerMode, ReadScope};
use serde::{Deserialize, Serialize};

/// Names of the three coordinate files inside `input_dir`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridFiles {
    pub x: PathBuf,
    pub y: PathBuf,
    pub z: PathBuf,
}

impl Default for GridFiles {
    fn default() -> Self {
        Self {
            x: PathBuf::from("xgrid.000000.out"),
            y: PathBuf::from("ygrid.000000.out"),
            z: PathBuf::from("zgrid.000000.out"),
        }
    }
}

/// Explicit timestep range: `start, start + stride, ...`, `count` entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestepSelection {
    #[serde(default)]
    pub start: u64,
    pub count: usize,
    #[serde(default = "default_stride")]
    pub stride: u64,
}

fn default_stride() -> u64 {
    1
}

impl TimestepSelection {
    pub fn timesteps(&self) -> Vec<u64> {
        (0..self.count as u64)
            .map(|i| self.start + i * self.stride)
            .collect()
    }
}

/// What to do when a field file for some timestep does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingFilePolicy {
    /// Log a warning and leave that slice unwritten.
    #[default]
    Skip,
    /// Abort the job.
    Fail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConverterConfig {
    pub input_dir: PathBuf,
    pub output_path: PathBuf,

    #[serde(default)]
    pub grid_files: GridFiles,

    #[serde(default)]
    pub field_roots: Vec<String>,

    /// `None` discovers timesteps from the files in `input_dir`.
    #[serde(default)]
    pub timesteps: Option<TimestepSelection>,

    #[serde(default)]
    pub coordinates: CoordinateMode,

    #[serde(default = "default_element_layers")]
    pub element_layers: usize,

    #[serde(default)]
    pub element_layer_mode: ElementLayerMode,

    #[serde(default)]
    pub read_scope: ReadScope,

    #[serde(default)]
    pub missing_field_files: MissingFilePolicy,

    /// Output schema; the built-in UGRID layout when absent.
    #[serde(default)]
    pub schema: Option<PathBuf>,

    /// Replace an existing output store.
    #[serde(default)]
    pub overwrite: bool,
}

fn default_element_layers() -> usize {
    1
}

impl ConverterConfig {
    /// Load, resolve relative paths and validate.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;
        let mut config: Self = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config from {:?}", path))?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.resolve(base);
        config.validate()?;
        Ok(config)
    }

    /// Make `input_dir`, `output_path` and `schema` absolute against `base`.
    /// Grid file names are joined onto `input_dir`.
    pub fn resolve(&mut self, base: &Path) {
        let join = |p: &Path| {
            if p.is_absolute() {
                p.to_path_buf()
            } else {
                base.join(p)
            }
        };
        self.input_dir = join(&self.input_dir);
        self.output_path = join(&self.output_path);
        self.schema = self.schema.as_deref().map(join);
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.input_dir.is_dir(),
            "Input directory {:?} does not exist",
            self.input_dir
        );
        anyhow::ensure!(
            self.element_layers >= 1,
            "element_layers must be at least 1"
        );

        let mut seen = HashSet::new();
        for root in &self.field_roots {
            anyhow::ensure!(!root.is_empty(), "Field root names cannot be empty");
            anyhow::ensure!(seen.insert(root), "Field root {} listed twice", root);
        }

        if let Some(sel) = &self.timesteps {
            anyhow::ensure!(sel.count > 0, "timesteps.count must be greater than 0");
            anyhow::ensure!(sel.stride > 0, "timesteps.stride must be greater than 0");
        }

        if self.read_scope == ReadScope::Layer {
            anyhow::ensure!(
                self.element_layer_mode == ElementLayerMode::Sequential,
                "read_scope \"layer\" requires element_layer_mode \"sequential\""
            );
        }

        Ok(())
    }

    pub fn grid_paths(&self) -> [PathBuf; 3] {
        [
            self.input_dir.join(&self.grid_files.x),
            self.input_dir.join(&self.grid_files.y),
            self.input_dir.join(&self.grid_files.z),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("job.json");
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_defaults_and_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("data")).unwrap();
        let path = write_config(
            dir.path(),
            r#"{ "input_dir": "data", "output_path": "out/mesh.zarr", "field_roots": ["T"] }"#,
        );

        let config = ConverterConfig::from_file(&path).unwrap();

        assert_eq!(config.input_dir, dir.path().join("data"));
        assert_eq!(config.output_path, dir.path().join("out/mesh.zarr"));
        assert_eq!(config.coordinates, CoordinateMode::Spherical);
        assert_eq!(config.element_layers, 1);
        assert_eq!(config.missing_field_files, MissingFilePolicy::Skip);
        assert_eq!(config.timesteps, None);
        assert_eq!(
            config.grid_paths()[0],
            dir.path().join("data").join("xgrid.000000.out")
        );
    }

    #[test]
    fn test_full_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            r#"{
                "input_dir": ".",
                "output_path": "/tmp/out.zarr",
                "grid_files": { "x": "x.out", "y": "y.out", "z": "z.out" },
                "timesteps": { "start": 10, "count": 3, "stride": 5 },
                "coordinates": "box",
                "element_layers": 4,
                "element_layer_mode": "radial",
                "missing_field_files": "fail",
                "schema": "schema.json"
            }"#,
        );

        let config = ConverterConfig::from_file(&path).unwrap();

        assert_eq!(config.output_path, PathBuf::from("/tmp/out.zarr"));
        assert_eq!(config.schema, Some(dir.path().join("schema.json")));
        assert_eq!(config.coordinates, CoordinateMode::Box);
        assert_eq!(config.element_layer_mode, ElementLayerMode::Radial);
        assert_eq!(config.missing_field_files, MissingFilePolicy::Fail);
        assert_eq!(config.timesteps.unwrap().timesteps(), vec![10, 15, 20]);
    }

    #[test]
    fn test_rejects_duplicate_roots() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            r#"{ "input_dir": ".", "output_path": "o", "field_roots": ["T", "T"] }"#,
        );
        let err = ConverterConfig::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("listed twice"));
    }

    #[test]
    fn test_rejects_empty_root() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            r#"{ "input_dir": ".", "output_path": "o", "field_roots": [""] }"#,
        );
        assert!(ConverterConfig::from_file(&path).is_err());
    }

    #[test]
    fn test_rejects_zero_layers_and_stride() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            r#"{ "input_dir": ".", "output_path": "o", "element_layers": 0 }"#,
        );
        assert!(ConverterConfig::from_file(&path).is_err());

        let path = write_config(
            dir.path(),
            r#"{ "input_dir": ".", "output_path": "o",
                 "timesteps": { "count": 2, "stride": 0 } }"#,
        );
        assert!(ConverterConfig::from_file(&path).is_err());
    }

    #[test]
    fn test_rejects_missing_input_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            r#"{ "input_dir": "nope", "output_path": "o" }"#,
        );
        let err = ConverterConfig::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_unknown_enum_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            r#"{ "input_dir": ".", "output_path": "o", "coordinates": "cylindrical" }"#,
        );
        let err = ConverterConfig::from_file(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse config"));
    }
}

//! End-to-end conversion: grid files to a layered mesh, then fields per
//! timestep into the output store.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use geoflow_mesh::{
    apply_coordinate_transform, discover_timesteps, element_layer_ids, FaceBuilder,
    FieldFileName, GridFileReader, MeshDimensions, MeshReorganizer, MeshStore, RawSample,
    VariableTable,
};
use mesh_export::{runtime_dimensions, Schema, ZarrMeshWriter};
use tracing::{debug, info, warn};

use crate::config::{ConverterConfig, MissingFilePolicy};

/// Outcome of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionSummary {
    pub dimensions: MeshDimensions,
    pub nodes: usize,
    pub faces: usize,
    pub timesteps: Vec<u64>,
    pub fields_read: usize,
    pub fields_skipped: usize,
    pub bytes_written: u64,
    /// `None` on a dry run.
    pub output: Option<PathBuf>,
    pub elapsed_ms: u64,
}

pub struct Converter {
    config: ConverterConfig,
}

impl Converter {
    pub fn new(config: ConverterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    /// Run every stage. With `dry_run`, the mesh is built and every field
    /// file is read but nothing is written.
    pub fn run(&self, dry_run: bool) -> Result<ConversionSummary> {
        let start = Instant::now();
        let cfg = &self.config;
        let reader = GridFileReader::<f64>::new(cfg.element_layers).with_scope(cfg.read_scope);

        let table = VariableTable::for_job(cfg.coordinates, &cfg.field_roots)
            .context("Failed to build variable table")?;
        let mut mesh = self.build_mesh(&reader, &table)?;
        let dims = mesh.dimensions();
        info!(
            nodes_per_2d_layer = dims.nodes_per_2d_layer,
            faces_per_2d_layer = dims.faces_per_2d_layer,
            n_2d_layers = dims.n_2d_layers,
            element_layers = dims.element_layers,
            "Derived mesh dimensions"
        );

        let timesteps = self.timesteps()?;

        let writer = if dry_run {
            info!("Dry run, no output will be written");
            None
        } else {
            Some(self.create_writer(&dims, timesteps.len())?)
        };

        let mut bytes_written = 0;
        if let Some(w) = &writer {
            bytes_written += w
                .write_static(&mesh, &table, &timesteps)
                .context("Failed to write mesh variables")?;
        }

        let stage = Instant::now();
        let mut fields_read = 0;
        let mut fields_skipped = 0;
        for (index, &t) in timesteps.iter().enumerate() {
            for root in &cfg.field_roots {
                let path = cfg
                    .input_dir
                    .join(FieldFileName::new(root.as_str(), t).to_string());

                if !path.is_file() {
                    match cfg.missing_field_files {
                        MissingFilePolicy::Skip => {
                            warn!(file = %path.display(), timestep = t, "Field file missing, skipping");
                            fields_skipped += 1;
                            continue;
                        }
                        MissingFilePolicy::Fail => {
                            anyhow::bail!("Field file {} is missing", path.display())
                        }
                    }
                }

                let sample = reader
                    .read(&path)
                    .with_context(|| format!("Failed to read field file {}", path.display()))?;
                mesh.read_field_by_name(&sample, root, &table)
                    .with_context(|| format!("Failed to load field {} at timestep {}", root, t))?;
                fields_read += 1;

                if let Some(w) = &writer {
                    bytes_written += w
                        .write_field(index, root, &mesh, &table)
                        .with_context(|| {
                            format!("Failed to write field {} at timestep {}", root, t)
                        })?;
                }
                debug!(root = %root, timestep = t, "Converted field");
            }
        }
        info!(
            timesteps = timesteps.len(),
            fields_read,
            fields_skipped,
            elapsed_ms = stage.elapsed().as_millis() as u64,
            "Converted field files"
        );

        let summary = ConversionSummary {
            dimensions: dims,
            nodes: mesh.len(),
            faces: mesh.faces().len(),
            timesteps,
            fields_read,
            fields_skipped,
            bytes_written,
            output: writer.map(|w| w.path().to_path_buf()),
            elapsed_ms: start.elapsed().as_millis() as u64,
        };
        Ok(summary)
    }

    /// Read the grid, transform, reorganize and build faces.
    fn build_mesh(&self, reader: &GridFileReader<f64>, table: &VariableTable) -> Result<MeshStore> {
        let cfg = &self.config;

        let stage = Instant::now();
        let [x, y, z] = cfg.grid_paths().map(|p| read_grid_file(reader, p));
        let (x, y, z) = (x?, y?, z?);
        info!(
            nodes = x.len(),
            elements = x.header.element_count,
            elapsed_ms = stage.elapsed().as_millis() as u64,
            "Read grid files"
        );

        let stage = Instant::now();
        let ids = element_layer_ids(&x, &y, &z, cfg.element_layer_mode, cfg.coordinates)
            .context("Failed to assign element layers")?;
        let mut mesh = MeshStore::from_grid_with_layers(&x, &y, &z, &ids, table)
            .context("Failed to build mesh nodes")?;
        apply_coordinate_transform(&mut mesh, table, cfg.coordinates)
            .context("Failed to compute node coordinates")?;
        info!(
            nodes = mesh.len(),
            coordinates = ?cfg.coordinates,
            elapsed_ms = stage.elapsed().as_millis() as u64,
            "Built mesh nodes"
        );

        MeshReorganizer::new(&x.geometry)
            .reorganize(&mut mesh)
            .context("Failed to reorganize nodes into layers")?;

        let stage = Instant::now();
        let faces = FaceBuilder::new(&x.geometry)
            .build(&mut mesh)
            .context("Failed to build faces")?;
        info!(
            faces,
            elapsed_ms = stage.elapsed().as_millis() as u64,
            "Built layer faces"
        );

        Ok(mesh)
    }

    fn timesteps(&self) -> Result<Vec<u64>> {
        let cfg = &self.config;
        let timesteps = match &cfg.timesteps {
            Some(sel) => sel.timesteps(),
            None => discover_timesteps(&cfg.input_dir, &cfg.field_roots).with_context(|| {
                format!("Failed to discover timesteps in {}", cfg.input_dir.display())
            })?,
        };
        info!(
            count = timesteps.len(),
            first = timesteps.first().copied(),
            last = timesteps.last().copied(),
            "Selected timesteps"
        );
        Ok(timesteps)
    }

    fn create_writer(&self, dims: &MeshDimensions, timesteps: usize) -> Result<ZarrMeshWriter> {
        let cfg = &self.config;

        let schema = match &cfg.schema {
            Some(path) => Schema::from_file(path)
                .with_context(|| format!("Failed to load schema {}", path.display()))?,
            None => Schema::ugrid(cfg.coordinates, &cfg.field_roots),
        };
        let resolved = schema
            .resolve(&runtime_dimensions(dims, timesteps))
            .context("Failed to resolve output schema")?;

        for root in resolved.field_roots() {
            anyhow::ensure!(
                cfg.field_roots.iter().any(|r| r == root),
                "Schema references field {} which is not in field_roots",
                root
            );
        }

        if cfg.output_path.exists() {
            anyhow::ensure!(
                cfg.overwrite,
                "Output {} already exists (set \"overwrite\": true to replace it)",
                cfg.output_path.display()
            );
            fs::remove_dir_all(&cfg.output_path).with_context(|| {
                format!("Failed to remove existing output {}", cfg.output_path.display())
            })?;
        }

        ZarrMeshWriter::create(&cfg.output_path, resolved)
            .with_context(|| format!("Failed to create output {}", cfg.output_path.display()))
    }
}

fn read_grid_file(reader: &GridFileReader<f64>, path: PathBuf) -> Result<RawSample<f64>> {
    reader
        .read(&path)
        .with_context(|| format!("Failed to read grid file {}", path.display()))
}

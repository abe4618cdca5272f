//! Temporary on-disk datasets.

use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::generators::{field_values, DatasetSpec};

/// Grid file names the solver writes for timestep 0.
pub const X_GRID: &str = "xgrid.000000.out";
pub const Y_GRID: &str = "ygrid.000000.out";
pub const Z_GRID: &str = "zgrid.000000.out";

/// A temp directory holding x/y/z grid files plus any field files written
/// into it. Removed on drop.
pub struct TempDataset {
    dir: TempDir,
    spec: DatasetSpec,
}

impl TempDataset {
    /// Write the three coordinate files for `spec`.
    pub fn new(spec: DatasetSpec) -> io::Result<Self> {
        let dir = tempfile::tempdir()?;
        let [x, y, z] = spec.coordinates();
        spec.grid_file(x).write(&dir.path().join(X_GRID))?;
        spec.grid_file(y).write(&dir.path().join(Y_GRID))?;
        spec.grid_file(z).write(&dir.path().join(Z_GRID))?;
        Ok(Self { dir, spec })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn spec(&self) -> &DatasetSpec {
        &self.spec
    }

    pub fn grid_paths(&self) -> [PathBuf; 3] {
        [
            self.dir.path().join(X_GRID),
            self.dir.path().join(Y_GRID),
            self.dir.path().join(Z_GRID),
        ]
    }

    /// Write `root.NNNNNN.out` with explicit values.
    pub fn write_field(&self, root: &str, timestep: u64, values: Vec<f64>) -> io::Result<PathBuf> {
        let path = self.dir.path().join(format!("{}.{:06}.out", root, timestep));
        self.spec.grid_file(values).write(&path)?;
        Ok(path)
    }

    /// Write every root at every timestep with [`field_values`] content.
    pub fn write_fields(&self, roots: &[&str], timesteps: &[u64]) -> io::Result<()> {
        for root in roots {
            for &t in timesteps {
                self.write_field(root, t, field_values(self.spec.node_count(), t))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_files_exist() {
        let ds = TempDataset::new(DatasetSpec::default()).unwrap();
        ds.write_fields(&["T"], &[0, 10]).unwrap();

        for p in ds.grid_paths() {
            assert!(p.is_file());
        }
        assert!(ds.path().join("T.000010.out").is_file());
    }

    #[test]
    fn test_dataset_removed_on_drop() {
        let ds = TempDataset::new(DatasetSpec::default()).unwrap();
        let path = ds.path().to_path_buf();
        drop(ds);
        assert!(!path.exists());
    }
}

//! Name to slot table shared by every node of one conversion job.

use std::collections::HashMap;

use crate::error::{MeshError, Result};
use crate::transform::CoordinateMode;

/// Reserved slot names.
pub const X: &str = "x";
pub const Y: &str = "y";
pub const Z: &str = "z";
pub const LATITUDE: &str = "lat";
pub const LONGITUDE: &str = "lon";
pub const RADIUS: &str = "radius";

/// Slots 0..3 always hold the cartesian position.
pub const X_SLOT: usize = 0;
pub const Y_SLOT: usize = 1;
pub const Z_SLOT: usize = 2;

/// Ordered variable names with stable indices.
///
/// Built once per job from the grid variables and every field root, then
/// passed by reference to whatever resolves names to slots.
#[derive(Debug, Clone, Default)]
pub struct VariableTable {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl VariableTable {
    /// Build a table from an explicit name list.
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut table = Self::default();
        for name in names {
            table.push(name.into())?;
        }
        Ok(table)
    }

    /// Table for a conversion job: grid slots for `mode`, then field roots.
    pub fn for_job(mode: CoordinateMode, field_roots: &[String]) -> Result<Self> {
        let grid: &[&str] = match mode {
            CoordinateMode::Spherical => &[X, Y, Z, LATITUDE, LONGITUDE, RADIUS],
            CoordinateMode::Box => &[X, Y, Z],
        };
        Self::new(
            grid.iter()
                .map(|s| s.to_string())
                .chain(field_roots.iter().cloned()),
        )
    }

    fn push(&mut self, name: String) -> Result<()> {
        if self.index.contains_key(&name) {
            return Err(MeshError::DuplicateVariable(name));
        }
        self.index.insert(name.clone(), self.names.len());
        self.names.push(name);
        Ok(())
    }

    /// Slot index for `name`.
    pub fn slot(&self, name: &str) -> Result<usize> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| MeshError::UnknownVariable(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Name at `slot`.
    pub fn name(&self, slot: usize) -> Result<&str> {
        self.names
            .get(slot)
            .map(String::as_str)
            .ok_or(MeshError::IndexOutOfRange {
                what: "variable slot",
                index: slot,
                len: self.names.len(),
            })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

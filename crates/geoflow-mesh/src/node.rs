//! Per-node record.

use crate::error::{MeshError, Result};
use crate::variables::{X_SLOT, Y_SLOT, Z_SLOT};

/// One mesh node: a fixed slot array of variable values plus the keys the
/// reorganizer sorts on.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshNode {
    values: Box<[f64]>,
    element_layer_id: usize,
    sort_key: Option<usize>,
    origin: usize,
}

impl MeshNode {
    /// Create a node with `slots` zeroed values.
    ///
    /// `origin` is the node's position in file order; field files read later
    /// are looked up through it.
    pub fn new(slots: usize, element_layer_id: usize, origin: usize) -> Self {
        Self {
            values: vec![0.0; slots].into_boxed_slice(),
            element_layer_id,
            sort_key: None,
            origin,
        }
    }

    pub fn var(&self, slot: usize) -> Result<f64> {
        self.values
            .get(slot)
            .copied()
            .ok_or(MeshError::IndexOutOfRange {
                what: "variable slot",
                index: slot,
                len: self.values.len(),
            })
    }

    pub fn set_var(&mut self, slot: usize, value: f64) -> Result<()> {
        let len = self.values.len();
        let dst = self.values.get_mut(slot).ok_or(MeshError::IndexOutOfRange {
            what: "variable slot",
            index: slot,
            len,
        })?;
        *dst = value;
        Ok(())
    }

    /// Cartesian position from the reserved slots.
    pub fn position(&self) -> Result<[f64; 3]> {
        Ok([self.var(X_SLOT)?, self.var(Y_SLOT)?, self.var(Z_SLOT)?])
    }

    pub fn slot_count(&self) -> usize {
        self.values.len()
    }

    /// Primary sort key.
    pub fn element_layer_id(&self) -> usize {
        self.element_layer_id
    }

    /// Secondary sort key; `None` until layer keys have been assigned.
    pub fn sort_key(&self) -> Option<usize> {
        self.sort_key
    }

    pub fn set_sort_key(&mut self, key: usize) {
        self.sort_key = Some(key);
    }

    pub fn origin(&self) -> usize {
        self.origin
    }
}

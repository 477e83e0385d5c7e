//! Accelerator-side mirror of the particle columns.
//!
//! The mirror keeps its own state table and storage. The owning
//! [`FieldStore`](crate::FieldStore) moves both halves in lock-step, so the
//! two tables only differ if a caller bypasses the store.

use sphve_core::{FieldError, FieldId, FIELD_COUNT};

use crate::column::Column;
use crate::state::FieldStates;

/// Mirror storage for the accelerator execution target.
#[derive(Clone, Debug, PartialEq)]
pub struct DeviceData {
    pub(crate) states: FieldStates,
    pub(crate) columns: Vec<Column>,
}

impl Default for DeviceData {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceData {
    /// Mirror with every field unused.
    pub fn new() -> Self {
        Self {
            states: FieldStates::new(),
            columns: (0..FIELD_COUNT as u8).map(|i| Column::new(FieldId(i))).collect(),
        }
    }

    /// The mirror's state table.
    pub fn states(&self) -> &FieldStates {
        &self.states
    }

    /// Whether `field` holds storage on the mirror.
    pub fn is_allocated(&self, field: FieldId) -> bool {
        self.states.is_allocated(field)
    }

    /// Borrow a mirrored column, which must be allocated.
    pub fn column(&self, field: FieldId) -> Result<&Column, FieldError> {
        if !self.states.is_allocated(field) {
            return Err(FieldError::NotAllocated { field });
        }
        Ok(&self.columns[field.index()])
    }

    /// Mutably borrow a mirrored column, which must be allocated.
    pub fn column_mut(&mut self, field: FieldId) -> Result<&mut Column, FieldError> {
        if !self.states.is_allocated(field) {
            return Err(FieldError::NotAllocated { field });
        }
        Ok(&mut self.columns[field.index()])
    }

    pub(crate) fn resize(&mut self, n: usize) {
        for field in self.states.allocated() {
            self.columns[field.index()].resize(n);
        }
    }

    /// Bytes reserved by mirrored columns.
    pub fn memory_bytes(&self) -> usize {
        self.columns.iter().map(Column::capacity_bytes).sum()
    }
}

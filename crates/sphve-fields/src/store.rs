//! The field registry: column storage guarded by allocation state.
//!
//! [`FieldStore`] owns one [`Column`] per entry of the particle field table
//! and an optional accelerator [`DeviceData`] mirror. Every declaration,
//! acquire and release is validated against both halves before either is
//! touched, so a rejected call leaves the registry exactly as it was.

use smallvec::SmallVec;
use sphve_core::{FieldError, FieldId, FieldSet, FIELD_COUNT};

use crate::column::{Column, ColumnData};
use crate::device::DeviceData;
use crate::state::{check_acquire_all, check_release_all, FieldState, FieldStates};

/// Field list used by registry calls.
pub type FieldList = SmallVec<[FieldId; 16]>;

/// Resolve field names against the particle field table.
pub fn resolve_names(names: &[&str]) -> Result<FieldList, FieldError> {
    names
        .iter()
        .map(|&name| {
            FieldId::from_name(name).ok_or_else(|| FieldError::UnknownField {
                name: name.to_string(),
            })
        })
        .collect()
}

/// Column storage plus allocation state for one particle dataset.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldStore {
    states: FieldStates,
    columns: Vec<Column>,
    device: Option<DeviceData>,
    len: usize,
}

impl Default for FieldStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldStore {
    /// Host-only store with every field unused.
    pub fn new() -> Self {
        Self {
            states: FieldStates::new(),
            columns: (0..FIELD_COUNT as u8).map(|i| Column::new(FieldId(i))).collect(),
            device: None,
            len: 0,
        }
    }

    /// Store with an accelerator mirror.
    pub fn with_device() -> Self {
        Self {
            device: Some(DeviceData::new()),
            ..Self::new()
        }
    }

    /// Number of particles every allocated column holds.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the store holds no particles.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The host state table.
    pub fn states(&self) -> &FieldStates {
        &self.states
    }

    /// The accelerator mirror, if present.
    pub fn device(&self) -> Option<&DeviceData> {
        self.device.as_ref()
    }

    /// Mutable accelerator mirror, if present.
    pub fn device_mut(&mut self) -> Option<&mut DeviceData> {
        self.device.as_mut()
    }

    /// Whether the column at `field` holds storage.
    pub fn is_allocated(&self, field: FieldId) -> bool {
        self.states.is_allocated(field)
    }

    /// Index-based form of [`is_allocated`](Self::is_allocated). Out of
    /// range indices are never allocated.
    pub fn is_allocated_index(&self, index: usize) -> bool {
        FieldId::from_index(index).is_some_and(|f| self.is_allocated(f))
    }

    /// Fields currently holding storage.
    pub fn allocated(&self) -> FieldSet {
        self.states.allocated()
    }

    /// Declare `fields` conserved and allocate them.
    pub fn declare_conserved(&mut self, fields: &[FieldId]) -> Result<(), FieldError> {
        for &field in fields {
            self.states.check_conserved(field)?;
            if let Some(dev) = &self.device {
                dev.states
                    .check_conserved(field)
                    .map_err(|_| FieldError::MirrorDiverged { field })?;
            }
        }
        for &field in fields {
            self.apply(field, FieldState::Conserved);
        }
        Ok(())
    }

    /// Declare `fields` dependent and allocate them.
    pub fn declare_dependent(&mut self, fields: &[FieldId]) -> Result<(), FieldError> {
        self.check_dependent(fields)?;
        for &field in fields {
            self.apply(field, FieldState::Dependent { allocated: true });
        }
        Ok(())
    }

    /// Declare `fields` dependent without allocating them. Fields already
    /// declared dependent keep their current state.
    pub fn declare_released(&mut self, fields: &[FieldId]) -> Result<(), FieldError> {
        self.check_dependent(fields)?;
        for &field in fields {
            if self.states.get(field) == FieldState::Unused {
                self.apply(field, FieldState::Dependent { allocated: false });
            }
        }
        Ok(())
    }

    fn check_dependent(&self, fields: &[FieldId]) -> Result<(), FieldError> {
        for &field in fields {
            self.states.check_dependent(field)?;
            if let Some(dev) = &self.device {
                dev.states
                    .check_dependent(field)
                    .map_err(|_| FieldError::MirrorDiverged { field })?;
            }
        }
        Ok(())
    }

    /// Allocate released dependent fields, sized to the current length.
    pub fn acquire(&mut self, fields: &[FieldId]) -> Result<(), FieldError> {
        check_acquire_all(&self.states, fields)?;
        if let Some(dev) = &self.device {
            check_acquire_all(&dev.states, fields).map_err(|e| diverged(e, fields))?;
        }
        for &field in fields {
            self.apply(field, FieldState::Dependent { allocated: true });
        }
        Ok(())
    }

    /// Free allocated dependent fields.
    pub fn release(&mut self, fields: &[FieldId]) -> Result<(), FieldError> {
        check_release_all(&self.states, fields)?;
        if let Some(dev) = &self.device {
            check_release_all(&dev.states, fields).map_err(|e| diverged(e, fields))?;
        }
        for &field in fields {
            self.apply(field, FieldState::Dependent { allocated: false });
        }
        Ok(())
    }

    fn apply(&mut self, field: FieldId, state: FieldState) {
        let len = self.len;
        let was = self.states.get(field).is_allocated();
        self.states.set(field, state);
        let col = &mut self.columns[field.index()];
        match (was, state.is_allocated()) {
            (false, true) => col.resize(len),
            (true, false) => col.free(),
            _ => {}
        }
        if let Some(dev) = &mut self.device {
            dev.states.set(field, state);
            let col = &mut dev.columns[field.index()];
            match (was, state.is_allocated()) {
                (false, true) => col.resize(len),
                (true, false) => col.free(),
                _ => {}
            }
        }
    }

    /// Resize every allocated column, on both halves, to `n` particles.
    pub fn resize(&mut self, n: usize) {
        self.len = n;
        for field in self.states.allocated() {
            self.columns[field.index()].resize(n);
        }
        if let Some(dev) = &mut self.device {
            dev.resize(n);
        }
    }

    /// Borrow an allocated column.
    pub fn column(&self, field: FieldId) -> Result<&Column, FieldError> {
        if !self.states.is_allocated(field) {
            return Err(FieldError::NotAllocated { field });
        }
        Ok(&self.columns[field.index()])
    }

    /// Mutably borrow an allocated column.
    pub fn column_mut(&mut self, field: FieldId) -> Result<&mut Column, FieldError> {
        if !self.states.is_allocated(field) {
            return Err(FieldError::NotAllocated { field });
        }
        Ok(&mut self.columns[field.index()])
    }

    /// Mutably borrow several distinct allocated columns at once.
    pub fn fields_mut<const N: usize>(
        &mut self,
        fields: [FieldId; N],
    ) -> Result<[&mut Column; N], FieldError> {
        let mut seen = FieldSet::empty();
        for &field in &fields {
            if seen.contains(field) {
                return Err(FieldError::DuplicateBorrow { field });
            }
            if !self.states.is_allocated(field) {
                return Err(FieldError::NotAllocated { field });
            }
            seen.insert(field);
        }
        let first = fields.first().copied().unwrap_or(FieldId::X);
        self.columns
            .get_disjoint_mut(fields.map(FieldId::index))
            .map_err(|_| FieldError::DuplicateBorrow { field: first })
    }

    /// Replace the contents of an allocated column.
    pub fn set_column(&mut self, field: FieldId, data: ColumnData) -> Result<(), FieldError> {
        self.column_mut(field)?.replace(data)
    }

    /// `f64` contents of an allocated column.
    pub fn real(&self, field: FieldId) -> Result<&[f64], FieldError> {
        self.column(field)?.real()
    }

    /// Mutable `f64` contents of an allocated column.
    pub fn real_mut(&mut self, field: FieldId) -> Result<&mut [f64], FieldError> {
        self.column_mut(field)?.real_mut()
    }

    /// `f32` contents of an allocated column.
    pub fn real32(&self, field: FieldId) -> Result<&[f32], FieldError> {
        self.column(field)?.real32()
    }

    /// Mutable `f32` contents of an allocated column.
    pub fn real32_mut(&mut self, field: FieldId) -> Result<&mut [f32], FieldError> {
        self.column_mut(field)?.real32_mut()
    }

    /// Keys of the `keys` column.
    pub fn keys(&self) -> Result<&[u64], FieldError> {
        self.column(FieldId::KEYS)?.keys()
    }

    /// Mutable keys of the `keys` column.
    pub fn keys_mut(&mut self) -> Result<&mut [u64], FieldError> {
        self.column_mut(FieldId::KEYS)?.keys_mut()
    }

    /// Neighbor counts of the `nc` column.
    pub fn counts(&self) -> Result<&[u32], FieldError> {
        self.column(FieldId::NC)?.counts()
    }

    /// Mutable neighbor counts of the `nc` column.
    pub fn counts_mut(&mut self) -> Result<&mut [u32], FieldError> {
        self.column_mut(FieldId::NC)?.counts_mut()
    }

    /// Reorder every allocated host column with `new[i] = old[order[i]]`.
    pub fn permute(&mut self, order: &[usize]) {
        for field in self.states.allocated() {
            self.columns[field.index()].permute(order);
        }
    }

    /// Copy `[first, last)` of `fields` from the host to the mirror.
    pub fn transfer_to_device(
        &mut self,
        first: usize,
        last: usize,
        fields: &[FieldId],
    ) -> Result<(), FieldError> {
        let Some(dev) = &mut self.device else {
            return Ok(());
        };
        for &field in fields {
            check_mirrored(&self.states, dev, field)?;
        }
        for &field in fields {
            dev.columns[field.index()].copy_range_from(&self.columns[field.index()], first, last)?;
        }
        Ok(())
    }

    /// Copy `[first, last)` of `fields` from the mirror back to the host.
    pub fn transfer_to_host(
        &mut self,
        first: usize,
        last: usize,
        fields: &[FieldId],
    ) -> Result<(), FieldError> {
        let Some(dev) = &self.device else {
            return Ok(());
        };
        for &field in fields {
            check_mirrored(&self.states, dev, field)?;
        }
        for &field in fields {
            self.columns[field.index()].copy_range_from(&dev.columns[field.index()], first, last)?;
        }
        Ok(())
    }

    /// Bytes reserved by host columns.
    pub fn memory_bytes(&self) -> usize {
        self.columns.iter().map(Column::capacity_bytes).sum()
    }
}

fn check_mirrored(states: &FieldStates, dev: &DeviceData, field: FieldId) -> Result<(), FieldError> {
    if !states.is_allocated(field) {
        return Err(FieldError::NotAllocated { field });
    }
    if !dev.is_allocated(field) {
        return Err(FieldError::MirrorDiverged { field });
    }
    Ok(())
}

fn diverged(err: FieldError, fields: &[FieldId]) -> FieldError {
    let field = match &err {
        FieldError::NotDependent { field }
        | FieldError::AlreadyAllocated { field }
        | FieldError::NotAllocated { field } => *field,
        _ => fields.first().copied().unwrap_or(FieldId::X),
    };
    FieldError::MirrorDiverged { field }
}

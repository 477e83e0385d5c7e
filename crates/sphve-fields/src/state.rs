//! Per-field registry state.
//!
//! [`FieldStates`] records, for every declared column, whether it is
//! conserved or dependent and whether a dependent column currently holds
//! storage. Columns that were never declared are [`FieldState::Unused`].
//! The table only answers questions and validates transitions; the owning
//! store applies them.

use indexmap::IndexMap;
use sphve_core::{FieldError, FieldId, FieldSet};

/// Lifecycle state of one particle column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldState {
    /// Never declared, holds no storage.
    Unused,
    /// Allocated at setup and valid for the whole run.
    Conserved,
    /// Declared dependent. `allocated` tracks acquire and release.
    Dependent {
        /// Whether the column currently holds storage.
        allocated: bool,
    },
}

impl FieldState {
    /// Whether the column holds valid storage in this state.
    pub fn is_allocated(self) -> bool {
        matches!(self, Self::Conserved | Self::Dependent { allocated: true })
    }

    fn category(self) -> &'static str {
        match self {
            Self::Unused => "unused",
            Self::Conserved => "conserved",
            Self::Dependent { .. } => "dependent",
        }
    }
}

/// Declaration-ordered table of field states.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FieldStates {
    entries: IndexMap<FieldId, FieldState>,
}

impl FieldStates {
    /// Empty table, every field unused.
    pub fn new() -> Self {
        Self::default()
    }

    /// State of `field`.
    pub fn get(&self, field: FieldId) -> FieldState {
        self.entries
            .get(&field)
            .copied()
            .unwrap_or(FieldState::Unused)
    }

    /// Whether `field` currently holds storage.
    pub fn is_allocated(&self, field: FieldId) -> bool {
        self.get(field).is_allocated()
    }

    /// Check that `field` may be declared conserved.
    pub fn check_conserved(&self, field: FieldId) -> Result<(), FieldError> {
        match self.get(field) {
            FieldState::Unused | FieldState::Conserved => Ok(()),
            other => Err(FieldError::CategoryConflict {
                field,
                declared: other.category(),
                requested: "conserved",
            }),
        }
    }

    /// Check that `field` may be declared dependent.
    pub fn check_dependent(&self, field: FieldId) -> Result<(), FieldError> {
        match self.get(field) {
            FieldState::Unused | FieldState::Dependent { .. } => Ok(()),
            other => Err(FieldError::CategoryConflict {
                field,
                declared: other.category(),
                requested: "dependent",
            }),
        }
    }

    /// Check that `field` may be acquired.
    pub fn check_acquire(&self, field: FieldId) -> Result<(), FieldError> {
        match self.get(field) {
            FieldState::Dependent { allocated: false } => Ok(()),
            FieldState::Dependent { allocated: true } => Err(FieldError::AlreadyAllocated { field }),
            _ => Err(FieldError::NotDependent { field }),
        }
    }

    /// Check that `field` may be released.
    pub fn check_release(&self, field: FieldId) -> Result<(), FieldError> {
        match self.get(field) {
            FieldState::Dependent { allocated: true } => Ok(()),
            FieldState::Dependent { allocated: false } => Err(FieldError::NotAllocated { field }),
            _ => Err(FieldError::NotDependent { field }),
        }
    }

    /// Record `state` for `field`.
    pub fn set(&mut self, field: FieldId, state: FieldState) {
        match state {
            FieldState::Unused => {
                self.entries.shift_remove(&field);
            }
            _ => {
                self.entries.insert(field, state);
            }
        }
    }

    /// Fields currently holding storage.
    pub fn allocated(&self) -> FieldSet {
        self.select(|s| s.is_allocated())
    }

    /// Fields declared conserved.
    pub fn conserved(&self) -> FieldSet {
        self.select(|s| s == FieldState::Conserved)
    }

    /// Fields declared dependent, allocated or not.
    pub fn dependent(&self) -> FieldSet {
        self.select(|s| matches!(s, FieldState::Dependent { .. }))
    }

    /// Declared fields in declaration order.
    pub fn declared(&self) -> impl Iterator<Item = (FieldId, FieldState)> + '_ {
        self.entries.iter().map(|(&f, &s)| (f, s))
    }

    fn select(&self, pred: impl Fn(FieldState) -> bool) -> FieldSet {
        self.entries
            .iter()
            .filter(|(_, &s)| pred(s))
            .map(|(&f, _)| f)
            .collect()
    }
}

/// Validate a batch acquire: each field must be acquirable and appear once.
pub fn check_acquire_all(states: &FieldStates, fields: &[FieldId]) -> Result<(), FieldError> {
    let mut seen = FieldSet::empty();
    for &field in fields {
        if seen.contains(field) {
            return Err(FieldError::AlreadyAllocated { field });
        }
        states.check_acquire(field)?;
        seen.insert(field);
    }
    Ok(())
}

/// Validate a batch release: each field must be releasable and appear once.
pub fn check_release_all(states: &FieldStates, fields: &[FieldId]) -> Result<(), FieldError> {
    let mut seen = FieldSet::empty();
    for &field in fields {
        if seen.contains(field) {
            return Err(FieldError::NotAllocated { field });
        }
        states.check_release(field)?;
        seen.insert(field);
    }
    Ok(())
}

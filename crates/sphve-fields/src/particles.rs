//! The particle dataset handed through the step pipeline.

use sphve_core::{FieldError, FieldId, OctreeView};

use crate::attributes::Attributes;
use crate::neighbors::NeighborList;
use crate::output::OutputSelection;
use crate::store::{resolve_names, FieldStore};

/// Columns present for the whole run regardless of the propagator.
pub const ALWAYS_PRESENT: [FieldId; 6] = [
    FieldId::X,
    FieldId::Y,
    FieldId::Z,
    FieldId::H,
    FieldId::M,
    FieldId::KEYS,
];

/// Column-oriented particle dataset.
///
/// The members are public so kernels can borrow the registry, the neighbor
/// lists and the attributes at the same time; each member guards its own
/// invariants.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParticleData {
    /// Field registry and column storage.
    pub fields: FieldStore,
    /// Neighbor lists of the owned particles.
    pub neighbors: NeighborList,
    /// Persisted attributes and per-step diagnostics.
    pub attrs: Attributes,
    /// Cached view of the domain's tree.
    pub tree: OctreeView,
    /// Columns selected for output.
    pub output: OutputSelection,
}

impl ParticleData {
    /// Host-only dataset of `n` particles with the always-present columns.
    pub fn new(n: usize) -> Self {
        Self::from_store(FieldStore::new(), n)
    }

    /// Dataset of `n` particles with an accelerator mirror.
    pub fn with_device(n: usize) -> Self {
        Self::from_store(FieldStore::with_device(), n)
    }

    fn from_store(mut fields: FieldStore, n: usize) -> Self {
        fields.resize(n);
        // Fresh store: the always-present set cannot conflict.
        let _ = fields.declare_conserved(&ALWAYS_PRESENT);
        Self {
            fields,
            ..Self::default()
        }
    }

    /// Number of resident particles.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the dataset is empty.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Resize every allocated column to `n` particles.
    pub fn resize(&mut self, n: usize) {
        self.fields.resize(n);
    }

    /// Declare the named columns conserved.
    pub fn set_conserved(&mut self, names: &[&str]) -> Result<(), FieldError> {
        self.fields.declare_conserved(&resolve_names(names)?)
    }

    /// Declare the named columns dependent and allocate them.
    pub fn set_dependent(&mut self, names: &[&str]) -> Result<(), FieldError> {
        self.fields.declare_dependent(&resolve_names(names)?)
    }

    /// Declare the named columns dependent without allocating them.
    pub fn declare_released(&mut self, names: &[&str]) -> Result<(), FieldError> {
        self.fields.declare_released(&resolve_names(names)?)
    }

    /// Acquire the named dependent columns.
    pub fn acquire(&mut self, names: &[&str]) -> Result<(), FieldError> {
        self.fields.acquire(&resolve_names(names)?)
    }

    /// Release the named dependent columns.
    pub fn release(&mut self, names: &[&str]) -> Result<(), FieldError> {
        self.fields.release(&resolve_names(names)?)
    }

    /// Whether the column at `index` of the field table holds storage.
    pub fn is_allocated(&self, index: usize) -> bool {
        self.fields.is_allocated_index(index)
    }

    /// Select the columns to write on output.
    pub fn set_output_fields<S: AsRef<str>>(&mut self, names: &[S]) {
        self.output = OutputSelection::new(names);
    }

    /// Selected output names in selection order.
    pub fn output_field_names(&self) -> Vec<String> {
        self.output.names().map(str::to_string).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn always_present_columns_are_allocated() {
        let d = ParticleData::new(8);
        for f in ALWAYS_PRESENT {
            assert!(d.is_allocated(f.index()), "{f}");
        }
        assert_eq!(d.fields.keys().unwrap().len(), 8);
        assert_eq!(d.fields.real32(FieldId::M).unwrap().len(), 8);
    }

    #[test]
    fn named_registry_calls() {
        let mut d = ParticleData::new(4);
        d.set_conserved(&["vx", "temp"]).unwrap();
        d.set_dependent(&["prho", "c"]).unwrap();
        d.declare_released(&["divv"]).unwrap();
        d.release(&["c"]).unwrap();
        d.acquire(&["divv"]).unwrap();
        assert!(d.is_allocated(FieldId::DIVV.index()));
        assert!(!d.is_allocated(FieldId::C.index()));
        assert!(!d.is_allocated(999));
        assert_eq!(
            d.acquire(&["nope"]).unwrap_err(),
            FieldError::UnknownField { name: "nope".into() }
        );
    }

    #[test]
    fn output_selection_round_trips_names() {
        let mut d = ParticleData::new(1);
        d.set_output_fields(&["x", "rho", "bogus"]);
        assert_eq!(d.output_field_names(), vec!["x", "rho", "bogus"]);
        assert_eq!(d.output.unresolvable().count(), 1);
    }
}

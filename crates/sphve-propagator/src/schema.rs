//! Field schemas of the VE hydro pipeline.
//!
//! The AV-cleaning choice selects one of two immutable schemas at
//! construction; nothing about the field sets changes afterwards.

use sphve_core::{FieldError, FieldId, FieldSet};
use sphve_fields::ParticleData;

/// Conserved columns besides the always-present ones.
pub const CONSERVED: [FieldId; 9] = [
    FieldId::TEMP,
    FieldId::VX,
    FieldId::VY,
    FieldId::VZ,
    FieldId::X_M1,
    FieldId::Y_M1,
    FieldId::Z_M1,
    FieldId::DU_M1,
    FieldId::ALPHA,
];

/// Always-present columns persisted ahead of the conserved ones.
pub const CHECKPOINT_PREFIX: [FieldId; 5] = [FieldId::X, FieldId::Y, FieldId::Z, FieldId::H, FieldId::M];

const DEPENDENT: [FieldId; 15] = [
    FieldId::PRHO,
    FieldId::C,
    FieldId::AX,
    FieldId::AY,
    FieldId::AZ,
    FieldId::DU,
    FieldId::C11,
    FieldId::C12,
    FieldId::C13,
    FieldId::C22,
    FieldId::C23,
    FieldId::C33,
    FieldId::XM,
    FieldId::KX,
    FieldId::NC,
];

const DEPENDENT_AV_CLEAN: [FieldId; 21] = [
    FieldId::PRHO,
    FieldId::C,
    FieldId::AX,
    FieldId::AY,
    FieldId::AZ,
    FieldId::DU,
    FieldId::C11,
    FieldId::C12,
    FieldId::C13,
    FieldId::C22,
    FieldId::C23,
    FieldId::C33,
    FieldId::XM,
    FieldId::KX,
    FieldId::NC,
    FieldId::DV11,
    FieldId::DV12,
    FieldId::DV13,
    FieldId::DV22,
    FieldId::DV23,
    FieldId::DV33,
];

/// Dependent columns declared released: mid-step scratch and output-only
/// quantities.
pub const TRANSIENT: [FieldId; 5] = [
    FieldId::GRADH,
    FieldId::DIVV,
    FieldId::CURLV,
    FieldId::RHO,
    FieldId::P,
];

/// Dependent columns released between steps. The `dV` tensor stays
/// resident for output.
const SCRATCH: [FieldId; 8] = [
    FieldId::PRHO,
    FieldId::C,
    FieldId::C11,
    FieldId::C12,
    FieldId::C13,
    FieldId::C22,
    FieldId::C23,
    FieldId::C33,
];

/// Field sets of one pipeline variant.
#[derive(Debug, PartialEq, Eq)]
pub struct FieldSchema {
    /// Whether the AV-cleaning momentum variant is used.
    pub av_clean: bool,
    /// Conserved columns.
    pub conserved: &'static [FieldId],
    /// Dependent columns allocated at activation.
    pub dependent: &'static [FieldId],
    /// Dependent columns declared released.
    pub transient: &'static [FieldId],
    /// Dependent columns released between steps.
    pub scratch: &'static [FieldId],
}

/// Schema without AV cleaning.
pub static HYDRO_VE: FieldSchema = FieldSchema {
    av_clean: false,
    conserved: &CONSERVED,
    dependent: &DEPENDENT,
    transient: &TRANSIENT,
    scratch: &SCRATCH,
};

/// Schema with AV cleaning.
pub static HYDRO_VE_AV_CLEAN: FieldSchema = FieldSchema {
    av_clean: true,
    conserved: &CONSERVED,
    dependent: &DEPENDENT_AV_CLEAN,
    transient: &TRANSIENT,
    scratch: &SCRATCH,
};

impl FieldSchema {
    /// The schema for the given AV-cleaning choice.
    pub fn select(av_clean: bool) -> &'static FieldSchema {
        if av_clean {
            &HYDRO_VE_AV_CLEAN
        } else {
            &HYDRO_VE
        }
    }

    /// Checkpointed column names: the always-present prefix, then the
    /// conserved columns.
    pub fn checkpoint_names(&self) -> Vec<&'static str> {
        CHECKPOINT_PREFIX
            .iter()
            .chain(self.conserved)
            .map(|f| f.name())
            .collect()
    }

    /// Checkpointed columns, in [`checkpoint_names`](Self::checkpoint_names) order.
    pub fn checkpoint_fields(&self) -> Vec<FieldId> {
        CHECKPOINT_PREFIX.iter().chain(self.conserved).copied().collect()
    }

    /// Declare the schema's fields on `data`.
    pub fn activate(&self, data: &mut ParticleData) -> Result<(), FieldError> {
        data.fields.declare_conserved(self.conserved)?;
        data.fields.declare_dependent(self.dependent)?;
        data.fields.declare_released(self.transient)
    }

    /// Allocated columns between two steps.
    pub fn resting_allocated(&self) -> FieldSet {
        let mut set: FieldSet = sphve_fields::ALWAYS_PRESENT.iter().copied().collect();
        for &f in self.conserved.iter().chain(self.dependent) {
            set.insert(f);
        }
        set.difference(&FieldSet::of(self.scratch))
    }

    /// Every column declared dependent.
    pub fn declared_dependent(&self) -> FieldSet {
        self.dependent.iter().chain(self.transient).copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn av_cleaning_adds_exactly_the_tensor() {
        let off = FieldSet::of(HYDRO_VE.dependent);
        let on = FieldSet::of(HYDRO_VE_AV_CLEAN.dependent);
        let extra = on.difference(&off);
        assert_eq!(extra.len(), 6);
        assert!(off.is_subset(&on));
        assert!(extra.iter().all(|f| f.name().starts_with("dV")));
    }

    #[test]
    fn scratch_is_dependent() {
        for schema in [&HYDRO_VE, &HYDRO_VE_AV_CLEAN] {
            assert!(FieldSet::of(schema.scratch).is_subset(&FieldSet::of(schema.dependent)));
            assert!(!schema.resting_allocated().contains(FieldId::PRHO));
            assert!(schema.resting_allocated().contains(FieldId::XM));
        }
    }

    #[test]
    fn velocity_gradient_tensor_stays_resident_between_steps() {
        let resting = HYDRO_VE_AV_CLEAN.resting_allocated();
        for f in sphve_kernels::DV_FIELDS {
            assert!(resting.contains(f), "{f}");
        }
        assert_eq!(HYDRO_VE.scratch, HYDRO_VE_AV_CLEAN.scratch);
    }

    #[test]
    fn checkpoint_names_start_with_geometry() {
        let names = HYDRO_VE.checkpoint_names();
        assert_eq!(&names[..5], &["x", "y", "z", "h", "m"]);
        assert_eq!(names.len(), 14);
        assert_eq!(names, HYDRO_VE_AV_CLEAN.checkpoint_names());
    }

    #[test]
    fn fixture_declarations_match_the_schemas() {
        for schema in [&HYDRO_VE, &HYDRO_VE_AV_CLEAN] {
            let mut activated = ParticleData::new(4);
            schema.activate(&mut activated).unwrap();
            let mut fixture = ParticleData::new(4);
            sphve_test_utils::declare_hydro_fields(&mut fixture, schema.av_clean).unwrap();
            assert_eq!(fixture.fields.states(), activated.fields.states(), "av_clean = {}", schema.av_clean);
        }
    }

    #[test]
    fn activation_leaves_transients_released() {
        let mut d = ParticleData::new(4);
        HYDRO_VE_AV_CLEAN.activate(&mut d).unwrap();
        assert!(d.fields.is_allocated(FieldId::DV33));
        assert!(!d.fields.is_allocated(FieldId::GRADH));
        assert!(d.fields.states().dependent().contains(FieldId::RHO));
    }
}

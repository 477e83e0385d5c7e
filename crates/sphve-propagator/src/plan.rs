//! The step pipeline as a data table, and its startup validation.
//!
//! Each [`PhaseSpec`] names the fields it releases and acquires, the stage
//! it runs, the fields the stage reads and an optional halo exchange.
//! [`validate_plan`] simulates the allocation states through the table
//! once, at construction, so a misordered release or a double exchange
//! is caught before the first step instead of inside a kernel.

use std::error::Error;
use std::fmt;

use smallvec::SmallVec;
use sphve_core::{FieldId, FieldSet};
use sphve_kernels::DV_FIELDS;

use crate::schema::FieldSchema;

/// Field list of one phase.
pub type FieldList = SmallVec<[FieldId; 8]>;

/// Work performed by a phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    /// Domain sync and tree refresh.
    Sync,
    /// Resize the dataset to the resident count.
    Resize,
    /// Copy the first owned mass into the halo padding.
    PadHaloMass,
    /// Neighbor search.
    Neighbors,
    /// Volume estimator `xm`.
    XMass,
    /// Normalization `kx` and `gradh`.
    VeDefGradh,
    /// Equation of state.
    Eos,
    /// IAD matrix, divergence and curl.
    IadDivvCurlv,
    /// Artificial-viscosity switches.
    AvSwitches,
    /// Momentum and energy equations.
    MomentumEnergy,
    /// Multipole upsweep and traversal; skipped without gravity.
    Gravity,
    /// Global timestep.
    Timestep,
    /// Injected forcing; skipped when none is injected.
    Forcing,
    /// Velocity, position and energy update.
    Positions,
    /// Smoothing-length update.
    SmoothingLength,
}

/// How a phase's acquires treat fields that are already allocated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AcquirePolicy {
    /// Every listed field must be released.
    #[default]
    Strict,
    /// Allocated fields are skipped.
    Missing,
}

/// A halo exchange and its two staging buffers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HaloExchange {
    /// Exchanged fields.
    pub fields: FieldList,
    /// Staging buffers.
    pub staging: [FieldId; 2],
}

/// One row of the plan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PhaseSpec {
    /// Timer checkpoint name.
    pub name: &'static str,
    /// Released before the stage.
    pub releases: FieldList,
    /// Acquired before the stage, after the releases.
    pub acquires: FieldList,
    /// Acquire behavior for allocated fields.
    pub acquire_policy: AcquirePolicy,
    /// The work, if any.
    pub stage: Option<Stage>,
    /// Fields the stage reads or writes.
    pub reads: FieldList,
    /// Exchange after the stage.
    pub exchange: Option<HaloExchange>,
}

impl PhaseSpec {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            releases: FieldList::new(),
            acquires: FieldList::new(),
            acquire_policy: AcquirePolicy::Strict,
            stage: None,
            reads: FieldList::new(),
            exchange: None,
        }
    }

    fn stage(mut self, stage: Stage, reads: &[FieldId]) -> Self {
        self.stage = Some(stage);
        self.reads.extend_from_slice(reads);
        self
    }

    fn also_reads(mut self, reads: &[FieldId]) -> Self {
        self.reads.extend_from_slice(reads);
        self
    }

    fn releases(mut self, fields: &[FieldId]) -> Self {
        self.releases.extend_from_slice(fields);
        self
    }

    fn acquires(mut self, fields: &[FieldId], policy: AcquirePolicy) -> Self {
        self.acquires.extend_from_slice(fields);
        self.acquire_policy = policy;
        self
    }

    fn exchange(mut self, fields: &[FieldId], staging: [FieldId; 2]) -> Self {
        self.exchange = Some(HaloExchange {
            fields: fields.iter().copied().collect(),
            staging,
        });
        self
    }
}

/// Errors from plan validation (startup-time, not per-step).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlanError {
    /// The plan has no phases.
    EmptyPlan,
    /// A phase releases a field that is not allocated at that point.
    ReleaseUnallocated {
        /// Phase name.
        phase: &'static str,
        /// The field.
        field: FieldId,
    },
    /// A phase acquires or releases a field not declared dependent.
    NotDependent {
        /// Phase name.
        phase: &'static str,
        /// The field.
        field: FieldId,
    },
    /// A phase acquires a field that is already allocated.
    AcquireAllocated {
        /// Phase name.
        phase: &'static str,
        /// The field.
        field: FieldId,
    },
    /// A stage reads a field that is not allocated at that point.
    ReadReleased {
        /// Phase name.
        phase: &'static str,
        /// The field.
        field: FieldId,
    },
    /// A halo exchange carries or stages through a released field.
    HaloReleased {
        /// Phase name.
        phase: &'static str,
        /// The field.
        field: FieldId,
    },
    /// A staging buffer is listed twice or is also exchanged.
    StagingConflict {
        /// Phase name.
        phase: &'static str,
        /// The field.
        field: FieldId,
    },
    /// A dependent field is exchanged a second time in one step.
    DuplicateExchange {
        /// Phase of the second exchange.
        phase: &'static str,
        /// Phase of the first exchange.
        first_phase: &'static str,
        /// The field.
        field: FieldId,
    },
    /// The allocation state after the last phase differs from the start.
    Unbalanced {
        /// Allocated at the end but not at the start.
        left_allocated: FieldSet,
        /// Allocated at the start but not at the end.
        left_released: FieldSet,
    },
}

impl fmt::Display for PlanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyPlan => write!(f, "plan has no phases"),
            Self::ReleaseUnallocated { phase, field } => {
                write!(f, "phase '{phase}' releases unallocated field '{field}'")
            }
            Self::NotDependent { phase, field } => {
                write!(f, "phase '{phase}' manages field '{field}' which is not dependent")
            }
            Self::AcquireAllocated { phase, field } => {
                write!(f, "phase '{phase}' acquires allocated field '{field}'")
            }
            Self::ReadReleased { phase, field } => {
                write!(f, "phase '{phase}' reads released field '{field}'")
            }
            Self::HaloReleased { phase, field } => {
                write!(f, "phase '{phase}' exchanges released field '{field}'")
            }
            Self::StagingConflict { phase, field } => {
                write!(f, "phase '{phase}' cannot stage through '{field}'")
            }
            Self::DuplicateExchange {
                phase,
                first_phase,
                field,
            } => write!(
                f,
                "field '{field}' exchanged by '{first_phase}' and again by '{phase}'"
            ),
            Self::Unbalanced {
                left_allocated,
                left_released,
            } => write!(
                f,
                "step leaves {left_allocated} allocated and {left_released} released"
            ),
        }
    }
}

impl Error for PlanError {}

/// Simulate allocation states through `phases`.
///
/// `allocated` is the state before the first phase and `dependent` the set
/// of fields declared dependent. Checks performed:
///
/// 1. Releases target allocated dependent fields.
/// 2. Acquires target released dependent fields.
/// 3. Stage reads, exchanged fields and staging buffers are allocated.
/// 4. Staging buffers are distinct and not exchanged themselves.
/// 5. No dependent field is exchanged twice.
/// 6. The final state equals `allocated`.
pub fn validate_plan(
    phases: &[PhaseSpec],
    allocated: FieldSet,
    dependent: FieldSet,
) -> Result<(), PlanError> {
    if phases.is_empty() {
        return Err(PlanError::EmptyPlan);
    }
    let mut state = allocated;
    let mut exchanged: Vec<(FieldId, &'static str)> = Vec::new();

    for p in phases {
        let phase = p.name;
        for &field in &p.releases {
            if !dependent.contains(field) {
                return Err(PlanError::NotDependent { phase, field });
            }
            if !state.contains(field) {
                return Err(PlanError::ReleaseUnallocated { phase, field });
            }
            state.remove(field);
        }
        for &field in &p.acquires {
            if !dependent.contains(field) {
                return Err(PlanError::NotDependent { phase, field });
            }
            if state.contains(field) {
                return Err(PlanError::AcquireAllocated { phase, field });
            }
            state.insert(field);
        }
        if let Some(&field) = p.reads.iter().find(|&&f| !state.contains(f)) {
            return Err(PlanError::ReadReleased { phase, field });
        }
        let Some(ex) = &p.exchange else {
            continue;
        };
        if ex.staging[0] == ex.staging[1] || ex.fields.contains(&ex.staging[0]) {
            return Err(PlanError::StagingConflict {
                phase,
                field: ex.staging[0],
            });
        }
        if ex.fields.contains(&ex.staging[1]) {
            return Err(PlanError::StagingConflict {
                phase,
                field: ex.staging[1],
            });
        }
        for &field in ex.fields.iter().chain(&ex.staging) {
            if !state.contains(field) {
                return Err(PlanError::HaloReleased { phase, field });
            }
        }
        for &field in ex.fields.iter().filter(|&&f| dependent.contains(f)) {
            if let Some(&(_, first_phase)) = exchanged.iter().find(|(f, _)| *f == field) {
                return Err(PlanError::DuplicateExchange {
                    phase,
                    first_phase,
                    field,
                });
            }
            exchanged.push((field, phase));
        }
    }

    if state != allocated {
        return Err(PlanError::Unbalanced {
            left_allocated: state.difference(&allocated),
            left_released: allocated.difference(&state),
        });
    }
    Ok(())
}

const POS: [FieldId; 4] = [FieldId::X, FieldId::Y, FieldId::Z, FieldId::H];
const VEL: [FieldId; 3] = [FieldId::VX, FieldId::VY, FieldId::VZ];
const ACC: [FieldId; 3] = [FieldId::AX, FieldId::AY, FieldId::AZ];
const IAD: [FieldId; 6] = [
    FieldId::C11,
    FieldId::C12,
    FieldId::C13,
    FieldId::C22,
    FieldId::C23,
    FieldId::C33,
];
const VOLUME: [FieldId; 3] = [FieldId::XM, FieldId::KX, FieldId::NC];

/// The validated phase table of a VE hydro step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PhasePlan {
    phases: Vec<PhaseSpec>,
}

impl PhasePlan {
    /// Build and validate the step plan for `schema`.
    pub fn hydro_ve(schema: &FieldSchema) -> Result<Self, PlanError> {
        let phases = hydro_ve_phases(schema);
        validate_plan(&phases, schema.resting_allocated(), schema.declared_dependent())?;
        Ok(Self { phases })
    }

    /// Phases in execution order.
    pub fn phases(&self) -> &[PhaseSpec] {
        &self.phases
    }

    /// Number of phases.
    pub fn len(&self) -> usize {
        self.phases.len()
    }

    /// Whether the plan is empty; never true for a validated plan.
    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    /// Phase names in execution order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.phases.iter().map(|p| p.name)
    }
}

/// The unvalidated phase table of a VE hydro step.
pub fn hydro_ve_phases(schema: &FieldSchema) -> Vec<PhaseSpec> {
    let dv: &[FieldId] = if schema.av_clean { &DV_FIELDS } else { &[] };
    let mut alpha_halo: FieldList = smallvec::smallvec![FieldId::ALPHA];
    alpha_halo.extend_from_slice(dv);
    let mut iad_halo: FieldList = IAD.iter().copied().collect();
    iad_halo.push(FieldId::DIVV);
    let mut carried: FieldList = schema.conserved.iter().copied().collect();
    carried.push(FieldId::M);

    vec![
        PhaseSpec::new("acquire scratch").acquires(schema.scratch, AcquirePolicy::Missing),
        PhaseSpec::new("domain sync").stage(Stage::Sync, &carried),
        PhaseSpec::new("resize").stage(Stage::Resize, &[]),
        PhaseSpec::new("halo mass").stage(Stage::PadHaloMass, &[FieldId::M]),
        PhaseSpec::new("neighbors").stage(Stage::Neighbors, &POS).also_reads(&[FieldId::NC]),
        PhaseSpec::new("xmass")
            .stage(Stage::XMass, &POS)
            .also_reads(&[FieldId::M, FieldId::NC, FieldId::XM])
            .exchange(&[FieldId::XM], [FieldId::AX, FieldId::AY]),
        PhaseSpec::new("normalization")
            .releases(&[FieldId::AX])
            .acquires(&[FieldId::GRADH], AcquirePolicy::Strict)
            .stage(Stage::VeDefGradh, &POS)
            .also_reads(&VOLUME)
            .also_reads(&[FieldId::GRADH]),
        PhaseSpec::new("eos")
            .stage(
                Stage::Eos,
                &[FieldId::TEMP, FieldId::M, FieldId::KX, FieldId::XM, FieldId::GRADH, FieldId::PRHO, FieldId::C],
            )
            .exchange(
                &[FieldId::VX, FieldId::VY, FieldId::VZ, FieldId::PRHO, FieldId::C, FieldId::KX],
                [FieldId::GRADH, FieldId::AY],
            ),
        PhaseSpec::new("iad divv curlv")
            .releases(&[FieldId::GRADH, FieldId::AY])
            .acquires(&[FieldId::DIVV, FieldId::CURLV], AcquirePolicy::Strict)
            .stage(Stage::IadDivvCurlv, &POS)
            .also_reads(&VEL)
            .also_reads(&VOLUME)
            .also_reads(&IAD)
            .also_reads(&[FieldId::DIVV, FieldId::CURLV])
            .exchange(&iad_halo, [FieldId::AZ, FieldId::DU]),
        PhaseSpec::new("av switches")
            .stage(Stage::AvSwitches, &POS)
            .also_reads(&VEL)
            .also_reads(&VOLUME)
            .also_reads(&IAD)
            .also_reads(&[FieldId::C, FieldId::DIVV, FieldId::CURLV, FieldId::ALPHA])
            .also_reads(dv)
            .exchange(&alpha_halo, [FieldId::AZ, FieldId::DU]),
        PhaseSpec::new("momentum energy")
            .releases(&[FieldId::DIVV, FieldId::CURLV])
            .acquires(&[FieldId::AX, FieldId::AY], AcquirePolicy::Strict)
            .stage(Stage::MomentumEnergy, &POS)
            .also_reads(&VEL)
            .also_reads(&VOLUME)
            .also_reads(&IAD)
            .also_reads(&ACC)
            .also_reads(&[FieldId::M, FieldId::PRHO, FieldId::C, FieldId::ALPHA, FieldId::DU])
            .also_reads(dv),
        PhaseSpec::new("gravity")
            .stage(Stage::Gravity, &[FieldId::X, FieldId::Y, FieldId::Z, FieldId::M])
            .also_reads(&ACC),
        PhaseSpec::new("timestep").stage(Stage::Timestep, &ACC),
        PhaseSpec::new("forcing")
            .stage(Stage::Forcing, &[FieldId::X, FieldId::Y, FieldId::Z])
            .also_reads(&ACC),
        PhaseSpec::new("positions")
            .stage(Stage::Positions, &POS)
            .also_reads(&VEL)
            .also_reads(&ACC)
            .also_reads(&[
                FieldId::X_M1,
                FieldId::Y_M1,
                FieldId::Z_M1,
                FieldId::DU,
                FieldId::DU_M1,
                FieldId::TEMP,
            ]),
        PhaseSpec::new("smoothing length").stage(Stage::SmoothingLength, &[FieldId::H, FieldId::NC]),
        PhaseSpec::new("release scratch").releases(schema.scratch),
    ]
}

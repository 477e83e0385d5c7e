//! Errors raised outside the step itself: construction, persistence and
//! output.

use std::error::Error;
use std::fmt;

use sphve_checkpoint::CheckpointError;
use sphve_core::FieldError;
use sphve_kernels::TurbulenceError;

use crate::plan::PlanError;

/// Errors from building, saving, loading or writing output of a
/// propagator. Step failures use [`StepError`](sphve_core::StepError).
#[derive(Debug)]
pub enum PropagatorError {
    /// The factory does not know the requested propagator.
    UnknownPropagator {
        /// The requested name.
        name: String,
    },
    /// The phase plan failed validation.
    Plan(PlanError),
    /// A field registry usage defect.
    Field(FieldError),
    /// Checkpoint I/O failed.
    Checkpoint(CheckpointError),
    /// Stirring parameters or state were rejected.
    Turbulence(TurbulenceError),
}

impl fmt::Display for PropagatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownPropagator { name } => write!(f, "unknown propagator '{name}'"),
            Self::Plan(e) => write!(f, "invalid phase plan: {e}"),
            Self::Field(e) => write!(f, "field registry: {e}"),
            Self::Checkpoint(e) => write!(f, "checkpoint: {e}"),
            Self::Turbulence(e) => write!(f, "turbulence: {e}"),
        }
    }
}

impl Error for PropagatorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::UnknownPropagator { .. } => None,
            Self::Plan(e) => Some(e),
            Self::Field(e) => Some(e),
            Self::Checkpoint(e) => Some(e),
            Self::Turbulence(e) => Some(e),
        }
    }
}

impl From<PlanError> for PropagatorError {
    fn from(e: PlanError) -> Self {
        Self::Plan(e)
    }
}

impl From<FieldError> for PropagatorError {
    fn from(e: FieldError) -> Self {
        Self::Field(e)
    }
}

impl From<CheckpointError> for PropagatorError {
    fn from(e: CheckpointError) -> Self {
        match e {
            CheckpointError::Field(inner) => Self::Field(inner),
            other => Self::Checkpoint(other),
        }
    }
}

impl From<TurbulenceError> for PropagatorError {
    fn from(e: TurbulenceError) -> Self {
        Self::Turbulence(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sphve_core::FieldId;

    #[test]
    fn checkpoint_field_errors_are_unwrapped() {
        let e: PropagatorError = CheckpointError::Field(FieldError::NotAllocated { field: FieldId::C }).into();
        assert!(matches!(e, PropagatorError::Field(FieldError::NotAllocated { .. })));
        let e: PropagatorError = CheckpointError::NoOpenStep.into();
        assert!(e.source().is_some());
    }

    #[test]
    fn display_names_the_propagator() {
        let e = PropagatorError::UnknownPropagator { name: "std".into() };
        assert_eq!(e.to_string(), "unknown propagator 'std'");
    }
}

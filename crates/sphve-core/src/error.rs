//! Error types shared across the sphve workspace.
//!
//! Organized by the failure taxonomy of the step pipeline: usage defects
//! against the field registry ([`FieldError`]), collaborator failures from
//! the domain decomposition ([`DomainError`]), and the step-level wrapper
//! ([`StepError`]) that the driver treats as fatal.

use std::error::Error;
use std::fmt;

use crate::field::{FieldId, FieldKind};

/// A violation of the field registry's category or allocation rules.
///
/// Every variant is a usage defect: the pipeline asked for a field in a
/// state that its declared lifecycle does not permit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldError {
    /// A field name that is not part of the particle field table.
    UnknownField {
        /// The unrecognised name.
        name: String,
    },
    /// Acquire or release of a field that is not declared dependent.
    NotDependent {
        /// The offending field.
        field: FieldId,
    },
    /// Acquire of a dependent field whose storage is already allocated.
    AlreadyAllocated {
        /// The offending field.
        field: FieldId,
    },
    /// Access to, or release of, a field whose storage is not allocated.
    NotAllocated {
        /// The offending field.
        field: FieldId,
    },
    /// A field declared with one category and then re-declared with another.
    CategoryConflict {
        /// The offending field.
        field: FieldId,
        /// Category recorded first.
        declared: &'static str,
        /// Category requested now.
        requested: &'static str,
    },
    /// Typed access with the wrong scalar kind.
    KindMismatch {
        /// The offending field.
        field: FieldId,
        /// Kind the caller asked for.
        expected: FieldKind,
        /// Kind the column actually stores.
        found: FieldKind,
    },
    /// The same field requested twice in one disjoint borrow.
    DuplicateBorrow {
        /// The repeated field.
        field: FieldId,
    },
    /// Column data of the wrong length handed to the registry.
    LengthMismatch {
        /// The offending field.
        field: FieldId,
        /// Length the registry expected.
        expected: usize,
        /// Length that was supplied.
        found: usize,
    },
    /// Host and accelerator mirrors disagree on a field's state.
    MirrorDiverged {
        /// The offending field.
        field: FieldId,
    },
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownField { name } => write!(f, "unknown particle field '{name}'"),
            Self::NotDependent { field } => {
                write!(f, "field '{field}' is not declared dependent")
            }
            Self::AlreadyAllocated { field } => {
                write!(f, "field '{field}' could not be acquired: already allocated")
            }
            Self::NotAllocated { field } => write!(f, "field '{field}' is not allocated"),
            Self::CategoryConflict {
                field,
                declared,
                requested,
            } => write!(
                f,
                "field '{field}' declared {declared}, cannot be re-declared {requested}"
            ),
            Self::KindMismatch {
                field,
                expected,
                found,
            } => write!(f, "field '{field}' stores {found}, accessed as {expected}"),
            Self::DuplicateBorrow { field } => {
                write!(f, "field '{field}' borrowed twice in one access")
            }
            Self::LengthMismatch {
                field,
                expected,
                found,
            } => write!(
                f,
                "field '{field}' has {found} elements, expected {expected}"
            ),
            Self::MirrorDiverged { field } => {
                write!(f, "host and accelerator state of field '{field}' diverged")
            }
        }
    }
}

impl Error for FieldError {}

/// Failures reported by the domain decomposition collaborator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DomainError {
    /// The owned range is inconsistent with the resident particle count.
    InvalidRange {
        /// First owned index.
        first: usize,
        /// One past the last owned index.
        last: usize,
        /// Locally resident particles including halos.
        n_with_halos: usize,
    },
    /// Domain synchronization (keys, tree, halo discovery) failed.
    SyncFailed {
        /// Human-readable description.
        reason: String,
    },
    /// A halo exchange could not be completed.
    HaloExchangeFailed {
        /// Human-readable description.
        reason: String,
    },
    /// The domain touched a field in a state the registry forbids.
    Field(FieldError),
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRange {
                first,
                last,
                n_with_halos,
            } => write!(
                f,
                "invalid particle range [{first}, {last}) with {n_with_halos} resident particles"
            ),
            Self::SyncFailed { reason } => write!(f, "domain sync failed: {reason}"),
            Self::HaloExchangeFailed { reason } => write!(f, "halo exchange failed: {reason}"),
            Self::Field(e) => write!(f, "domain field access: {e}"),
        }
    }
}

impl Error for DomainError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Field(e) => Some(e),
            _ => None,
        }
    }
}

impl From<FieldError> for DomainError {
    fn from(e: FieldError) -> Self {
        Self::Field(e)
    }
}

/// Errors that abort a simulation step.
///
/// A step is atomic: any of these leaves the run in an undefined state and
/// the driver terminates instead of retrying.
#[derive(Clone, Debug, PartialEq)]
pub enum StepError {
    /// A field registry usage defect.
    Field(FieldError),
    /// The domain collaborator failed.
    Domain(DomainError),
    /// The gravity solver failed.
    Gravity {
        /// Human-readable description.
        reason: String,
    },
    /// The global timestep reduction produced an unusable value.
    InvalidTimestep {
        /// The offending timestep.
        value: f64,
    },
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(e) => write!(f, "field registry: {e}"),
            Self::Domain(e) => write!(f, "domain: {e}"),
            Self::Gravity { reason } => write!(f, "gravity: {reason}"),
            Self::InvalidTimestep { value } => {
                write!(f, "timestep must be finite and positive, got {value}")
            }
        }
    }
}

impl Error for StepError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Field(e) => Some(e),
            Self::Domain(e) => Some(e),
            _ => None,
        }
    }
}

impl From<FieldError> for StepError {
    fn from(e: FieldError) -> Self {
        Self::Field(e)
    }
}

impl From<DomainError> for StepError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::Field(inner) => Self::Field(inner),
            other => Self::Domain(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_errors_name_the_field() {
        let e = FieldError::NotAllocated {
            field: FieldId::DIVV,
        };
        assert_eq!(e.to_string(), "field 'divv' is not allocated");
    }

    #[test]
    fn domain_field_error_unwraps_into_step_field_error() {
        let inner = FieldError::NotDependent { field: FieldId::X };
        let step: StepError = DomainError::Field(inner.clone()).into();
        assert_eq!(step, StepError::Field(inner));
    }

    #[test]
    fn step_error_exposes_source() {
        let step = StepError::Domain(DomainError::SyncFailed {
            reason: "peer lost".into(),
        });
        assert!(step.source().is_some());
        assert!(step.to_string().contains("peer lost"));
    }
}

//! Gravity solver errors.

use std::error::Error;
use std::fmt;

use sphve_core::{FieldError, StepError};

/// Errors from the multipole holders.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GravityError {
    /// A column needed by the solver is unusable.
    Field(FieldError),
    /// Traversal was requested without moments for the current tree.
    NotUpswept {
        /// Nodes in the domain's tree.
        tree_nodes: usize,
        /// Nodes with moments.
        moment_nodes: usize,
    },
    /// The accelerator variant was used on a dataset without a mirror.
    NoDevice,
}

impl fmt::Display for GravityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(e) => write!(f, "{e}"),
            Self::NotUpswept {
                tree_nodes,
                moment_nodes,
            } => write!(
                f,
                "traversal over {tree_nodes} tree nodes with moments for {moment_nodes}"
            ),
            Self::NoDevice => f.write_str("accelerator holder needs a dataset with a device mirror"),
        }
    }
}

impl Error for GravityError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Field(e) => Some(e),
            _ => None,
        }
    }
}

impl From<FieldError> for GravityError {
    fn from(e: FieldError) -> Self {
        Self::Field(e)
    }
}

impl From<GravityError> for StepError {
    fn from(e: GravityError) -> Self {
        match e {
            GravityError::Field(e) => StepError::Field(e),
            other => StepError::Gravity {
                reason: other.to_string(),
            },
        }
    }
}

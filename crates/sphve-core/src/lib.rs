//! Core types for the sphve particle pipeline.
//!
//! This is the leaf crate with zero internal dependencies. It defines the
//! canonical per-particle field table, the [`FieldSet`] bitset used to
//! declare phase reads and halo payloads, the simulation box and octree view
//! handed between collaborators, and the error taxonomy shared by every
//! other crate in the workspace.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod field;
pub mod geometry;
pub mod target;

pub use error::{DomainError, FieldError, StepError};
pub use field::{FieldId, FieldKind, FieldSet, FieldSetIter, FIELD_COUNT, FIELD_NAMES};
pub use geometry::{Boundary, OctreeView, SimBox, TreeNode};
pub use target::ExecutionTarget;

//! Multipole gravity for sphve.
//!
//! The [`MultipoleHolder`] trait wraps a Barnes-Hut style solver with
//! monopole and quadrupole moments. Two variants exist, selected once per
//! run by [`ExecutionTarget`](sphve_core::ExecutionTarget) through
//! [`make_holder`]:
//!
//! - [`CpuMultipoleHolder`] works on host columns.
//! - [`AccelMultipoleHolder`] transfers sources to the accelerator mirror,
//!   walks the tree there and transfers accelerations back.
//!
//! Both are only invoked when the gravitational constant is non-zero.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod error;
pub mod holder;
pub mod moments;
pub mod traversal;

pub use error::GravityError;
pub use holder::{make_holder, AccelMultipoleHolder, CpuMultipoleHolder, MultipoleHolder};
pub use moments::Multipole;
pub use traversal::{GravityParams, DEFAULT_THETA};

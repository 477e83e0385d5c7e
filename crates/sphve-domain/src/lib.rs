//! Domain decomposition for the sphve step pipeline.
//!
//! The pipeline consumes the [`Domain`] trait: particle synchronization,
//! halo exchange, the owned index range, the simulation box and the tree
//! topology. [`LocalDomain`] is the single-rank reference implementation
//! and [`Communicator`] carries the collective reductions.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod comm;
pub mod compliance;
pub mod domain;
pub mod local;
pub mod morton;
pub mod octree;

pub use comm::{Communicator, SingleRank};
pub use domain::{check_halo_request, check_resident, Domain};
pub use local::{LocalDomain, DEFAULT_BUCKET_SIZE};

//! Simulation driver for sphve.
//!
//! [`SimConfig`] describes a run and is validated before anything is
//! built. [`bootstrap`] turns it into an [`ExecutionContext`] holding the
//! worker pool and the communicator; [`Simulation`] owns the propagator,
//! the domain and the particle dataset and advances them step by step,
//! writing checkpoints and output along the way.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod context;
pub mod driver;
pub mod metrics;

pub use config::{ConfigError, PropagatorChoice, SimConfig};
pub use context::{bootstrap, bootstrap_with, teardown, ExecutionContext};
pub use driver::{EngineError, RunSummary, Simulation};
pub use metrics::StepMetrics;

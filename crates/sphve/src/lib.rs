//! sphve: the step pipeline and field lifecycle of a generalized
//! volume-element SPH code.
//!
//! This is the facade crate that re-exports the public API from all sphve
//! sub-crates. For most users, adding `sphve` as a single dependency is
//! sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use sphve::prelude::*;
//!
//! let config = SimConfig {
//!     threads: Some(1),
//!     ..SimConfig::default()
//! };
//! let ctx = bootstrap(&config).unwrap();
//!
//! // A 3x3x3 lattice at rest in the unit box.
//! let mut data = ctx.new_dataset(27);
//! for i in 0..27 {
//!     let c = [i / 9, (i / 3) % 3, i % 3];
//!     for (a, f) in [FieldId::X, FieldId::Y, FieldId::Z].into_iter().enumerate() {
//!         data.fields.real_mut(f).unwrap()[i] = (c[a] as f64 + 0.5) / 3.0;
//!     }
//! }
//! data.fields.real_mut(FieldId::H).unwrap().fill(0.5);
//! data.fields.real32_mut(FieldId::M).unwrap().fill(1.0 / 27.0);
//!
//! let mut sim = Simulation::new(&config, &ctx, data).unwrap();
//! sim.data_mut().fields.real_mut(FieldId::TEMP).unwrap().fill(10.0);
//! let metrics = sim.step(&ctx).unwrap();
//! assert_eq!(metrics.iteration, 1);
//! teardown(ctx);
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `sphve-core` | field ids and sets, box geometry, error taxonomy |
//! | [`fields`] | `sphve-fields` | field registry, particle dataset, attributes |
//! | [`domain`] | `sphve-domain` | domain trait, communicator, single-rank domain |
//! | [`kernels`] | `sphve-kernels` | reference SPH kernels and turbulent stirring |
//! | [`gravity`] | `sphve-gravity` | multipole gravity holders |
//! | [`checkpoint`] | `sphve-checkpoint` | keyed-record checkpoint archives |
//! | [`propagator`] | `sphve-propagator` | propagator trait, phase plans, VE propagators |
//! | [`engine`] | `sphve-engine` | configuration, bootstrap and the simulation driver |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Field ids, field sets, geometry and errors (`sphve-core`).
pub use sphve_core as types;

/// Field registry and particle dataset (`sphve-fields`).
///
/// [`fields::ParticleData`] is the column store every phase reads and
/// writes; [`fields::FieldStore`] tracks which dependent columns are
/// allocated.
pub use sphve_fields as fields;

/// Domain decomposition (`sphve-domain`).
pub use sphve_domain as domain;

/// Reference SPH kernels (`sphve-kernels`).
pub use sphve_kernels as kernels;

/// Multipole gravity (`sphve-gravity`).
pub use sphve_gravity as gravity;

/// Checkpoint archives (`sphve-checkpoint`).
pub use sphve_checkpoint as checkpoint;

/// Propagators and phase plans (`sphve-propagator`).
///
/// [`propagator::Propagator`] is the step contract;
/// [`propagator::HydroVeProp`] and [`propagator::TurbVeProp`] implement it.
pub use sphve_propagator as propagator;

/// Configuration and the simulation driver (`sphve-engine`).
pub use sphve_engine as engine;

/// Common imports for typical sphve usage.
///
/// ```rust
/// use sphve::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use sphve_core::{ExecutionTarget, FieldId, FieldSet, SimBox};

    // Errors
    pub use sphve_core::{DomainError, FieldError, StepError};

    // Dataset
    pub use sphve_fields::{Attributes, ParticleData};

    // Domain
    pub use sphve_domain::{Communicator, Domain, LocalDomain, SingleRank};

    // Propagators
    pub use sphve_propagator::{make_propagator, Propagator, PropagatorError, PropagatorSettings};

    // Checkpoints
    pub use sphve_checkpoint::{BinaryFileReader, BinaryFileWriter, FileReader, FileWriter};

    // Engine
    pub use sphve_engine::{
        bootstrap, teardown, EngineError, ExecutionContext, PropagatorChoice, SimConfig,
        Simulation, StepMetrics,
    };
}

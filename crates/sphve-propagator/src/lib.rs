//! Step pipelines for sphve.
//!
//! A [`Propagator`] advances a [`ParticleData`](sphve_fields::ParticleData)
//! by one step through a [`Domain`](sphve_domain::Domain). The VE hydro
//! pipeline is a [`PhasePlan`]: a table of phases, each naming the
//! dependent fields it releases and acquires, the stage it runs and the
//! halo exchange that follows. The plan is validated once at construction.
//!
//! [`TurbVeProp`] reuses [`HydroVeProp`] and injects a [`ForcingPhase`]
//! between the timestep and the position update.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod factory;
pub mod hydro_ve;
pub mod output;
pub mod plan;
pub mod propagator;
pub mod schema;
pub mod timer;
pub mod turb_ve;

pub use error::PropagatorError;
pub use factory::{make_propagator, PropagatorSettings, PROPAGATOR_NAMES};
pub use hydro_ve::HydroVeProp;
pub use output::save_ve_fields;
pub use plan::{validate_plan, AcquirePolicy, HaloExchange, PhasePlan, PhaseSpec, PlanError, Stage};
pub use propagator::{ForcingPhase, Propagator};
pub use schema::{FieldSchema, HYDRO_VE, HYDRO_VE_AV_CLEAN};
pub use timer::PhaseTimer;
pub use turb_ve::{TurbVeProp, TurbulenceForcing};

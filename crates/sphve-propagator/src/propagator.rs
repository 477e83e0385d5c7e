//! The [`Propagator`] and [`ForcingPhase`] traits.

use sphve_checkpoint::FileWriter;
use sphve_core::{FieldError, SimBox, StepError};
use sphve_domain::{Communicator, Domain};
use sphve_fields::ParticleData;

use crate::error::PropagatorError;
use crate::timer::PhaseTimer;

/// Advances a particle dataset by one step.
///
/// # Contract
///
/// - [`activate_fields`](Self::activate_fields) runs once before the first
///   step; it declares every field the propagator uses.
/// - [`conserved_fields`](Self::conserved_fields) is fixed at construction
///   and independent of allocation state.
/// - [`step`](Self::step) is atomic: an error leaves the dataset in an
///   unspecified state and the run must stop.
///
/// # Object safety
///
/// The driver stores the propagator as `Box<dyn Propagator>`.
pub trait Propagator: Send {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Checkpointed column names, starting with `x, y, z, h, m`.
    fn conserved_fields(&self) -> Vec<&'static str>;

    /// Declare the propagator's fields on `data`.
    fn activate_fields(&self, data: &mut ParticleData) -> Result<(), FieldError>;

    /// Synchronize the domain and refresh the dataset's tree view.
    fn sync(&mut self, domain: &mut dyn Domain, data: &mut ParticleData) -> Result<(), StepError>;

    /// Run one full step.
    fn step(&mut self, domain: &mut dyn Domain, data: &mut ParticleData) -> Result<(), StepError>;

    /// Add the propagator's own state to the open checkpoint step.
    fn save(&self, _writer: &mut dyn FileWriter) -> Result<(), PropagatorError> {
        Ok(())
    }

    /// Restore the propagator's own state from `path[,step]`.
    fn load(&mut self, _path: &str, _comm: &dyn Communicator) -> Result<(), PropagatorError> {
        Ok(())
    }

    /// Write the selected output columns over `[first, last)`.
    ///
    /// Returns the selected names that could not be produced.
    fn save_fields(
        &self,
        writer: &mut dyn FileWriter,
        first: usize,
        last: usize,
        data: &mut ParticleData,
        sim_box: &SimBox,
    ) -> Result<Vec<String>, PropagatorError>;

    /// Phase timings of the last step.
    fn timer(&self) -> &PhaseTimer;
}

/// Extra acceleration applied between the timestep and the position update.
pub trait ForcingPhase: Send {
    /// Timer checkpoint name.
    fn name(&self) -> &'static str;

    /// Add the forcing over the owned range `[first, last)`.
    fn apply(
        &mut self,
        first: usize,
        last: usize,
        data: &mut ParticleData,
        sim_box: &SimBox,
    ) -> Result<(), StepError>;
}

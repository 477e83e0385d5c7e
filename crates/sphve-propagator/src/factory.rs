//! Propagators by name.

use std::sync::Arc;

use sphve_core::ExecutionTarget;
use sphve_domain::Communicator;
use sphve_gravity::{make_holder, DEFAULT_THETA};
use sphve_kernels::TurbulenceConstants;

use crate::error::PropagatorError;
use crate::hydro_ve::HydroVeProp;
use crate::propagator::Propagator;
use crate::turb_ve::TurbVeProp;

/// Names accepted by [`make_propagator`].
pub const PROPAGATOR_NAMES: [&str; 2] = ["ve", "turbulence"];

/// Construction parameters shared by every propagator.
#[derive(Clone, Debug, PartialEq)]
pub struct PropagatorSettings {
    /// Use the AV-cleaning schema.
    pub av_clean: bool,
    /// Where the gravity holder runs.
    pub target: ExecutionTarget,
    /// Multipole opening angle.
    pub theta: f64,
    /// Stirring parameters, used by `"turbulence"` only.
    pub turbulence: TurbulenceConstants,
}

impl Default for PropagatorSettings {
    fn default() -> Self {
        Self {
            av_clean: false,
            target: ExecutionTarget::Cpu,
            theta: DEFAULT_THETA,
            turbulence: TurbulenceConstants::default(),
        }
    }
}

/// Build the propagator called `name`.
///
/// ```
/// use std::sync::Arc;
/// use sphve_domain::SingleRank;
/// use sphve_propagator::{make_propagator, Propagator, PropagatorSettings};
///
/// let p = make_propagator("ve", &PropagatorSettings::default(), Arc::new(SingleRank)).unwrap();
/// assert_eq!(p.name(), "ve");
/// assert!(make_propagator("std", &PropagatorSettings::default(), Arc::new(SingleRank)).is_err());
/// ```
pub fn make_propagator(
    name: &str,
    settings: &PropagatorSettings,
    comm: Arc<dyn Communicator>,
) -> Result<Box<dyn Propagator>, PropagatorError> {
    let gravity = make_holder(settings.target, settings.theta);
    match name {
        "ve" => Ok(Box::new(HydroVeProp::new(settings.av_clean, gravity, comm)?)),
        "turbulence" => Ok(Box::new(TurbVeProp::new(
            settings.av_clean,
            settings.turbulence.clone(),
            gravity,
            comm,
        )?)),
        other => Err(PropagatorError::UnknownPropagator {
            name: other.to_string(),
        }),
    }
}

//! Per-step performance metrics for the simulation driver.
//!
//! [`StepMetrics`] captures the wall-clock cost of a step, phase by
//! phase, together with the timestep it produced.

use std::time::Duration;

use sphve_fields::Attributes;
use sphve_propagator::PhaseTimer;

/// Timing and progress of a single step.
///
/// Durations are in microseconds.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StepMetrics {
    /// Iteration the step completed.
    pub iteration: u64,
    /// Wall-clock time of the whole step.
    pub total_us: u64,
    /// Per-phase execution times: `(name, microseconds)`, in phase order.
    pub phase_us: Vec<(String, u64)>,
    /// Timestep taken.
    pub dt: f64,
    /// Simulation time after the step.
    pub time: f64,
    /// Resident particles after the step, halos included.
    pub resident: usize,
}

impl StepMetrics {
    /// Collect the metrics of the step `timer` just finished.
    pub fn from_step(timer: &PhaseTimer, total: Duration, attrs: &Attributes, resident: usize) -> Self {
        Self {
            iteration: attrs.iteration,
            total_us: micros(total),
            phase_us: timer
                .checkpoints()
                .iter()
                .map(|(name, d)| (name.to_string(), micros(*d)))
                .collect(),
            dt: attrs.min_dt,
            time: attrs.time,
            resident,
        }
    }

    /// Time of phase `name`, if it ran.
    pub fn phase(&self, name: &str) -> Option<u64> {
        self.phase_us.iter().find(|(n, _)| n == name).map(|(_, us)| *us)
    }
}

fn micros(d: Duration) -> u64 {
    u64::try_from(d.as_micros()).unwrap_or(u64::MAX)
}

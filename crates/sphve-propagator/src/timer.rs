//! Per-phase wall-clock timing of a step.

use std::time::{Duration, Instant};

use indexmap::IndexMap;

/// Records a named checkpoint after every pipeline phase.
///
/// Each checkpoint stores the time since the previous one. Phase timings
/// go to `log::debug!`; the per-step summary goes to `log::info!` on the
/// root rank only.
#[derive(Clone, Debug)]
pub struct PhaseTimer {
    is_root: bool,
    last: Option<Instant>,
    started: Option<Instant>,
    checkpoints: Vec<(&'static str, Duration)>,
    totals: IndexMap<&'static str, Duration>,
    steps: u64,
}

impl PhaseTimer {
    /// Timer reporting summaries when `is_root`.
    pub fn new(is_root: bool) -> Self {
        Self {
            is_root,
            last: None,
            started: None,
            checkpoints: Vec::new(),
            totals: IndexMap::new(),
            steps: 0,
        }
    }

    /// Begin a step, forgetting the previous step's checkpoints.
    pub fn start(&mut self) {
        let now = Instant::now();
        self.started = Some(now);
        self.last = Some(now);
        self.checkpoints.clear();
    }

    /// Record the end of phase `name`.
    pub fn step(&mut self, name: &'static str) {
        let now = Instant::now();
        let elapsed = self.last.map_or(Duration::ZERO, |t| now - t);
        self.last = Some(now);
        log::debug!("{name}: {:.3} ms", elapsed.as_secs_f64() * 1e3);
        self.checkpoints.push((name, elapsed));
        *self.totals.entry(name).or_default() += elapsed;
    }

    /// End the step and return its wall-clock time.
    pub fn stop(&mut self, iteration: u64) -> Duration {
        let total = self.started.take().map_or(Duration::ZERO, |t| t.elapsed());
        self.last = None;
        self.steps += 1;
        if self.is_root {
            let slowest = self.checkpoints.iter().max_by_key(|(_, d)| *d);
            match slowest {
                Some((name, d)) => log::info!(
                    "step {iteration}: {:.3} s over {} phases, slowest '{name}' {:.3} s",
                    total.as_secs_f64(),
                    self.checkpoints.len(),
                    d.as_secs_f64()
                ),
                None => log::info!("step {iteration}: {:.3} s", total.as_secs_f64()),
            }
        }
        total
    }

    /// Checkpoints of the current or last step, in order.
    pub fn checkpoints(&self) -> &[(&'static str, Duration)] {
        &self.checkpoints
    }

    /// Checkpoint names of the current or last step.
    pub fn names(&self) -> Vec<&'static str> {
        self.checkpoints.iter().map(|(n, _)| *n).collect()
    }

    /// Time per phase summed over every step.
    pub fn totals(&self) -> &IndexMap<&'static str, Duration> {
        &self.totals
    }

    /// Completed steps.
    pub fn steps(&self) -> u64 {
        self.steps
    }
}

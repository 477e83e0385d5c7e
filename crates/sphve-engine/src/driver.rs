//! The simulation driver.
//!
//! [`Simulation`] owns one rank's share of a run: the propagator, the
//! domain and the particle dataset. Each [`step()`](Simulation::step)
//! runs the propagator's pipeline on the context's worker pool and then
//! advances the iteration counter; [`run()`](Simulation::run) repeats that
//! and writes checkpoints and output at the configured cadence.
//!
//! # Ownership model
//!
//! `Simulation` is [`Send`] but not [`Sync`]. All mutating methods take
//! `&mut self`.

use std::error::Error;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use sphve_checkpoint::{
    load_attributes, read_fields, store_attributes, write_fields, BinaryFileReader,
    BinaryFileWriter, CheckpointError, CheckpointPath, FileReader, FileWriter,
};
use sphve_core::{FieldError, FieldId, StepError};
use sphve_domain::{Communicator, Domain, LocalDomain};
use sphve_fields::ParticleData;
use sphve_propagator::{make_propagator, Propagator, PropagatorError};

use crate::config::{ConfigError, SimConfig};
use crate::context::ExecutionContext;
use crate::metrics::StepMetrics;

const _: () = {
    #[allow(dead_code)]
    fn assert_send<T: Send>() {}
    #[allow(dead_code)]
    fn check() {
        assert_send::<Simulation>();
    }
};

// ── EngineError ────────────────────────────────────────────────────

/// Errors that abort a run.
#[derive(Debug)]
pub enum EngineError {
    /// Invalid configuration.
    Config(ConfigError),
    /// Propagator construction, output or restore failed.
    Propagator(PropagatorError),
    /// A step failed; the dataset is left as the failing phase found it.
    Step(StepError),
    /// Checkpoint archive I/O failed.
    Checkpoint(CheckpointError),
    /// Field declarations were rejected.
    Field(FieldError),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Propagator(e) => write!(f, "propagator: {e}"),
            Self::Step(e) => write!(f, "step: {e}"),
            Self::Checkpoint(e) => write!(f, "checkpoint: {e}"),
            Self::Field(e) => write!(f, "fields: {e}"),
        }
    }
}

impl Error for EngineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Propagator(e) => Some(e),
            Self::Step(e) => Some(e),
            Self::Checkpoint(e) => Some(e),
            Self::Field(e) => Some(e),
        }
    }
}

impl From<ConfigError> for EngineError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<PropagatorError> for EngineError {
    fn from(e: PropagatorError) -> Self {
        Self::Propagator(e)
    }
}

impl From<StepError> for EngineError {
    fn from(e: StepError) -> Self {
        Self::Step(e)
    }
}

impl From<CheckpointError> for EngineError {
    fn from(e: CheckpointError) -> Self {
        Self::Checkpoint(e)
    }
}

impl From<FieldError> for EngineError {
    fn from(e: FieldError) -> Self {
        Self::Field(e)
    }
}

// ── RunSummary ─────────────────────────────────────────────────────

/// Outcome of [`Simulation::run()`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunSummary {
    /// Steps taken by this call.
    pub steps: u64,
    /// Iteration counter after the last step.
    pub iteration: u64,
    /// Simulation time after the last step.
    pub time: f64,
    /// Checkpoint steps written.
    pub checkpoints: usize,
    /// Output steps written.
    pub outputs: usize,
    /// Output names that could not be written, from the last output.
    pub missing_output: Vec<String>,
    /// Wall-clock time of the call.
    pub wall: Duration,
}

// ── Simulation ─────────────────────────────────────────────────────

/// One rank of a running simulation.
pub struct Simulation {
    propagator: Box<dyn Propagator>,
    domain: Box<dyn Domain + Send>,
    data: ParticleData,
    comm: Arc<dyn Communicator>,
    last_metrics: StepMetrics,
}

impl Simulation {
    /// Start from `data` on the single-rank reference domain.
    pub fn new(
        config: &SimConfig,
        ctx: &ExecutionContext,
        data: ParticleData,
    ) -> Result<Self, EngineError> {
        let domain = LocalDomain::with_bucket_size(config.sim_box, config.bucket_size);
        Self::with_domain(config, ctx, data, Box::new(domain))
    }

    /// Start from `data` on `domain`.
    ///
    /// Builds the configured propagator, activates its fields on `data` and
    /// selects the configured output columns.
    pub fn with_domain(
        config: &SimConfig,
        ctx: &ExecutionContext,
        mut data: ParticleData,
        domain: Box<dyn Domain + Send>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let propagator = make_propagator(
            config.propagator.name(),
            &config.propagator_settings(),
            ctx.comm(),
        )?;
        propagator.activate_fields(&mut data)?;
        data.set_output_fields(&config.output_fields);
        let comm = ctx.comm();
        if data.attrs.num_particles_global == 0 {
            data.attrs.num_particles_global = comm.all_reduce_sum(data.len() as f64) as u64;
        }
        if comm.is_root() {
            log::info!(
                "propagator '{}' with {} particles, conserved fields: {}",
                propagator.name(),
                data.attrs.num_particles_global,
                propagator.conserved_fields().join(" ")
            );
        }
        Ok(Self {
            propagator,
            domain,
            data,
            comm,
            last_metrics: StepMetrics::default(),
        })
    }

    /// Resume from the checkpoint at `location` (`path[,step]`, last step
    /// by default) on the reference domain.
    pub fn restart(
        config: &SimConfig,
        ctx: &ExecutionContext,
        location: &str,
    ) -> Result<Self, EngineError> {
        let domain = LocalDomain::with_bucket_size(config.sim_box, config.bucket_size);
        Self::restart_with_domain(config, ctx, location, Box::new(domain))
    }

    /// Resume from the checkpoint at `location` on `domain`.
    ///
    /// Restores the dataset attributes, the conserved columns and the
    /// propagator's own state from the same step.
    pub fn restart_with_domain(
        config: &SimConfig,
        ctx: &ExecutionContext,
        location: &str,
        domain: Box<dyn Domain + Send>,
    ) -> Result<Self, EngineError> {
        let at = CheckpointPath::parse(location)?;
        let mut reader = BinaryFileReader::new();
        reader.set_step(&at.path, at.step)?;

        let mut sim = Self::with_domain(config, ctx, ctx.new_dataset(0), domain)?;
        let fields = sim.checkpoint_fields();
        load_attributes(&reader, &mut sim.data.attrs)?;
        read_fields(&reader, &mut sim.data, &fields)?;
        reader.close_step();
        sim.propagator.load(location, sim.comm.as_ref())?;

        if sim.comm.is_root() {
            log::info!(
                "restarted from {} at iteration {}, time {:.6e}",
                at.path.display(),
                sim.data.attrs.iteration,
                sim.data.attrs.time
            );
        }
        Ok(sim)
    }

    /// Advance by one step.
    pub fn step(&mut self, ctx: &ExecutionContext) -> Result<&StepMetrics, EngineError> {
        let started = Instant::now();
        let Self {
            propagator,
            domain,
            data,
            ..
        } = self;
        ctx.install(|| propagator.step(domain.as_mut(), data))?;
        self.data.attrs.iteration += 1;
        self.last_metrics = StepMetrics::from_step(
            self.propagator.timer(),
            started.elapsed(),
            &self.data.attrs,
            self.data.len(),
        );
        Ok(&self.last_metrics)
    }

    /// Run `config.max_steps` steps, writing checkpoints and output at the
    /// configured cadence.
    pub fn run(
        &mut self,
        ctx: &ExecutionContext,
        config: &SimConfig,
    ) -> Result<RunSummary, EngineError> {
        let started = Instant::now();
        let mut summary = RunSummary::default();
        for _ in 0..config.max_steps {
            self.step(ctx)?;
            summary.steps += 1;
            let iteration = self.data.attrs.iteration;
            if let (Some(every), Some(path)) = (config.checkpoint_every, &config.checkpoint_path) {
                if iteration % every == 0 {
                    self.write_checkpoint(path)?;
                    summary.checkpoints += 1;
                }
            }
            if let (Some(every), Some(path)) = (config.output_every, &config.output_path) {
                if iteration % every == 0 {
                    summary.missing_output = self.write_output(path)?;
                    summary.outputs += 1;
                }
            }
        }
        summary.iteration = self.data.attrs.iteration;
        summary.time = self.data.attrs.time;
        summary.wall = started.elapsed();
        if self.comm.is_root() {
            log::info!(
                "{} steps in {:.3} s, now at iteration {} time {:.6e}",
                summary.steps,
                summary.wall.as_secs_f64(),
                summary.iteration,
                summary.time
            );
        }
        Ok(summary)
    }

    /// Conserved columns in checkpoint order.
    pub fn checkpoint_fields(&self) -> Vec<FieldId> {
        self.propagator
            .conserved_fields()
            .into_iter()
            .filter_map(FieldId::from_name)
            .collect()
    }

    /// Add the attributes, the propagator state and the owned part of every
    /// conserved column to `writer` as one step.
    pub fn checkpoint(&self, writer: &mut dyn FileWriter) -> Result<(), EngineError> {
        store_attributes(writer, &self.data.attrs)?;
        self.propagator.save(writer)?;
        let (first, last) = (self.domain.start_index(), self.domain.end_index());
        write_fields(writer, &self.data, first, last, &self.checkpoint_fields())?;
        writer.close_step()?;
        Ok(())
    }

    /// Append a checkpoint step to the archive at `path`.
    pub fn write_checkpoint(&self, path: &Path) -> Result<(), EngineError> {
        let mut writer = BinaryFileWriter::append(path)?;
        self.checkpoint(&mut writer)?;
        if self.comm.is_root() {
            log::info!(
                "checkpoint {} of iteration {} written to {}",
                writer.steps_written() - 1,
                self.data.attrs.iteration,
                path.display()
            );
        }
        Ok(())
    }

    /// Write the selected output columns to `writer` as one step and
    /// return the names that could not be written.
    pub fn output(&mut self, writer: &mut dyn FileWriter) -> Result<Vec<String>, EngineError> {
        store_attributes(writer, &self.data.attrs)?;
        let (first, last) = (self.domain.start_index(), self.domain.end_index());
        let sim_box = self.domain.sim_box();
        let missing = self
            .propagator
            .save_fields(writer, first, last, &mut self.data, &sim_box)?;
        writer.close_step()?;
        Ok(missing)
    }

    /// Append an output step to the archive at `path`.
    pub fn write_output(&mut self, path: &Path) -> Result<Vec<String>, EngineError> {
        let mut writer = BinaryFileWriter::append(path)?;
        self.output(&mut writer)
    }

    /// The particle dataset.
    pub fn data(&self) -> &ParticleData {
        &self.data
    }

    /// Mutable access to the particle dataset, for setting initial
    /// conditions.
    pub fn data_mut(&mut self) -> &mut ParticleData {
        &mut self.data
    }

    /// The propagator.
    pub fn propagator(&self) -> &dyn Propagator {
        self.propagator.as_ref()
    }

    /// The domain.
    pub fn domain(&self) -> &dyn Domain {
        self.domain.as_ref()
    }

    /// Metrics of the most recent step.
    pub fn last_metrics(&self) -> &StepMetrics {
        &self.last_metrics
    }
}

impl fmt::Debug for Simulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulation")
            .field("propagator", &self.propagator.name())
            .field("particles", &self.data.len())
            .field("iteration", &self.data.attrs.iteration)
            .field("time", &self.data.attrs.time)
            .finish()
    }
}

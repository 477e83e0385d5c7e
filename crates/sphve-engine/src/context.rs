//! Process-level setup shared by every component of a run.
//!
//! [`bootstrap`] validates the configuration, installs the logger and
//! builds the worker pool; [`teardown`] synchronizes the ranks and
//! releases them. Nothing here is global state: the returned
//! [`ExecutionContext`] is passed to the components that need it.

use std::fmt;
use std::sync::Arc;

use rayon::{ThreadPool, ThreadPoolBuilder};
use sphve_core::ExecutionTarget;
use sphve_domain::{Communicator, SingleRank};
use sphve_fields::ParticleData;

use crate::config::{ConfigError, SimConfig};

/// Worker pool, communicator and execution target of a run.
pub struct ExecutionContext {
    pool: ThreadPool,
    comm: Arc<dyn Communicator>,
    target: ExecutionTarget,
}

impl ExecutionContext {
    /// Shared handle to the communicator.
    pub fn comm(&self) -> Arc<dyn Communicator> {
        Arc::clone(&self.comm)
    }

    /// Whether this rank reports run-wide diagnostics.
    pub fn is_root(&self) -> bool {
        self.comm.is_root()
    }

    /// Execution target fixed at bootstrap.
    pub fn target(&self) -> ExecutionTarget {
        self.target
    }

    /// Worker threads in the pool.
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run `op` with the kernels' parallel iterators on this context's pool.
    pub fn install<R: Send>(&self, op: impl FnOnce() -> R + Send) -> R {
        self.pool.install(op)
    }

    /// Empty dataset of `n` particles, with an accelerator mirror when the
    /// target has one.
    pub fn new_dataset(&self, n: usize) -> ParticleData {
        if self.target.has_device() {
            ParticleData::with_device(n)
        } else {
            ParticleData::new(n)
        }
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("rank", &self.comm.rank())
            .field("num_ranks", &self.comm.num_ranks())
            .field("threads", &self.threads())
            .field("target", &self.target)
            .finish()
    }
}

/// Set up a single-rank run.
pub fn bootstrap(config: &SimConfig) -> Result<ExecutionContext, ConfigError> {
    bootstrap_with(config, Arc::new(SingleRank))
}

/// Set up a run on the ranks of `comm`.
pub fn bootstrap_with(
    config: &SimConfig,
    comm: Arc<dyn Communicator>,
) -> Result<ExecutionContext, ConfigError> {
    config.validate()?;
    if let Err(e) = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init()
    {
        log::debug!("logger already installed: {e}");
    }

    let rank = comm.rank();
    let mut builder = ThreadPoolBuilder::new().thread_name(move |i| format!("sphve-{rank}-{i}"));
    if let Some(n) = config.threads {
        builder = builder.num_threads(n);
    }
    let pool = builder.build().map_err(|e| ConfigError::ThreadPool {
        reason: e.to_string(),
    })?;

    let ctx = ExecutionContext {
        pool,
        comm,
        target: config.target,
    };
    if ctx.is_root() {
        log::info!(
            "sphve {} on {} rank(s), {} thread(s) per rank, target {}",
            env!("CARGO_PKG_VERSION"),
            ctx.comm.num_ranks(),
            ctx.threads(),
            ctx.target
        );
    }
    Ok(ctx)
}

/// Wait for every rank, then release the context.
pub fn teardown(ctx: ExecutionContext) {
    ctx.comm.barrier();
    if ctx.is_root() {
        log::info!("sphve run finished");
    }
}

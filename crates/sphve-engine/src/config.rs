//! Run configuration, validation, and error types.
//!
//! [`SimConfig`] is the input to [`bootstrap`](crate::bootstrap) and
//! [`Simulation`](crate::Simulation). [`validate()`](SimConfig::validate)
//! checks every structural invariant at startup so that a bad value fails
//! before any particle is touched.

use std::error::Error;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use sphve_core::{ExecutionTarget, SimBox};
use sphve_kernels::{TurbulenceConstants, TurbulenceError};
use sphve_propagator::{PropagatorSettings, PROPAGATOR_NAMES};

// ── PropagatorChoice ───────────────────────────────────────────────

/// Which propagator drives the run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PropagatorChoice {
    /// Generalized volume-element hydrodynamics.
    #[default]
    Ve,
    /// [`Ve`](Self::Ve) with turbulent stirring.
    Turbulence,
}

impl PropagatorChoice {
    /// Name understood by the propagator factory.
    pub fn name(self) -> &'static str {
        match self {
            Self::Ve => "ve",
            Self::Turbulence => "turbulence",
        }
    }
}

impl fmt::Display for PropagatorChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PropagatorChoice {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ve" => Ok(Self::Ve),
            "turbulence" | "turbulence-ve" => Ok(Self::Turbulence),
            _ => Err(ConfigError::UnknownPropagator {
                name: s.to_string(),
            }),
        }
    }
}

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected by [`SimConfig::validate()`] and during bootstrap.
#[derive(Debug, PartialEq)]
pub enum ConfigError {
    /// The propagator name is not one of the known propagators.
    UnknownPropagator {
        /// The rejected name.
        name: String,
    },
    /// The execution target name is not recognized.
    UnknownTarget {
        /// The rejected name.
        name: String,
    },
    /// The simulation box has a non-positive or non-finite extent.
    InvalidBox {
        /// Axis with the bad extent.
        axis: usize,
    },
    /// The multipole opening angle is NaN, infinite, or outside `(0, 1]`.
    InvalidTheta {
        /// The invalid value.
        value: f64,
    },
    /// A tree bucket must hold at least one particle.
    BucketSizeZero,
    /// An explicit thread count of zero.
    ThreadCountZero,
    /// A write frequency of zero.
    FrequencyZero {
        /// Which frequency.
        which: &'static str,
    },
    /// Checkpoints are requested but no path is configured.
    MissingCheckpointPath,
    /// Output is requested but no path or no fields are configured.
    MissingOutput {
        /// What is missing.
        reason: &'static str,
    },
    /// Stirring parameters are out of range.
    Turbulence(TurbulenceError),
    /// The worker pool could not be built.
    ThreadPool {
        /// Description of the failure.
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownPropagator { name } => write!(
                f,
                "unknown propagator '{name}', expected one of {}",
                PROPAGATOR_NAMES.join(", ")
            ),
            Self::UnknownTarget { name } => write!(f, "unknown execution target '{name}'"),
            Self::InvalidBox { axis } => {
                write!(f, "simulation box has no positive finite extent on axis {axis}")
            }
            Self::InvalidTheta { value } => {
                write!(f, "theta must be finite and in (0, 1], got {value}")
            }
            Self::BucketSizeZero => write!(f, "bucket_size must be at least 1"),
            Self::ThreadCountZero => write!(f, "threads must be at least 1 when set"),
            Self::FrequencyZero { which } => write!(f, "{which} must be at least 1 when set"),
            Self::MissingCheckpointPath => {
                write!(f, "checkpoint frequency set without a checkpoint path")
            }
            Self::MissingOutput { reason } => write!(f, "output requested but {reason}"),
            Self::Turbulence(e) => write!(f, "turbulence: {e}"),
            Self::ThreadPool { reason } => write!(f, "worker pool: {reason}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Turbulence(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TurbulenceError> for ConfigError {
    fn from(e: TurbulenceError) -> Self {
        Self::Turbulence(e)
    }
}

// ── SimConfig ──────────────────────────────────────────────────────

/// Complete configuration of a run.
#[derive(Clone, Debug, PartialEq)]
pub struct SimConfig {
    /// Propagator driving the run. Default: [`PropagatorChoice::Ve`].
    pub propagator: PropagatorChoice,
    /// Select the AV-cleaning field schema. Default: `false`.
    pub av_clean: bool,
    /// Where gravity and the particle mirror live. Default: CPU.
    pub target: ExecutionTarget,
    /// Multipole opening angle. Default: 0.5.
    pub theta: f64,
    /// Simulation box of the reference domain. Default: open unit cube.
    pub sim_box: SimBox,
    /// Particles per tree leaf. Default: 64.
    pub bucket_size: usize,
    /// Worker threads. `None` uses rayon's default.
    pub threads: Option<usize>,
    /// Steps to run. Default: 10.
    pub max_steps: u64,
    /// Write a checkpoint every this many steps. `None` disables.
    pub checkpoint_every: Option<u64>,
    /// Checkpoint archive, also used for restarts.
    pub checkpoint_path: Option<PathBuf>,
    /// Write output every this many steps. `None` disables.
    pub output_every: Option<u64>,
    /// Output archive.
    pub output_path: Option<PathBuf>,
    /// Columns written to output.
    pub output_fields: Vec<String>,
    /// Stirring parameters, used by the turbulence propagator.
    pub turbulence: TurbulenceConstants,
}

impl Default for SimConfig {
    fn default() -> Self {
        let settings = PropagatorSettings::default();
        Self {
            propagator: PropagatorChoice::Ve,
            av_clean: settings.av_clean,
            target: settings.target,
            theta: settings.theta,
            sim_box: SimBox::cube(0.0, 1.0),
            bucket_size: sphve_domain::DEFAULT_BUCKET_SIZE,
            threads: None,
            max_steps: 10,
            checkpoint_every: None,
            checkpoint_path: None,
            output_every: None,
            output_path: None,
            output_fields: Vec::new(),
            turbulence: settings.turbulence,
        }
    }
}

impl SimConfig {
    /// Set the execution target from its configuration name.
    pub fn set_target(&mut self, name: &str) -> Result<(), ConfigError> {
        self.target = ExecutionTarget::from_name(name).ok_or_else(|| ConfigError::UnknownTarget {
            name: name.to_string(),
        })?;
        Ok(())
    }

    /// Validate all structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // 1. Box extents.
        for axis in 0..3 {
            let l = self.sim_box.hi[axis] - self.sim_box.lo[axis];
            if !(l.is_finite() && l > 0.0) {
                return Err(ConfigError::InvalidBox { axis });
            }
        }
        // 2. Opening angle.
        if !(self.theta.is_finite() && self.theta > 0.0 && self.theta <= 1.0) {
            return Err(ConfigError::InvalidTheta { value: self.theta });
        }
        // 3. Tree and pool sizes.
        if self.bucket_size == 0 {
            return Err(ConfigError::BucketSizeZero);
        }
        if self.threads == Some(0) {
            return Err(ConfigError::ThreadCountZero);
        }
        // 4. Checkpoint cadence needs a destination.
        if self.checkpoint_every == Some(0) {
            return Err(ConfigError::FrequencyZero {
                which: "checkpoint_every",
            });
        }
        if self.checkpoint_every.is_some() && self.checkpoint_path.is_none() {
            return Err(ConfigError::MissingCheckpointPath);
        }
        // 5. Output cadence needs a destination and a selection.
        if self.output_every == Some(0) {
            return Err(ConfigError::FrequencyZero {
                which: "output_every",
            });
        }
        if self.output_every.is_some() {
            if self.output_path.is_none() {
                return Err(ConfigError::MissingOutput {
                    reason: "no output path is set",
                });
            }
            if self.output_fields.is_empty() {
                return Err(ConfigError::MissingOutput {
                    reason: "no output fields are selected",
                });
            }
        }
        // 6. Stirring, only when it will be built.
        if self.propagator == PropagatorChoice::Turbulence {
            self.turbulence.validate()?;
        }
        Ok(())
    }

    /// Construction parameters for the propagator factory.
    pub fn propagator_settings(&self) -> PropagatorSettings {
        PropagatorSettings {
            av_clean: self.av_clean,
            target: self.target,
            theta: self.theta,
            turbulence: self.turbulence.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(SimConfig::default().validate().is_ok());
    }

    #[test]
    fn propagator_choice_parses_names() {
        assert_eq!("ve".parse::<PropagatorChoice>(), Ok(PropagatorChoice::Ve));
        assert_eq!(
            " Turbulence ".parse::<PropagatorChoice>(),
            Ok(PropagatorChoice::Turbulence)
        );
        match "std".parse::<PropagatorChoice>() {
            Err(ConfigError::UnknownPropagator { name }) => assert_eq!(name, "std"),
            other => panic!("expected UnknownPropagator, got {other:?}"),
        }
        for name in PROPAGATOR_NAMES {
            assert_eq!(name.parse::<PropagatorChoice>().map(|c| c.name()), Ok(name));
        }
    }

    #[test]
    fn target_names_resolve() {
        let mut cfg = SimConfig::default();
        cfg.set_target("gpu").unwrap();
        assert_eq!(cfg.target, ExecutionTarget::Accelerator);
        assert!(matches!(
            cfg.set_target("tpu"),
            Err(ConfigError::UnknownTarget { .. })
        ));
        assert_eq!(cfg.target, ExecutionTarget::Accelerator);
    }

    #[test]
    fn degenerate_box_fails() {
        let mut cfg = SimConfig::default();
        cfg.sim_box.hi[2] = cfg.sim_box.lo[2];
        assert_eq!(cfg.validate(), Err(ConfigError::InvalidBox { axis: 2 }));
    }

    #[test]
    fn theta_out_of_range_fails() {
        for theta in [0.0, -0.3, 1.5, f64::NAN] {
            let cfg = SimConfig {
                theta,
                ..SimConfig::default()
            };
            match cfg.validate() {
                Err(ConfigError::InvalidTheta { .. }) => {}
                other => panic!("expected InvalidTheta for {theta}, got {other:?}"),
            }
        }
    }

    #[test]
    fn zero_sizes_fail() {
        let cfg = SimConfig {
            bucket_size: 0,
            ..SimConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::BucketSizeZero));
        let cfg = SimConfig {
            threads: Some(0),
            ..SimConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::ThreadCountZero));
    }

    #[test]
    fn checkpoint_cadence_needs_a_path() {
        let mut cfg = SimConfig {
            checkpoint_every: Some(5),
            ..SimConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::MissingCheckpointPath));
        cfg.checkpoint_path = Some(PathBuf::from("run.sphv"));
        assert!(cfg.validate().is_ok());
        cfg.checkpoint_every = Some(0);
        assert!(matches!(cfg.validate(), Err(ConfigError::FrequencyZero { .. })));
    }

    #[test]
    fn output_cadence_needs_path_and_fields() {
        let mut cfg = SimConfig {
            output_every: Some(1),
            output_path: Some(PathBuf::from("out.sphv")),
            ..SimConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::MissingOutput { .. })));
        cfg.output_fields = vec!["rho".to_string()];
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn stirring_is_checked_only_when_used() {
        let mut cfg = SimConfig::default();
        cfg.turbulence.st_decay = -1.0;
        assert!(cfg.validate().is_ok());
        cfg.propagator = PropagatorChoice::Turbulence;
        match cfg.validate() {
            Err(ConfigError::Turbulence(TurbulenceError::InvalidParameter { name, .. })) => {
                assert_eq!(name, "stDecay");
            }
            other => panic!("expected Turbulence, got {other:?}"),
        }
    }

    #[test]
    fn settings_carry_the_schema_choice() {
        let cfg = SimConfig {
            av_clean: true,
            theta: 0.7,
            ..SimConfig::default()
        };
        let s = cfg.propagator_settings();
        assert!(s.av_clean);
        assert_eq!(s.theta, 0.7);
        assert_eq!(s.target, ExecutionTarget::Cpu);
    }

    #[test]
    fn errors_display_their_cause() {
        let err = ConfigError::from(TurbulenceError::NoModes {
            k_min: 5.0,
            k_max: 4.0,
        });
        assert!(err.to_string().starts_with("turbulence:"));
        assert!(err.source().is_some());
        assert!(ConfigError::UnknownPropagator { name: "x".into() }
            .to_string()
            .contains("ve, turbulence"));
    }
}

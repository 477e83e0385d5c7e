//! Stochastic turbulence stirring.
//!
//! The driving field is a sum of Fourier modes whose wave vectors lie in a
//! shell `[k_min, k_max]` (in units of `2 pi / L`). Each mode carries six
//! phase components, the real and imaginary parts of a 3-vector, evolved
//! as Ornstein-Uhlenbeck processes with Gaussian increments from a seeded
//! ChaCha8 generator. The acceleration at a point is the sum over modes of
//! the Helmholtz-weighted projection of the phases.
//!
//! The generator state is part of [`TurbulenceState`], so a restored run
//! continues the same random sequence.

use std::error::Error;
use std::f64::consts::PI;
use std::fmt;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use sphve_core::{FieldError, FieldId, SimBox};
use sphve_fields::ParticleData;

use crate::kernel::dot;

/// Seed of the stirring generator unless configured otherwise.
pub const DEFAULT_SEED: u64 = 251_299;

/// Phase components per mode.
pub const PHASES_PER_MODE: usize = 6;

/// Errors from configuring or restoring the stirring model.
#[derive(Clone, Debug, PartialEq)]
pub enum TurbulenceError {
    /// A stirring parameter is out of range.
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Offending value.
        value: f64,
    },
    /// No integer wave vector lies in the configured shell.
    NoModes {
        /// Inner radius of the shell.
        k_min: f64,
        /// Outer radius of the shell.
        k_max: f64,
    },
    /// A restored phase vector does not match the mode count.
    PhaseCountMismatch {
        /// Phases required by the configured modes.
        expected: usize,
        /// Phases supplied.
        found: usize,
    },
}

impl fmt::Display for TurbulenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidParameter { name, value } => {
                write!(f, "stirring parameter {name} out of range: {value}")
            }
            Self::NoModes { k_min, k_max } => {
                write!(f, "no stirring modes with {k_min} <= |k| <= {k_max}")
            }
            Self::PhaseCountMismatch { expected, found } => {
                write!(f, "expected {expected} stirring phases, found {found}")
            }
        }
    }
}

impl Error for TurbulenceError {}

/// Stirring parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct TurbulenceConstants {
    /// Cap on the number of modes.
    pub st_max_modes: usize,
    /// Autocorrelation time of the phases.
    pub st_decay: f64,
    /// Variance of each phase component.
    pub st_energy: f64,
    /// Weight of the solenoidal part: 1 is divergence free, 0 curl free.
    pub st_sol_weight: f64,
    /// Inner radius of the wave-number shell, in units of `2 pi / L`.
    pub k_min: f64,
    /// Outer radius of the wave-number shell, in units of `2 pi / L`.
    pub k_max: f64,
    /// Generator seed.
    pub seed: u64,
}

impl Default for TurbulenceConstants {
    fn default() -> Self {
        Self {
            st_max_modes: 100_000,
            st_decay: 0.5,
            st_energy: 5.0e-3,
            st_sol_weight: 0.5,
            k_min: 1.0,
            k_max: 3.0,
            seed: DEFAULT_SEED,
        }
    }
}

impl TurbulenceConstants {
    /// Check every parameter range.
    pub fn validate(&self) -> Result<(), TurbulenceError> {
        let invalid = |name, value| Err(TurbulenceError::InvalidParameter { name, value });
        if !(self.st_decay > 0.0 && self.st_decay.is_finite()) {
            return invalid("stDecay", self.st_decay);
        }
        if !(self.st_energy >= 0.0 && self.st_energy.is_finite()) {
            return invalid("stEnergy", self.st_energy);
        }
        if !(0.0..=1.0).contains(&self.st_sol_weight) {
            return invalid("stSolWeight", self.st_sol_weight);
        }
        if self.st_max_modes == 0 {
            return invalid("stMaxModes", 0.0);
        }
        if !(self.k_min > 0.0 && self.k_min <= self.k_max && self.k_max.is_finite()) {
            return invalid("kMin", self.k_min);
        }
        Ok(())
    }
}

/// Persistable stirring state.
#[derive(Clone, Debug, PartialEq)]
pub struct TurbulenceState {
    /// Phase components, six per mode.
    pub phases: Vec<f64>,
    /// Generator seed.
    pub seed: [u8; 32],
    /// Generator stream.
    pub stream: u64,
    /// Generator word position.
    pub word_pos: u128,
}

/// The stirring model: modes, phases and generator.
#[derive(Clone, Debug)]
pub struct TurbulenceData {
    constants: TurbulenceConstants,
    modes: Vec<[f64; 3]>,
    phases: Vec<f64>,
    rng: ChaCha8Rng,
}

fn shell_modes(k_min: f64, k_max: f64, cap: usize) -> Vec<[f64; 3]> {
    let n = k_max.floor() as i64;
    let mut modes = Vec::new();
    for nx in 0..=n {
        for ny in -n..=n {
            for nz in -n..=n {
                // One of each +k/-k pair.
                let upper = nx > 0 || (nx == 0 && (ny > 0 || (ny == 0 && nz > 0)));
                let k = [nx as f64, ny as f64, nz as f64];
                let len = dot(k, k).sqrt();
                if upper && len >= k_min && len <= k_max {
                    modes.push(k);
                }
            }
        }
    }
    modes.truncate(cap);
    modes
}

fn gaussian(rng: &mut ChaCha8Rng) -> f64 {
    let u1: f64 = rng.random::<f64>().max(1e-300);
    let u2: f64 = rng.random();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

impl TurbulenceData {
    /// Set up the modes and draw the initial phases from the stationary
    /// distribution.
    pub fn new(constants: TurbulenceConstants) -> Result<Self, TurbulenceError> {
        constants.validate()?;
        let modes = shell_modes(constants.k_min, constants.k_max, constants.st_max_modes);
        if modes.is_empty() {
            return Err(TurbulenceError::NoModes {
                k_min: constants.k_min,
                k_max: constants.k_max,
            });
        }
        let mut rng = ChaCha8Rng::seed_from_u64(constants.seed);
        let sigma = constants.st_energy.sqrt();
        let phases = (0..modes.len() * PHASES_PER_MODE)
            .map(|_| sigma * gaussian(&mut rng))
            .collect();
        Ok(Self {
            constants,
            modes,
            phases,
            rng,
        })
    }

    /// Stirring parameters.
    pub fn constants(&self) -> &TurbulenceConstants {
        &self.constants
    }

    /// Number of driven modes.
    pub fn num_modes(&self) -> usize {
        self.modes.len()
    }

    /// Integer wave vectors of the modes.
    pub fn modes(&self) -> &[[f64; 3]] {
        &self.modes
    }

    /// Current phase components.
    pub fn phases(&self) -> &[f64] {
        &self.phases
    }

    /// Advance the phases by `dt`.
    pub fn evolve(&mut self, dt: f64) {
        let damping = (-dt / self.constants.st_decay).exp();
        let kick = (self.constants.st_energy * (1.0 - damping * damping)).sqrt();
        for p in &mut self.phases {
            *p = damping * *p + kick * gaussian(&mut self.rng);
        }
    }

    /// Physical wave vectors and projected phase pairs for a box of
    /// `lengths`.
    fn projected(&self, lengths: [f64; 3]) -> Vec<([f64; 3], [f64; 3], [f64; 3])> {
        let w = self.constants.st_sol_weight;
        let project = |v: [f64; 3], khat: [f64; 3]| -> [f64; 3] {
            let long = dot(v, khat);
            std::array::from_fn(|a| w * (v[a] - khat[a] * long) + (1.0 - w) * khat[a] * long)
        };
        self.modes
            .iter()
            .zip(self.phases.chunks_exact(PHASES_PER_MODE))
            .map(|(n, p)| {
                let k: [f64; 3] = std::array::from_fn(|a| 2.0 * PI * n[a] / lengths[a]);
                let norm = dot(k, k).sqrt();
                let khat = k.map(|v| v / norm);
                (k, project([p[0], p[1], p[2]], khat), project([p[3], p[4], p[5]], khat))
            })
            .collect()
    }

    fn normalization(&self) -> f64 {
        let w = self.constants.st_sol_weight;
        1.0 / ((1.0 - 2.0 * w + 3.0 * w * w) * self.modes.len() as f64).sqrt()
    }

    /// Stirring acceleration at `pos` in a box of `lengths`.
    pub fn acceleration_at(&self, pos: [f64; 3], lengths: [f64; 3]) -> [f64; 3] {
        let modes = self.projected(lengths);
        accumulate(&modes, pos, self.normalization())
    }

    /// Snapshot of phases and generator.
    pub fn state(&self) -> TurbulenceState {
        TurbulenceState {
            phases: self.phases.clone(),
            seed: self.rng.get_seed(),
            stream: self.rng.get_stream(),
            word_pos: self.rng.get_word_pos(),
        }
    }

    /// Replace phases and generator with `state`.
    ///
    /// Nothing changes when the phase count does not match the modes.
    pub fn restore(&mut self, state: TurbulenceState) -> Result<(), TurbulenceError> {
        let expected = self.modes.len() * PHASES_PER_MODE;
        if state.phases.len() != expected {
            return Err(TurbulenceError::PhaseCountMismatch {
                expected,
                found: state.phases.len(),
            });
        }
        let mut rng = ChaCha8Rng::from_seed(state.seed);
        rng.set_stream(state.stream);
        rng.set_word_pos(state.word_pos);
        self.rng = rng;
        self.phases = state.phases;
        Ok(())
    }
}

fn accumulate(modes: &[([f64; 3], [f64; 3], [f64; 3])], pos: [f64; 3], scale: f64) -> [f64; 3] {
    let mut acc = [0.0; 3];
    for (k, re, im) in modes {
        let (s, c) = dot(*k, pos).sin_cos();
        for a in 0..3 {
            acc[a] += re[a] * c - im[a] * s;
        }
    }
    acc.map(|v| v * scale)
}

/// Evolve the stirring model by the current `minDt` and add its
/// acceleration to `[first, last)`.
pub fn drive_turbulence(
    first: usize,
    last: usize,
    data: &mut ParticleData,
    sim_box: &SimBox,
    turbulence: &mut TurbulenceData,
) -> Result<(), FieldError> {
    turbulence.evolve(data.attrs.min_dt);
    let modes = turbulence.projected(sim_box.lengths());
    let scale = turbulence.normalization();

    let [x, y, z, ax, ay, az] = data.fields.fields_mut([
        FieldId::X,
        FieldId::Y,
        FieldId::Z,
        FieldId::AX,
        FieldId::AY,
        FieldId::AZ,
    ])?;
    let pos = [x.real()?, y.real()?, z.real()?];
    let stir: Vec<[f64; 3]> = (first..last)
        .into_par_iter()
        .map(|i| {
            let p = [pos[0][i] - sim_box.lo[0], pos[1][i] - sim_box.lo[1], pos[2][i] - sim_box.lo[2]];
            accumulate(&modes, p, scale)
        })
        .collect();
    for (a, col) in [ax, ay, az].into_iter().enumerate() {
        let out = col.real_mut()?;
        for (k, s) in stir.iter().enumerate() {
            out[first + k] += s[a];
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sphve_test_utils::uniform_lattice;

    fn model() -> TurbulenceData {
        TurbulenceData::new(TurbulenceConstants::default()).unwrap()
    }

    #[test]
    fn shell_holds_one_of_each_pair() {
        let t = model();
        assert_eq!(t.num_modes(), 61);
        assert_eq!(t.phases().len(), 61 * PHASES_PER_MODE);
        for m in t.modes() {
            assert!(!t.modes().contains(&m.map(|v| -v)));
        }
    }

    #[test]
    fn mode_cap_applies() {
        let t = TurbulenceData::new(TurbulenceConstants {
            st_max_modes: 5,
            ..TurbulenceConstants::default()
        })
        .unwrap();
        assert_eq!(t.num_modes(), 5);
    }

    #[test]
    fn rejects_bad_parameters() {
        let bad = |c: TurbulenceConstants| TurbulenceData::new(c).unwrap_err();
        let d = TurbulenceConstants::default();
        assert!(matches!(
            bad(TurbulenceConstants { st_decay: 0.0, ..d.clone() }),
            TurbulenceError::InvalidParameter { name: "stDecay", .. }
        ));
        assert!(matches!(
            bad(TurbulenceConstants { st_sol_weight: 1.5, ..d.clone() }),
            TurbulenceError::InvalidParameter { name: "stSolWeight", .. }
        ));
        assert!(matches!(
            bad(TurbulenceConstants { k_min: 1.2, k_max: 1.3, ..d }),
            TurbulenceError::NoModes { .. }
        ));
    }

    #[test]
    fn same_seed_same_sequence() {
        let (mut a, mut b) = (model(), model());
        a.evolve(0.1);
        b.evolve(0.1);
        assert_eq!(a.phases(), b.phases());

        let mut c = TurbulenceData::new(TurbulenceConstants {
            seed: 7,
            ..TurbulenceConstants::default()
        })
        .unwrap();
        c.evolve(0.1);
        assert_ne!(a.phases(), c.phases());
    }

    #[test]
    fn restored_state_continues_the_sequence() {
        let mut a = model();
        a.evolve(0.1);
        let saved = a.state();
        a.evolve(0.1);

        let mut b = model();
        b.restore(saved).unwrap();
        b.evolve(0.1);
        assert_eq!(a.phases(), b.phases());
        assert_eq!(a.state(), b.state());
    }

    #[test]
    fn restore_rejects_wrong_phase_count() {
        let mut t = model();
        let before = t.state();
        let mut bad = before.clone();
        bad.phases.pop();
        assert_eq!(
            t.restore(bad).unwrap_err(),
            TurbulenceError::PhaseCountMismatch {
                expected: 366,
                found: 365
            }
        );
        assert_eq!(t.state(), before);
    }

    #[test]
    fn decorrelated_phases_have_configured_variance() {
        let mut t = model();
        t.evolve(100.0);
        let n = t.phases().len() as f64;
        let var = t.phases().iter().map(|p| p * p).sum::<f64>() / n;
        let energy = t.constants().st_energy;
        assert!((var - energy).abs() < 0.3 * energy, "{var}");
    }

    #[test]
    fn solenoidal_driving_is_divergence_free() {
        let t = TurbulenceData::new(TurbulenceConstants {
            st_sol_weight: 1.0,
            ..TurbulenceConstants::default()
        })
        .unwrap();
        let l = [1.0; 3];
        let p = [0.3, 0.6, 0.1];
        let eps = 1e-5;
        let mut div = 0.0;
        let mut scale = 0.0;
        for a in 0..3 {
            let mut hi = p;
            let mut lo = p;
            hi[a] += eps;
            lo[a] -= eps;
            let d = t.acceleration_at(hi, l)[a] - t.acceleration_at(lo, l)[a];
            div += d / (2.0 * eps);
            scale += d.abs() / (2.0 * eps);
        }
        assert!(div.abs() < 1e-6 * scale.max(1e-12), "{div} vs {scale}");
    }

    #[test]
    fn stirring_touches_only_the_owned_range() {
        let b = SimBox::periodic_cube(0.0, 1.0);
        let mut d = uniform_lattice(3, &b, 1.3);
        d.attrs.min_dt = 0.01;
        let mut t = model();
        drive_turbulence(5, 20, &mut d, &b, &mut t).unwrap();
        let ax = d.fields.real(FieldId::AX).unwrap();
        assert!(ax[..5].iter().chain(&ax[20..]).all(|&v| v == 0.0));
        assert!(ax[5..20].iter().any(|&v| v != 0.0));
        assert!(ax.iter().all(|v| v.is_finite()));
    }
}

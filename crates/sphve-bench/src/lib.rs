//! Benchmark profiles for the sphve step pipeline.
//!
//! - [`reference_profile`]: 16^3 particles, VE hydro without gravity
//! - [`stress_profile`]: 32^3 particles, AV cleaning and gravity on
//! - [`particles`]: the matching jittered lattice

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use sphve_core::SimBox;
use sphve_engine::SimConfig;
use sphve_fields::ParticleData;

/// Particles per axis of [`reference_profile`].
pub const REFERENCE_SIDE: usize = 16;

/// Particles per axis of [`stress_profile`].
pub const STRESS_SIDE: usize = 32;

/// VE hydro on the unit box, no gravity, no output.
pub fn reference_profile() -> SimConfig {
    SimConfig {
        sim_box: SimBox::periodic_cube(0.0, 1.0),
        max_steps: 1,
        ..SimConfig::default()
    }
}

/// [`reference_profile`] with the AV-cleaning schema and self-gravity.
///
/// Gravity also needs `attrs.g` set on the dataset; [`particles`] does
/// that when `gravity` is true.
pub fn stress_profile() -> SimConfig {
    SimConfig {
        av_clean: true,
        ..reference_profile()
    }
}

/// `side^3` particles on a lattice jittered by a tenth of the spacing,
/// deterministically from `seed`.
pub fn particles(side: usize, sim_box: &SimBox, seed: u64, gravity: bool) -> ParticleData {
    let mut data = sphve_test_utils::perturbed_lattice(side, sim_box, 1.3, 0.1, seed);
    if gravity {
        data.attrs.g = 1.0;
    }
    data
}

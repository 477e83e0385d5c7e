//! Test fixtures for sphve development.
//!
//! Provides particle lattices with the hydrodynamic fields declared, and
//! instrumented [`Domain`](sphve_domain::Domain) wrappers that record or
//! fail the calls the step pipeline makes.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use sphve_core::{FieldError, FieldId, SimBox};
use sphve_fields::ParticleData;

pub use fixtures::{DomainEvent, FailingDomain, RecordingDomain};

/// Conserved hydrodynamic columns besides the always-present ones. These
/// tables follow the propagator schemas, which test that they agree.
pub const HYDRO_CONSERVED: [&str; 9] = [
    "temp", "vx", "vy", "vz", "x_m1", "y_m1", "z_m1", "du_m1", "alpha",
];

/// Dependent hydrodynamic columns allocated at activation.
pub const HYDRO_DEPENDENT: [&str; 15] = [
    "prho", "c", "ax", "ay", "az", "du", "c11", "c12", "c13", "c22", "c23", "c33", "xm", "kx",
    "nc",
];

/// Velocity-gradient columns used by AV cleaning.
pub const AV_CLEAN_DEPENDENT: [&str; 6] = ["dV11", "dV12", "dV13", "dV22", "dV23", "dV33"];

/// Dependent columns that start released.
pub const HYDRO_TRANSIENT: [&str; 5] = ["gradh", "divv", "curlv", "rho", "p"];

/// Initial temperature of lattice particles.
pub const LATTICE_TEMP: f64 = 1.0;

/// Declare the hydrodynamic fields on `data`.
pub fn declare_hydro_fields(data: &mut ParticleData, av_clean: bool) -> Result<(), FieldError> {
    data.set_conserved(&HYDRO_CONSERVED)?;
    data.set_dependent(&HYDRO_DEPENDENT)?;
    if av_clean {
        data.set_dependent(&AV_CLEAN_DEPENDENT)?;
    }
    data.declare_released(&HYDRO_TRANSIENT)
}

/// Cubic lattice of `side^3` particles filling `sim_box` with unit density,
/// at rest, with `h = eta * spacing` and hydrodynamic fields declared.
pub fn uniform_lattice(side: usize, sim_box: &SimBox, eta: f64) -> ParticleData {
    lattice_with(side, sim_box, eta, false)
}

/// [`uniform_lattice`] with the AV-cleaning columns optionally declared.
pub fn lattice_with(side: usize, sim_box: &SimBox, eta: f64, av_clean: bool) -> ParticleData {
    let n = side * side * side;
    let mut d = ParticleData::new(n);
    declare_hydro_fields(&mut d, av_clean).expect("fresh dataset accepts hydro fields");

    let l = sim_box.lengths();
    let dx = [l[0] / side as f64, l[1] / side as f64, l[2] / side as f64];
    let mass = (l[0] * l[1] * l[2] / n as f64) as f32;
    for idx in 0..n {
        let c = [idx / (side * side), (idx / side) % side, idx % side];
        for (a, f) in [FieldId::X, FieldId::Y, FieldId::Z].into_iter().enumerate() {
            d.fields.real_mut(f).unwrap()[idx] = sim_box.lo[a] + (c[a] as f64 + 0.5) * dx[a];
        }
    }
    d.fields.real_mut(FieldId::H).unwrap().fill(eta * dx[0]);
    d.fields.real32_mut(FieldId::M).unwrap().fill(mass);
    d.fields.real_mut(FieldId::TEMP).unwrap().fill(LATTICE_TEMP);
    d.fields.real_mut(FieldId::ALPHA).unwrap().fill(0.05);
    d.attrs.num_particles_global = n as u64;
    d
}

/// [`uniform_lattice`] with positions jittered by up to `amplitude`
/// spacings, deterministically from `seed`.
pub fn perturbed_lattice(
    side: usize,
    sim_box: &SimBox,
    eta: f64,
    amplitude: f64,
    seed: u64,
) -> ParticleData {
    let mut d = uniform_lattice(side, sim_box, eta);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let dx = sim_box.lengths()[0] / side as f64;
    for (a, f) in [FieldId::X, FieldId::Y, FieldId::Z].into_iter().enumerate() {
        for v in d.fields.real_mut(f).unwrap() {
            let jitter = (rng.random::<f64>() * 2.0 - 1.0) * amplitude * dx;
            *v = sim_box.wrap(a, *v + jitter);
        }
    }
    d
}

/// Set every particle's velocity from its position.
pub fn set_velocity(data: &mut ParticleData, f: impl Fn([f64; 3]) -> [f64; 3]) {
    let n = data.len();
    let pos: Vec<[f64; 3]> = (0..n)
        .map(|i| {
            [FieldId::X, FieldId::Y, FieldId::Z].map(|c| data.fields.real(c).unwrap()[i])
        })
        .collect();
    for (i, p) in pos.into_iter().enumerate() {
        let v = f(p);
        for (a, c) in [FieldId::VX, FieldId::VY, FieldId::VZ].into_iter().enumerate() {
            data.fields.real_mut(c).unwrap()[i] = v[a];
        }
    }
}

/// Whether every value of an allocated `f64` column is finite.
pub fn all_finite(data: &ParticleData, field: FieldId) -> bool {
    data.fields
        .real(field)
        .map(|v| v.iter().all(|x| x.is_finite()))
        .unwrap_or(false)
}

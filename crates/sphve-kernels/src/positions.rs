//! Time integration of positions, velocities and internal energy, and
//! the smoothing-length update.

use rayon::prelude::*;
use sphve_core::{FieldError, FieldId, SimBox};
use sphve_fields::ParticleData;

use crate::eos::ideal_gas_cv;

/// Exponent of the neighbor-count driven smoothing-length update.
pub const H_EXPONENT: f64 = 1.0 / 10.0;

/// Floor of the internal energy after an update.
pub const MIN_ENERGY: f64 = 1e-30;

/// Advance `[first, last)` by the current `minDt`.
///
/// Velocities follow from the previous displacement `x_m1 / minDt_m1`
/// plus the acceleration over `minDt + minDt_m1 / 2`; positions advance
/// by the new velocity over the mean of both steps and wrap into periodic
/// boxes. The internal energy uses the same two-step scheme with `du` and
/// `du_m1` and is stored back as temperature.
pub fn compute_positions(
    first: usize,
    last: usize,
    data: &mut ParticleData,
    sim_box: &SimBox,
) -> Result<(), FieldError> {
    let attrs = &data.attrs;
    let (dt, dt_m1) = (attrs.min_dt, attrs.min_dt_m1);
    let cv = ideal_gas_cv(attrs.mui_const, attrs.gamma);
    let delta_a = dt + 0.5 * dt_m1;
    let delta_b = 0.5 * (dt + dt_m1);

    let [x, y, z, vx, vy, vz, x_m1, y_m1, z_m1, ax, ay, az] = data.fields.fields_mut([
        FieldId::X,
        FieldId::Y,
        FieldId::Z,
        FieldId::VX,
        FieldId::VY,
        FieldId::VZ,
        FieldId::X_M1,
        FieldId::Y_M1,
        FieldId::Z_M1,
        FieldId::AX,
        FieldId::AY,
        FieldId::AZ,
    ])?;
    let axes = [
        (x.real_mut()?, vx.real_mut()?, x_m1.real32_mut()?, ax.real()?),
        (y.real_mut()?, vy.real_mut()?, y_m1.real32_mut()?, ay.real()?),
        (z.real_mut()?, vz.real_mut()?, z_m1.real32_mut()?, az.real()?),
    ];
    for (axis, (pos, vel, prev, acc)) in axes.into_iter().enumerate() {
        pos[first..last]
            .par_iter_mut()
            .zip(vel[first..last].par_iter_mut())
            .zip(prev[first..last].par_iter_mut())
            .zip(acc[first..last].par_iter())
            .for_each(|(((x, v), x_m1), a)| {
                let v_new = f64::from(*x_m1) / dt_m1 + a * delta_a;
                let dx = v_new * delta_b;
                *x = sim_box.wrap(axis, *x + dx);
                *x_m1 = dx as f32;
                *v = v_new;
            });
    }

    let [temp, du, du_m1] = data
        .fields
        .fields_mut([FieldId::TEMP, FieldId::DU, FieldId::DU_M1])?;
    let du = du.real32()?;
    temp.real_mut()?[first..last]
        .par_iter_mut()
        .zip(du_m1.real32_mut()?[first..last].par_iter_mut())
        .zip(du[first..last].par_iter())
        .for_each(|((t, du_m1), &du)| {
            let u = cv * *t;
            let u_new = u + f64::from(du) * delta_a - 0.5 * f64::from(*du_m1) * dt_m1;
            *du_m1 = du;
            *t = u_new.max(MIN_ENERGY) / cv;
        });
    Ok(())
}

/// Drive `h` of `[first, last)` towards `ng0` neighbors.
///
/// `h_new = h / 2 * (1 + 1023 ng0 / nc)^(1/10)`; a particle without
/// neighbors counts as having one.
pub fn update_smoothing_length(
    first: usize,
    last: usize,
    data: &mut ParticleData,
) -> Result<(), FieldError> {
    let ng0 = f64::from(data.attrs.ng0);
    let [h, nc] = data.fields.fields_mut([FieldId::H, FieldId::NC])?;
    let nc = nc.counts()?;
    h.real_mut()?[first..last]
        .par_iter_mut()
        .zip(nc[first..last].par_iter())
        .for_each(|(h, &nc)| {
            let n = f64::from(nc.max(1));
            *h *= 0.5 * (1.0 + 1023.0 * ng0 / n).powf(H_EXPONENT);
        });
    Ok(())
}

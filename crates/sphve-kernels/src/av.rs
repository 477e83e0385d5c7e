//! Artificial-viscosity switches and the velocity-gradient tensor used by
//! AV cleaning.

use rayon::prelude::*;
use sphve_core::{FieldError, FieldId, SimBox};
use sphve_fields::ParticleData;

use crate::iad::GradientInputs;

/// Lower bound of the viscosity coefficient.
pub const ALPHA_MIN: f64 = 0.05;
/// Upper bound of the viscosity coefficient.
pub const ALPHA_MAX: f64 = 1.0;
/// Decay rate of the coefficient in units of the sound-crossing time of `h`.
pub const DECAY_CONSTANT: f64 = 0.2;

/// Velocity-gradient tensor columns, in `[11, 12, 13, 22, 23, 33]` order.
pub const DV_FIELDS: [FieldId; 6] = [
    FieldId::DV11,
    FieldId::DV12,
    FieldId::DV13,
    FieldId::DV22,
    FieldId::DV23,
    FieldId::DV33,
];

/// Target coefficient from compression, limited by a Balsara-type shear
/// factor.
pub fn alpha_target(divv: f64, curlv: f64, c: f64, h: f64) -> f64 {
    let compression = (-divv).max(0.0);
    if compression == 0.0 {
        return ALPHA_MIN;
    }
    let xi = divv * divv / (divv * divv + curlv * curlv + 1e-4 * (c / h).powi(2));
    let a = xi * compression * compression * h * h;
    (ALPHA_MAX * a / (c * c + a)).clamp(ALPHA_MIN, ALPHA_MAX)
}

/// Update `alpha` over `[first, last)`; with `av_clean` also write the
/// symmetric velocity-gradient tensor `dV`.
pub fn av_switches(
    first: usize,
    last: usize,
    data: &mut ParticleData,
    sim_box: &SimBox,
    av_clean: bool,
) -> Result<(), FieldError> {
    let dt = data.attrs.min_dt;
    let ParticleData {
        fields, neighbors, ..
    } = data;
    let neighbors = &*neighbors;

    let tensor: Vec<[f64; 6]> = if av_clean {
        let [x, y, z, h, vx, vy, vz, xm, kx, nc, c11, c12, c13, c22, c23, c33] = fields
            .fields_mut([
                FieldId::X,
                FieldId::Y,
                FieldId::Z,
                FieldId::H,
                FieldId::VX,
                FieldId::VY,
                FieldId::VZ,
                FieldId::XM,
                FieldId::KX,
                FieldId::NC,
                FieldId::C11,
                FieldId::C12,
                FieldId::C13,
                FieldId::C22,
                FieldId::C23,
                FieldId::C33,
            ])?;
        let nc = nc.counts()?;
        let iad = [c11.real()?, c12.real()?, c13.real()?, c22.real()?, c23.real()?, c33.real()?];
        let inputs = GradientInputs {
            pos: [x.real()?, y.real()?, z.real()?],
            vel: [vx.real()?, vy.real()?, vz.real()?],
            h: h.real()?,
            xm: xm.real()?,
            kx: kx.real()?,
        };
        (first..last)
            .into_par_iter()
            .map(|i| {
                let c = iad.map(|col| col[i]);
                let g = inputs.velocity_gradient(sim_box, i, neighbors.row(i - first, nc[i] as usize), c);
                [
                    g[0][0],
                    0.5 * (g[0][1] + g[1][0]),
                    0.5 * (g[0][2] + g[2][0]),
                    g[1][1],
                    0.5 * (g[1][2] + g[2][1]),
                    g[2][2],
                ]
            })
            .collect()
    } else {
        Vec::new()
    };

    if av_clean {
        for (m, field) in DV_FIELDS.into_iter().enumerate() {
            let out = fields.real_mut(field)?;
            for (k, t) in tensor.iter().enumerate() {
                out[first + k] = t[m];
            }
        }
    }

    let [h, c, divv, curlv, alpha] = fields.fields_mut([
        FieldId::H,
        FieldId::C,
        FieldId::DIVV,
        FieldId::CURLV,
        FieldId::ALPHA,
    ])?;
    let (h, c, divv, curlv) = (h.real()?, c.real()?, divv.real()?, curlv.real()?);
    alpha.real_mut()?[first..last]
        .par_iter_mut()
        .enumerate()
        .for_each(|(k, alpha)| {
            let i = first + k;
            let target = alpha_target(divv[i], curlv[i], c[i], h[i]);
            *alpha = if target >= *alpha {
                target
            } else {
                let decay = (-dt * DECAY_CONSTANT * c[i] / h[i]).exp();
                (target + (*alpha - target) * decay).clamp(ALPHA_MIN, ALPHA_MAX)
            };
        });
    Ok(())
}

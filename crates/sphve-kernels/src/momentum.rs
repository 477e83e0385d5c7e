//! Volume-element momentum and energy equations with artificial
//! viscosity, and the Courant timestep bound.

use rayon::prelude::*;
use sphve_core::{FieldError, FieldId, SimBox};
use sphve_fields::{FieldStore, ParticleData};

use crate::av::DV_FIELDS;
use crate::kernel::{dot, kernel, norm, separation, sym_mul};

const IAD_FIELDS: [FieldId; 6] = [
    FieldId::C11,
    FieldId::C12,
    FieldId::C13,
    FieldId::C22,
    FieldId::C23,
    FieldId::C33,
];

fn columns<const N: usize>(fields: &FieldStore, ids: [FieldId; N]) -> Result<[&[f64]; N], FieldError> {
    let mut out = [&[][..]; N];
    for (slot, id) in out.iter_mut().zip(ids) {
        *slot = fields.real(id)?;
    }
    Ok(out)
}

struct Pair {
    acc: [f64; 3],
    du: f64,
    dt: f64,
}

/// Accelerations `ax, ay, az` and energy rate `du` over `[first, last)`.
///
/// Pressure forces use the IAD gradient of each side of the pair. The
/// viscous term is a signal-velocity viscosity weighted by the mean
/// `alpha`; with `av_clean` the linear part of the velocity field,
/// reconstructed from `dV`, is removed from the pair velocity before the
/// viscosity is evaluated. Also lowers `min_dt_courant`.
pub fn momentum_energy(
    first: usize,
    last: usize,
    data: &mut ParticleData,
    sim_box: &SimBox,
    av_clean: bool,
) -> Result<(), FieldError> {
    let k_cour = data.attrs.k_cour;
    let ParticleData {
        fields,
        neighbors,
        attrs,
        ..
    } = data;

    let results: Vec<Pair> = {
        let fields = &*fields;
        let [x, y, z, h, vx, vy, vz, c, prho, alpha, xm, kx] = columns(
            fields,
            [
                FieldId::X,
                FieldId::Y,
                FieldId::Z,
                FieldId::H,
                FieldId::VX,
                FieldId::VY,
                FieldId::VZ,
                FieldId::C,
                FieldId::PRHO,
                FieldId::ALPHA,
                FieldId::XM,
                FieldId::KX,
            ],
        )?;
        let iad = columns(fields, IAD_FIELDS)?;
        let dv = if av_clean { Some(columns(fields, DV_FIELDS)?) } else { None };
        let m = fields.real32(FieldId::M)?;
        let nc = fields.counts()?;
        for f in [FieldId::AX, FieldId::AY, FieldId::AZ, FieldId::DU] {
            fields.column(f)?;
        }
        let pos = [x, y, z];
        let vel = [vx, vy, vz];
        let neighbors = &*neighbors;

        (first..last)
            .into_par_iter()
            .map(|i| {
                let mi = f64::from(m[i]);
                let rho_i = kx[i] * mi / xm[i];
                let ci = iad.map(|col| col[i]);
                let vi = [vel[0][i], vel[1][i], vel[2][i]];
                let mut acc = [0.0; 3];
                let mut du = 0.0;
                let mut vsig_max = c[i];

                for &j in neighbors.row(i - first, nc[i] as usize) {
                    let j = j as usize;
                    let mj = f64::from(m[j]);
                    let d = separation(sim_box, pos, i, j);
                    let r = norm(d);
                    let a_i = sym_mul(ci, d).map(|v| v * kernel(r, h[i]));
                    let a_j = sym_mul(iad.map(|col| col[j]), d).map(|v| v * kernel(r, h[j]));
                    let vij = [vi[0] - vel[0][j], vi[1] - vel[1][j], vi[2] - vel[2][j]];

                    let vol = xm[i] * xm[j] / mi;
                    for a in 0..3 {
                        acc[a] -= vol * (prho[i] * a_i[a] + prho[j] * a_j[a]);
                    }
                    du += vol * prho[i] * dot(vij, a_i);

                    let mut v_av = vij;
                    if let Some(dv) = &dv {
                        let mean = std::array::from_fn(|k| 0.5 * (dv[k][i] + dv[k][j]));
                        let lin = sym_mul(mean, d);
                        for a in 0..3 {
                            v_av[a] += lin[a];
                        }
                    }
                    let w = if r > 0.0 { -dot(v_av, d) / r } else { 0.0 };
                    let vsig = c[i] + c[j] - 3.0 * w.min(0.0);
                    vsig_max = vsig_max.max(vsig);
                    if w < 0.0 {
                        let rho_j = kx[j] * mj / xm[j];
                        let alpha_ij = 0.5 * (alpha[i] + alpha[j]);
                        let visc = -0.5 * alpha_ij * vsig * w / (0.5 * (rho_i + rho_j));
                        let grad = [
                            0.5 * (a_i[0] + a_j[0]),
                            0.5 * (a_i[1] + a_j[1]),
                            0.5 * (a_i[2] + a_j[2]),
                        ];
                        for a in 0..3 {
                            acc[a] -= mj * visc * grad[a];
                        }
                        du += 0.5 * mj * visc * dot(vij, grad);
                    }
                }
                let dt = if vsig_max > 0.0 { k_cour * h[i] / vsig_max } else { f64::INFINITY };
                Pair { acc, du, dt }
            })
            .collect()
    };

    for (a, field) in [FieldId::AX, FieldId::AY, FieldId::AZ].into_iter().enumerate() {
        let out = fields.real_mut(field)?;
        for (k, p) in results.iter().enumerate() {
            out[first + k] = p.acc[a];
        }
    }
    let du = fields.real32_mut(FieldId::DU)?;
    for (k, p) in results.iter().enumerate() {
        du[first + k] = p.du as f32;
    }
    attrs.min_dt_courant = results.iter().fold(attrs.min_dt_courant, |m, p| m.min(p.dt));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eos::compute_eos;
    use crate::iad::iad_divv_curlv;
    use crate::search::find_neighbors;
    use crate::ve::{ve_def_gradh, xmass};
    use sphve_test_utils::{perturbed_lattice, set_velocity, uniform_lattice};

    fn forces(mut d: ParticleData, b: &SimBox) -> ParticleData {
        let n = d.len();
        find_neighbors(0, n, &mut d, b).unwrap();
        xmass(0, n, &mut d, b).unwrap();
        d.fields.acquire(&[FieldId::GRADH]).unwrap();
        ve_def_gradh(0, n, &mut d, b).unwrap();
        compute_eos(0, n, &mut d).unwrap();
        d.fields.release(&[FieldId::GRADH]).unwrap();
        d.fields.acquire(&[FieldId::DIVV, FieldId::CURLV]).unwrap();
        iad_divv_curlv(0, n, &mut d, b).unwrap();
        momentum_energy(0, n, &mut d, b, false).unwrap();
        d
    }

    #[test]
    fn uniform_periodic_lattice_is_in_equilibrium() {
        let b = SimBox::periodic_cube(0.0, 1.0);
        let d = forces(uniform_lattice(8, &b, 1.3), &b);
        let c = d.fields.real(FieldId::C).unwrap()[0];
        let scale = c * c / 0.125;
        for f in [FieldId::AX, FieldId::AY, FieldId::AZ] {
            let a = d.fields.real(f).unwrap();
            assert!(a.iter().all(|v| v.abs() < 1e-8 * scale), "{f}");
        }
        assert!(d.attrs.min_dt_courant.is_finite() && d.attrs.min_dt_courant > 0.0);
    }

    #[test]
    fn pressure_forces_conserve_momentum() {
        let b = SimBox::periodic_cube(0.0, 1.0);
        let d = forces(perturbed_lattice(6, &b, 1.4, 0.1, 11), &b);
        let m = d.fields.real32(FieldId::M).unwrap();
        for f in [FieldId::AX, FieldId::AY, FieldId::AZ] {
            let a = d.fields.real(f).unwrap();
            let total: f64 = a.iter().zip(m).map(|(a, &m)| a * f64::from(m)).sum();
            let scale: f64 = a.iter().zip(m).map(|(a, &m)| (a * f64::from(m)).abs()).sum();
            assert!(total.abs() < 1e-6 * scale.max(1e-300), "{f}: {total} vs {scale}");
        }
    }

    #[test]
    fn converging_flow_heats() {
        let b = SimBox::periodic_cube(0.0, 1.0);
        let mut d = uniform_lattice(6, &b, 1.4);
        set_velocity(&mut d, |p| [-(p[0] - 0.5) * 1e4, 0.0, 0.0]);
        let d = forces(d, &b);
        let du = d.fields.real32(FieldId::DU).unwrap();
        let x = d.fields.real(FieldId::X).unwrap();
        let i = (0..d.len()).find(|&i| (x[i] - 0.4167).abs() < 0.01).unwrap();
        assert!(du[i] > 0.0);
    }
}

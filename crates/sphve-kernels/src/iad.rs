//! Integral approach to derivatives: the IAD matrix, velocity divergence
//! and curl, and the density-change timestep bound.

use rayon::prelude::*;
use sphve_core::{FieldError, FieldId, SimBox};
use sphve_fields::ParticleData;

use crate::kernel::{kernel, norm, separation, sym_mul};

/// Smallest determinant treated as invertible.
const MIN_DET: f64 = 1e-300;

/// Inverse of a symmetric 3x3 matrix stored as `[m11, m12, m13, m22, m23, m33]`.
/// Singular matrices map to zero.
pub fn invert_symmetric(t: [f64; 6]) -> [f64; 6] {
    let [t11, t12, t13, t22, t23, t33] = t;
    let a11 = t22 * t33 - t23 * t23;
    let a12 = t13 * t23 - t12 * t33;
    let a13 = t12 * t23 - t13 * t22;
    let det = t11 * a11 + t12 * a12 + t13 * a13;
    if !(det.abs() > MIN_DET) || !det.is_finite() {
        return [0.0; 6];
    }
    let inv = 1.0 / det;
    [
        a11 * inv,
        a12 * inv,
        a13 * inv,
        (t11 * t33 - t13 * t13) * inv,
        (t13 * t12 - t11 * t23) * inv,
        (t11 * t22 - t12 * t12) * inv,
    ]
}

/// Borrowed inputs of a velocity-gradient evaluation.
pub(crate) struct GradientInputs<'a> {
    pub pos: [&'a [f64]; 3],
    pub vel: [&'a [f64]; 3],
    pub h: &'a [f64],
    pub xm: &'a [f64],
    pub kx: &'a [f64],
}

impl GradientInputs<'_> {
    /// IAD matrix `tau^-1` of particle `i`.
    pub fn iad_matrix(&self, sim_box: &SimBox, i: usize, nbrs: &[u32]) -> [f64; 6] {
        let mut tau = [0.0; 6];
        for &j in nbrs {
            let j = j as usize;
            let d = separation(sim_box, self.pos, i, j);
            let vw = self.xm[j] / self.kx[j] * kernel(norm(d), self.h[i]);
            tau[0] += d[0] * d[0] * vw;
            tau[1] += d[0] * d[1] * vw;
            tau[2] += d[0] * d[2] * vw;
            tau[3] += d[1] * d[1] * vw;
            tau[4] += d[1] * d[2] * vw;
            tau[5] += d[2] * d[2] * vw;
        }
        invert_symmetric(tau)
    }

    /// Velocity gradient `g[a][b] = d v_a / d x_b` of particle `i`.
    pub fn velocity_gradient(
        &self,
        sim_box: &SimBox,
        i: usize,
        nbrs: &[u32],
        c: [f64; 6],
    ) -> [[f64; 3]; 3] {
        let mut g = [[0.0; 3]; 3];
        for &j in nbrs {
            let j = j as usize;
            let d = separation(sim_box, self.pos, i, j);
            let vw = self.xm[j] / self.kx[j] * kernel(norm(d), self.h[i]);
            let a = sym_mul(c, d);
            for (ax, row) in g.iter_mut().enumerate() {
                let dv = self.vel[ax][j] - self.vel[ax][i];
                for b in 0..3 {
                    row[b] += vw * dv * a[b];
                }
            }
        }
        g
    }
}

/// IAD matrix, velocity divergence and curl magnitude over `[first, last)`.
///
/// Also lowers the rank-local density-change bound `min_dt_rho` to
/// `Krho / |divv|`.
pub fn iad_divv_curlv(
    first: usize,
    last: usize,
    data: &mut ParticleData,
    sim_box: &SimBox,
) -> Result<(), FieldError> {
    let k_rho = data.attrs.k_rho;
    let ParticleData {
        fields,
        neighbors,
        attrs,
        ..
    } = data;
    let neighbors = &*neighbors;
    let [x, y, z, h, vx, vy, vz, xm, kx, nc, c11, c12, c13, c22, c23, c33, divv, curlv] = fields
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
            FieldId::DIVV,
            FieldId::CURLV,
        ])?;
    let nc = nc.counts()?;
    let inputs = GradientInputs {
        pos: [x.real()?, y.real()?, z.real()?],
        vel: [vx.real()?, vy.real()?, vz.real()?],
        h: h.real()?,
        xm: xm.real()?,
        kx: kx.real()?,
    };

    let results: Vec<([f64; 6], f64, f64)> = (first..last)
        .into_par_iter()
        .map(|i| {
            let nbrs = neighbors.row(i - first, nc[i] as usize);
            let c = inputs.iad_matrix(sim_box, i, nbrs);
            let g = inputs.velocity_gradient(sim_box, i, nbrs, c);
            let div = g[0][0] + g[1][1] + g[2][2];
            let curl = [g[2][1] - g[1][2], g[0][2] - g[2][0], g[1][0] - g[0][1]];
            (c, div, norm(curl))
        })
        .collect();

    let cols = [c11, c12, c13, c22, c23, c33];
    for (m, col) in cols.into_iter().enumerate() {
        let out = col.real_mut()?;
        for (k, r) in results.iter().enumerate() {
            out[first + k] = r.0[m];
        }
    }
    let (divv, curlv) = (divv.real_mut()?, curlv.real_mut()?);
    let mut dt_rho = attrs.min_dt_rho;
    for (k, r) in results.iter().enumerate() {
        divv[first + k] = r.1;
        curlv[first + k] = r.2;
        if r.1 != 0.0 {
            dt_rho = dt_rho.min(k_rho / r.1.abs());
        }
    }
    attrs.min_dt_rho = dt_rho;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::find_neighbors;
    use crate::ve::{ve_def_gradh, xmass};
    use proptest::prelude::*;
    use sphve_test_utils::{perturbed_lattice, set_velocity};

    fn prepared(v: impl Fn([f64; 3]) -> [f64; 3]) -> (ParticleData, SimBox) {
        let b = SimBox::cube(0.0, 1.0);
        let mut d = perturbed_lattice(10, &b, 1.4, 0.05, 3);
        set_velocity(&mut d, v);
        let n = d.len();
        find_neighbors(0, n, &mut d, &b).unwrap();
        xmass(0, n, &mut d, &b).unwrap();
        d.fields.acquire(&[FieldId::GRADH]).unwrap();
        ve_def_gradh(0, n, &mut d, &b).unwrap();
        d.fields.release(&[FieldId::GRADH]).unwrap();
        d.fields.acquire(&[FieldId::DIVV, FieldId::CURLV]).unwrap();
        (d, b)
    }

    fn interior(d: &ParticleData) -> Vec<usize> {
        let x = d.fields.real(FieldId::X).unwrap();
        let y = d.fields.real(FieldId::Y).unwrap();
        let z = d.fields.real(FieldId::Z).unwrap();
        (0..d.len())
            .filter(|&i| [x[i], y[i], z[i]].iter().all(|&v| v > 0.35 && v < 0.65))
            .collect()
    }

    #[test]
    fn inverse_of_diagonal() {
        let c = invert_symmetric([2.0, 0.0, 0.0, 4.0, 0.0, 0.5]);
        assert_eq!(c, [0.5, 0.0, 0.0, 0.25, 0.0, 2.0]);
        assert_eq!(invert_symmetric([0.0; 6]), [0.0; 6]);
    }

    #[test]
    fn linear_expansion_is_exact_in_interior() {
        let (mut d, b) = prepared(|p| [2.0 * p[0], -0.5 * p[1], 0.0]);
        let n = d.len();
        iad_divv_curlv(0, n, &mut d, &b).unwrap();
        let divv = d.fields.real(FieldId::DIVV).unwrap();
        let curlv = d.fields.real(FieldId::CURLV).unwrap();
        for i in interior(&d) {
            assert!((divv[i] - 1.5).abs() < 1e-9, "divv[{i}] = {}", divv[i]);
            assert!(curlv[i].abs() < 1e-9);
        }
        assert!((d.attrs.min_dt_rho - d.attrs.k_rho / divv.iter().fold(0.0f64, |a, &v| a.max(v.abs()))).abs() < 1e-12);
    }

    #[test]
    fn rigid_rotation_has_curl_and_no_divergence() {
        let (mut d, b) = prepared(|p| [-(p[1] - 0.5), p[0] - 0.5, 0.0]);
        let n = d.len();
        iad_divv_curlv(0, n, &mut d, &b).unwrap();
        let divv = d.fields.real(FieldId::DIVV).unwrap();
        let curlv = d.fields.real(FieldId::CURLV).unwrap();
        for i in interior(&d) {
            assert!(divv[i].abs() < 1e-9);
            assert!((curlv[i] - 2.0).abs() < 1e-9);
        }
    }

    proptest! {
        #[test]
        fn inverse_of_dominant_matrix_is_exact(
            off in prop::array::uniform3(-0.3f64..0.3),
            diag in prop::array::uniform3(1.0f64..5.0),
        ) {
            let t = [diag[0], off[0], off[1], diag[1], off[2], diag[2]];
            let c = invert_symmetric(t);
            let full = |m: [f64; 6]| [[m[0], m[1], m[2]], [m[1], m[3], m[4]], [m[2], m[4], m[5]]];
            let (a, b) = (full(t), full(c));
            for r in 0..3 {
                for k in 0..3 {
                    let v: f64 = (0..3).map(|j| a[r][j] * b[j][k]).sum();
                    let id = if r == k { 1.0 } else { 0.0 };
                    prop_assert!((v - id).abs() < 1e-10);
                }
            }
        }
    }
}

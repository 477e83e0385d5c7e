//! Generalized volume elements: the volume estimator `xm`, its kernel
//! normalization `kx` and the smoothing-length correction `gradh`.

use rayon::prelude::*;
use sphve_core::{FieldError, FieldId, SimBox};
use sphve_fields::ParticleData;

use crate::kernel::{kernel, kernel_dh, norm, separation};

/// Volume estimator `xm_i = m_i / sum_j m_j W_ij(h_i)`.
pub fn xmass(
    first: usize,
    last: usize,
    data: &mut ParticleData,
    sim_box: &SimBox,
) -> Result<(), FieldError> {
    let ParticleData {
        fields, neighbors, ..
    } = data;
    let neighbors = &*neighbors;
    let [x, y, z, h, m, nc, xm] = fields.fields_mut([
        FieldId::X,
        FieldId::Y,
        FieldId::Z,
        FieldId::H,
        FieldId::M,
        FieldId::NC,
        FieldId::XM,
    ])?;
    let pos = [x.real()?, y.real()?, z.real()?];
    let (h, m, nc) = (h.real()?, m.real32()?, nc.counts()?);

    xm.real_mut()?[first..last]
        .par_iter_mut()
        .enumerate()
        .for_each(|(k, out)| {
            let i = first + k;
            let mut rho0 = f64::from(m[i]) * kernel(0.0, h[i]);
            for &j in neighbors.row(k, nc[i] as usize) {
                let j = j as usize;
                let r = norm(separation(sim_box, pos, i, j));
                rho0 += f64::from(m[j]) * kernel(r, h[i]);
            }
            *out = f64::from(m[i]) / rho0;
        });
    Ok(())
}

/// Kernel normalization `kx_i = sum_j xm_j W_ij(h_i)` and the
/// smoothing-length correction `gradh_i = 1 + h_i / (3 kx_i) sum_j xm_j dW_ij/dh`.
pub fn ve_def_gradh(
    first: usize,
    last: usize,
    data: &mut ParticleData,
    sim_box: &SimBox,
) -> Result<(), FieldError> {
    let ParticleData {
        fields, neighbors, ..
    } = data;
    let neighbors = &*neighbors;
    let [x, y, z, h, nc, xm, kx, gradh] = fields.fields_mut([
        FieldId::X,
        FieldId::Y,
        FieldId::Z,
        FieldId::H,
        FieldId::NC,
        FieldId::XM,
        FieldId::KX,
        FieldId::GRADH,
    ])?;
    let pos = [x.real()?, y.real()?, z.real()?];
    let (h, nc, xm) = (h.real()?, nc.counts()?, xm.real()?);

    kx.real_mut()?[first..last]
        .par_iter_mut()
        .zip(gradh.real_mut()?[first..last].par_iter_mut())
        .enumerate()
        .for_each(|(k, (kx_out, gradh_out))| {
            let i = first + k;
            let hi = h[i];
            let mut norm_sum = xm[i] * kernel(0.0, hi);
            let mut dh_sum = xm[i] * kernel_dh(0.0, hi);
            for &j in neighbors.row(k, nc[i] as usize) {
                let j = j as usize;
                let r = norm(separation(sim_box, pos, i, j));
                norm_sum += xm[j] * kernel(r, hi);
                dh_sum += xm[j] * kernel_dh(r, hi);
            }
            *kx_out = norm_sum;
            *gradh_out = 1.0 + hi / (3.0 * norm_sum) * dh_sum;
        });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::find_neighbors;
    use sphve_test_utils::uniform_lattice;

    #[test]
    fn uniform_lattice_has_unit_normalization() {
        let b = SimBox::periodic_cube(0.0, 1.0);
        let mut d = uniform_lattice(10, &b, 1.3);
        let n = d.len();
        find_neighbors(0, n, &mut d, &b).unwrap();
        xmass(0, n, &mut d, &b).unwrap();
        d.fields.acquire(&[FieldId::GRADH]).unwrap();
        ve_def_gradh(0, n, &mut d, &b).unwrap();

        let xm = d.fields.real(FieldId::XM).unwrap();
        let kx = d.fields.real(FieldId::KX).unwrap();
        let gradh = d.fields.real(FieldId::GRADH).unwrap();
        let vol = 1.0 / n as f64;
        for i in 0..n {
            assert!((xm[i] / vol - 1.0).abs() < 0.05, "xm[{i}] = {}", xm[i]);
            assert!((kx[i] - 1.0).abs() < 0.05, "kx[{i}] = {}", kx[i]);
            assert!(gradh[i] > 0.5 && gradh[i] < 1.5, "gradh[{i}] = {}", gradh[i]);
        }
    }

    #[test]
    fn released_gradh_is_reported() {
        let b = SimBox::periodic_cube(0.0, 1.0);
        let mut d = uniform_lattice(4, &b, 1.3);
        assert_eq!(
            ve_def_gradh(0, d.len(), &mut d, &b).unwrap_err(),
            FieldError::NotAllocated { field: FieldId::GRADH }
        );
    }
}

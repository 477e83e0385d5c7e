//! Ideal-gas equation of state.

use rayon::prelude::*;
use sphve_core::{FieldError, FieldId};
use sphve_fields::ParticleData;

/// Gas constant in cgs units.
pub const GAS_CONSTANT: f64 = 8.317e7;

/// Specific heat at constant volume of an ideal gas.
pub fn ideal_gas_cv(mui: f64, gamma: f64) -> f64 {
    GAS_CONSTANT / mui / (gamma - 1.0)
}

/// Pressure and sound speed of an ideal gas at `temp` and `rho`.
pub fn ideal_gas(temp: f64, rho: f64, mui: f64, gamma: f64) -> (f64, f64) {
    let u = ideal_gas_cv(mui, gamma) * temp;
    let p = (gamma - 1.0) * rho * u;
    let c = (gamma * (gamma - 1.0) * u).max(0.0).sqrt();
    (p, c)
}

/// Evaluate the equation of state for `[first, last)`.
///
/// Writes the pressure term `prho = p / (kx^2 gradh)` and the sound speed
/// `c`. The density `rho = kx m / xm` and pressure `p` are written too
/// when their columns are allocated.
pub fn compute_eos(first: usize, last: usize, data: &mut ParticleData) -> Result<(), FieldError> {
    let (gamma, mui) = (data.attrs.gamma, data.attrs.mui_const);
    let fields = &mut data.fields;
    let [temp, m, kx, xm, gradh, prho, c] = fields.fields_mut([
        FieldId::TEMP,
        FieldId::M,
        FieldId::KX,
        FieldId::XM,
        FieldId::GRADH,
        FieldId::PRHO,
        FieldId::C,
    ])?;
    let (temp, m, kx, xm, gradh) = (
        temp.real()?,
        m.real32()?,
        kx.real()?,
        xm.real()?,
        gradh.real()?,
    );

    let state: Vec<(f64, f64)> = (first..last)
        .into_par_iter()
        .map(|i| {
            let rho = kx[i] * f64::from(m[i]) / xm[i];
            ideal_gas(temp[i], rho, mui, gamma)
        })
        .collect();

    prho.real_mut()?[first..last]
        .par_iter_mut()
        .zip(c.real_mut()?[first..last].par_iter_mut())
        .enumerate()
        .for_each(|(k, (prho, c))| {
            let i = first + k;
            *prho = state[k].0 / (kx[i] * kx[i] * gradh[i]);
            *c = state[k].1;
        });

    let rho: Vec<f64> = (first..last)
        .map(|i| kx[i] * f64::from(m[i]) / xm[i])
        .collect();
    if fields.is_allocated(FieldId::RHO) {
        fields.real_mut(FieldId::RHO)?[first..last].copy_from_slice(&rho);
    }
    if fields.is_allocated(FieldId::P) {
        let p = fields.real_mut(FieldId::P)?;
        for (k, s) in state.iter().enumerate() {
            p[first + k] = s.0;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sphve_core::SimBox;
    use sphve_test_utils::uniform_lattice;

    fn prepared(with_output: bool) -> ParticleData {
        let mut d = uniform_lattice(3, &SimBox::cube(0.0, 1.0), 1.2);
        let n = d.len();
        d.fields.acquire(&[FieldId::GRADH]).unwrap();
        if with_output {
            d.fields.acquire(&[FieldId::RHO, FieldId::P]).unwrap();
        }
        d.fields.real_mut(FieldId::KX).unwrap().fill(1.0);
        d.fields.real_mut(FieldId::GRADH).unwrap().fill(1.0);
        d.fields.real_mut(FieldId::XM).unwrap().fill(1.0 / n as f64);
        d
    }

    #[test]
    fn ideal_gas_relations_hold() {
        let (p, c) = ideal_gas(100.0, 2.0, 10.0, 5.0 / 3.0);
        let u = ideal_gas_cv(10.0, 5.0 / 3.0) * 100.0;
        assert!((p - 2.0 / 3.0 * 2.0 * u).abs() < 1e-6 * p);
        assert!((c * c - 5.0 / 3.0 * p / 2.0).abs() < 1e-6 * c * c);
    }

    #[test]
    fn writes_prho_and_c() {
        let mut d = prepared(false);
        let n = d.len();
        compute_eos(0, n, &mut d).unwrap();
        let c = d.fields.real(FieldId::C).unwrap();
        assert!(c.iter().all(|&c| c > 0.0 && c.is_finite()));
        let prho = d.fields.real(FieldId::PRHO).unwrap();
        assert!(prho.iter().all(|&p| p > 0.0));
        assert!(!d.fields.is_allocated(FieldId::RHO));
    }

    #[test]
    fn fills_rho_and_p_when_allocated() {
        let mut d = prepared(true);
        let n = d.len();
        compute_eos(0, n, &mut d).unwrap();
        let rho = d.fields.real(FieldId::RHO).unwrap();
        assert!(rho.iter().all(|&r| (r - 1.0).abs() < 1e-5), "{rho:?}");
        let p = d.fields.real(FieldId::P).unwrap();
        let prho = d.fields.real(FieldId::PRHO).unwrap();
        assert!((p[0] - prho[0]).abs() < 1e-9 * p[0]);
    }
}

//! Global timestep selection.

use rayon::prelude::*;
use sphve_core::{FieldId, StepError};
use sphve_domain::Communicator;
use sphve_fields::ParticleData;

/// Maximum growth of the timestep from one step to the next.
pub const MAX_DT_INCREASE: f64 = 1.1;

/// Rank-local timestep bound from the step diagnostics and, with gravity
/// enabled, the acceleration of `[first, last)`.
pub fn local_timestep(first: usize, last: usize, data: &ParticleData) -> Result<f64, StepError> {
    let attrs = &data.attrs;
    let mut dt = attrs
        .min_dt_courant
        .min(attrs.min_dt_rho)
        .min(MAX_DT_INCREASE * attrs.min_dt);

    if attrs.g != 0.0 {
        let ax = data.fields.real(FieldId::AX)?;
        let ay = data.fields.real(FieldId::AY)?;
        let az = data.fields.real(FieldId::AZ)?;
        let a_max = (first..last)
            .into_par_iter()
            .map(|i| (ax[i] * ax[i] + ay[i] * ay[i] + az[i] * az[i]).sqrt())
            .reduce(|| 0.0, f64::max);
        if a_max > 0.0 {
            dt = dt.min(attrs.eta_acc * (attrs.eps / a_max).sqrt());
        }
    }
    Ok(dt)
}

/// Reduce the rank-local bound over all ranks and advance the clock.
///
/// On success `minDt_m1` takes the previous `minDt`, `minDt` the new step
/// and `time` advances by it. A non-finite or non-positive result leaves
/// the attributes untouched.
pub fn compute_timestep(
    first: usize,
    last: usize,
    data: &mut ParticleData,
    comm: &dyn Communicator,
) -> Result<f64, StepError> {
    let local = local_timestep(first, last, data)?;
    let dt = comm.all_reduce_min(local);
    if !dt.is_finite() || dt <= 0.0 {
        return Err(StepError::InvalidTimestep { value: dt });
    }
    let attrs = &mut data.attrs;
    attrs.min_dt_m1 = attrs.min_dt;
    attrs.min_dt = dt;
    attrs.time += dt;
    Ok(dt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sphve_core::SimBox;
    use sphve_domain::SingleRank;
    use sphve_test_utils::uniform_lattice;

    struct FixedMin(f64);

    impl Communicator for FixedMin {
        fn rank(&self) -> usize {
            1
        }
        fn num_ranks(&self) -> usize {
            2
        }
        fn all_reduce_min(&self, value: f64) -> f64 {
            value.min(self.0)
        }
        fn all_reduce_sum(&self, value: f64) -> f64 {
            value
        }
        fn barrier(&self) {}
    }

    fn lattice() -> ParticleData {
        uniform_lattice(3, &SimBox::cube(0.0, 1.0), 1.3)
    }

    #[test]
    fn smallest_bound_wins_and_clock_advances() {
        let mut d = lattice();
        d.attrs.min_dt = 1.0;
        d.attrs.min_dt_courant = 0.5;
        d.attrs.min_dt_rho = 0.25;
        d.attrs.time = 2.0;
        let dt = compute_timestep(0, d.len(), &mut d, &SingleRank).unwrap();
        assert_eq!(dt, 0.25);
        assert_eq!(d.attrs.min_dt, 0.25);
        assert_eq!(d.attrs.min_dt_m1, 1.0);
        assert_eq!(d.attrs.time, 2.25);
    }

    #[test]
    fn growth_is_limited() {
        let mut d = lattice();
        d.attrs.min_dt = 1e-3;
        let dt = compute_timestep(0, d.len(), &mut d, &SingleRank).unwrap();
        assert!((dt - 1.1e-3).abs() < 1e-15);
    }

    #[test]
    fn reduction_takes_other_ranks_into_account() {
        let mut d = lattice();
        d.attrs.min_dt = 1.0;
        let dt = compute_timestep(0, d.len(), &mut d, &FixedMin(1e-4)).unwrap();
        assert_eq!(dt, 1e-4);
    }

    #[test]
    fn acceleration_bound_applies_with_gravity() {
        let mut d = lattice();
        d.attrs.min_dt = 1.0;
        d.attrs.g = 1.0;
        d.attrs.eps = 0.01;
        d.attrs.eta_acc = 0.2;
        d.fields.real_mut(FieldId::AX).unwrap()[4] = 100.0;
        let dt = compute_timestep(0, d.len(), &mut d, &SingleRank).unwrap();
        assert!((dt - 0.2 * (0.01f64 / 100.0).sqrt()).abs() < 1e-15);
    }

    #[test]
    fn unusable_timestep_is_rejected() {
        let mut d = lattice();
        d.attrs.min_dt = 0.0;
        let before = d.attrs.clone();
        let err = compute_timestep(0, d.len(), &mut d, &SingleRank).unwrap_err();
        assert_eq!(err, StepError::InvalidTimestep { value: 0.0 });
        assert_eq!(d.attrs, before);

        d.attrs.min_dt = f64::NAN;
        assert!(matches!(
            compute_timestep(0, d.len(), &mut d, &SingleRank),
            Err(StepError::InvalidTimestep { .. })
        ));
    }
}

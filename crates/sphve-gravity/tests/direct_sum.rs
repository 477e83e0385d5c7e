//! Tree gravity against direct summation on a random cloud.

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use sphve_core::{FieldId, FieldSet, SimBox, StepError};
use sphve_domain::{Domain, LocalDomain};
use sphve_fields::ParticleData;
use sphve_gravity::traversal::direct;
use sphve_gravity::{
    AccelMultipoleHolder, CpuMultipoleHolder, GravityError, GravityParams, MultipoleHolder,
};

const N: usize = 400;
const EPS: f64 = 1e-3;

fn cloud(with_device: bool) -> (ParticleData, LocalDomain) {
    let mut d = if with_device {
        ParticleData::with_device(N)
    } else {
        ParticleData::new(N)
    };
    d.set_dependent(&["ax", "ay", "az"]).unwrap();
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    for f in [FieldId::X, FieldId::Y, FieldId::Z] {
        for v in d.fields.real_mut(f).unwrap() {
            *v = rng.random::<f64>();
        }
    }
    for m in d.fields.real32_mut(FieldId::M).unwrap() {
        *m = 0.5 + rng.random::<f32>();
    }
    d.fields.real_mut(FieldId::H).unwrap().fill(0.05);
    d.attrs.g = 1.0;
    d.attrs.eps = EPS;

    let mut domain = LocalDomain::with_bucket_size(SimBox::cube(0.0, 1.0), 8);
    domain
        .sync_grav(&mut d, FieldId::M, FieldSet::empty(), FieldSet::empty())
        .unwrap();
    (d, domain)
}

fn brute_force(d: &ParticleData) -> (Vec<[f64; 3]>, f64) {
    let f = &d.fields;
    let (x, y, z) = (
        f.real(FieldId::X).unwrap(),
        f.real(FieldId::Y).unwrap(),
        f.real(FieldId::Z).unwrap(),
    );
    let m = f.real32(FieldId::M).unwrap();
    let params = GravityParams {
        g: 1.0,
        eps: EPS,
        theta: 0.0,
    };
    let mut egrav = 0.0;
    let acc = (0..N)
        .map(|i| {
            let mut a = [0.0; 3];
            let mut phi = 0.0;
            for j in (0..N).filter(|&j| j != i) {
                let (aj, pj) = direct([x[i], y[i], z[i]], [x[j], y[j], z[j]], f64::from(m[j]), &params);
                for k in 0..3 {
                    a[k] += aj[k];
                }
                phi += pj;
            }
            egrav += 0.5 * f64::from(m[i]) * phi;
            a
        })
        .collect();
    (acc, egrav)
}

fn accelerations(d: &ParticleData) -> Vec<[f64; 3]> {
    let f = &d.fields;
    let cols = [FieldId::AX, FieldId::AY, FieldId::AZ].map(|c| f.real(c).unwrap());
    (0..N).map(|i| [cols[0][i], cols[1][i], cols[2][i]]).collect()
}

fn run(holder: &mut dyn MultipoleHolder, d: &mut ParticleData, domain: &LocalDomain) {
    holder.upsweep(d, domain).unwrap();
    holder.traverse(d, domain).unwrap();
}

#[test]
fn traversal_approximates_direct_summation() {
    let (mut d, domain) = cloud(false);
    run(&mut CpuMultipoleHolder::default(), &mut d, &domain);

    let (exact, egrav) = brute_force(&d);
    let tree = accelerations(&d);
    let mean: f64 = exact
        .iter()
        .map(|a| (a[0] * a[0] + a[1] * a[1] + a[2] * a[2]).sqrt())
        .sum::<f64>()
        / N as f64;
    let mut sq = 0.0;
    for (t, e) in tree.iter().zip(&exact) {
        let err = ((t[0] - e[0]).powi(2) + (t[1] - e[1]).powi(2) + (t[2] - e[2]).powi(2)).sqrt();
        assert!(err < 5e-2 * mean, "{err} vs mean {mean}");
        sq += err * err;
    }
    let rms = (sq / N as f64).sqrt();
    assert!(rms < 1e-2 * mean, "rms {rms} vs mean {mean}");
    assert!(egrav < 0.0);
    assert!((d.attrs.egrav - egrav).abs() < 1e-2 * egrav.abs());
}

#[test]
fn zero_opening_angle_is_exact() {
    let (mut d, domain) = cloud(false);
    run(&mut CpuMultipoleHolder::new(0.0), &mut d, &domain);
    let (exact, egrav) = brute_force(&d);
    for (t, e) in accelerations(&d).iter().zip(&exact) {
        for k in 0..3 {
            assert!((t[k] - e[k]).abs() < 1e-9 * (1.0 + e[k].abs()));
        }
    }
    assert!((d.attrs.egrav - egrav).abs() < 1e-9 * egrav.abs());
}

#[test]
fn accelerator_variant_matches_host_variant() {
    let (mut host, domain) = cloud(false);
    run(&mut CpuMultipoleHolder::default(), &mut host, &domain);

    let (mut dev, dev_domain) = cloud(true);
    let mut holder = AccelMultipoleHolder::default();
    run(&mut holder, &mut dev, &dev_domain);

    assert_eq!(accelerations(&host), accelerations(&dev));
    assert_eq!(host.attrs.egrav, dev.attrs.egrav);
    assert_eq!(holder.moments().len(), dev_domain.octree_properties().len());
}

#[test]
fn accelerator_variant_needs_a_mirror() {
    let (mut d, domain) = cloud(false);
    let err = AccelMultipoleHolder::default()
        .upsweep(&mut d, &domain)
        .unwrap_err();
    assert_eq!(err, GravityError::NoDevice);
}

#[test]
fn traversal_requires_current_moments() {
    let (mut d, domain) = cloud(false);
    let err = CpuMultipoleHolder::default()
        .traverse(&mut d, &domain)
        .unwrap_err();
    assert!(matches!(err, GravityError::NotUpswept { moment_nodes: 0, .. }));
    assert!(matches!(StepError::from(err), StepError::Gravity { .. }));
}

#[test]
fn released_acceleration_columns_surface_as_field_errors() {
    let (mut d, domain) = cloud(false);
    d.fields.release(&[FieldId::AX]).unwrap();
    let mut holder = CpuMultipoleHolder::default();
    holder.upsweep(&mut d, &domain).unwrap();
    let err = holder.traverse(&mut d, &domain).unwrap_err();
    assert!(matches!(StepError::from(err), StepError::Field(_)));
}

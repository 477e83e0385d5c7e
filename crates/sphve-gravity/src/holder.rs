//! The gravity holder trait and its host and accelerator variants.

use sphve_core::{ExecutionTarget, FieldError, FieldId, OctreeView};
use sphve_domain::Domain;
use sphve_fields::{DeviceData, ParticleData};

use crate::error::GravityError;
use crate::moments::{upsweep, Multipole};
use crate::traversal::{walk_range, GravityParams, DEFAULT_THETA};

const SOURCE_FIELDS: [FieldId; 4] = [FieldId::X, FieldId::Y, FieldId::Z, FieldId::M];
const ACCEL_FIELDS: [FieldId; 3] = [FieldId::AX, FieldId::AY, FieldId::AZ];

/// Multipole gravity solver over the domain's tree.
///
/// [`upsweep`](Self::upsweep) computes the moments of every cell of the
/// tree from the last sync; [`traverse`](Self::traverse) adds the
/// gravitational acceleration to `ax, ay, az` of the owned particles and
/// stores their potential energy in the `egrav` attribute.
pub trait MultipoleHolder: Send {
    /// Name for diagnostics.
    fn name(&self) -> &str;

    /// Build moments bottom-up over `domain.octree_properties()`.
    fn upsweep(&mut self, data: &mut ParticleData, domain: &dyn Domain) -> Result<(), GravityError>;

    /// Accumulate accelerations and potential energy of the owned range.
    fn traverse(&mut self, data: &mut ParticleData, domain: &dyn Domain) -> Result<(), GravityError>;

    /// Moments of the last upsweep, indexed like the tree nodes.
    fn moments(&self) -> &[Multipole];
}

/// Holder for `target`.
pub fn make_holder(target: ExecutionTarget, theta: f64) -> Box<dyn MultipoleHolder> {
    log::debug!("multipole holder for target {target}, theta {theta}");
    match target {
        ExecutionTarget::Cpu => Box::new(CpuMultipoleHolder::new(theta)),
        ExecutionTarget::Accelerator => Box::new(AccelMultipoleHolder::new(theta)),
    }
}

fn params(data: &ParticleData, theta: f64) -> GravityParams {
    GravityParams {
        g: data.attrs.g,
        eps: data.attrs.eps,
        theta,
    }
}

fn check_upswept(tree: &OctreeView, moments: &[Multipole]) -> Result<(), GravityError> {
    if tree.len() != moments.len() {
        return Err(GravityError::NotUpswept {
            tree_nodes: tree.len(),
            moment_nodes: moments.len(),
        });
    }
    Ok(())
}

fn potential_energy(m: &[f32], first: usize, results: &[([f64; 3], f64)]) -> f64 {
    results
        .iter()
        .enumerate()
        .map(|(k, r)| 0.5 * f64::from(m[first + k]) * r.1)
        .sum()
}

/// Holder evaluating moments and the walk on host columns.
#[derive(Clone, Debug)]
pub struct CpuMultipoleHolder {
    theta: f64,
    moments: Vec<Multipole>,
}

impl Default for CpuMultipoleHolder {
    fn default() -> Self {
        Self::new(DEFAULT_THETA)
    }
}

impl CpuMultipoleHolder {
    /// Holder with opening angle `theta`.
    pub fn new(theta: f64) -> Self {
        Self {
            theta,
            moments: Vec::new(),
        }
    }
}

impl MultipoleHolder for CpuMultipoleHolder {
    fn name(&self) -> &str {
        "cpu"
    }

    fn upsweep(&mut self, data: &mut ParticleData, domain: &dyn Domain) -> Result<(), GravityError> {
        let f = &data.fields;
        let pos = [f.real(FieldId::X)?, f.real(FieldId::Y)?, f.real(FieldId::Z)?];
        self.moments = upsweep(domain.octree_properties(), pos, f.real32(FieldId::M)?);
        Ok(())
    }

    fn traverse(&mut self, data: &mut ParticleData, domain: &dyn Domain) -> Result<(), GravityError> {
        let tree = domain.octree_properties();
        check_upswept(tree, &self.moments)?;
        let (first, last) = (domain.start_index(), domain.end_index());
        let params = params(data, self.theta);

        let f = &data.fields;
        let pos = [f.real(FieldId::X)?, f.real(FieldId::Y)?, f.real(FieldId::Z)?];
        let m = f.real32(FieldId::M)?;
        let results = walk_range(tree, &self.moments, pos, m, first, last, &params);
        let egrav = potential_energy(m, first, &results);

        for (a, field) in ACCEL_FIELDS.into_iter().enumerate() {
            let out = data.fields.real_mut(field)?;
            for (k, r) in results.iter().enumerate() {
                out[first + k] += r.0[a];
            }
        }
        data.attrs.egrav = egrav;
        Ok(())
    }

    fn moments(&self) -> &[Multipole] {
        &self.moments
    }
}

/// Holder that runs on the accelerator mirror of the dataset.
///
/// Sources are transferred to the mirror before the upsweep; the walk
/// reads and writes mirror columns only, and the accelerations of the
/// owned range are transferred back to the host afterwards.
#[derive(Clone, Debug)]
pub struct AccelMultipoleHolder {
    theta: f64,
    moments: Vec<Multipole>,
}

impl Default for AccelMultipoleHolder {
    fn default() -> Self {
        Self::new(DEFAULT_THETA)
    }
}

impl AccelMultipoleHolder {
    /// Holder with opening angle `theta`.
    pub fn new(theta: f64) -> Self {
        Self {
            theta,
            moments: Vec::new(),
        }
    }
}

fn device_sources(dev: &DeviceData) -> Result<([&[f64]; 3], &[f32]), FieldError> {
    Ok((
        [
            dev.column(FieldId::X)?.real()?,
            dev.column(FieldId::Y)?.real()?,
            dev.column(FieldId::Z)?.real()?,
        ],
        dev.column(FieldId::M)?.real32()?,
    ))
}

impl MultipoleHolder for AccelMultipoleHolder {
    fn name(&self) -> &str {
        "accelerator"
    }

    fn upsweep(&mut self, data: &mut ParticleData, domain: &dyn Domain) -> Result<(), GravityError> {
        let n = domain.n_particles_with_halos();
        data.fields.transfer_to_device(0, n, &SOURCE_FIELDS)?;
        let dev = data.fields.device().ok_or(GravityError::NoDevice)?;
        let (pos, m) = device_sources(dev)?;
        self.moments = upsweep(domain.octree_properties(), pos, m);
        Ok(())
    }

    fn traverse(&mut self, data: &mut ParticleData, domain: &dyn Domain) -> Result<(), GravityError> {
        let tree = domain.octree_properties();
        check_upswept(tree, &self.moments)?;
        let (first, last) = (domain.start_index(), domain.end_index());
        let params = params(data, self.theta);
        data.fields.transfer_to_device(first, last, &ACCEL_FIELDS)?;

        let dev = data.fields.device().ok_or(GravityError::NoDevice)?;
        let (pos, m) = device_sources(dev)?;
        let results = walk_range(tree, &self.moments, pos, m, first, last, &params);
        let egrav = potential_energy(m, first, &results);

        let dev = data.fields.device_mut().ok_or(GravityError::NoDevice)?;
        for (a, field) in ACCEL_FIELDS.into_iter().enumerate() {
            let out = dev.column_mut(field)?.real_mut()?;
            for (k, r) in results.iter().enumerate() {
                out[first + k] += r.0[a];
            }
        }
        data.fields.transfer_to_host(first, last, &ACCEL_FIELDS)?;
        data.attrs.egrav = egrav;
        Ok(())
    }

    fn moments(&self) -> &[Multipole] {
        &self.moments
    }
}

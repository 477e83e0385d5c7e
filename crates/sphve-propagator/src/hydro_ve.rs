//! The VE hydro propagator: the step pipeline driven by its phase plan.

use std::sync::Arc;

use sphve_checkpoint::FileWriter;
use sphve_core::{FieldError, FieldId, FieldSet, SimBox, StepError};
use sphve_domain::{Communicator, Domain};
use sphve_fields::ParticleData;
use sphve_gravity::MultipoleHolder;
use sphve_kernels::{
    av_switches, compute_eos, compute_positions, compute_timestep, find_neighbors,
    iad_divv_curlv, momentum_energy, update_smoothing_length, ve_def_gradh, xmass,
};

use crate::error::PropagatorError;
use crate::output::{acquire_released, save_ve_fields};
use crate::plan::{AcquirePolicy, PhasePlan, PhaseSpec, PlanError, Stage};
use crate::propagator::{ForcingPhase, Propagator};
use crate::schema::FieldSchema;
use crate::timer::PhaseTimer;

/// Outcome of one stage.
enum StageRun {
    Ran,
    RanAs(&'static str),
    Skipped,
}

/// Hydrodynamics with generalized volume elements.
pub struct HydroVeProp {
    schema: &'static FieldSchema,
    plan: PhasePlan,
    gravity: Box<dyn MultipoleHolder>,
    comm: Arc<dyn Communicator>,
    timer: PhaseTimer,
}

impl HydroVeProp {
    /// Propagator with the schema for `av_clean`, gravity through `gravity`
    /// and timestep reductions through `comm`.
    pub fn new(
        av_clean: bool,
        gravity: Box<dyn MultipoleHolder>,
        comm: Arc<dyn Communicator>,
    ) -> Result<Self, PlanError> {
        let schema = FieldSchema::select(av_clean);
        let plan = PhasePlan::hydro_ve(schema)?;
        if comm.is_root() {
            log::info!(
                "ve propagator: av cleaning {}, {} phases, gravity via {}",
                if av_clean { "on" } else { "off" },
                plan.len(),
                gravity.name()
            );
        }
        let timer = PhaseTimer::new(comm.is_root());
        Ok(Self {
            schema,
            plan,
            gravity,
            comm,
            timer,
        })
    }

    /// The field schema.
    pub fn schema(&self) -> &'static FieldSchema {
        self.schema
    }

    /// The validated phase plan.
    pub fn plan(&self) -> &PhasePlan {
        &self.plan
    }

    /// The gravity holder.
    pub fn gravity(&self) -> &dyn MultipoleHolder {
        self.gravity.as_ref()
    }

    /// Run one step with `forcing` inserted between the timestep and the
    /// position update.
    pub fn step_with<'f>(
        &mut self,
        domain: &mut dyn Domain,
        data: &mut ParticleData,
        mut forcing: Option<&mut (dyn ForcingPhase + 'f)>,
    ) -> Result<(), StepError> {
        self.timer.start();
        data.attrs.reset_step_bounds();
        let phases = self.plan.phases();
        for phase in phases {
            let ran = run_phase(
                phase,
                self.schema,
                self.gravity.as_mut(),
                self.comm.as_ref(),
                domain,
                data,
                forcing.as_deref_mut(),
            )?;
            if let Some(name) = ran {
                self.timer.step(name);
            }
        }
        self.timer.stop(data.attrs.iteration);
        Ok(())
    }
}

fn run_phase<'f>(
    phase: &PhaseSpec,
    schema: &FieldSchema,
    gravity: &mut dyn MultipoleHolder,
    comm: &dyn Communicator,
    domain: &mut dyn Domain,
    data: &mut ParticleData,
    forcing: Option<&mut (dyn ForcingPhase + 'f)>,
) -> Result<Option<&'static str>, StepError> {
    if !phase.releases.is_empty() {
        data.fields.release(&phase.releases)?;
    }
    if !phase.acquires.is_empty() {
        match phase.acquire_policy {
            AcquirePolicy::Strict => data.fields.acquire(&phase.acquires)?,
            AcquirePolicy::Missing => {
                acquire_released(data, &phase.acquires)?;
            }
        }
    }
    let mut name = phase.name;
    if let Some(stage) = phase.stage {
        match run_stage(stage, schema, gravity, comm, domain, data, forcing)? {
            StageRun::Ran => {}
            StageRun::RanAs(n) => name = n,
            StageRun::Skipped => return Ok(None),
        }
    }
    if let Some(ex) = &phase.exchange {
        domain.exchange_halos(data, &ex.fields, ex.staging)?;
    }
    Ok(Some(name))
}

fn run_stage<'f>(
    stage: Stage,
    schema: &FieldSchema,
    gravity: &mut dyn MultipoleHolder,
    comm: &dyn Communicator,
    domain: &mut dyn Domain,
    data: &mut ParticleData,
    forcing: Option<&mut (dyn ForcingPhase + 'f)>,
) -> Result<StageRun, StepError> {
    let (first, last) = (domain.start_index(), domain.end_index());
    let sim_box = domain.sim_box();
    match stage {
        Stage::Sync => sync_domain(schema, domain, data)?,
        Stage::Resize => {
            data.resize(domain.n_particles_with_halos());
            let ngmax = data.attrs.ngmax as usize;
            data.neighbors.resize(domain.n_particles(), ngmax);
        }
        Stage::PadHaloMass => pad_halo_mass(first, last, data)?,
        Stage::Neighbors => find_neighbors(first, last, data, &sim_box)?,
        Stage::XMass => xmass(first, last, data, &sim_box)?,
        Stage::VeDefGradh => ve_def_gradh(first, last, data, &sim_box)?,
        Stage::Eos => compute_eos(first, last, data)?,
        Stage::IadDivvCurlv => iad_divv_curlv(first, last, data, &sim_box)?,
        Stage::AvSwitches => av_switches(first, last, data, &sim_box, schema.av_clean)?,
        Stage::MomentumEnergy => momentum_energy(first, last, data, &sim_box, schema.av_clean)?,
        Stage::Gravity => {
            if data.attrs.g == 0.0 {
                return Ok(StageRun::Skipped);
            }
            gravity.upsweep(data, &*domain)?;
            gravity.traverse(data, &*domain)?;
            if comm.is_root() {
                log::debug!("egrav on rank 0: {:.6e}", data.attrs.egrav);
            }
        }
        Stage::Timestep => {
            compute_timestep(first, last, data, comm)?;
        }
        Stage::Forcing => {
            let Some(forcing) = forcing else {
                return Ok(StageRun::Skipped);
            };
            forcing.apply(first, last, data, &sim_box)?;
            return Ok(StageRun::RanAs(forcing.name()));
        }
        Stage::Positions => compute_positions(first, last, data, &sim_box)?,
        Stage::SmoothingLength => update_smoothing_length(first, last, data)?,
    }
    Ok(StageRun::Ran)
}

/// Sync the domain, then cache the tree. Gravity runs hand the mass column
/// to the gravity-aware variant separately; otherwise mass travels with the
/// conserved fields.
fn sync_domain(
    schema: &FieldSchema,
    domain: &mut dyn Domain,
    data: &mut ParticleData,
) -> Result<(), StepError> {
    let mut carried = FieldSet::of(schema.conserved);
    let scratch = data
        .fields
        .states()
        .dependent()
        .intersection(&data.fields.allocated());
    if data.attrs.g != 0.0 {
        domain.sync_grav(data, FieldId::M, carried, scratch)?;
    } else {
        carried.insert(FieldId::M);
        domain.sync(data, carried, scratch)?;
    }
    domain.check_range()?;
    data.tree = domain.octree_properties().clone();
    Ok(())
}

/// Give halo padding the mass of the first owned particle.
fn pad_halo_mass(first: usize, last: usize, data: &mut ParticleData) -> Result<(), FieldError> {
    let m = data.fields.real32_mut(FieldId::M)?;
    if first >= last || last > m.len() {
        return Ok(());
    }
    let pad = m[first];
    m[..first].fill(pad);
    m[last..].fill(pad);
    Ok(())
}

impl Propagator for HydroVeProp {
    fn name(&self) -> &str {
        "ve"
    }

    fn conserved_fields(&self) -> Vec<&'static str> {
        self.schema.checkpoint_names()
    }

    fn activate_fields(&self, data: &mut ParticleData) -> Result<(), FieldError> {
        self.schema.activate(data)
    }

    fn sync(&mut self, domain: &mut dyn Domain, data: &mut ParticleData) -> Result<(), StepError> {
        sync_domain(self.schema, domain, data)
    }

    fn step(&mut self, domain: &mut dyn Domain, data: &mut ParticleData) -> Result<(), StepError> {
        self.step_with(domain, data, None)
    }

    fn save_fields(
        &self,
        writer: &mut dyn FileWriter,
        first: usize,
        last: usize,
        data: &mut ParticleData,
        sim_box: &SimBox,
    ) -> Result<Vec<String>, PropagatorError> {
        save_ve_fields(writer, first, last, data, sim_box)
    }

    fn timer(&self) -> &PhaseTimer {
        &self.timer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sphve_domain::{LocalDomain, SingleRank};
    use sphve_gravity::CpuMultipoleHolder;

    #[test]
    fn halo_padding_copies_first_owned_mass() {
        let mut d = ParticleData::new(6);
        d.fields
            .real32_mut(FieldId::M)
            .unwrap()
            .copy_from_slice(&[0.0, 0.0, 2.0, 3.0, 0.0, 0.0]);
        pad_halo_mass(2, 4, &mut d).unwrap();
        assert_eq!(d.fields.real32(FieldId::M).unwrap(), &[2.0, 2.0, 2.0, 3.0, 2.0, 2.0]);
        pad_halo_mass(3, 3, &mut d).unwrap();
    }

    #[test]
    fn sync_refreshes_tree_view() {
        let mut prop =
            HydroVeProp::new(false, Box::new(CpuMultipoleHolder::default()), Arc::new(SingleRank)).unwrap();
        let b = SimBox::cube(0.0, 1.0);
        let mut d = sphve_test_utils::uniform_lattice(4, &b, 1.2);
        prop.activate_fields(&mut d).unwrap();
        let mut dom = LocalDomain::with_bucket_size(b, 8);
        prop.sync(&mut dom, &mut d).unwrap();
        assert_eq!(&d.tree, dom.octree_properties());
        assert!(d.tree.len() > 1);
    }
}

//! VE hydro with turbulent stirring between the timestep and the
//! position update.

use std::sync::Arc;

use sphve_checkpoint::{
    BinaryFileReader, CheckpointError, CheckpointPath, FileReader, FileWriter, RecordValue,
};
use sphve_core::{FieldError, SimBox, StepError};
use sphve_domain::{Communicator, Domain};
use sphve_fields::ParticleData;
use sphve_gravity::MultipoleHolder;
use sphve_kernels::{drive_turbulence, TurbulenceConstants, TurbulenceData, TurbulenceState};

use crate::error::PropagatorError;
use crate::hydro_ve::HydroVeProp;
use crate::propagator::{ForcingPhase, Propagator};
use crate::timer::PhaseTimer;

/// Record holding the phase components.
pub const PHASES_KEY: &str = "turbulence::phases";
/// Record holding the 32-byte generator seed.
pub const SEED_KEY: &str = "turbulence::rngSeed";
/// Record holding the generator stream.
pub const STREAM_KEY: &str = "turbulence::rngStream";
/// Record holding the generator word position, 16 bytes little-endian.
pub const WORD_POS_KEY: &str = "turbulence::rngWordPos";

/// The stirring model as a [`ForcingPhase`].
#[derive(Clone, Debug)]
pub struct TurbulenceForcing {
    turbulence: TurbulenceData,
}

impl TurbulenceForcing {
    /// Forcing with the modes and initial phases of `constants`.
    pub fn new(constants: TurbulenceConstants) -> Result<Self, PropagatorError> {
        Ok(Self {
            turbulence: TurbulenceData::new(constants)?,
        })
    }

    /// The stirring model.
    pub fn turbulence(&self) -> &TurbulenceData {
        &self.turbulence
    }
}

impl ForcingPhase for TurbulenceForcing {
    fn name(&self) -> &'static str {
        "turbulence stirring"
    }

    fn apply(
        &mut self,
        first: usize,
        last: usize,
        data: &mut ParticleData,
        sim_box: &SimBox,
    ) -> Result<(), StepError> {
        drive_turbulence(first, last, data, sim_box, &mut self.turbulence)?;
        Ok(())
    }
}

/// [`HydroVeProp`] plus turbulent stirring.
pub struct TurbVeProp {
    hydro: HydroVeProp,
    forcing: TurbulenceForcing,
}

impl TurbVeProp {
    /// Stirred VE hydro propagator.
    pub fn new(
        av_clean: bool,
        constants: TurbulenceConstants,
        gravity: Box<dyn MultipoleHolder>,
        comm: Arc<dyn Communicator>,
    ) -> Result<Self, PropagatorError> {
        let forcing = TurbulenceForcing::new(constants)?;
        if comm.is_root() {
            log::info!("turbulence stirring with {} modes", forcing.turbulence.num_modes());
        }
        Ok(Self {
            hydro: HydroVeProp::new(av_clean, gravity, comm)?,
            forcing,
        })
    }

    /// The wrapped hydro propagator.
    pub fn hydro(&self) -> &HydroVeProp {
        &self.hydro
    }

    /// The stirring model.
    pub fn turbulence(&self) -> &TurbulenceData {
        &self.forcing.turbulence
    }
}

fn record<'a>(reader: &'a dyn FileReader, name: &str) -> Result<&'a RecordValue, CheckpointError> {
    reader.step_attribute(name)
}

fn type_error(name: &str, expected: &'static str, found: &RecordValue) -> CheckpointError {
    CheckpointError::RecordType {
        name: name.to_string(),
        expected,
        found: found.type_name(),
    }
}

fn fixed_bytes<const N: usize>(reader: &dyn FileReader, name: &str) -> Result<[u8; N], CheckpointError> {
    match record(reader, name)? {
        RecordValue::Bytes(b) => b.as_slice().try_into().map_err(|_| CheckpointError::MalformedStep {
            detail: format!("record '{name}' holds {} bytes, expected {N}", b.len()),
        }),
        other => Err(type_error(name, "bytes", other)),
    }
}

/// Read the stirring state from the open step.
pub fn read_turbulence_state(reader: &dyn FileReader) -> Result<TurbulenceState, CheckpointError> {
    let phases = match record(reader, PHASES_KEY)? {
        RecordValue::Reals(v) => v.clone(),
        other => return Err(type_error(PHASES_KEY, "reals", other)),
    };
    let stream = match record(reader, STREAM_KEY)? {
        RecordValue::Int(v) => *v,
        other => return Err(type_error(STREAM_KEY, "int", other)),
    };
    Ok(TurbulenceState {
        phases,
        seed: fixed_bytes::<32>(reader, SEED_KEY)?,
        stream,
        word_pos: u128::from_le_bytes(fixed_bytes::<16>(reader, WORD_POS_KEY)?),
    })
}

/// Add the stirring state to the open step.
pub fn write_turbulence_state(
    writer: &mut dyn FileWriter,
    state: TurbulenceState,
) -> Result<(), CheckpointError> {
    writer.step_attribute(PHASES_KEY, RecordValue::Reals(state.phases))?;
    writer.step_attribute(SEED_KEY, RecordValue::Bytes(state.seed.to_vec()))?;
    writer.step_attribute(STREAM_KEY, RecordValue::Int(state.stream))?;
    writer.step_attribute(WORD_POS_KEY, RecordValue::Bytes(state.word_pos.to_le_bytes().to_vec()))
}

impl Propagator for TurbVeProp {
    fn name(&self) -> &str {
        "turbulence"
    }

    fn conserved_fields(&self) -> Vec<&'static str> {
        self.hydro.conserved_fields()
    }

    fn activate_fields(&self, data: &mut ParticleData) -> Result<(), FieldError> {
        self.hydro.activate_fields(data)
    }

    fn sync(&mut self, domain: &mut dyn Domain, data: &mut ParticleData) -> Result<(), StepError> {
        self.hydro.sync(domain, data)
    }

    fn step(&mut self, domain: &mut dyn Domain, data: &mut ParticleData) -> Result<(), StepError> {
        let forcing: &mut dyn ForcingPhase = &mut self.forcing;
        self.hydro.step_with(domain, data, Some(forcing))
    }

    fn save(&self, writer: &mut dyn FileWriter) -> Result<(), PropagatorError> {
        write_turbulence_state(writer, self.forcing.turbulence.state())?;
        Ok(())
    }

    /// A missing path or archive is a cold start: nothing changes.
    fn load(&mut self, path: &str, comm: &dyn Communicator) -> Result<(), PropagatorError> {
        let path = path.trim();
        if path.is_empty() {
            return Ok(());
        }
        let location = CheckpointPath::parse(path)?;
        if !location.exists() {
            if comm.is_root() {
                log::info!("no turbulence state at {}, starting cold", location.path.display());
            }
            return Ok(());
        }
        let mut reader = BinaryFileReader::new();
        reader.set_step(&location.path, location.step)?;
        let state = read_turbulence_state(&reader);
        reader.close_step();
        self.forcing.turbulence.restore(state?)?;
        if comm.is_root() {
            log::info!("turbulence state restored from {}", location.path.display());
        }
        Ok(())
    }

    fn save_fields(
        &self,
        writer: &mut dyn FileWriter,
        first: usize,
        last: usize,
        data: &mut ParticleData,
        sim_box: &SimBox,
    ) -> Result<Vec<String>, PropagatorError> {
        self.hydro.save_fields(writer, first, last, data, sim_box)
    }

    fn timer(&self) -> &PhaseTimer {
        self.hydro.timer()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sphve_checkpoint::MemoryArchive;
    use sphve_domain::SingleRank;
    use sphve_gravity::CpuMultipoleHolder;
    use std::path::Path;

    fn prop(seed: u64) -> TurbVeProp {
        let constants = TurbulenceConstants {
            seed,
            ..TurbulenceConstants::default()
        };
        TurbVeProp::new(false, constants, Box::new(CpuMultipoleHolder::default()), Arc::new(SingleRank)).unwrap()
    }

    #[test]
    fn state_round_trips_through_records() {
        let mut p = prop(3);
        p.forcing.turbulence.evolve(0.1);
        let mut a = MemoryArchive::new();
        p.save(&mut a).unwrap();
        a.close_step().unwrap();

        let mut reader = a.reader();
        reader.set_step(Path::new(""), None).unwrap();
        let state = read_turbulence_state(&reader).unwrap();
        assert_eq!(state, p.turbulence().state());
    }

    #[test]
    fn short_seed_is_malformed() {
        let mut a = MemoryArchive::new();
        let mut state = prop(1).turbulence().state();
        state.phases.truncate(6);
        write_turbulence_state(&mut a, state).unwrap();
        a.step_attribute(SEED_KEY, RecordValue::Bytes(vec![1, 2, 3])).unwrap();
        a.close_step().unwrap();
        let mut reader = a.reader();
        reader.set_step(Path::new(""), None).unwrap();
        assert!(matches!(
            read_turbulence_state(&reader),
            Err(CheckpointError::MalformedStep { .. })
        ));
    }

    #[test]
    fn empty_path_is_cold_start() {
        let mut p = prop(5);
        let before = p.turbulence().state();
        p.load("", &SingleRank).unwrap();
        p.load("   ", &SingleRank).unwrap();
        assert_eq!(p.turbulence().state(), before);
    }
}

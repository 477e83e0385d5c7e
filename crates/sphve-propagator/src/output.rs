//! Output of selected columns, recomputing released quantities on demand.
//!
//! Between steps only the conserved fields and the non-scratch dependent
//! fields hold data. Output runs in three passes: what is allocated, then
//! the equation-of-state quantities, then the velocity derivatives. A
//! pass with nothing left to produce skips its acquire and recompute.

use std::cmp::Reverse;

use sphve_checkpoint::{write_fields, FileWriter};
use sphve_core::{FieldError, FieldId, SimBox};
use sphve_fields::{FieldList, ParticleData};
use sphve_kernels::{compute_eos, find_neighbors, iad_divv_curlv, ve_def_gradh, xmass};

use crate::error::PropagatorError;

const ACCELERATIONS: [FieldId; 3] = [FieldId::AX, FieldId::AY, FieldId::AZ];

/// Re-acquired by the second pass.
pub const EOS_OUTPUTS: [FieldId; 5] = [
    FieldId::PRHO,
    FieldId::C,
    FieldId::RHO,
    FieldId::P,
    FieldId::GRADH,
];

/// Re-acquired by the third pass.
pub const GRADIENT_OUTPUTS: [FieldId; 8] = [
    FieldId::DIVV,
    FieldId::CURLV,
    FieldId::C11,
    FieldId::C12,
    FieldId::C13,
    FieldId::C22,
    FieldId::C23,
    FieldId::C33,
];

struct Pending {
    name: String,
    field: Option<FieldId>,
}

/// Acquire the released fields among `fields` and return them.
pub(crate) fn acquire_released(
    data: &mut ParticleData,
    fields: &[FieldId],
) -> Result<FieldList, FieldError> {
    let missing: FieldList = fields
        .iter()
        .copied()
        .filter(|&f| !data.fields.is_allocated(f))
        .collect();
    data.fields.acquire(&missing)?;
    Ok(missing)
}

fn write_allocated(
    writer: &mut dyn FileWriter,
    data: &ParticleData,
    first: usize,
    last: usize,
    pending: &mut Vec<Pending>,
) -> Result<(), PropagatorError> {
    let mut ready: Vec<FieldId> = pending
        .iter()
        .filter_map(|p| p.field)
        .filter(|&f| data.fields.is_allocated(f))
        .collect();
    ready.sort_by_key(|f| Reverse(f.index()));
    write_fields(writer, data, first, last, &ready)?;
    pending.retain(|p| !p.field.is_some_and(|f| ready.contains(&f)));
    Ok(())
}

fn producible(pending: &[Pending]) -> bool {
    pending.iter().any(|p| p.field.is_some())
}

/// One recompute pass: acquire the released `fields`, run `compute`, write
/// what became available. The acquired fields are released again whether
/// or not the pass succeeds.
fn recompute_pass(
    writer: &mut dyn FileWriter,
    data: &mut ParticleData,
    first: usize,
    last: usize,
    pending: &mut Vec<Pending>,
    fields: &[FieldId],
    compute: impl FnOnce(&mut ParticleData) -> Result<(), FieldError>,
) -> Result<(), PropagatorError> {
    if !producible(pending) {
        return Ok(());
    }
    let acquired = acquire_released(data, fields)?;
    let result = compute(data)
        .map_err(PropagatorError::from)
        .and_then(|()| write_allocated(writer, data, first, last, pending));
    data.fields.release(&acquired)?;
    result
}

fn recompute_passes(
    writer: &mut dyn FileWriter,
    first: usize,
    last: usize,
    data: &mut ParticleData,
    sim_box: &SimBox,
    pending: &mut Vec<Pending>,
) -> Result<(), PropagatorError> {
    recompute_pass(writer, data, first, last, pending, &EOS_OUTPUTS, |d| {
        if d.neighbors.rows() != last - first {
            find_neighbors(first, last, d, sim_box)?;
            xmass(first, last, d, sim_box)?;
        }
        ve_def_gradh(first, last, d, sim_box)?;
        compute_eos(first, last, d)
    })?;
    recompute_pass(writer, data, first, last, pending, &GRADIENT_OUTPUTS, |d| {
        let min_dt_rho = d.attrs.min_dt_rho;
        let result = iad_divv_curlv(first, last, d, sim_box);
        d.attrs.min_dt_rho = min_dt_rho;
        result
    })
}

/// Write the dataset's output selection over `[first, last)`.
///
/// Returns the selected names that none of the passes could produce,
/// after logging a warning for each. On error the registry is still left
/// in its between-step allocation state.
pub fn save_ve_fields(
    writer: &mut dyn FileWriter,
    first: usize,
    last: usize,
    data: &mut ParticleData,
    sim_box: &SimBox,
) -> Result<Vec<String>, PropagatorError> {
    let mut pending: Vec<Pending> = data
        .output
        .names()
        .map(|name| Pending {
            name: name.to_string(),
            field: FieldId::from_name(name),
        })
        .collect();

    write_allocated(writer, data, first, last, &mut pending)?;
    data.fields.release(&ACCELERATIONS)?;
    let passes = recompute_passes(writer, first, last, data, sim_box, &mut pending);
    data.fields.acquire(&ACCELERATIONS)?;
    passes?;

    let leftover: Vec<String> = pending.into_iter().map(|p| p.name).collect();
    for name in &leftover {
        log::warn!("output field '{name}' is not available and was not written");
    }
    Ok(leftover)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::HYDRO_VE;
    use sphve_checkpoint::{CheckpointError, MemoryArchive, RecordValue};
    use sphve_fields::ColumnView;
    use sphve_test_utils::uniform_lattice;

    fn resting_lattice() -> ParticleData {
        let mut d = uniform_lattice(4, &SimBox::periodic_cube(0.0, 1.0), 1.3);
        HYDRO_VE.activate(&mut d).unwrap();
        d.fields.release(HYDRO_VE.scratch).unwrap();
        d
    }

    fn written(archive: &MemoryArchive) -> Vec<&str> {
        archive
            .pending()
            .iter()
            .filter(|(_, v)| matches!(v, RecordValue::Column { .. }))
            .map(|(n, _)| n)
            .collect()
    }

    #[test]
    fn allocated_fields_are_written_in_reverse_column_order() {
        let mut d = resting_lattice();
        d.set_output_fields(&["x", "temp", "vx"]);
        let b = SimBox::periodic_cube(0.0, 1.0);
        let n = d.len();
        let mut a = MemoryArchive::new();
        let left = save_ve_fields(&mut a, 0, n, &mut d, &b).unwrap();
        assert!(left.is_empty());
        assert_eq!(written(&a), vec!["temp", "vx", "x"]);
        assert!(!d.fields.is_allocated(FieldId::GRADH));
    }

    #[test]
    fn released_quantities_are_recomputed_and_released_again() {
        let mut d = resting_lattice();
        d.set_output_fields(&["rho", "c", "divv", "x"]);
        let b = SimBox::periodic_cube(0.0, 1.0);
        let n = d.len();
        let mut a = MemoryArchive::new();
        let left = save_ve_fields(&mut a, 0, n, &mut d, &b).unwrap();
        assert!(left.is_empty(), "{left:?}");
        assert_eq!(written(&a), vec!["x", "c", "rho", "divv"]);
        for f in [FieldId::RHO, FieldId::C, FieldId::DIVV, FieldId::C11, FieldId::GRADH] {
            assert!(!d.fields.is_allocated(f), "{f}");
        }
        for f in ACCELERATIONS {
            assert!(d.fields.is_allocated(f));
        }
        let RecordValue::Column { data, .. } = a.pending().get("rho").unwrap() else {
            panic!("rho is not a column");
        };
        assert_eq!(data.len(), n);
    }

    #[test]
    fn unknown_and_undeclared_names_stay_pending() {
        let mut d = resting_lattice();
        d.set_output_fields(&["bogus", "mue", "x"]);
        let b = SimBox::periodic_cube(0.0, 1.0);
        let n = d.len();
        let mut a = MemoryArchive::new();
        let left = save_ve_fields(&mut a, 0, n, &mut d, &b).unwrap();
        assert_eq!(left, vec!["bogus".to_string(), "mue".to_string()]);
        assert_eq!(written(&a), vec!["x"]);
    }

    #[test]
    fn nothing_pending_skips_recompute() {
        let mut d = resting_lattice();
        d.set_output_fields(&["bogus"]);
        let b = SimBox::periodic_cube(0.0, 1.0);
        let n = d.len();
        let mut a = MemoryArchive::new();
        save_ve_fields(&mut a, 0, n, &mut d, &b).unwrap();
        assert_eq!(d.neighbors.rows(), 0);
        assert!(d.fields.real(FieldId::XM).unwrap().iter().all(|&v| v == 0.0));
    }

    /// Archive that fails to write one column.
    struct RejectingWriter {
        inner: MemoryArchive,
        reject: &'static str,
    }

    impl FileWriter for RejectingWriter {
        fn step_attribute(&mut self, name: &str, value: RecordValue) -> Result<(), CheckpointError> {
            self.inner.step_attribute(name, value)
        }

        fn write_field(
            &mut self,
            name: &str,
            data: ColumnView<'_>,
            column: usize,
        ) -> Result<(), CheckpointError> {
            if name == self.reject {
                return Err(CheckpointError::Io(std::io::Error::other("disk full")));
            }
            self.inner.write_field(name, data, column)
        }

        fn close_step(&mut self) -> Result<(), CheckpointError> {
            self.inner.close_step()
        }
    }

    #[test]
    fn failed_write_leaves_registry_at_rest() {
        let b = SimBox::periodic_cube(0.0, 1.0);
        for reject in ["rho", "divv"] {
            let mut d = resting_lattice();
            d.set_output_fields(&["rho", "divv"]);
            let resting = d.fields.allocated();
            let n = d.len();
            let mut w = RejectingWriter {
                inner: MemoryArchive::new(),
                reject,
            };
            let err = save_ve_fields(&mut w, 0, n, &mut d, &b).unwrap_err();
            assert!(matches!(err, PropagatorError::Checkpoint(CheckpointError::Io(_))), "{err}");
            assert_eq!(d.fields.allocated(), resting, "after rejecting {reject}");
        }
    }
}

//! The domain decomposition interface consumed by the step pipeline.

use sphve_core::{DomainError, FieldError, FieldId, FieldSet, OctreeView, SimBox};
use sphve_fields::ParticleData;

/// Spatial partition of the particles owned by one rank.
///
/// After a sync the dataset holds `n_particles_with_halos()` resident
/// particles, of which `[start_index(), end_index())` are owned by this
/// rank and the rest are halo copies of remote particles.
pub trait Domain {
    /// Re-partition and reorder particles.
    ///
    /// Fields in `carried` travel with their particles. Fields in `scratch`
    /// may be used as temporary buffers; their contents are undefined
    /// afterwards.
    fn sync(
        &mut self,
        data: &mut ParticleData,
        carried: FieldSet,
        scratch: FieldSet,
    ) -> Result<(), DomainError>;

    /// Like [`sync`](Self::sync), additionally preparing the tree for the
    /// gravity solver from the `mass` column, which always travels with
    /// its particles whether or not `carried` names it.
    fn sync_grav(
        &mut self,
        data: &mut ParticleData,
        mass: FieldId,
        carried: FieldSet,
        scratch: FieldSet,
    ) -> Result<(), DomainError>;

    /// Refresh the halo copies of `fields`, using the two `staging`
    /// columns as send and receive buffers.
    fn exchange_halos(
        &mut self,
        data: &mut ParticleData,
        fields: &[FieldId],
        staging: [FieldId; 2],
    ) -> Result<(), DomainError>;

    /// First owned particle index.
    fn start_index(&self) -> usize;

    /// One past the last owned particle index.
    fn end_index(&self) -> usize;

    /// Number of owned particles.
    fn n_particles(&self) -> usize {
        self.end_index().saturating_sub(self.start_index())
    }

    /// Number of resident particles including halos.
    fn n_particles_with_halos(&self) -> usize;

    /// Global simulation box.
    fn sim_box(&self) -> SimBox;

    /// Tree topology of the last sync.
    fn octree_properties(&self) -> &OctreeView;

    /// Check `first <= last <= n_with_halos`.
    fn check_range(&self) -> Result<(), DomainError> {
        let (first, last, n) = (self.start_index(), self.end_index(), self.n_particles_with_halos());
        if first <= last && last <= n {
            Ok(())
        } else {
            Err(DomainError::InvalidRange {
                first,
                last,
                n_with_halos: n,
            })
        }
    }
}

/// Check that every field in `fields` is allocated.
pub fn check_resident(data: &ParticleData, fields: FieldSet) -> Result<(), DomainError> {
    match fields.difference(&data.fields.allocated()).iter().next() {
        Some(field) => Err(FieldError::NotAllocated { field }.into()),
        None => Ok(()),
    }
}

/// Validate a halo exchange request against the dataset.
///
/// Payload and staging columns must be allocated. The staging columns
/// must be distinct and must not be part of the payload.
pub fn check_halo_request(
    data: &ParticleData,
    fields: &[FieldId],
    staging: [FieldId; 2],
) -> Result<(), DomainError> {
    let payload: FieldSet = fields.iter().copied().collect();
    check_resident(data, payload.union(&FieldSet::of(&staging)))?;
    if staging[0] == staging[1] {
        return Err(DomainError::HaloExchangeFailed {
            reason: format!("staging buffer '{}' given twice", staging[0]),
        });
    }
    for s in staging {
        if payload.contains(s) {
            return Err(DomainError::HaloExchangeFailed {
                reason: format!("staging buffer '{s}' is also exchanged"),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> ParticleData {
        let mut d = ParticleData::new(4);
        d.set_conserved(&["vx", "vy"]).unwrap();
        d.set_dependent(&["ax", "ay", "prho"]).unwrap();
        d.declare_released(&["gradh"]).unwrap();
        d
    }

    #[test]
    fn halo_request_accepts_resident_payload() {
        let d = data();
        assert!(check_halo_request(&d, &[FieldId::VX, FieldId::PRHO], [FieldId::AX, FieldId::AY]).is_ok());
    }

    #[test]
    fn halo_request_rejects_released_fields() {
        let d = data();
        assert_eq!(
            check_halo_request(&d, &[FieldId::VX], [FieldId::GRADH, FieldId::AY]),
            Err(DomainError::Field(FieldError::NotAllocated { field: FieldId::GRADH }))
        );
    }

    #[test]
    fn halo_request_rejects_bad_staging() {
        let d = data();
        assert!(check_halo_request(&d, &[FieldId::VX], [FieldId::AX, FieldId::AX]).is_err());
        assert!(check_halo_request(&d, &[FieldId::AX], [FieldId::AX, FieldId::AY]).is_err());
        assert!(check_halo_request(&d, &[FieldId::VX], [FieldId::M, FieldId::AY]).is_ok());
    }
}

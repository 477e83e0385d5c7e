//! Single-rank reference domain.

use rayon::prelude::*;
use sphve_core::{DomainError, FieldId, FieldSet, OctreeView, SimBox};
use sphve_fields::ParticleData;

use crate::domain::{check_halo_request, check_resident, Domain};
use crate::{morton, octree};

/// Default maximum number of particles in a leaf cell.
pub const DEFAULT_BUCKET_SIZE: usize = 64;

/// Domain of a run with one rank: every resident particle is owned and
/// there are no halos.
///
/// A sync wraps positions on periodic axes, computes Morton keys, sorts
/// the particles along the curve and rebuilds the octree.
#[derive(Clone, Debug)]
pub struct LocalDomain {
    sim_box: SimBox,
    bucket_size: usize,
    n: usize,
    tree: OctreeView,
    exchanges: usize,
}

impl LocalDomain {
    /// Domain over `sim_box` with the default bucket size.
    pub fn new(sim_box: SimBox) -> Self {
        Self::with_bucket_size(sim_box, DEFAULT_BUCKET_SIZE)
    }

    /// Domain over `sim_box` splitting cells above `bucket_size` particles.
    pub fn with_bucket_size(sim_box: SimBox, bucket_size: usize) -> Self {
        Self {
            sim_box,
            bucket_size: bucket_size.max(1),
            n: 0,
            tree: OctreeView::default(),
            exchanges: 0,
        }
    }

    /// Number of halo exchanges served since construction.
    pub fn exchange_count(&self) -> usize {
        self.exchanges
    }

    fn reorder(
        &mut self,
        data: &mut ParticleData,
        carried: FieldSet,
        scratch: FieldSet,
    ) -> Result<(), DomainError> {
        check_resident(data, carried.union(&scratch))?;
        let n = data.len();
        let b = self.sim_box;
        let (origin, size) = octree::root_cube(&b);

        let [x, y, z, keys] = data
            .fields
            .fields_mut([FieldId::X, FieldId::Y, FieldId::Z, FieldId::KEYS])?;
        for (axis, col) in [x.real_mut()?, y.real_mut()?, z.real_mut()?].into_iter().enumerate() {
            col.par_iter_mut().for_each(|v| *v = b.wrap(axis, *v));
        }
        let (x, y, z) = (x.real()?, y.real()?, z.real()?);
        keys.keys_mut()?
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, k)| *k = morton::key_of([x[i], y[i], z[i]], origin, size));

        let keys = keys.keys()?;
        let mut order: Vec<usize> = (0..n).collect();
        order.par_sort_by_key(|&i| keys[i]);

        let moved = carried.union(&FieldSet::of(&[
            FieldId::X,
            FieldId::Y,
            FieldId::Z,
            FieldId::H,
            FieldId::KEYS,
        ]));
        for field in moved {
            data.fields.column_mut(field)?.permute(&order);
        }

        self.n = n;
        self.tree = octree::build(data.fields.keys()?, &b, self.bucket_size);
        Ok(())
    }
}

impl Domain for LocalDomain {
    fn sync(
        &mut self,
        data: &mut ParticleData,
        carried: FieldSet,
        scratch: FieldSet,
    ) -> Result<(), DomainError> {
        self.reorder(data, carried, scratch)
    }

    fn sync_grav(
        &mut self,
        data: &mut ParticleData,
        mass: FieldId,
        carried: FieldSet,
        scratch: FieldSet,
    ) -> Result<(), DomainError> {
        data.fields.real32(mass)?;
        let mut carried = carried;
        carried.insert(mass);
        self.reorder(data, carried, scratch)
    }

    fn exchange_halos(
        &mut self,
        data: &mut ParticleData,
        fields: &[FieldId],
        staging: [FieldId; 2],
    ) -> Result<(), DomainError> {
        check_halo_request(data, fields, staging)?;
        self.exchanges += 1;
        Ok(())
    }

    fn start_index(&self) -> usize {
        0
    }

    fn end_index(&self) -> usize {
        self.n
    }

    fn n_particles_with_halos(&self) -> usize {
        self.n
    }

    fn sim_box(&self) -> SimBox {
        self.sim_box
    }

    fn octree_properties(&self) -> &OctreeView {
        &self.tree
    }
}

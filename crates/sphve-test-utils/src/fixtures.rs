//! Instrumented domains for pipeline tests.
//!
//! - [`RecordingDomain`] forwards to an inner domain and records every
//!   sync and halo exchange together with the allocation state at the
//!   time of the call.
//! - [`FailingDomain`] fails deterministically after N halo exchanges.

use sphve_core::{DomainError, FieldId, FieldSet, OctreeView, SimBox};
use sphve_domain::Domain;
use sphve_fields::ParticleData;

/// A call observed by [`RecordingDomain`].
#[derive(Clone, Debug, PartialEq)]
pub enum DomainEvent {
    /// `sync`, or `sync_grav` with its mass column.
    Sync {
        mass: Option<FieldId>,
        carried: FieldSet,
        scratch: FieldSet,
    },
    /// `exchange_halos`.
    Exchange {
        fields: Vec<FieldId>,
        staging: [FieldId; 2],
        allocated: FieldSet,
    },
}

/// Forwards to `inner`, recording every call.
pub struct RecordingDomain<D> {
    pub inner: D,
    events: Vec<DomainEvent>,
}

impl<D: Domain> RecordingDomain<D> {
    pub fn new(inner: D) -> Self {
        Self {
            inner,
            events: Vec::new(),
        }
    }

    /// Calls observed so far, in order.
    pub fn events(&self) -> &[DomainEvent] {
        &self.events
    }

    /// Forget the recorded calls.
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Payload fields of every recorded exchange, in call order.
    pub fn exchanged_fields(&self) -> Vec<FieldId> {
        self.events
            .iter()
            .filter_map(|e| match e {
                DomainEvent::Exchange { fields, .. } => Some(fields.iter().copied()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    /// Number of recorded exchanges.
    pub fn exchange_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, DomainEvent::Exchange { .. }))
            .count()
    }
}

impl<D: Domain> Domain for RecordingDomain<D> {
    fn sync(
        &mut self,
        data: &mut ParticleData,
        carried: FieldSet,
        scratch: FieldSet,
    ) -> Result<(), DomainError> {
        self.events.push(DomainEvent::Sync {
            mass: None,
            carried,
            scratch,
        });
        self.inner.sync(data, carried, scratch)
    }

    fn sync_grav(
        &mut self,
        data: &mut ParticleData,
        mass: FieldId,
        carried: FieldSet,
        scratch: FieldSet,
    ) -> Result<(), DomainError> {
        self.events.push(DomainEvent::Sync {
            mass: Some(mass),
            carried,
            scratch,
        });
        self.inner.sync_grav(data, mass, carried, scratch)
    }

    fn exchange_halos(
        &mut self,
        data: &mut ParticleData,
        fields: &[FieldId],
        staging: [FieldId; 2],
    ) -> Result<(), DomainError> {
        self.events.push(DomainEvent::Exchange {
            fields: fields.to_vec(),
            staging,
            allocated: data.fields.allocated(),
        });
        self.inner.exchange_halos(data, fields, staging)
    }

    fn start_index(&self) -> usize {
        self.inner.start_index()
    }

    fn end_index(&self) -> usize {
        self.inner.end_index()
    }

    fn n_particles_with_halos(&self) -> usize {
        self.inner.n_particles_with_halos()
    }

    fn sim_box(&self) -> SimBox {
        self.inner.sim_box()
    }

    fn octree_properties(&self) -> &OctreeView {
        self.inner.octree_properties()
    }
}

/// Forwards to `inner` but fails every halo exchange after the first
/// `succeed_count`.
pub struct FailingDomain<D> {
    pub inner: D,
    pub succeed_count: usize,
    calls: usize,
}

impl<D: Domain> FailingDomain<D> {
    pub fn new(inner: D, succeed_count: usize) -> Self {
        Self {
            inner,
            succeed_count,
            calls: 0,
        }
    }

    /// How many exchanges have been attempted.
    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl<D: Domain> Domain for FailingDomain<D> {
    fn sync(
        &mut self,
        data: &mut ParticleData,
        carried: FieldSet,
        scratch: FieldSet,
    ) -> Result<(), DomainError> {
        self.inner.sync(data, carried, scratch)
    }

    fn sync_grav(
        &mut self,
        data: &mut ParticleData,
        mass: FieldId,
        carried: FieldSet,
        scratch: FieldSet,
    ) -> Result<(), DomainError> {
        self.inner.sync_grav(data, mass, carried, scratch)
    }

    fn exchange_halos(
        &mut self,
        data: &mut ParticleData,
        fields: &[FieldId],
        staging: [FieldId; 2],
    ) -> Result<(), DomainError> {
        let n = self.calls;
        self.calls += 1;
        if n >= self.succeed_count {
            return Err(DomainError::HaloExchangeFailed {
                reason: format!("deliberate failure after {} exchanges", self.succeed_count),
            });
        }
        self.inner.exchange_halos(data, fields, staging)
    }

    fn start_index(&self) -> usize {
        self.inner.start_index()
    }

    fn end_index(&self) -> usize {
        self.inner.end_index()
    }

    fn n_particles_with_halos(&self) -> usize {
        self.inner.n_particles_with_halos()
    }

    fn sim_box(&self) -> SimBox {
        self.inner.sim_box()
    }

    fn octree_properties(&self) -> &OctreeView {
        self.inner.octree_properties()
    }
}

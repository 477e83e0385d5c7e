//! Field registry for the sphve particle dataset.
//!
//! Every particle column lives in a [`FieldStore`] together with its
//! lifecycle state. Conserved columns are allocated once at setup;
//! dependent columns are acquired and released by the step pipeline, and
//! any access to a released column is reported as a
//! [`FieldError`](sphve_core::FieldError) rather than silently reading stale
//! memory.
//!
//! ```text
//! ParticleData
//! ├── FieldStore
//! │   ├── FieldStates (declared fields, allocation state)
//! │   ├── Column × 46 (typed storage)
//! │   └── DeviceData (optional accelerator mirror, same shape)
//! ├── NeighborList
//! ├── Attributes
//! ├── OctreeView
//! └── OutputSelection
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod attributes;
pub mod column;
pub mod device;
pub mod neighbors;
pub mod output;
pub mod particles;
pub mod state;
pub mod store;

pub use attributes::{AttrValue, AttributeSpec, Attributes, ATTRIBUTES};
pub use column::{Column, ColumnData, ColumnView, GROWTH_RATE};
pub use device::DeviceData;
pub use neighbors::NeighborList;
pub use output::OutputSelection;
pub use particles::{ParticleData, ALWAYS_PRESENT};
pub use state::{FieldState, FieldStates};
pub use store::{resolve_names, FieldList, FieldStore};

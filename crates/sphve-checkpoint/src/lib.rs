//! Keyed-record checkpoint archives for sphve.
//!
//! A checkpoint is a sequence of steps; each step maps record names to
//! scalars, arrays or particle columns. Propagators and the driver write
//! through [`FileWriter`] and restore through [`FileReader`], so the
//! on-disk layout stays behind these traits.
//!
//! # Format
//!
//! ```text
//! [MAGIC "SPHV"] [VERSION u8] [Step 1] [Step 2] ... [Step N]
//! ```
//!
//! See [`codec`] for the record layout.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod codec;
pub mod error;
pub mod file;
pub mod memory;
pub mod path;
pub mod state;
pub mod types;

pub use error::CheckpointError;
pub use file::{BinaryFileReader, BinaryFileWriter, FileReader, FileWriter};
pub use memory::{MemoryArchive, MemoryReader};
pub use path::CheckpointPath;
pub use state::{load_attributes, read_fields, store_attributes, write_fields};
pub use types::{RecordValue, Step};

/// Magic bytes at the start of every archive.
pub const MAGIC: [u8; 4] = *b"SPHV";

/// Current binary format version.
pub const FORMAT_VERSION: u8 = 1;

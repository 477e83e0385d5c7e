//! Checkpoint archive errors.

use std::fmt;
use std::io;

use sphve_core::FieldError;

/// Errors from writing or reading a checkpoint archive.
#[derive(Debug)]
pub enum CheckpointError {
    /// The underlying file or stream failed.
    Io(io::Error),
    /// The stream does not start with `b"SPHV"`.
    InvalidMagic,
    /// The format version is not supported by this build.
    UnsupportedVersion {
        /// Version found in the stream.
        found: u8,
    },
    /// A step could not be decoded.
    MalformedStep {
        /// What was wrong.
        detail: String,
    },
    /// A record tag is not recognized.
    UnknownTag {
        /// The unrecognized tag.
        tag: u8,
    },
    /// The requested step does not exist.
    NoSuchStep {
        /// Requested step index.
        step: usize,
        /// Steps in the archive.
        available: usize,
    },
    /// A reader call was made without an open step.
    NoOpenStep,
    /// A required record is absent from the step.
    MissingRecord {
        /// Record name.
        name: String,
    },
    /// A record holds a different value type than requested.
    RecordType {
        /// Record name.
        name: String,
        /// Requested type.
        expected: &'static str,
        /// Stored type.
        found: &'static str,
    },
    /// A `path,step` suffix is not a step number.
    InvalidStepSuffix {
        /// The text after the comma.
        suffix: String,
    },
    /// Restoring a column into the dataset failed.
    Field(FieldError),
}

impl fmt::Display for CheckpointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::InvalidMagic => write!(f, "invalid magic bytes (expected b\"SPHV\")"),
            Self::UnsupportedVersion { found } => write!(f, "unsupported format version {found}"),
            Self::MalformedStep { detail } => write!(f, "malformed step: {detail}"),
            Self::UnknownTag { tag } => write!(f, "unknown record tag {tag}"),
            Self::NoSuchStep { step, available } => {
                write!(f, "step {step} requested, archive holds {available}")
            }
            Self::NoOpenStep => write!(f, "no step is open"),
            Self::MissingRecord { name } => write!(f, "record '{name}' not found"),
            Self::RecordType {
                name,
                expected,
                found,
            } => write!(f, "record '{name}' holds {found}, expected {expected}"),
            Self::InvalidStepSuffix { suffix } => write!(f, "invalid step suffix '{suffix}'"),
            Self::Field(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for CheckpointError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Field(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for CheckpointError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<FieldError> for CheckpointError {
    fn from(e: FieldError) -> Self {
        Self::Field(e)
    }
}

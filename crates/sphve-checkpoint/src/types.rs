//! Record values and steps.

use indexmap::IndexMap;
use sphve_fields::{AttrValue, ColumnData};

use crate::error::CheckpointError;

/// Tag of a real scalar record.
pub const TAG_REAL: u8 = 1;
/// Tag of an integer scalar record.
pub const TAG_INT: u8 = 2;
/// Tag of an opaque byte record.
pub const TAG_BYTES: u8 = 3;
/// Tag of a real array record.
pub const TAG_REALS: u8 = 4;
/// Tag of an `f64` column record.
pub const TAG_COLUMN_REAL: u8 = 5;
/// Tag of an `f32` column record.
pub const TAG_COLUMN_REAL32: u8 = 6;
/// Tag of a `u64` column record.
pub const TAG_COLUMN_KEY: u8 = 7;
/// Tag of a `u32` column record.
pub const TAG_COLUMN_COUNT: u8 = 8;

/// Value of a keyed record.
#[derive(Clone, Debug, PartialEq)]
pub enum RecordValue {
    /// Real scalar.
    Real(f64),
    /// Integer scalar.
    Int(u64),
    /// Opaque bytes.
    Bytes(Vec<u8>),
    /// Real array that is not a particle column.
    Reals(Vec<f64>),
    /// Particle column with its index in the field table.
    Column {
        /// Field table index.
        index: u32,
        /// Column payload.
        data: ColumnData,
    },
}

impl RecordValue {
    /// Wire tag.
    pub fn tag(&self) -> u8 {
        match self {
            Self::Real(_) => TAG_REAL,
            Self::Int(_) => TAG_INT,
            Self::Bytes(_) => TAG_BYTES,
            Self::Reals(_) => TAG_REALS,
            Self::Column { data, .. } => match data {
                ColumnData::Real(_) => TAG_COLUMN_REAL,
                ColumnData::Real32(_) => TAG_COLUMN_REAL32,
                ColumnData::Key(_) => TAG_COLUMN_KEY,
                ColumnData::Count(_) => TAG_COLUMN_COUNT,
            },
        }
    }

    /// Type name for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Real(_) => "real",
            Self::Int(_) => "int",
            Self::Bytes(_) => "bytes",
            Self::Reals(_) => "real array",
            Self::Column { .. } => "column",
        }
    }
}

impl From<AttrValue> for RecordValue {
    fn from(v: AttrValue) -> Self {
        match v {
            AttrValue::Real(x) => Self::Real(x),
            AttrValue::Int(x) => Self::Int(x),
        }
    }
}

/// One checkpoint step: records in insertion order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Step {
    records: IndexMap<String, RecordValue>,
}

fn type_error(name: &str, expected: &'static str, found: &RecordValue) -> CheckpointError {
    CheckpointError::RecordType {
        name: name.to_string(),
        expected,
        found: found.type_name(),
    }
}

impl Step {
    /// Empty step.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record.
    pub fn insert(&mut self, name: &str, value: RecordValue) {
        self.records.insert(name.to_string(), value);
    }

    /// Record by name.
    pub fn get(&self, name: &str) -> Option<&RecordValue> {
        self.records.get(name)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the step holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RecordValue)> {
        self.records.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Record `name`, which must exist.
    pub fn require(&self, name: &str) -> Result<&RecordValue, CheckpointError> {
        self.get(name).ok_or_else(|| CheckpointError::MissingRecord {
            name: name.to_string(),
        })
    }

    /// Scalar record `name` as an attribute value.
    pub fn attribute(&self, name: &str) -> Result<AttrValue, CheckpointError> {
        match self.require(name)? {
            RecordValue::Real(v) => Ok(AttrValue::Real(*v)),
            RecordValue::Int(v) => Ok(AttrValue::Int(*v)),
            other => Err(type_error(name, "scalar", other)),
        }
    }

    /// Column record `name`.
    pub fn column(&self, name: &str) -> Result<&ColumnData, CheckpointError> {
        match self.require(name)? {
            RecordValue::Column { data, .. } => Ok(data),
            other => Err(type_error(name, "column", other)),
        }
    }
}

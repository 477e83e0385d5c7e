//! Binary encode/decode of checkpoint archives.
//!
//! ```text
//! [MAGIC "SPHV"] [VERSION u8] [Step 1] [Step 2] ... [Step N]
//! Step   = [record count u32] [Record]*
//! Record = [name: u32 len + UTF-8] [tag u8] [payload]
//! ```
//!
//! Scalars are 8 bytes. Arrays carry a `u64` element count; column records
//! additionally carry the `u32` field-table index before the count. All
//! integers and floats are little-endian.

use std::io::{Read, Write};

use sphve_fields::ColumnData;

use crate::error::CheckpointError;
use crate::types::*;
use crate::{FORMAT_VERSION, MAGIC};

fn put(w: &mut dyn Write, bytes: &[u8]) -> Result<(), CheckpointError> {
    w.write_all(bytes)?;
    Ok(())
}

fn take<const N: usize>(r: &mut dyn Read) -> Result<[u8; N], CheckpointError> {
    let mut buf = [0u8; N];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

fn put_name(w: &mut dyn Write, name: &str) -> Result<(), CheckpointError> {
    put(w, &(name.len() as u32).to_le_bytes())?;
    put(w, name.as_bytes())
}

fn take_name(r: &mut dyn Read) -> Result<String, CheckpointError> {
    let len = u32::from_le_bytes(take(r)?) as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|e| CheckpointError::MalformedStep {
        detail: format!("record name is not UTF-8: {e}"),
    })
}

macro_rules! array_codec {
    ($put:ident, $take:ident, $t:ty, $width:expr) => {
        fn $put(w: &mut dyn Write, values: &[$t]) -> Result<(), CheckpointError> {
            put(w, &(values.len() as u64).to_le_bytes())?;
            let mut buf = Vec::with_capacity(values.len() * $width);
            for v in values {
                buf.extend_from_slice(&v.to_le_bytes());
            }
            put(w, &buf)
        }

        fn $take(r: &mut dyn Read) -> Result<Vec<$t>, CheckpointError> {
            let len = u64::from_le_bytes(take(r)?) as usize;
            let mut buf = Vec::new();
            (&mut *r).take((len * $width) as u64).read_to_end(&mut buf)?;
            if buf.len() != len * $width {
                return Err(CheckpointError::MalformedStep {
                    detail: format!("array of {len} elements truncated at {} bytes", buf.len()),
                });
            }
            Ok(buf
                .chunks_exact($width)
                .map(|c| {
                    let mut b = [0u8; $width];
                    b.copy_from_slice(c);
                    <$t>::from_le_bytes(b)
                })
                .collect())
        }
    };
}

array_codec!(put_f64s, take_f64s, f64, 8);
array_codec!(put_f32s, take_f32s, f32, 4);
array_codec!(put_u64s, take_u64s, u64, 8);
array_codec!(put_u32s, take_u32s, u32, 4);

/// Write magic and format version.
pub fn encode_header(w: &mut dyn Write) -> Result<(), CheckpointError> {
    put(w, &MAGIC)?;
    put(w, &[FORMAT_VERSION])
}

/// Read and validate magic and format version.
pub fn decode_header(r: &mut dyn Read) -> Result<(), CheckpointError> {
    if take::<4>(r)? != MAGIC {
        return Err(CheckpointError::InvalidMagic);
    }
    let [version] = take::<1>(r)?;
    if version != FORMAT_VERSION {
        return Err(CheckpointError::UnsupportedVersion { found: version });
    }
    Ok(())
}

/// Encode one record.
pub fn encode_record(w: &mut dyn Write, name: &str, value: &RecordValue) -> Result<(), CheckpointError> {
    put_name(w, name)?;
    put(w, &[value.tag()])?;
    match value {
        RecordValue::Real(v) => put(w, &v.to_le_bytes()),
        RecordValue::Int(v) => put(w, &v.to_le_bytes()),
        RecordValue::Bytes(b) => {
            put(w, &(b.len() as u64).to_le_bytes())?;
            put(w, b)
        }
        RecordValue::Reals(v) => put_f64s(w, v),
        RecordValue::Column { index, data } => {
            put(w, &index.to_le_bytes())?;
            match data {
                ColumnData::Real(v) => put_f64s(w, v),
                ColumnData::Real32(v) => put_f32s(w, v),
                ColumnData::Key(v) => put_u64s(w, v),
                ColumnData::Count(v) => put_u32s(w, v),
            }
        }
    }
}

/// Decode one record.
pub fn decode_record(r: &mut dyn Read) -> Result<(String, RecordValue), CheckpointError> {
    let name = take_name(r)?;
    let [tag] = take::<1>(r)?;
    let column = |r: &mut dyn Read, data: fn(&mut dyn Read) -> Result<ColumnData, CheckpointError>| {
        let index = u32::from_le_bytes(take(r)?);
        Ok::<_, CheckpointError>(RecordValue::Column {
            index,
            data: data(r)?,
        })
    };
    let value = match tag {
        TAG_REAL => RecordValue::Real(f64::from_le_bytes(take(r)?)),
        TAG_INT => RecordValue::Int(u64::from_le_bytes(take(r)?)),
        TAG_BYTES => {
            let len = u64::from_le_bytes(take(r)?) as usize;
            let mut buf = Vec::new();
            (&mut *r).take(len as u64).read_to_end(&mut buf)?;
            if buf.len() != len {
                return Err(CheckpointError::MalformedStep {
                    detail: format!("byte record '{name}' truncated"),
                });
            }
            RecordValue::Bytes(buf)
        }
        TAG_REALS => RecordValue::Reals(take_f64s(r)?),
        TAG_COLUMN_REAL => column(r, |r| Ok(ColumnData::Real(take_f64s(r)?)))?,
        TAG_COLUMN_REAL32 => column(r, |r| Ok(ColumnData::Real32(take_f32s(r)?)))?,
        TAG_COLUMN_KEY => column(r, |r| Ok(ColumnData::Key(take_u64s(r)?)))?,
        TAG_COLUMN_COUNT => column(r, |r| Ok(ColumnData::Count(take_u32s(r)?)))?,
        tag => return Err(CheckpointError::UnknownTag { tag }),
    };
    Ok((name, value))
}

/// Encode one step.
pub fn encode_step(w: &mut dyn Write, step: &Step) -> Result<(), CheckpointError> {
    put(w, &(step.len() as u32).to_le_bytes())?;
    for (name, value) in step.iter() {
        encode_record(w, name, value)?;
    }
    Ok(())
}

/// Decode one step.
///
/// Returns `Ok(None)` on a clean end of stream, and an error when the
/// stream ends inside the record count.
pub fn decode_step(r: &mut dyn Read) -> Result<Option<Step>, CheckpointError> {
    let mut head = [0u8; 4];
    let mut filled = 0;
    while filled < head.len() {
        match r.read(&mut head[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => {
                return Err(CheckpointError::MalformedStep {
                    detail: format!("truncated record count: {filled} of 4 bytes"),
                })
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    let count = u32::from_le_bytes(head);
    let mut step = Step::new();
    for _ in 0..count {
        let (name, value) = decode_record(r)?;
        step.insert(&name, value);
    }
    Ok(Some(step))
}

/// Decode a whole archive.
pub fn decode_archive(r: &mut dyn Read) -> Result<Vec<Step>, CheckpointError> {
    decode_header(r)?;
    let mut steps = Vec::new();
    while let Some(step) = decode_step(r)? {
        steps.push(step);
    }
    Ok(steps)
}

//! Dataset attributes and particle columns to and from archives.

use sphve_core::FieldId;
use sphve_fields::{AttrValue, Attributes, ParticleData, ATTRIBUTES};

use crate::error::CheckpointError;
use crate::file::{FileReader, FileWriter};
use crate::types::RecordValue;

/// Write every persisted attribute to the open step.
pub fn store_attributes(writer: &mut dyn FileWriter, attrs: &Attributes) -> Result<(), CheckpointError> {
    for spec in ATTRIBUTES {
        if let Some(v) = attrs.get(spec.name) {
            writer.step_attribute(spec.name, v.into())?;
        }
    }
    Ok(())
}

/// Read the persisted attributes of the open step.
///
/// Missing optional attributes keep their current value; missing required
/// ones are an error and leave `attrs` untouched.
pub fn load_attributes(reader: &dyn FileReader, attrs: &mut Attributes) -> Result<(), CheckpointError> {
    let mut loaded = attrs.clone();
    for spec in ATTRIBUTES {
        if !reader.has_attribute(spec.name) {
            if spec.required {
                return Err(CheckpointError::MissingRecord {
                    name: spec.name.to_string(),
                });
            }
            log::info!("attribute {} not in checkpoint, keeping {:?}", spec.name, attrs.get(spec.name));
            continue;
        }
        let value = match reader.step_attribute(spec.name)? {
            RecordValue::Real(v) => AttrValue::Real(*v),
            RecordValue::Int(v) => AttrValue::Int(*v),
            other => {
                return Err(CheckpointError::RecordType {
                    name: spec.name.to_string(),
                    expected: "scalar",
                    found: other.type_name(),
                })
            }
        };
        loaded.set(spec.name, value);
    }
    *attrs = loaded;
    Ok(())
}

/// Write `[first, last)` of each allocated column in `fields`.
pub fn write_fields(
    writer: &mut dyn FileWriter,
    data: &ParticleData,
    first: usize,
    last: usize,
    fields: &[FieldId],
) -> Result<(), CheckpointError> {
    for &field in fields {
        let view = data.fields.column(field)?.view().slice(first, last);
        writer.write_field(field.name(), view, field.index())?;
    }
    Ok(())
}

/// Replace `fields` of the dataset with the columns of the open step.
///
/// The dataset is resized to the length of the first column; every column
/// must have that length.
pub fn read_fields(
    reader: &dyn FileReader,
    data: &mut ParticleData,
    fields: &[FieldId],
) -> Result<(), CheckpointError> {
    let mut columns = Vec::with_capacity(fields.len());
    for &field in fields {
        columns.push((field, reader.read_field(field.name())?.clone()));
    }
    let Some(n) = columns.first().map(|(_, c)| c.len()) else {
        return Ok(());
    };
    if let Some((field, c)) = columns.iter().find(|(_, c)| c.len() != n) {
        return Err(CheckpointError::MalformedStep {
            detail: format!("column '{field}' holds {} values, expected {n}", c.len()),
        });
    }
    data.resize(n);
    for (field, c) in columns {
        data.fields.set_column(field, c)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryArchive;
    use std::path::Path;

    #[test]
    fn attributes_round_trip() {
        let mut attrs = Attributes::default();
        attrs.iteration = 12;
        attrs.time = 3.5;
        attrs.gamma = 1.4;
        let mut a = MemoryArchive::new();
        store_attributes(&mut a, &attrs).unwrap();
        a.close_step().unwrap();

        let mut r = a.reader();
        r.set_step(Path::new(""), None).unwrap();
        let mut back = Attributes::default();
        load_attributes(&r, &mut back).unwrap();
        assert_eq!(back.iteration, 12);
        assert_eq!(back.time, 3.5);
        assert_eq!(back.gamma, 1.4);
    }

    #[test]
    fn missing_optional_keeps_default_missing_required_fails() {
        let mut a = MemoryArchive::new();
        for (name, v) in [
            ("iteration", RecordValue::Int(4)),
            ("numParticlesGlobal", RecordValue::Int(8)),
            ("time", RecordValue::Real(1.0)),
            ("minDt", RecordValue::Real(0.1)),
            ("minDt_m1", RecordValue::Real(0.1)),
            ("gravConstant", RecordValue::Real(0.0)),
        ] {
            a.step_attribute(name, v).unwrap();
        }
        a.close_step().unwrap();
        a.step_attribute("iteration", RecordValue::Int(5)).unwrap();
        a.close_step().unwrap();

        let mut r = a.reader();
        r.set_step(Path::new(""), Some(0)).unwrap();
        let mut attrs = Attributes::default();
        load_attributes(&r, &mut attrs).unwrap();
        assert_eq!(attrs.iteration, 4);
        assert_eq!(attrs.ng0, Attributes::default().ng0);

        r.set_step(Path::new(""), None).unwrap();
        let before = attrs.clone();
        let err = load_attributes(&r, &mut attrs).unwrap_err();
        assert!(matches!(err, CheckpointError::MissingRecord { ref name } if name == "numParticlesGlobal"));
        assert_eq!(attrs, before);
    }

    #[test]
    fn fields_round_trip_and_resize() {
        let mut src = ParticleData::new(5);
        src.set_conserved(&["vx"]).unwrap();
        src.fields.real_mut(FieldId::VX).unwrap().copy_from_slice(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        src.fields.real32_mut(FieldId::M).unwrap().fill(0.5);

        let mut a = MemoryArchive::new();
        write_fields(&mut a, &src, 1, 4, &[FieldId::VX, FieldId::M]).unwrap();
        a.close_step().unwrap();
        assert_eq!(
            a.steps()[0].get("m"),
            Some(&RecordValue::Column {
                index: 14,
                data: sphve_fields::ColumnData::Real32(vec![0.5; 3])
            })
        );

        let mut r = a.reader();
        r.set_step(Path::new(""), None).unwrap();
        let mut dst = ParticleData::new(10);
        dst.set_conserved(&["vx"]).unwrap();
        read_fields(&r, &mut dst, &[FieldId::VX, FieldId::M]).unwrap();
        assert_eq!(dst.len(), 3);
        assert_eq!(dst.fields.real(FieldId::VX).unwrap(), &[2.0, 3.0, 4.0]);
    }

    #[test]
    fn writing_a_released_field_fails() {
        let mut d = ParticleData::new(2);
        d.declare_released(&["divv"]).unwrap();
        let mut a = MemoryArchive::new();
        let err = write_fields(&mut a, &d, 0, 2, &[FieldId::DIVV]).unwrap_err();
        assert!(matches!(err, CheckpointError::Field(_)));
    }
}

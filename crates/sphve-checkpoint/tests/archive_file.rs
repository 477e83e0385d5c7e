//! Dataset checkpoints through the binary file archive.

use proptest::prelude::*;
use sphve_checkpoint::codec::{decode_archive, encode_header, encode_step};
use sphve_checkpoint::{
    load_attributes, read_fields, store_attributes, write_fields, BinaryFileReader,
    BinaryFileWriter, CheckpointPath, FileReader, FileWriter, RecordValue, Step,
};
use sphve_core::FieldId;
use sphve_fields::{ColumnData, ParticleData};

fn dataset(n: usize) -> ParticleData {
    let mut d = ParticleData::new(n);
    d.set_conserved(&["temp", "vx"]).unwrap();
    for (i, v) in d.fields.real_mut(FieldId::X).unwrap().iter_mut().enumerate() {
        *v = i as f64 * 0.1;
    }
    d.fields.real_mut(FieldId::TEMP).unwrap().fill(300.0);
    d.fields.real32_mut(FieldId::M).unwrap().fill(0.25);
    d.attrs.iteration = 9;
    d.attrs.time = 0.75;
    d
}

#[test]
fn checkpoint_restores_dataset_from_selected_step() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dump.sphv");
    let fields = [FieldId::X, FieldId::M, FieldId::TEMP];

    let mut w = BinaryFileWriter::create(&path).unwrap();
    for iteration in [9, 10] {
        let mut d = dataset(6);
        d.attrs.iteration = iteration;
        store_attributes(&mut w, &d.attrs).unwrap();
        write_fields(&mut w, &d, 0, 6, &fields).unwrap();
        w.close_step().unwrap();
    }

    let spec = format!("{},0", path.display());
    let location = CheckpointPath::parse(&spec).unwrap();
    assert!(location.exists());

    let mut r = BinaryFileReader::new();
    r.set_step(&location.path, location.step).unwrap();
    assert_eq!(r.num_steps(), 2);
    let mut restored = ParticleData::new(0);
    restored.set_conserved(&["temp", "vx"]).unwrap();
    load_attributes(&r, &mut restored.attrs).unwrap();
    read_fields(&r, &mut restored, &fields).unwrap();
    r.close_step();

    let original = dataset(6);
    assert_eq!(restored.attrs.iteration, 9);
    assert_eq!(restored.attrs.time, original.attrs.time);
    for f in fields {
        assert_eq!(
            restored.fields.column(f).unwrap().data(),
            original.fields.column(f).unwrap().data(),
            "{f}"
        );
    }
    assert_eq!(restored.fields.real(FieldId::VX).unwrap(), &[0.0; 6]);
}

fn record() -> impl Strategy<Value = RecordValue> {
    prop_oneof![
        any::<f64>().prop_filter("nan", |v| !v.is_nan()).prop_map(RecordValue::Real),
        any::<u64>().prop_map(RecordValue::Int),
        proptest::collection::vec(any::<u8>(), 0..16).prop_map(RecordValue::Bytes),
        proptest::collection::vec(-1e6f64..1e6, 0..16).prop_map(RecordValue::Reals),
        (0u32..46, proptest::collection::vec(any::<u32>(), 0..16)).prop_map(|(index, v)| {
            RecordValue::Column {
                index,
                data: ColumnData::Count(v),
            }
        }),
        (0u32..46, proptest::collection::vec(-1e3f32..1e3, 0..16)).prop_map(|(index, v)| {
            RecordValue::Column {
                index,
                data: ColumnData::Real32(v),
            }
        }),
    ]
}

proptest! {
    #[test]
    fn archives_decode_to_what_was_encoded(
        steps in proptest::collection::vec(
            proptest::collection::vec(("[a-z:_]{1,12}", record()), 0..6),
            0..4,
        )
    ) {
        let steps: Vec<Step> = steps
            .into_iter()
            .map(|records| {
                let mut s = Step::new();
                for (name, value) in records {
                    s.insert(&name, value);
                }
                s
            })
            .collect();
        let mut buf = Vec::new();
        encode_header(&mut buf).unwrap();
        for s in &steps {
            encode_step(&mut buf, s).unwrap();
        }
        prop_assert_eq!(decode_archive(&mut buf.as_slice()).unwrap(), steps);
    }
}

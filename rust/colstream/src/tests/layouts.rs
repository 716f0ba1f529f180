use colstream_common::ErrorKind;
use colstream_format::ColumnKind;

use crate::{
    ColumnLayout, DataArrayShape, DecodeTarget, Decoder, EncodeSource, Encoder, Reader,
    tests::data_gen,
};

fn f64_at(buf: &[u8], offset: usize) -> f64 {
    f64::from_le_bytes(buf[offset..offset + 8].try_into().unwrap())
}

#[test]
fn test_column_major_is_transpose_of_row_major() {
    let table = data_gen::mixed_table(64);
    let bytes = table.encode(10_000);
    let mut reader = Reader::from_slice(&bytes);
    let frame = reader.next_frame().unwrap().unwrap();

    let mut row_major = Decoder::new();
    row_major.defaults_from_frame(&frame);
    row_major.decode(&frame).unwrap();
    let rows = row_major.output().unwrap();

    let mut column_major = Decoder::new();
    column_major.defaults_from_frame(&frame);
    column_major.set_column_major(true);
    column_major.decode(&frame).unwrap();
    let cols = column_major.output().unwrap();
    table.check_output(&cols, 0);

    // id | lat | name | flags | temp, each 64 rows high
    let bases = [0, 8 * 64, 16 * 64, 32 * 64, 40 * 64];
    let row_offsets = [0, 8, 16, 32, 40];
    let sizes = [8, 8, 16, 8, 8];
    for row in 0..64 {
        for col in 0..5 {
            let r = row * 56 + row_offsets[col];
            let c = bases[col] + row * sizes[col];
            assert_eq!(
                &rows.data()[r..r + sizes[col]],
                &cols.data()[c..c + sizes[col]],
                "row {row} col {col}"
            );
        }
    }
}

#[test]
fn test_explicit_shape() {
    let table = data_gen::numeric_table(10);
    let bytes = table.encode(10_000);
    let mut reader = Reader::from_slice(&bytes);
    let frame = reader.next_frame().unwrap().unwrap();

    let mut decoder = Decoder::new();
    decoder.defaults_from_frame(&frame);
    decoder.set_data_array(DataArrayShape {
        width: Some(40),
        ..Default::default()
    });
    assert_eq!(decoder.required_size(&frame).unwrap(), 9 * 40 + 16);
    let mut buf = vec![0xffu8; 9 * 40 + 16];
    decoder.decode_into(&frame, &mut buf).unwrap();
    for row in 0..10 {
        assert_eq!(f64_at(&buf, row * 40), row as f64);
        assert_eq!(f64_at(&buf, row * 40 + 8), row as f64 / 8.0);
        // padding between rows is untouched
        assert!(buf[row * 40 + 16..(row * 40 + 40).min(buf.len())]
            .iter()
            .all(|&b| b == 0xff));
    }

    // a column-major height above the row count leaves room per column
    decoder.set_data_array(DataArrayShape {
        height: Some(16),
        column_major: true,
        ..Default::default()
    });
    assert_eq!(decoder.rows_to_decode(&frame), 10);
    let mut buf = vec![0u8; 16 * 8 + 10 * 8];
    decoder.decode_into(&frame, &mut buf).unwrap();
    assert_eq!(f64_at(&buf, 9 * 8), 9.0);
    assert_eq!(f64_at(&buf, 16 * 8 + 9 * 8), 9.0 / 8.0);

    decoder.set_row_count(10);
    decoder.set_data_array(DataArrayShape {
        height: Some(4),
        column_major: true,
        ..Default::default()
    });
    let err = decoder.decode_into(&frame, &mut buf).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::InvalidArgument { .. }));
}

#[test]
fn test_per_column_overrides() {
    let table = data_gen::numeric_table(12);
    let bytes = table.encode(10_000);
    let mut reader = Reader::from_slice(&bytes);
    let frame = reader.next_frame().unwrap().unwrap();

    // b before a within each 16-byte row, a written at a separate base offset
    let mut decoder = Decoder::new();
    let a = decoder.add_column("a");
    let b = decoder.add_column("b");
    decoder
        .column_set_layout(b, ColumnLayout::default().with_offset(0).with_stride(16))
        .unwrap();
    decoder
        .column_set_layout(a, ColumnLayout::default().with_offset(200).with_stride(8))
        .unwrap();
    assert_eq!(decoder.required_size(&frame).unwrap(), 200 + 12 * 8);
    let mut buf = vec![0u8; 296];
    decoder.decode_into(&frame, &mut buf).unwrap();
    for row in 0..12 {
        assert_eq!(f64_at(&buf, row * 16), row as f64 / 8.0);
        assert_eq!(f64_at(&buf, 200 + row * 8), row as f64);
    }

    let view = decoder.view(&frame, &buf).unwrap();
    table.check_output(&view, 0);
}

#[test]
fn test_separate_column_buffers() {
    let table = data_gen::mixed_table(30);
    let bytes = table.encode(10_000);
    let mut reader = Reader::from_slice(&bytes);
    let frame = reader.next_frame().unwrap().unwrap();

    let mut decoder = Decoder::new();
    decoder.add_column("id");
    let name = decoder.add_column("name");
    decoder.add_column("temp");

    let mut shared = vec![0u8; 30 * 16];
    let mut names = vec![0u8; 30 * 16];
    let rows = decoder
        .decode_to(
            &frame,
            DecodeTarget::new(&mut shared).with_column_buffer(name, &mut names),
        )
        .unwrap();
    assert_eq!(rows, 30);

    let view = decoder.column_view(&frame, name, &names).unwrap();
    for row in 0..30 {
        assert_eq!(view.str_at(row), Some(format!("item-{row}").as_str()));
    }
    let id = &table.column("id").cells;
    let temp = &table.column("temp").cells;
    for row in 0..30 {
        match (&id[row], f64_at(&shared, row * 16)) {
            (data_gen::Cell::Int(v), got) => assert_eq!(got, *v as f64),
            (_, got) => assert_eq!(got, decoder.settings().missing_double),
        }
        match (&temp[row], f64_at(&shared, row * 16 + 8)) {
            (data_gen::Cell::Real(v), got) => assert_eq!(got, *v),
            (_, got) => assert_eq!(got, decoder.settings().missing_double),
        }
    }

    let mut small = vec![0u8; 29 * 16];
    let err = decoder
        .decode_to(
            &frame,
            DecodeTarget::new(&mut shared).with_column_buffer(name, &mut small),
        )
        .unwrap_err();
    assert!(matches!(
        err.kind(),
        ErrorKind::DestBufferTooSmall {
            required: 480,
            actual: 464
        }
    ));
}

#[test]
fn test_encode_column_major_source() {
    let table = data_gen::numeric_table(25);
    let mut source = Vec::new();
    for column in table.columns() {
        for cell in &column.cells {
            match cell {
                data_gen::Cell::Int(v) => source.extend_from_slice(&(*v as f64).to_le_bytes()),
                data_gen::Cell::Real(v) => source.extend_from_slice(&v.to_le_bytes()),
                other => panic!("unexpected cell {other:?}"),
            }
        }
    }

    let mut encoder = Encoder::new();
    encoder.add_column("a", ColumnKind::Integer);
    encoder.add_column("b", ColumnKind::Double);
    encoder.set_data_array(DataArrayShape {
        height: Some(25),
        column_major: true,
        ..Default::default()
    });
    let bytes = encoder.encode_to_vec(&source).unwrap();
    assert_eq!(bytes, table.encode(encoder.rows_per_frame()));

    let mut reader = Reader::from_slice(&bytes);
    let frame = reader.next_frame().unwrap().unwrap();
    let mut decoder = Decoder::new();
    decoder.defaults_from_frame(&frame);
    decoder.decode(&frame).unwrap();
    table.check_output(&decoder.output().unwrap(), 0);
}

#[test]
fn test_encode_column_major_height_below_rows() {
    let cells = |values: &[f64]| -> Vec<u8> { values.iter().flat_map(|v| v.to_le_bytes()).collect() };
    let mut encoder = Encoder::new();
    encoder.add_column("a", ColumnKind::Integer);
    encoder.add_column("b", ColumnKind::Integer);
    encoder.set_row_count(4);
    encoder.set_data_array(DataArrayShape {
        height: Some(2),
        column_major: true,
        ..Default::default()
    });

    let mut out = Vec::new();
    let err = encoder
        .encode(&cells(&[1.0, 2.0, 10.0, 20.0, 30.0, 40.0]), &mut out)
        .unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::InvalidArgument { .. }));
    assert!(out.is_empty());

    encoder.set_data_array(DataArrayShape {
        height: Some(4),
        column_major: true,
        ..Default::default()
    });
    let bytes = encoder
        .encode_to_vec(&cells(&[1.0, 2.0, 3.0, 4.0, 10.0, 20.0, 30.0, 40.0]))
        .unwrap();
    let mut reader = Reader::from_slice(&bytes);
    let frame = reader.next_frame().unwrap().unwrap();
    let mut decoder = Decoder::new();
    decoder.defaults_from_frame(&frame);
    decoder.decode(&frame).unwrap();
    let output = decoder.output().unwrap();
    let a: Vec<_> = (0..4).map(|r| output.column(0).unwrap().f64_at(r).unwrap()).collect();
    let b: Vec<_> = (0..4).map(|r| output.column(1).unwrap().f64_at(r).unwrap()).collect();
    assert_eq!(a, [1.0, 2.0, 3.0, 4.0]);
    assert_eq!(b, [10.0, 20.0, 30.0, 40.0]);
}

#[test]
fn test_encode_from_column_buffers() {
    let rows = 9;
    let ids: Vec<u8> = (0..rows)
        .flat_map(|r| ((r * 10) as f64).to_le_bytes())
        .collect();
    let mut labels = Vec::new();
    for r in 0..rows {
        let mut cell = format!("l{r}").into_bytes();
        cell.resize(4, 0);
        labels.extend_from_slice(&cell);
    }

    let mut encoder = Encoder::new();
    encoder.add_column("id", ColumnKind::Integer);
    let label = encoder.add_column("label", ColumnKind::String);
    encoder.column_set_data_size(label, 8).unwrap();
    encoder
        .column_set_layout(label, ColumnLayout::default().with_element_size(4))
        .unwrap();
    encoder.set_row_count(rows);

    let mut out = Vec::new();
    let written = encoder
        .encode_from(
            EncodeSource::new(&ids).with_column_buffer(label, &labels),
            &mut out,
        )
        .unwrap();
    assert_eq!(written, out.len() as u64);

    let mut reader = Reader::from_slice(&out);
    let frame = reader.next_frame().unwrap().unwrap();
    assert_eq!(frame.column(label).unwrap().element_size(), 8);
    let mut decoder = Decoder::new();
    decoder.defaults_from_frame(&frame);
    decoder.decode(&frame).unwrap();
    let output = decoder.output().unwrap();
    let id = output.column(0).unwrap();
    let label = output.column(1).unwrap();
    for r in 0..rows {
        assert_eq!(id.f64_at(r), Some((r * 10) as f64));
        assert_eq!(label.str_at(r), Some(format!("l{r}").as_str()));
    }

    let err = encoder
        .encode_from(EncodeSource::new(&ids), &mut Vec::<u8>::new())
        .unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::InvalidArgument { .. }));
}

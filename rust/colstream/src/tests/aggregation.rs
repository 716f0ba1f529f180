use colstream_common::Status;

use crate::{Decoder, Frame, Reader, tests::data_gen};

#[test]
fn test_rows_per_frame_chunking() {
    let table = data_gen::mixed_table(10_000);
    let bytes = table.encode(3000);

    let counts: Vec<_> = Reader::from_slice(&bytes)
        .frames()
        .map(|f| f.unwrap().row_count())
        .collect();
    assert_eq!(counts, vec![3000, 3000, 3000, 1000]);

    let mut decoder = Decoder::new();
    let mut reader = Reader::from_slice(&bytes);
    let mut per_frame = Vec::new();
    let mut first_row = 0;
    while let Some(frame) = reader.next_frame().unwrap() {
        assert_eq!(frame.segment_count(), 1);
        decoder.defaults_from_frame(&frame);
        decoder.decode(&frame).unwrap();
        let output = decoder.output().unwrap();
        table.check_output(&output, first_row);
        // the ignored cell ending each frame's last row is not part of its output
        per_frame.resize(first_row * table.row_width(), 0);
        per_frame.extend_from_slice(output.data());
        first_row += output.row_count();
    }
    assert_eq!(first_row, 10_000);

    let mut reader = Reader::from_slice(&bytes);
    let frame = reader.next_frame_aggregated(10_000).unwrap().unwrap();
    assert_eq!(frame.row_count(), 10_000);
    assert_eq!(frame.segment_count(), 4);
    decoder.decode(&frame).unwrap();
    let output = decoder.output().unwrap();
    table.check_output(&output, 0);
    assert_eq!(output.data(), per_frame.as_slice());
    drop(frame);
    assert!(reader.next_frame_aggregated(10_000).unwrap().is_none());
}

#[test]
fn test_aggregation_row_ceiling() {
    let table = data_gen::numeric_table(10_000);
    let bytes = table.encode(3000);

    let mut reader = Reader::from_slice(&bytes);
    let mut sizes = Vec::new();
    while let Some(frame) = reader.next_frame_aggregated(6500).unwrap() {
        sizes.push((frame.row_count(), frame.segment_count()));
    }
    assert_eq!(sizes, vec![(6000, 2), (4000, 2)]);

    // a ceiling below the frame size still yields whole frames
    let mut reader = Reader::from_slice(&bytes);
    let mut sizes = Vec::new();
    while let Some(frame) = reader.next_frame_aggregated(1000).unwrap() {
        sizes.push(frame.row_count());
    }
    assert_eq!(sizes, vec![3000, 3000, 3000, 1000]);
}

#[test]
fn test_aggregation_stops_at_schema_change() {
    let mixed = data_gen::mixed_table(100);
    let numeric = data_gen::numeric_table(30);
    let mut bytes = mixed.encode(50);
    bytes.extend(numeric.encode(10_000));
    bytes.extend(numeric.encode(10_000));

    let mut reader = Reader::from_slice(&bytes);
    let mut decoder = Decoder::new();

    let frame = reader.next_frame_aggregated(1000).unwrap().unwrap();
    assert_eq!(frame.row_count(), 100);
    assert_eq!(frame.segment_count(), 2);
    decoder.defaults_from_frame(&frame);
    decoder.decode(&frame).unwrap();
    mixed.check_output(&decoder.output().unwrap(), 0);
    drop(frame);

    let frame = reader.next_frame_aggregated(1000).unwrap().unwrap();
    assert_eq!(frame.row_count(), 60);
    assert_eq!(frame.column_count(), 2);
    decoder.defaults_from_frame(&frame);
    decoder.decode(&frame).unwrap();
    let output = decoder.output().unwrap();
    let a = output.column(0).unwrap();
    assert_eq!(a.f64_at(29), Some(29.0));
    assert_eq!(a.f64_at(30), Some(0.0));
    drop(frame);

    let end = reader.next_frame_aggregated(1000);
    assert_eq!(Status::of_next(&end), Status::IterationComplete);
    assert_eq!(reader.frames_read(), 4);
}

#[test]
fn test_owned_frames_outlive_reader_position() {
    let table = data_gen::mixed_table(90);
    let bytes = table.encode(40);

    let mut reader = Reader::from_slice(&bytes);
    let first = reader.next_frame().unwrap().unwrap().to_owned();
    let second = reader.next_frame().unwrap().unwrap().to_owned();
    let third = reader.next_frame().unwrap().unwrap().into_owned();
    assert!(reader.next_frame().unwrap().is_none());
    drop(reader);

    let merged = Frame::aggregate([first, second, third]).unwrap();
    assert_eq!(merged.row_count(), 90);

    let mut decoder = Decoder::new();
    decoder.defaults_from_frame(&merged);
    decoder.decode(&merged).unwrap();
    table.check_output(&decoder.output().unwrap(), 0);

    let handle = std::thread::spawn(move || merged.row_count());
    assert_eq!(handle.join().unwrap(), 90);
}

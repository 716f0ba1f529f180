//! Rechunk command implementation

use std::{fs::File, io::BufWriter, time::Instant};

use anyhow::{Context, Result};
use colstream::{CodecSettings, ColumnKind, Decoder, Encoder, Frame, IntegerBehaviour};
use colstream_io::WriteAdapter;

use crate::{commands::open_reader, utils};

/// Run the rechunk command
pub fn run(rows_per_frame: usize, input: String, output: String) -> Result<()> {
    anyhow::ensure!(rows_per_frame > 0, "--rows-per-frame must be at least 1");
    let start_time = Instant::now();
    let mut reader = open_reader(&input)?;
    let file = File::create(&output).with_context(|| format!("Failed to create {output}"))?;
    let mut sink = WriteAdapter::new(BufWriter::new(file));

    // integers pass through as longs so that no value is rounded
    let settings = CodecSettings::default().with_integer_behaviour(IntegerBehaviour::AsLongs);
    let mut decoder = Decoder::with_settings(settings);
    let mut total_bytes = 0u64;
    let mut total_rows = 0u64;

    // every run of frames sharing a schema is re-encoded as one table
    while let Some(frame) = reader
        .next_frame_aggregated(usize::MAX)
        .context("Failed to read frame")?
    {
        let encoder = encoder_for(&frame, settings, rows_per_frame)?;
        decoder.defaults_from_frame(&frame);
        decoder.decode(&frame).context("Failed to decode frames")?;
        let decoded = decoder
            .output()
            .context("Decoder produced no output")?;
        total_bytes += encoder
            .encode(decoded.data(), &mut sink)
            .context("Failed to encode frames")?;
        total_rows += frame.row_count() as u64;
        log::info!(
            "re-encoded {} rows from {} frames",
            frame.row_count(),
            frame.segment_count()
        );
    }

    println!("Rechunk completed:");
    println!("  Input frames: {}", reader.frames_read());
    println!("  Total records: {total_rows}");
    println!("  Output size: {}", utils::format_size(total_bytes));
    println!("  Total time: {:.3} seconds", start_time.elapsed().as_secs_f64());
    Ok(())
}

/// Builds an encoder reproducing the schema and properties of `frame`.
fn encoder_for(frame: &Frame, settings: CodecSettings, rows_per_frame: usize) -> Result<Encoder> {
    let mut encoder = Encoder::with_settings(settings);
    for descriptor in frame.columns() {
        let column = encoder.add_column(descriptor.name(), descriptor.kind());
        match descriptor.kind() {
            ColumnKind::String => encoder.column_set_data_size(column, descriptor.element_size())?,
            ColumnKind::Bitfield => {
                for field in descriptor.bitfield().map(|b| b.fields()).unwrap_or_default() {
                    encoder.column_add_bitfield(column, field.name(), field.size())?;
                }
            }
            _ => {}
        }
    }
    for idx in 0..frame.property_count() {
        let (key, value) = frame.property(idx)?;
        encoder.add_property(key, value);
    }
    encoder.set_row_count(frame.row_count());
    encoder.set_rows_per_frame(rows_per_frame)?;
    Ok(encoder)
}

#[cfg(test)]
mod tests {
    use colstream::{ColumnKind, Decoder, Encoder, Reader};

    fn write_input(path: &std::path::Path) {
        let mut encoder = Encoder::new();
        encoder.add_column("n", ColumnKind::Integer);
        let flags = encoder.add_column("flags", ColumnKind::Bitfield);
        encoder.column_add_bitfield(flags, "lo", 3).unwrap();
        encoder.column_add_bitfield(flags, "hi", 5).unwrap();
        encoder.add_column("x", ColumnKind::Real);
        encoder.add_property("origin", "test");
        encoder.set_row_count(100);
        encoder.set_rows_per_frame(7).unwrap();
        let source: Vec<u8> = (0..100)
            .flat_map(|r| [r as f64, (r % 256) as f64, r as f64 * 0.5])
            .flat_map(f64::to_le_bytes)
            .collect();
        encoder.encode_to_path(&source, path).unwrap();
    }

    #[test]
    fn test_rechunk() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.cst");
        let output = dir.path().join("out.cst");
        write_input(&input);

        super::run(
            40,
            input.to_str().unwrap().to_string(),
            output.to_str().unwrap().to_string(),
        )
        .unwrap();

        let sizes: Vec<_> = Reader::open(&output)
            .unwrap()
            .frames()
            .map(|f| f.unwrap().row_count())
            .collect();
        assert_eq!(sizes, vec![40, 40, 20]);

        let mut reader = Reader::open(&output).unwrap();
        let frame = reader.next_frame_aggregated(usize::MAX).unwrap().unwrap();
        assert_eq!(frame.property_value("origin"), Some("test"));
        let mut decoder = Decoder::new();
        decoder.add_column("n");
        decoder.add_column("flags.hi");
        decoder.add_column("x");
        decoder.decode(&frame).unwrap();
        let out = decoder.output().unwrap();
        for r in 0..100 {
            assert_eq!(out.column(0).unwrap().f64_at(r), Some(r as f64));
            assert_eq!(out.column(1).unwrap().f64_at(r), Some(((r % 256) >> 3) as f64));
            assert_eq!(out.column(2).unwrap().f64_at(r), Some(r as f64 * 0.5));
        }
    }
}

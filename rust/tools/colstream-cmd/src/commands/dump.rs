//! Dump command implementation

use std::io::{BufWriter, Write};

use anyhow::{Context, Result};
use colstream::{
    CellValue, CodecSettings, DecodeTarget, DecodedOutput, Decoder, Frame, IntegerBehaviour,
};

use crate::commands::open_reader;

/// Run the dump command
pub fn run(columns: Vec<String>, max_rows: Option<usize>, threads: usize, path: String) -> Result<()> {
    anyhow::ensure!(threads > 0, "--threads must be at least 1");
    let mut reader = open_reader(&path)?;
    let settings = CodecSettings::default().with_integer_behaviour(IntegerBehaviour::AsLongs);
    let mut decoder = Decoder::with_settings(settings);
    for column in &columns {
        decoder.add_column(column.as_str());
    }

    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let mut header: Option<Vec<String>> = None;
    let mut remaining = max_rows.unwrap_or(usize::MAX);
    let mut buf = Vec::new();

    while remaining > 0 {
        let frame_no = reader.frames_read() + 1;
        let Some(frame) = reader.next_frame().context("Failed to read frame")? else {
            break;
        };
        if columns.is_empty() {
            decoder.defaults_from_frame(&frame);
        }
        decoder.set_row_count(remaining);
        let output = decode(&decoder, &frame, threads, &mut buf)
            .with_context(|| format!("Failed to decode frame {frame_no}"))?;

        let names: Vec<String> = output.columns().map(|c| c.name().to_string()).collect();
        if header.as_ref() != Some(&names) {
            if header.is_some() {
                log::warn!("column set changes at frame {frame_no}");
            }
            writeln!(out, "{}", names.iter().map(|n| quote(n)).collect::<Vec<_>>().join(","))?;
            header = Some(names);
        }
        write_rows(&mut out, &output)?;
        remaining -= output.row_count();
    }
    out.flush()?;
    Ok(())
}

fn decode<'a>(
    decoder: &'a Decoder,
    frame: &Frame,
    threads: usize,
    buf: &'a mut Vec<u8>,
) -> colstream::Result<DecodedOutput<'a>> {
    buf.clear();
    buf.resize(decoder.required_size(frame)?, 0);
    decoder.decode_threaded(frame, DecodeTarget::new(buf), threads)?;
    decoder.view(frame, buf)
}

fn write_rows<W: Write>(out: &mut W, output: &DecodedOutput) -> Result<()> {
    let views: Vec<_> = output.columns().collect();
    for row in 0..output.row_count() {
        let mut fields = Vec::with_capacity(views.len());
        for view in &views {
            let field = if view.is_missing(row) {
                String::new()
            } else {
                match view.value_at(row) {
                    Some(CellValue::Long(v)) => v.to_string(),
                    Some(CellValue::Double(v)) => v.to_string(),
                    Some(CellValue::Float(v)) => v.to_string(),
                    Some(CellValue::Bytes(_)) => quote(view.str_at(row).unwrap_or_default()),
                    Some(CellValue::Skipped) | None => String::new(),
                }
            };
            fields.push(field);
        }
        writeln!(out, "{}", fields.join(","))?;
    }
    Ok(())
}

/// Quotes a CSV field when it holds a separator, quote or line break.
fn quote(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

//! Inspect command implementation

use anyhow::{Context, Result};
use colstream::{ColumnDescriptor, Frame};
use serde::Serialize;

use crate::{commands::open_reader, utils};

#[derive(Serialize)]
struct InspectSummary {
    path: String,
    file_size: String,
    frame_count: u64,
    total_row_count: u64,
    schema_count: usize,
    schemas: Vec<SchemaInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    properties: Vec<PropertyInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    frames: Vec<FrameInfo>,
}

#[derive(Serialize)]
struct SchemaInfo {
    first_frame: u64,
    columns: Vec<ColumnInfo>,
}

#[derive(Serialize)]
struct ColumnInfo {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    element_size: usize,
    stored_size: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    bitfields: Vec<BitfieldInfo>,
}

#[derive(Serialize)]
struct BitfieldInfo {
    name: String,
    offset: u32,
    size: u32,
}

#[derive(Serialize)]
struct PropertyInfo {
    name: String,
    value: String,
}

#[derive(Serialize)]
struct FrameInfo {
    frame_idx: u64,
    row_count: usize,
    first_row: u64,
    schema_idx: usize,
}

/// Run the inspect command
pub fn run(verbose: u8, path: String) -> Result<()> {
    let file_size = std::fs::metadata(&path)
        .with_context(|| format!("Failed to stat {path}"))?
        .len();
    let mut reader = open_reader(&path)?;

    let mut schemas: Vec<(Vec<ColumnDescriptor>, SchemaInfo)> = Vec::new();
    let mut properties = Vec::new();
    let mut frames = Vec::new();
    let mut total_row_count = 0u64;
    let mut frame_idx = 0u64;

    while let Some(frame) = reader.next_frame().context("Failed to read frame")? {
        if frame_idx == 0 {
            properties = create_property_info(&frame)?;
        }
        let schema_idx = match schemas.iter().position(|(cols, _)| cols == frame.columns()) {
            Some(idx) => idx,
            None => {
                let info = SchemaInfo {
                    first_frame: frame_idx,
                    columns: create_column_info(&frame)?,
                };
                schemas.push((frame.columns().to_vec(), info));
                schemas.len() - 1
            }
        };
        if verbose > 0 {
            frames.push(FrameInfo {
                frame_idx,
                row_count: frame.row_count(),
                first_row: total_row_count,
                schema_idx,
            });
        }
        total_row_count += frame.row_count() as u64;
        frame_idx += 1;
    }

    let summary = InspectSummary {
        path,
        file_size: utils::format_size(file_size),
        frame_count: frame_idx,
        total_row_count,
        schema_count: schemas.len(),
        schemas: schemas.into_iter().map(|(_, info)| info).collect(),
        properties,
        frames,
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn create_column_info(frame: &Frame) -> Result<Vec<ColumnInfo>> {
    (0..frame.column_count())
        .map(|col| {
            let attrs = frame.column_attributes(col)?;
            let bitfields = (0..attrs.bitfield_count)
                .map(|idx| {
                    frame.bitfield_attributes(col, idx).map(|b| BitfieldInfo {
                        name: b.name.to_string(),
                        offset: b.offset,
                        size: b.size,
                    })
                })
                .collect::<colstream::Result<Vec<_>>>()?;
            Ok(ColumnInfo {
                name: attrs.name.to_string(),
                kind: attrs.kind.to_string(),
                element_size: attrs.element_size,
                stored_size: attrs.stored_size,
                bitfields,
            })
        })
        .collect()
}

fn create_property_info(frame: &Frame) -> Result<Vec<PropertyInfo>> {
    (0..frame.property_count())
        .map(|idx| {
            let (name, value) = frame.property(idx)?;
            Ok(PropertyInfo {
                name: name.to_string(),
                value: value.to_string(),
            })
        })
        .collect()
}

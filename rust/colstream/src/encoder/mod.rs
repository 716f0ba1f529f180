//! Frame encoding from caller-defined memory layouts.
//!
//! An [`Encoder`] describes the columns of a table and where their cells live in
//! caller memory (same addressing rules as the decoder, see [`crate::layout`]),
//! then writes the rows as a sequence of frames of at most `rows_per_frame` rows.

use std::ops::Range;

use colstream_common::{Error, Result, verify_arg};
use colstream_format::{
    ColumnChunk, ColumnDescriptor, ColumnKind, FrameHeader, PropertyBagBuilder, Schema,
    bitmap::{bitmap_len, set_bit},
    checksum,
    defs::{DEFAULT_ROWS_PER_FRAME, FRAME_MARKER},
};
use colstream_io::{CountingWrite, FileWriter, SealingWrite};

use crate::{
    frame::segment::word,
    layout::{
        CellFormat, CellPlacement, ColumnLayout, DataArrayShape, Direction, PlacementInput,
        cell_format, place_columns, required_size,
    },
    settings::CodecSettings,
};

mod source;

pub use source::EncodeSource;

#[derive(Debug, Clone)]
struct EncoderColumn {
    descriptor: ColumnDescriptor,
    layout: ColumnLayout,
}

/// Encodes rows from caller memory into a frame stream.
#[derive(Debug, Clone)]
pub struct Encoder {
    settings: CodecSettings,
    columns: Vec<EncoderColumn>,
    shape: DataArrayShape,
    row_count: Option<usize>,
    rows_per_frame: usize,
    properties: PropertyBagBuilder,
}

impl Default for Encoder {
    fn default() -> Self {
        Encoder {
            settings: CodecSettings::default(),
            columns: Vec::new(),
            shape: DataArrayShape::default(),
            row_count: None,
            rows_per_frame: DEFAULT_ROWS_PER_FRAME,
            properties: PropertyBagBuilder::new(),
        }
    }
}

/// Encoder columns with their source cell formats and placements.
struct EncodePlan<'a> {
    columns: Vec<(&'a EncoderColumn, CellFormat, CellPlacement)>,
    rows: usize,
}

impl Encoder {
    pub fn new() -> Encoder {
        Encoder::default()
    }

    pub fn with_settings(settings: CodecSettings) -> Encoder {
        Encoder {
            settings,
            ..Default::default()
        }
    }

    pub fn settings(&self) -> &CodecSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: CodecSettings) {
        self.settings = settings;
    }

    /// Adds a column and returns its index.
    pub fn add_column(&mut self, name: impl Into<String>, kind: ColumnKind) -> usize {
        self.columns.push(EncoderColumn {
            descriptor: ColumnDescriptor::new(name, kind),
            layout: ColumnLayout::default(),
        });
        self.columns.len() - 1
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, column: usize) -> Option<&ColumnDescriptor> {
        self.columns.get(column).map(|c| &c.descriptor)
    }

    /// Sets the element size of a column: the stored width of a string column, or
    /// the source cell size of a numeric one.
    pub fn column_set_data_size(&mut self, column: usize, element_size: usize) -> Result<()> {
        let column = self.column_mut(column)?;
        if column.descriptor.kind() == ColumnKind::String {
            column.descriptor.set_element_size(element_size)
        } else {
            column.layout.element_size = Some(element_size);
            Ok(())
        }
    }

    pub fn column_set_layout(&mut self, column: usize, layout: ColumnLayout) -> Result<()> {
        self.column_mut(column)?.layout = layout;
        Ok(())
    }

    /// Appends a sub-field of `bits` bits to a bit-field column.
    pub fn column_add_bitfield(
        &mut self,
        column: usize,
        name: impl Into<String>,
        bits: u32,
    ) -> Result<()> {
        self.column_mut(column)?
            .descriptor
            .add_bitfield_field(name, bits)
    }

    pub fn set_row_count(&mut self, rows: usize) {
        self.row_count = Some(rows);
    }

    pub fn set_rows_per_frame(&mut self, rows: usize) -> Result<()> {
        verify_arg!(rows_per_frame, rows > 0);
        self.rows_per_frame = rows;
        Ok(())
    }

    pub fn rows_per_frame(&self) -> usize {
        self.rows_per_frame
    }

    pub fn set_column_major(&mut self, column_major: bool) {
        self.shape.column_major = column_major;
    }

    pub fn set_data_array(&mut self, shape: DataArrayShape) {
        self.shape = shape;
    }

    /// Sets a property written into every frame.
    pub fn add_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.set(key, value);
    }

    pub fn properties(&self) -> &PropertyBagBuilder {
        &self.properties
    }

    /// Encodes the rows held in `source`, a shared array laid out as configured.
    /// Returns the number of bytes written; the sink is sealed.
    pub fn encode<W>(&self, source: &[u8], sink: &mut W) -> Result<u64>
    where
        W: SealingWrite + ?Sized,
    {
        self.encode_from(EncodeSource::new(source), sink)
    }

    pub fn encode_to_vec(&self, source: &[u8]) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.encode(source, &mut out)?;
        Ok(out)
    }

    pub fn encode_to_path<P: AsRef<std::path::Path>>(&self, source: &[u8], path: P) -> Result<u64> {
        let path = path.as_ref();
        let mut file =
            FileWriter::create(path).map_err(|e| Error::io(path.display().to_string(), e))?;
        self.encode(source, &mut file)
    }

    /// Encodes the rows held in the buffers of `source`.
    pub fn encode_from<W>(&self, source: EncodeSource<'_>, sink: &mut W) -> Result<u64>
    where
        W: SealingWrite + ?Sized,
    {
        let plan = self.plan(&source)?;
        let descriptors: Vec<_> = self.columns.iter().map(|c| c.descriptor.clone()).collect();
        Schema::new(descriptors.clone())?;
        for descriptor in &descriptors {
            descriptor.validate()?;
        }
        let properties = self.properties.to_pairs();

        let mut sink = CountingWrite::new(sink);
        let mut start = 0;
        let mut frames = 0;
        while start < plan.rows {
            let end = (start + self.rows_per_frame).min(plan.rows);
            let (chunks, data) = self.encode_rows(&plan, &source, start..end)?;
            let header = FrameHeader {
                row_count: (end - start) as u64,
                columns: descriptors.clone(),
                chunks,
                properties: properties.clone(),
                data_size: data.len() as u64,
            };
            write_frame(&mut sink, &header, &data)?;
            frames += 1;
            log::debug!(
                "wrote frame {frames}: rows {start}..{end}, {} data bytes",
                data.len()
            );
            start = end;
        }
        sink.seal().map_err(|e| Error::io("encoder sink", e))?;
        log::debug!(
            "encoded {} rows into {frames} frames, {} bytes",
            plan.rows,
            sink.bytes_written()
        );
        Ok(sink.bytes_written())
    }

    fn column_mut(&mut self, column: usize) -> Result<&mut EncoderColumn> {
        verify_arg!(column, column < self.columns.len());
        Ok(&mut self.columns[column])
    }

    fn plan(&self, source: &EncodeSource) -> Result<EncodePlan<'_>> {
        if self.columns.is_empty() {
            return Err(Error::configuration("no columns to encode"));
        }
        let rows = self
            .row_count
            .or(self.shape.height)
            .ok_or_else(|| Error::configuration("row count is not set"))?;
        self.shape.check_rows(rows)?;
        if let Some(column) = source.column_indices().find(|&c| c >= self.columns.len()) {
            return Err(Error::invalid_arg(
                "column buffer",
                format!("column {column} is not configured"),
            ));
        }

        let mut formats = Vec::with_capacity(self.columns.len());
        let mut inputs = Vec::with_capacity(self.columns.len());
        for (i, column) in self.columns.iter().enumerate() {
            let descriptor = &column.descriptor;
            let format = cell_format(
                descriptor.name(),
                descriptor.kind(),
                descriptor.element_size(),
                column.layout.element_size,
                &self.settings,
                Direction::Encode,
            )?;
            inputs.push(PlacementInput {
                element_size: format.size(),
                layout: column.layout,
                separate: source.has_column_buffer(i),
            });
            formats.push(format);
        }
        let placements = place_columns(&inputs, &self.shape, rows);

        let shared_size = required_size(
            placements
                .iter()
                .zip(&formats)
                .zip(&inputs)
                .filter(|(_, input)| !input.separate)
                .map(|(cell, _)| cell),
            rows,
        );
        check_source_size(shared_size, source.shared(), "shared array")?;
        for i in (0..inputs.len()).filter(|&i| inputs[i].separate) {
            let required = required_size([(&placements[i], &formats[i])], rows);
            check_source_size(required, source.column(i), self.columns[i].descriptor.name())?;
        }

        let columns = self
            .columns
            .iter()
            .zip(formats)
            .zip(placements)
            .map(|((column, format), placement)| (column, format, placement))
            .collect();
        Ok(EncodePlan { columns, rows })
    }

    /// Builds the data section of one frame: a chunk per column, each holding an
    /// optional missing bitmap and the stored values.
    fn encode_rows(
        &self,
        plan: &EncodePlan,
        source: &EncodeSource,
        rows: Range<usize>,
    ) -> Result<(Vec<ColumnChunk>, Vec<u8>)> {
        let frame_rows = rows.len();
        let mut data = Vec::new();
        let mut chunks = Vec::with_capacity(plan.columns.len());
        let mut values = Vec::new();
        let mut bitmap = vec![0u8; bitmap_len(frame_rows)];

        for (i, (column, format, placement)) in plan.columns.iter().enumerate() {
            let descriptor = &column.descriptor;
            let offset = data.len() as u64;
            if descriptor.kind() == ColumnKind::Ignore {
                chunks.push(ColumnChunk {
                    offset,
                    size: 0,
                    missing_count: 0,
                });
                continue;
            }
            let buf = if source.has_column_buffer(i) {
                source.column(i)
            } else {
                source.shared()
            }
            .unwrap_or_default();

            values.clear();
            bitmap.fill(0);
            let mut missing_count = 0u64;
            for (local, row) in rows.clone().enumerate() {
                let start = placement.cell(row);
                let cell = &buf[start..start + format.size()];
                let missing = self.encode_cell(descriptor, *format, cell, row, &mut values)?;
                if missing {
                    set_bit(&mut bitmap, local);
                    missing_count += 1;
                }
            }
            if missing_count > 0 {
                data.extend_from_slice(&bitmap);
            }
            data.extend_from_slice(&values);
            chunks.push(ColumnChunk {
                offset,
                size: data.len() as u64 - offset,
                missing_count,
            });
            log::trace!(
                "column '{}': {frame_rows} rows, {missing_count} missing",
                descriptor.name()
            );
        }
        Ok((chunks, data))
    }

    /// Appends the stored form of one cell to `values` and returns whether it holds
    /// the missing-value sentinel. Missing cells are stored as zero bytes.
    fn encode_cell(
        &self,
        descriptor: &ColumnDescriptor,
        format: CellFormat,
        cell: &[u8],
        row: usize,
        values: &mut Vec<u8>,
    ) -> Result<bool> {
        let settings = &self.settings;
        let stored_size = descriptor.element_size();
        match descriptor.kind() {
            ColumnKind::Integer | ColumnKind::Bitfield => {
                let value = match format {
                    CellFormat::I64 => {
                        let value = i64::from_le_bytes(word(cell));
                        if settings.is_missing_integer(value) {
                            None
                        } else {
                            Some(value)
                        }
                    }
                    _ => {
                        let value = f64::from_le_bytes(word(cell));
                        if settings.is_missing_double(value) {
                            None
                        } else {
                            Some(integral(value).ok_or_else(|| {
                                Error::invalid_arg(
                                    descriptor.name(),
                                    format!("row {row}: {value} is not an integer"),
                                )
                            })?)
                        }
                    }
                };
                let Some(value) = value else {
                    values.resize(values.len() + stored_size, 0);
                    return Ok(true);
                };
                if descriptor.kind() == ColumnKind::Integer {
                    values.extend_from_slice(&value.to_le_bytes());
                } else {
                    let container = u32::try_from(value).map_err(|_| {
                        Error::invalid_arg(
                            descriptor.name(),
                            format!("row {row}: {value} does not fit a 32-bit bit-field"),
                        )
                    })?;
                    values.extend_from_slice(&container.to_le_bytes());
                }
                Ok(false)
            }
            ColumnKind::Real | ColumnKind::Double => {
                let (value, missing) = match format {
                    CellFormat::F32 => {
                        let value = f32::from_le_bytes(word(cell));
                        let missing =
                            value.to_bits() == (settings.missing_double as f32).to_bits();
                        (value as f64, missing)
                    }
                    _ => {
                        let value = f64::from_le_bytes(word(cell));
                        (value, settings.is_missing_double(value))
                    }
                };
                if missing {
                    values.resize(values.len() + stored_size, 0);
                    return Ok(true);
                }
                if descriptor.kind() == ColumnKind::Real {
                    values.extend_from_slice(&(value as f32).to_le_bytes());
                } else {
                    values.extend_from_slice(&value.to_le_bytes());
                }
                Ok(false)
            }
            ColumnKind::String => {
                values.extend_from_slice(cell);
                values.resize(values.len() + stored_size - cell.len(), 0);
                Ok(false)
            }
            ColumnKind::Ignore => Ok(false),
        }
    }
}

/// Converts a double holding an integral value.
fn integral(value: f64) -> Option<i64> {
    // i64::MAX is not representable; 2^63 is the first out of range value
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    (value.is_finite() && value.fract() == 0.0 && value >= -LIMIT && value < LIMIT)
        .then_some(value as i64)
}

fn check_source_size(required: usize, buf: Option<&[u8]>, name: &str) -> Result<()> {
    let available = buf.map_or(0, <[u8]>::len);
    if required > available {
        return Err(Error::invalid_arg(
            name,
            format!("source buffer holds {available} bytes, {required} required"),
        ));
    }
    Ok(())
}

fn write_frame<W: SealingWrite + ?Sized>(
    sink: &mut W,
    header: &FrameHeader,
    data: &[u8],
) -> Result<()> {
    let message = header.to_message()?;
    let io = |e| Error::io("encoder sink", e);
    sink.write_all(&FRAME_MARKER).map_err(io)?;
    sink.write_all(&message).map_err(io)?;
    sink.write_all(data).map_err(io)?;
    sink.write_all(&checksum::compute(data).to_le_bytes())
        .map_err(io)?;
    Ok(())
}

//! Frame decoding into caller-defined memory layouts.
//!
//! A [`Decoder`] is configured once (columns, element sizes, strides, offsets,
//! row- or column-major order, row ceiling) and then applied to any number of
//! frames. Column names are resolved against each frame's schema at decode time;
//! `column.subfield` selects one sub-field of a bit-field column.

use std::ops::Range;

use ahash::AHashMap;
use colstream_common::{Error, Result, verify_arg};
use colstream_format::{BitfieldField, ColumnKind, ColumnRef};
use rayon::prelude::*;

use crate::{
    frame::Frame,
    layout::{
        CellFormat, CellPlacement, ColumnLayout, DataArrayShape, Direction, PlacementInput,
        cell_format, check_disjoint, place_columns, required_size,
    },
    settings::CodecSettings,
};

mod output;
mod pool;
mod target;

pub use output::{CellValue, ColumnView, DecodedOutput};
pub use target::DecodeTarget;

use output::OutputColumn;
use target::RawDest;

#[derive(Debug, Clone)]
struct DecoderColumn {
    name: String,
    layout: ColumnLayout,
}

/// Result of [`Decoder::decode`], kept until the next decode or reconfiguration.
#[derive(Debug)]
struct OwnedOutput {
    data: Vec<u8>,
    cells: Vec<(CellFormat, CellPlacement)>,
    rows: usize,
}

/// Decodes frames into caller memory.
#[derive(Debug, Default)]
pub struct Decoder {
    settings: CodecSettings,
    columns: Vec<DecoderColumn>,
    shape: DataArrayShape,
    row_count: Option<usize>,
    output: Option<OwnedOutput>,
}

/// One decoder column resolved against a frame schema.
#[derive(Debug)]
struct ColumnPlan<'f> {
    source: ColumnRef,
    kind: ColumnKind,
    element_size: usize,
    sub_field: Option<&'f BitfieldField>,
    format: CellFormat,
    placement: CellPlacement,
    separate: bool,
}

#[derive(Debug)]
struct DecodePlan<'f> {
    columns: Vec<ColumnPlan<'f>>,
    rows: usize,
}

impl Decoder {
    pub fn new() -> Decoder {
        Decoder::default()
    }

    pub fn with_settings(settings: CodecSettings) -> Decoder {
        Decoder {
            settings,
            ..Default::default()
        }
    }

    pub fn settings(&self) -> &CodecSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: CodecSettings) {
        self.output = None;
        self.settings = settings;
    }

    /// Replaces the configured columns with all columns of `frame`, in frame order,
    /// with default element sizes.
    pub fn defaults_from_frame(&mut self, frame: &Frame) {
        self.output = None;
        self.columns = frame
            .columns()
            .iter()
            .map(|c| DecoderColumn {
                name: c.name().to_string(),
                layout: ColumnLayout::default(),
            })
            .collect();
    }

    /// Adds a column to decode and returns its index. `name` is a column name or a
    /// `column.subfield` reference.
    pub fn add_column(&mut self, name: impl Into<String>) -> usize {
        self.output = None;
        self.columns.push(DecoderColumn {
            name: name.into(),
            layout: ColumnLayout::default(),
        });
        self.columns.len() - 1
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_name(&self, column: usize) -> Option<&str> {
        self.columns.get(column).map(|c| c.name.as_str())
    }

    /// Sets the in-memory element size of a column.
    pub fn column_set_data_size(&mut self, column: usize, element_size: usize) -> Result<()> {
        self.column_mut(column)?.layout.element_size = Some(element_size);
        Ok(())
    }

    /// Replaces the layout overrides of a column.
    pub fn column_set_layout(&mut self, column: usize, layout: ColumnLayout) -> Result<()> {
        self.column_mut(column)?.layout = layout;
        Ok(())
    }

    pub fn set_column_major(&mut self, column_major: bool) {
        self.output = None;
        self.shape.column_major = column_major;
    }

    /// Sets the row ceiling: at most `rows` rows of a frame are decoded.
    pub fn set_row_count(&mut self, rows: usize) {
        self.output = None;
        self.row_count = Some(rows);
    }

    pub fn set_data_array(&mut self, shape: DataArrayShape) {
        self.output = None;
        self.shape = shape;
    }

    /// Number of rows a decode of `frame` produces.
    pub fn rows_to_decode(&self, frame: &Frame) -> usize {
        self.row_ceiling(frame).min(frame.row_count())
    }

    /// Byte size of the shared array needed to decode `frame`.
    pub fn required_size(&self, frame: &Frame) -> Result<usize> {
        let plan = self.plan(frame, |_| false)?;
        Ok(plan.shared_size())
    }

    /// Decodes `frame` into a buffer owned by the decoder, returning the number of
    /// rows decoded. The result is available through [`output`](Decoder::output)
    /// until the next decode or configuration change.
    pub fn decode(&mut self, frame: &Frame) -> Result<usize> {
        self.output = None;
        let plan = self.plan(frame, |_| false)?;
        let mut data = vec![0u8; plan.shared_size()];
        {
            let shared = RawDest::new(&mut data);
            self.decode_rows(&plan, frame, Some(&shared), &AHashMap::new(), 0..plan.rows)?;
        }
        let rows = plan.rows;
        let cells = plan
            .columns
            .iter()
            .map(|c| (c.format, c.placement))
            .collect();
        self.output = Some(OwnedOutput { data, cells, rows });
        Ok(rows)
    }

    /// Result of the last [`decode`](Decoder::decode).
    pub fn output(&self) -> Option<DecodedOutput<'_>> {
        let output = self.output.as_ref()?;
        let columns = self
            .columns
            .iter()
            .zip(&output.cells)
            .map(|(column, &(format, placement))| OutputColumn {
                name: &column.name,
                format,
                placement,
            })
            .collect();
        DecodedOutput::new(&output.data, columns, output.rows, self.settings).ok()
    }

    /// Decodes `frame` into `buf`, laid out as configured.
    pub fn decode_into(&self, frame: &Frame, buf: &mut [u8]) -> Result<usize> {
        self.decode_to(frame, DecodeTarget::new(buf))
    }

    /// Decodes `frame` into the buffers of `target`.
    pub fn decode_to(&self, frame: &Frame, target: DecodeTarget<'_>) -> Result<usize> {
        let (plan, shared, columns) = self.prepare(frame, target)?;
        self.decode_rows(&plan, frame, shared.as_ref(), &columns, 0..plan.rows)?;
        Ok(plan.rows)
    }

    /// Decodes `frame` on `threads` worker threads, each handling a contiguous
    /// chunk of `rows / threads` rows; the last chunk also takes the remainder.
    ///
    /// The output is identical to [`decode_to`](Decoder::decode_to). Layouts in
    /// which two cells share a byte are rejected. Worker failures are reported
    /// together once all workers have finished; cells written by successful
    /// workers are left in place.
    pub fn decode_threaded(
        &self,
        frame: &Frame,
        target: DecodeTarget<'_>,
        threads: usize,
    ) -> Result<usize> {
        verify_arg!(threads, threads > 0);
        let (plan, shared, columns) = self.prepare(frame, target)?;
        let rows = plan.rows;
        if threads == 1 {
            self.decode_rows(&plan, frame, shared.as_ref(), &columns, 0..rows)?;
            return Ok(rows);
        }

        let shared_cells: Vec<_> = plan
            .columns
            .iter()
            .filter(|c| !c.separate && !c.format.is_skip())
            .map(|c| c.placement)
            .collect();
        check_disjoint(&shared_cells, rows)?;
        for column in plan.columns.iter().filter(|c| c.separate) {
            check_disjoint(&[column.placement], rows)?;
        }

        let pool = pool::get(threads)?;
        log::debug!(
            "threaded decode of {rows} rows on {threads} workers, {} rows per chunk",
            rows / threads
        );
        let results: Vec<Result<()>> = pool.install(|| {
            (0..threads)
                .into_par_iter()
                .map(|worker| {
                    let range = chunk_range(rows, threads, worker);
                    self.decode_rows(&plan, frame, shared.as_ref(), &columns, range)
                })
                .collect()
        });

        let mut failed = 0;
        let mut first = None;
        for err in results.into_iter().filter_map(|r| r.err()) {
            failed += 1;
            first.get_or_insert(err);
        }
        match first {
            None => Ok(rows),
            Some(first) => Err(Error::parallel_decode(failed, threads, first)),
        }
    }

    /// Reads decoded cells of `frame` from `data`, a shared array filled by
    /// [`decode_into`](Decoder::decode_into) or [`decode_to`](Decoder::decode_to).
    pub fn view<'a>(&'a self, frame: &Frame, data: &'a [u8]) -> Result<DecodedOutput<'a>> {
        let plan = self.plan(frame, |_| false)?;
        let columns = self
            .columns
            .iter()
            .zip(&plan.columns)
            .map(|(column, c)| OutputColumn {
                name: &column.name,
                format: c.format,
                placement: c.placement,
            })
            .collect();
        DecodedOutput::new(data, columns, plan.rows, self.settings)
    }

    /// Reads decoded cells of one column from its dedicated buffer.
    pub fn column_view<'a>(
        &'a self,
        frame: &Frame,
        column: usize,
        data: &'a [u8],
    ) -> Result<ColumnView<'a>> {
        verify_arg!(column, column < self.columns.len());
        let plan = self.plan(frame, |i| i == column)?;
        let c = &plan.columns[column];
        ColumnView::new(
            data,
            OutputColumn {
                name: &self.columns[column].name,
                format: c.format,
                placement: c.placement,
            },
            plan.rows,
            self.settings,
        )
    }

    fn column_mut(&mut self, column: usize) -> Result<&mut DecoderColumn> {
        verify_arg!(column, column < self.columns.len());
        self.output = None;
        Ok(&mut self.columns[column])
    }

    fn row_ceiling(&self, frame: &Frame) -> usize {
        self.row_count
            .or(self.shape.height)
            .unwrap_or(frame.row_count())
    }

    /// Resolves the configured columns against the schema of `frame` and computes
    /// the cell placements.
    fn plan<'f>(&self, frame: &'f Frame, separate: impl Fn(usize) -> bool) -> Result<DecodePlan<'f>> {
        if self.columns.is_empty() {
            return Err(Error::configuration("no columns to decode"));
        }
        let ceiling = self.row_ceiling(frame);
        let rows = ceiling.min(frame.row_count());
        self.shape.check_rows(rows)?;

        let schema = frame.schema();
        let mut resolved = Vec::with_capacity(self.columns.len());
        let mut inputs = Vec::with_capacity(self.columns.len());
        for (i, column) in self.columns.iter().enumerate() {
            let source = schema.resolve(&column.name)?;
            let descriptor = &schema.columns()[source.column];
            let sub_field = source
                .bitfield
                .and_then(|idx| descriptor.bitfield().and_then(|b| b.get(idx)));
            let format = cell_format(
                &column.name,
                descriptor.kind(),
                descriptor.element_size(),
                column.layout.element_size,
                &self.settings,
                Direction::Decode,
            )?;
            let separate = separate(i);
            inputs.push(PlacementInput {
                element_size: format.size(),
                layout: column.layout,
                separate,
            });
            resolved.push((source, descriptor, sub_field, format, separate));
        }

        let placements = place_columns(&inputs, &self.shape, ceiling);
        let columns = resolved
            .into_iter()
            .zip(placements)
            .map(
                |((source, descriptor, sub_field, format, separate), placement)| ColumnPlan {
                    source,
                    kind: descriptor.kind(),
                    element_size: descriptor.element_size(),
                    sub_field,
                    format,
                    placement,
                    separate,
                },
            )
            .collect();
        Ok(DecodePlan { columns, rows })
    }

    /// Plans a decode into `target` and checks that every buffer can hold the
    /// decoded rows before anything is written.
    #[allow(clippy::type_complexity)]
    fn prepare<'f, 'a>(
        &self,
        frame: &'f Frame,
        target: DecodeTarget<'a>,
    ) -> Result<(DecodePlan<'f>, Option<RawDest<'a>>, AHashMap<usize, RawDest<'a>>)> {
        if let Some(column) = target.column_indices().find(|&c| c >= self.columns.len()) {
            return Err(Error::invalid_arg(
                "column buffer",
                format!("column {column} is not configured"),
            ));
        }
        let plan = self.plan(frame, |i| target.has_column_buffer(i))?;
        let (shared, columns) = target.into_dests();

        let shared_size = plan.shared_size();
        let available = shared.as_ref().map_or(0, RawDest::len);
        if shared_size > available {
            return Err(Error::dest_too_small(shared_size, available));
        }
        for (i, column) in plan.columns.iter().enumerate().filter(|(_, c)| c.separate) {
            let required = required_size([(&column.placement, &column.format)], plan.rows);
            let available = columns.get(&i).map_or(0, RawDest::len);
            if required > available {
                return Err(Error::dest_too_small(required, available));
            }
        }
        Ok((plan, shared, columns))
    }

    fn decode_rows(
        &self,
        plan: &DecodePlan,
        frame: &Frame,
        shared: Option<&RawDest>,
        columns: &AHashMap<usize, RawDest>,
        rows: Range<usize>,
    ) -> Result<()> {
        for (i, column) in plan.columns.iter().enumerate() {
            if column.format.is_skip() {
                continue;
            }
            let dest = if column.separate {
                columns.get(&i)
            } else {
                shared
            };
            let dest = dest.ok_or_else(|| Error::dest_too_small(column.placement.end(plan.rows), 0))?;
            self.decode_column(column, frame, dest, rows.clone())?;
        }
        Ok(())
    }

    fn decode_column(
        &self,
        column: &ColumnPlan,
        frame: &Frame,
        dest: &RawDest,
        rows: Range<usize>,
    ) -> Result<()> {
        let settings = &self.settings;
        for segment in frame.segments() {
            let seg_end = segment.row_start + segment.row_count;
            let start = rows.start.max(segment.row_start);
            let end = rows.end.min(seg_end);
            if start >= end {
                continue;
            }
            let data = segment.column(column.source.column, column.element_size);
            for row in start..end {
                let local = row - segment.row_start;
                let offset = column.placement.cell(row);
                if data.is_missing(local) {
                    write_missing(dest, offset, column.format, settings)?;
                    continue;
                }
                match column.kind {
                    ColumnKind::Integer => {
                        write_integer(dest, offset, column.format, data.i64_at(local))?
                    }
                    ColumnKind::Bitfield => {
                        let container = data.u32_at(local);
                        let value = column
                            .sub_field
                            .map_or(container, |field| field.extract(container));
                        write_integer(dest, offset, column.format, value as i64)?
                    }
                    ColumnKind::Real => {
                        write_real(dest, offset, column.format, data.f32_at(local) as f64)?
                    }
                    ColumnKind::Double => {
                        write_real(dest, offset, column.format, data.f64_at(local))?
                    }
                    ColumnKind::String => {
                        dest.write_padded(offset, data.value(local), column.format.size())?
                    }
                    ColumnKind::Ignore => {}
                }
            }
        }
        log::trace!(
            "decoded column {} rows {}..{}",
            column.source.column,
            rows.start,
            rows.end
        );
        Ok(())
    }
}

impl DecodePlan<'_> {
    fn shared_size(&self) -> usize {
        required_size(
            self.columns
                .iter()
                .filter(|c| !c.separate)
                .map(|c| (&c.placement, &c.format)),
            self.rows,
        )
    }
}

/// Rows handled by `worker` when `rows` rows are split over `workers` chunks.
fn chunk_range(rows: usize, workers: usize, worker: usize) -> Range<usize> {
    let chunk = rows / workers;
    let start = worker * chunk;
    let end = if worker + 1 == workers {
        rows
    } else {
        start + chunk
    };
    start..end
}

#[inline]
fn write_integer(dest: &RawDest, offset: usize, format: CellFormat, value: i64) -> Result<()> {
    match format {
        CellFormat::I64 => dest.write(offset, &value.to_le_bytes()),
        _ => dest.write(offset, &(value as f64).to_le_bytes()),
    }
}

#[inline]
fn write_real(dest: &RawDest, offset: usize, format: CellFormat, value: f64) -> Result<()> {
    match format {
        CellFormat::F32 => dest.write(offset, &(value as f32).to_le_bytes()),
        _ => dest.write(offset, &value.to_le_bytes()),
    }
}

fn write_missing(
    dest: &RawDest,
    offset: usize,
    format: CellFormat,
    settings: &CodecSettings,
) -> Result<()> {
    match format {
        CellFormat::I64 => dest.write(offset, &settings.missing_integer.to_le_bytes()),
        CellFormat::F64 => dest.write(offset, &settings.missing_double.to_le_bytes()),
        CellFormat::F32 => dest.write(offset, &(settings.missing_double as f32).to_le_bytes()),
        CellFormat::Bytes(width) => dest.write_padded(offset, &[], width),
        CellFormat::Skip(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_ranges() {
        let ranges: Vec<_> = (0..3).map(|w| chunk_range(10, 3, w)).collect();
        assert_eq!(ranges, vec![0..3, 3..6, 6..10]);
        let ranges: Vec<_> = (0..4).map(|w| chunk_range(2, 4, w)).collect();
        assert_eq!(ranges, vec![0..0, 0..0, 0..0, 0..2]);
    }
}

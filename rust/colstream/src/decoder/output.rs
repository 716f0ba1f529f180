//! Typed reading of decoded cells.

use colstream_common::{Error, Result};

use crate::{
    frame::segment::word,
    layout::{CellFormat, CellPlacement},
    settings::CodecSettings,
};

/// Format and address of one decoded column.
#[derive(Debug, Clone, Copy)]
pub(crate) struct OutputColumn<'a> {
    pub name: &'a str,
    pub format: CellFormat,
    pub placement: CellPlacement,
}

/// Decoded cells of all decoder columns in one buffer.
#[derive(Debug, Clone)]
pub struct DecodedOutput<'a> {
    data: &'a [u8],
    columns: Vec<OutputColumn<'a>>,
    rows: usize,
    settings: CodecSettings,
}

impl<'a> DecodedOutput<'a> {
    pub(crate) fn new(
        data: &'a [u8],
        columns: Vec<OutputColumn<'a>>,
        rows: usize,
        settings: CodecSettings,
    ) -> Result<DecodedOutput<'a>> {
        for column in &columns {
            check_bounds(data, column, rows)?;
        }
        Ok(DecodedOutput {
            data,
            columns,
            rows,
            settings,
        })
    }

    /// The raw buffer.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, index: usize) -> Option<ColumnView<'a>> {
        self.columns.get(index).map(|&column| ColumnView {
            data: self.data,
            column,
            rows: self.rows,
            settings: self.settings,
        })
    }

    pub fn column_by_name(&self, name: &str) -> Option<ColumnView<'a>> {
        let index = self.columns.iter().position(|c| c.name == name)?;
        self.column(index)
    }

    pub fn columns(&self) -> impl Iterator<Item = ColumnView<'a>> + '_ {
        (0..self.columns.len()).filter_map(|i| self.column(i))
    }
}

/// A decoded cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CellValue<'a> {
    Long(i64),
    Double(f64),
    Float(f32),
    Bytes(&'a [u8]),
    Skipped,
}

/// Decoded cells of one column.
#[derive(Debug, Clone, Copy)]
pub struct ColumnView<'a> {
    data: &'a [u8],
    column: OutputColumn<'a>,
    rows: usize,
    settings: CodecSettings,
}

impl<'a> ColumnView<'a> {
    pub(crate) fn new(
        data: &'a [u8],
        column: OutputColumn<'a>,
        rows: usize,
        settings: CodecSettings,
    ) -> Result<ColumnView<'a>> {
        check_bounds(data, &column, rows)?;
        Ok(ColumnView {
            data,
            column,
            rows,
            settings,
        })
    }

    pub fn name(&self) -> &'a str {
        self.column.name
    }

    pub fn format(&self) -> CellFormat {
        self.column.format
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    fn cell(&self, row: usize) -> Option<&'a [u8]> {
        if row >= self.rows {
            return None;
        }
        let start = self.column.placement.cell(row);
        Some(&self.data[start..start + self.column.format.size()])
    }

    pub fn value_at(&self, row: usize) -> Option<CellValue<'a>> {
        if self.column.format.is_skip() {
            // skipped cells are not backed by the buffer
            return (row < self.rows).then_some(CellValue::Skipped);
        }
        let cell = self.cell(row)?;
        Some(match self.column.format {
            CellFormat::I64 => CellValue::Long(i64::from_le_bytes(word(cell))),
            CellFormat::F64 => CellValue::Double(f64::from_le_bytes(word(cell))),
            CellFormat::F32 => CellValue::Float(f32::from_le_bytes(word(cell))),
            CellFormat::Bytes(_) => CellValue::Bytes(cell),
            CellFormat::Skip(_) => CellValue::Skipped,
        })
    }

    /// A floating point cell, widened to `f64` for 4-byte cells.
    pub fn f64_at(&self, row: usize) -> Option<f64> {
        match self.value_at(row)? {
            CellValue::Double(v) => Some(v),
            CellValue::Float(v) => Some(v as f64),
            _ => None,
        }
    }

    pub fn f32_at(&self, row: usize) -> Option<f32> {
        match self.value_at(row)? {
            CellValue::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn i64_at(&self, row: usize) -> Option<i64> {
        match self.value_at(row)? {
            CellValue::Long(v) => Some(v),
            _ => None,
        }
    }

    pub fn bytes_at(&self, row: usize) -> Option<&'a [u8]> {
        match self.value_at(row)? {
            CellValue::Bytes(v) => Some(v),
            _ => None,
        }
    }

    /// A string cell without its zero padding. `None` for cells that are not
    /// valid UTF-8.
    pub fn str_at(&self, row: usize) -> Option<&'a str> {
        let bytes = self.bytes_at(row)?;
        let len = bytes.iter().rposition(|&b| b != 0).map_or(0, |p| p + 1);
        std::str::from_utf8(&bytes[..len]).ok()
    }

    /// Whether the cell holds the missing-value sentinel of its format.
    pub fn is_missing(&self, row: usize) -> bool {
        match self.value_at(row) {
            Some(CellValue::Long(v)) => self.settings.is_missing_integer(v),
            Some(CellValue::Double(v)) => self.settings.is_missing_double(v),
            Some(CellValue::Float(v)) => v.to_bits() == (self.settings.missing_double as f32).to_bits(),
            _ => false,
        }
    }
}

fn check_bounds(data: &[u8], column: &OutputColumn, rows: usize) -> Result<()> {
    if column.format.is_skip() {
        return Ok(());
    }
    let required = column.placement.end(rows);
    if required > data.len() {
        return Err(Error::dest_too_small(required, data.len()));
    }
    Ok(())
}

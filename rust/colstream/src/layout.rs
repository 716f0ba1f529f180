//! Placement of cells in caller memory.
//!
//! Decoder destinations and encoder sources share the same addressing rules.
//! In a row-major array, cell `(row, col)` lives at `offset[col] + row * row_stride`,
//! where the offsets are the prefix sums of the column element sizes and the row
//! stride is either the explicit array width or the sum of all element sizes.
//! In a column-major array, cell `(row, col)` lives at `base[col] + row * element_size`,
//! with `base[col]` being the sum of `element_size * height` over the previous
//! columns.
//!
//! Every column may override its element size, stride and offset. A column with
//! a buffer of its own is addressed from offset zero with a stride equal to its
//! element size, and takes no room in the shared array.

use colstream_common::{Error, Result};
use colstream_format::{ColumnKind, defs::STRING_CHUNK_SIZE};

use crate::settings::CodecSettings;

/// Per-column layout overrides. `None` keeps the computed value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColumnLayout {
    pub element_size: Option<usize>,
    pub stride: Option<usize>,
    pub offset: Option<usize>,
}

impl ColumnLayout {
    pub fn with_element_size(mut self, size: usize) -> Self {
        self.element_size = Some(size);
        self
    }

    pub fn with_stride(mut self, stride: usize) -> Self {
        self.stride = Some(stride);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// Shape of the shared in-memory array.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DataArrayShape {
    /// Row stride in bytes for row-major arrays.
    pub width: Option<usize>,
    /// Rows reserved per column in column-major arrays.
    pub height: Option<usize>,
    pub column_major: bool,
}

impl DataArrayShape {
    /// A column-major array must reserve at least `rows` cells per column, or the
    /// cells of one column would run into the next.
    pub(crate) fn check_rows(&self, rows: usize) -> Result<()> {
        match self.height {
            Some(height) if self.column_major && height < rows => Err(Error::invalid_arg(
                "height",
                format!("column-major height {height} is below the {rows} rows addressed"),
            )),
            _ => Ok(()),
        }
    }
}

/// Representation of one cell in caller memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellFormat {
    I64,
    F64,
    F32,
    /// Fixed-width byte string, zero-padded.
    Bytes(usize),
    /// A cell that is neither read nor written.
    Skip(usize),
}

impl CellFormat {
    pub fn size(&self) -> usize {
        match self {
            CellFormat::I64 | CellFormat::F64 => 8,
            CellFormat::F32 => 4,
            CellFormat::Bytes(size) | CellFormat::Skip(size) => *size,
        }
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, CellFormat::Skip(_))
    }
}

/// Default width of a cell in caller memory: strings keep their stored width,
/// every other kind takes 8 bytes.
pub fn default_cell_size(kind: ColumnKind, stored_size: usize) -> usize {
    match kind {
        ColumnKind::String => stored_size,
        _ => 8,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    Decode,
    Encode,
}

/// Resolves the in-memory cell format of a column.
///
/// `kind` is the stored column kind (a bit-field sub-field resolves like its
/// container), `stored_size` the stored element width and `requested` an
/// explicit element size override.
pub(crate) fn cell_format(
    name: &str,
    kind: ColumnKind,
    stored_size: usize,
    requested: Option<usize>,
    settings: &CodecSettings,
    direction: Direction,
) -> Result<CellFormat> {
    let invalid = |size: usize| {
        Error::invalid_arg(
            "element_size",
            format!("{size} bytes is not a valid cell width for {kind} column '{name}'"),
        )
    };
    let size = requested.unwrap_or_else(|| default_cell_size(kind, stored_size));
    let format = match kind {
        ColumnKind::Integer | ColumnKind::Bitfield => {
            if size != 8 {
                return Err(invalid(size));
            }
            if settings.integers_as_longs() {
                CellFormat::I64
            } else {
                CellFormat::F64
            }
        }
        ColumnKind::Real | ColumnKind::Double => match size {
            8 => CellFormat::F64,
            4 => CellFormat::F32,
            size => return Err(invalid(size)),
        },
        ColumnKind::String => {
            let valid = match direction {
                Direction::Decode => size >= stored_size && size % STRING_CHUNK_SIZE == 0,
                Direction::Encode => size > 0 && size <= stored_size,
            };
            if !valid {
                return Err(invalid(size));
            }
            CellFormat::Bytes(size)
        }
        ColumnKind::Ignore => {
            if size == 0 {
                return Err(invalid(size));
            }
            CellFormat::Skip(size)
        }
    };
    Ok(format)
}

/// Address of the cells of one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellPlacement {
    pub offset: usize,
    pub stride: usize,
    pub element_size: usize,
}

impl CellPlacement {
    #[inline]
    pub fn cell(&self, row: usize) -> usize {
        self.offset + row * self.stride
    }

    /// One past the last byte touched when addressing `rows` rows.
    pub fn end(&self, rows: usize) -> usize {
        if rows == 0 {
            0
        } else {
            self.cell(rows - 1) + self.element_size
        }
    }
}

/// Input of [`place_columns`] for one column.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PlacementInput {
    pub element_size: usize,
    pub layout: ColumnLayout,
    pub separate: bool,
}

/// Computes cell placements of all columns. `rows` is the column-major height
/// used when the shape does not set one.
pub(crate) fn place_columns(
    inputs: &[PlacementInput],
    shape: &DataArrayShape,
    rows: usize,
) -> Vec<CellPlacement> {
    let row_width: usize = inputs
        .iter()
        .filter(|c| !c.separate)
        .map(|c| c.element_size)
        .sum();
    let row_stride = shape.width.unwrap_or(row_width);
    let height = shape.height.unwrap_or(rows);

    let mut next = 0usize;
    inputs
        .iter()
        .map(|input| {
            let size = input.element_size;
            let (offset, stride) = if input.separate {
                (0, size)
            } else if shape.column_major {
                let base = next;
                next += size * height;
                (base, size)
            } else {
                let offset = next;
                next += size;
                (offset, row_stride)
            };
            CellPlacement {
                offset: input.layout.offset.unwrap_or(offset),
                stride: input.layout.stride.unwrap_or(stride),
                element_size: size,
            }
        })
        .collect()
}

/// Checks that no two cells addressed by `placements` over `rows` rows share a
/// byte. Required whenever the rows are written concurrently.
///
/// Columns whose address ranges intersect are accepted only when they share the
/// stride and occupy distinct byte lanes within it.
pub(crate) fn check_disjoint(placements: &[CellPlacement], rows: usize) -> Result<()> {
    if rows == 0 {
        return Ok(());
    }
    for (i, a) in placements.iter().enumerate() {
        if rows > 1 && a.stride < a.element_size {
            return Err(Error::invalid_arg(
                "layout",
                format!(
                    "stride {} is smaller than the element size {}",
                    a.stride, a.element_size
                ),
            ));
        }
        for b in &placements[i + 1..] {
            let (a_end, b_end) = (a.end(rows), b.end(rows));
            if a_end <= b.offset || b_end <= a.offset {
                continue;
            }
            let interleaved = a.stride == b.stride
                && a.stride > 0
                && !lanes_overlap(
                    a.offset % a.stride,
                    a.element_size,
                    b.offset % a.stride,
                    b.element_size,
                    a.stride,
                );
            if !interleaved {
                return Err(Error::invalid_arg(
                    "layout",
                    format!(
                        "cells at offsets {} and {} overlap and cannot be decoded concurrently",
                        a.offset, b.offset
                    ),
                ));
            }
        }
    }
    Ok(())
}

/// Whether the byte lanes `[a, a + a_len)` and `[b, b + b_len)` intersect modulo
/// `period`. Both lanes start below `period` and are no longer than it.
fn lanes_overlap(a: usize, a_len: usize, b: usize, b_len: usize, period: usize) -> bool {
    let intersects = |x: usize, x_len: usize, y: usize, y_len: usize| x < y + y_len && y < x + x_len;
    intersects(a, a_len, b, b_len)
        || intersects(a, a_len, b + period, b_len)
        || intersects(a + period, a_len, b, b_len)
}

/// Byte size a buffer must have to hold `rows` rows of every non-skipped column
/// placed in it.
pub(crate) fn required_size<'a>(
    placements: impl IntoIterator<Item = (&'a CellPlacement, &'a CellFormat)>,
    rows: usize,
) -> usize {
    placements
        .into_iter()
        .filter(|(_, format)| !format.is_skip())
        .map(|(placement, _)| placement.end(rows))
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::IntegerBehaviour;

    fn inputs(sizes: &[usize]) -> Vec<PlacementInput> {
        sizes
            .iter()
            .map(|&element_size| PlacementInput {
                element_size,
                layout: ColumnLayout::default(),
                separate: false,
            })
            .collect()
    }

    #[test]
    fn test_row_major() {
        let placements = place_columns(&inputs(&[8, 4, 16]), &DataArrayShape::default(), 10);
        let offsets: Vec<_> = placements.iter().map(|p| p.offset).collect();
        assert_eq!(offsets, vec![0, 8, 12]);
        assert!(placements.iter().all(|p| p.stride == 28));
        assert_eq!(placements[1].cell(3), 8 + 3 * 28);
        check_disjoint(&placements, 10).unwrap();
    }

    #[test]
    fn test_row_major_explicit_width() {
        let shape = DataArrayShape {
            width: Some(64),
            ..Default::default()
        };
        let placements = place_columns(&inputs(&[8, 8]), &shape, 4);
        assert_eq!(placements[1].cell(2), 8 + 128);
        assert_eq!(placements[1].end(4), 8 + 3 * 64 + 8);
    }

    #[test]
    fn test_column_major() {
        let shape = DataArrayShape {
            column_major: true,
            ..Default::default()
        };
        let placements = place_columns(&inputs(&[8, 4, 8]), &shape, 5);
        let offsets: Vec<_> = placements.iter().map(|p| p.offset).collect();
        assert_eq!(offsets, vec![0, 40, 60]);
        assert_eq!(placements[1].stride, 4);
        check_disjoint(&placements, 5).unwrap();

        let shape = DataArrayShape {
            height: Some(7),
            column_major: true,
            ..Default::default()
        };
        let placements = place_columns(&inputs(&[8, 8]), &shape, 5);
        assert_eq!(placements[1].offset, 56);
    }

    #[test]
    fn test_overrides_and_separate_buffers() {
        let mut cols = inputs(&[8, 8, 8]);
        cols[1].separate = true;
        cols[2].layout = ColumnLayout::default().with_offset(100).with_stride(16);
        let placements = place_columns(&cols, &DataArrayShape::default(), 3);
        assert_eq!(placements[0].stride, 16);
        assert_eq!(
            placements[1],
            CellPlacement {
                offset: 0,
                stride: 8,
                element_size: 8
            }
        );
        assert_eq!(placements[2].cell(1), 116);
    }

    #[test]
    fn test_overlap_detection() {
        let a = CellPlacement {
            offset: 0,
            stride: 16,
            element_size: 8,
        };
        let b = CellPlacement {
            offset: 4,
            stride: 16,
            element_size: 8,
        };
        assert!(check_disjoint(&[a, b], 4).is_err());
        let c = CellPlacement {
            offset: 8,
            stride: 16,
            element_size: 8,
        };
        check_disjoint(&[a, c], 4).unwrap();
        let d = CellPlacement {
            offset: 24,
            stride: 8,
            element_size: 8,
        };
        assert!(check_disjoint(&[a, d], 4).is_err());
        // a single row never overlaps itself
        let packed = CellPlacement {
            offset: 0,
            stride: 0,
            element_size: 8,
        };
        check_disjoint(&[packed], 1).unwrap();
        assert!(check_disjoint(&[packed], 2).is_err());
    }

    #[test]
    fn test_cell_formats() {
        let settings = CodecSettings::default();
        let longs = settings.with_integer_behaviour(IntegerBehaviour::AsLongs);
        let fmt = |kind, stored, req, s: &CodecSettings, dir| cell_format("c", kind, stored, req, s, dir);

        assert_eq!(
            fmt(ColumnKind::Integer, 8, None, &settings, Direction::Decode).unwrap(),
            CellFormat::F64
        );
        assert_eq!(
            fmt(ColumnKind::Bitfield, 4, None, &longs, Direction::Decode).unwrap(),
            CellFormat::I64
        );
        assert!(fmt(ColumnKind::Integer, 8, Some(4), &settings, Direction::Decode).is_err());
        assert_eq!(
            fmt(ColumnKind::Real, 4, Some(4), &settings, Direction::Decode).unwrap(),
            CellFormat::F32
        );
        assert_eq!(
            fmt(ColumnKind::String, 16, None, &settings, Direction::Decode).unwrap(),
            CellFormat::Bytes(16)
        );
        assert!(fmt(ColumnKind::String, 16, Some(8), &settings, Direction::Decode).is_err());
        assert!(fmt(ColumnKind::String, 16, Some(20), &settings, Direction::Decode).is_err());
        assert_eq!(
            fmt(ColumnKind::String, 16, Some(5), &settings, Direction::Encode).unwrap(),
            CellFormat::Bytes(5)
        );
        assert!(fmt(ColumnKind::String, 16, Some(24), &settings, Direction::Encode).is_err());
        assert_eq!(
            fmt(ColumnKind::Ignore, 0, None, &settings, Direction::Decode).unwrap(),
            CellFormat::Skip(8)
        );
    }

    #[test]
    fn test_required_size_skips_ignored() {
        let placements = place_columns(&inputs(&[8, 8]), &DataArrayShape::default(), 3);
        let formats = [CellFormat::F64, CellFormat::Skip(8)];
        assert_eq!(required_size(placements.iter().zip(&formats), 3), 2 * 16 + 8);
        assert_eq!(required_size(placements.iter().zip(&formats), 0), 0);
    }
}

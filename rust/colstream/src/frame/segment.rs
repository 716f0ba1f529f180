use std::borrow::Cow;

use colstream_format::{ColumnChunk, bitmap};

/// Rows of one on-disk frame within a [`Frame`](super::Frame).
#[derive(Debug, Clone)]
pub(crate) struct Segment<'r> {
    /// Index of the first row of this segment within the frame.
    pub row_start: usize,
    pub row_count: usize,
    pub chunks: Vec<ColumnChunk>,
    pub data: Cow<'r, [u8]>,
}

impl Segment<'_> {
    pub fn into_owned(self) -> Segment<'static> {
        Segment {
            row_start: self.row_start,
            row_count: self.row_count,
            chunks: self.chunks,
            data: Cow::Owned(self.data.into_owned()),
        }
    }

    pub fn to_owned_segment(&self) -> Segment<'static> {
        self.clone().into_owned()
    }

    /// Stored cells of column `index`. The chunk geometry has been validated against
    /// the data section when the frame was read.
    pub fn column(&self, index: usize, element_size: usize) -> ColumnData<'_> {
        let chunk = &self.chunks[index];
        let start = chunk.offset as usize;
        let bytes = &self.data[start..start + chunk.size as usize];
        let (missing, values) = if chunk.has_bitmap() {
            let (bits, values) = bytes.split_at(bitmap::bitmap_len(self.row_count));
            (Some(bits), values)
        } else {
            (None, bytes)
        };
        ColumnData {
            missing,
            values,
            element_size,
        }
    }
}

/// Stored cells of one column in one segment, addressed by segment-local row.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ColumnData<'a> {
    missing: Option<&'a [u8]>,
    values: &'a [u8],
    element_size: usize,
}

impl<'a> ColumnData<'a> {
    #[inline]
    pub fn is_missing(&self, row: usize) -> bool {
        self.missing.is_some_and(|bits| bitmap::get_bit(bits, row))
    }

    #[inline]
    pub fn value(&self, row: usize) -> &'a [u8] {
        let start = row * self.element_size;
        &self.values[start..start + self.element_size]
    }

    #[inline]
    pub fn i64_at(&self, row: usize) -> i64 {
        i64::from_le_bytes(word(self.value(row)))
    }

    #[inline]
    pub fn u32_at(&self, row: usize) -> u32 {
        u32::from_le_bytes(word(self.value(row)))
    }

    #[inline]
    pub fn f32_at(&self, row: usize) -> f32 {
        f32::from_le_bytes(word(self.value(row)))
    }

    #[inline]
    pub fn f64_at(&self, row: usize) -> f64 {
        f64::from_le_bytes(word(self.value(row)))
    }
}

#[inline]
pub(crate) fn word<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut word = [0u8; N];
    word.copy_from_slice(&bytes[..N]);
    word
}

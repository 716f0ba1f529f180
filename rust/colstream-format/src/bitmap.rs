//! LSB-first bitmaps marking missing cells within a column chunk.

pub fn bitmap_len(rows: usize) -> usize {
    rows.div_ceil(8)
}

#[inline]
pub fn get_bit(bitmap: &[u8], index: usize) -> bool {
    (bitmap[index / 8] >> (index % 8)) & 1 != 0
}

#[inline]
pub fn set_bit(bitmap: &mut [u8], index: usize) {
    bitmap[index / 8] |= 1 << (index % 8);
}

use std::marker::PhantomData;

use ahash::AHashMap;
use colstream_common::{Error, Result};

/// Caller memory receiving decoded cells: a shared array addressed by the
/// decoder's layout, plus optional dedicated buffers for individual columns.
///
/// A column with a dedicated buffer is addressed from offset zero with a stride
/// equal to its element size, unless its layout overrides either.
#[derive(Default)]
pub struct DecodeTarget<'a> {
    shared: Option<&'a mut [u8]>,
    columns: AHashMap<usize, &'a mut [u8]>,
}

impl<'a> DecodeTarget<'a> {
    pub fn new(shared: &'a mut [u8]) -> DecodeTarget<'a> {
        DecodeTarget {
            shared: Some(shared),
            columns: AHashMap::new(),
        }
    }

    /// A target without a shared array; every decoded column needs a buffer of
    /// its own.
    pub fn empty() -> DecodeTarget<'a> {
        DecodeTarget::default()
    }

    /// Directs decoder column `column` into `buf`.
    pub fn with_column_buffer(mut self, column: usize, buf: &'a mut [u8]) -> DecodeTarget<'a> {
        self.columns.insert(column, buf);
        self
    }

    pub fn has_column_buffer(&self, column: usize) -> bool {
        self.columns.contains_key(&column)
    }

    pub(crate) fn column_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.columns.keys().copied()
    }

    pub(crate) fn into_dests(self) -> (Option<RawDest<'a>>, AHashMap<usize, RawDest<'a>>) {
        let shared = self.shared.map(RawDest::new);
        let columns = self
            .columns
            .into_iter()
            .map(|(column, buf)| (column, RawDest::new(buf)))
            .collect();
        (shared, columns)
    }
}

/// A destination buffer that decode workers write through concurrently.
///
/// Each write is bounds-checked. Callers that share a `RawDest` between threads
/// must write disjoint byte ranges; the decoder verifies this on the cell layout
/// before fanning out.
pub(crate) struct RawDest<'a> {
    ptr: *mut u8,
    len: usize,
    _buf: PhantomData<&'a mut [u8]>,
}

// SAFETY: `RawDest` is an exclusive borrow of a byte buffer, which is `Send`.
// Concurrent writers touch disjoint ranges only (see `layout::check_disjoint`).
unsafe impl Send for RawDest<'_> {}
unsafe impl Sync for RawDest<'_> {}

impl<'a> RawDest<'a> {
    pub fn new(buf: &'a mut [u8]) -> RawDest<'a> {
        RawDest {
            ptr: buf.as_mut_ptr(),
            len: buf.len(),
            _buf: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Copies `bytes` to `offset`, zero-filling up to `width` bytes.
    #[inline]
    pub fn write_padded(&self, offset: usize, bytes: &[u8], width: usize) -> Result<()> {
        let end = offset
            .checked_add(width)
            .filter(|&end| end <= self.len && bytes.len() <= width)
            .ok_or_else(|| Error::dest_too_small(offset.saturating_add(width), self.len))?;
        // SAFETY: `offset..end` lies within the borrowed buffer, checked above.
        unsafe {
            let dst = self.ptr.add(offset);
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), dst, bytes.len());
            std::ptr::write_bytes(dst.add(bytes.len()), 0, end - offset - bytes.len());
        }
        Ok(())
    }

    #[inline]
    pub fn write(&self, offset: usize, bytes: &[u8]) -> Result<()> {
        self.write_padded(offset, bytes, bytes.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_dest_writes() {
        let mut buf = vec![0xffu8; 16];
        {
            let dest = RawDest::new(&mut buf);
            dest.write(0, &[1, 2, 3]).unwrap();
            dest.write_padded(8, b"ab", 8).unwrap();
            assert!(dest.write(14, &[0; 4]).is_err());
            assert!(dest.write_padded(12, b"abcdef", 4).is_err());
        }
        assert_eq!(&buf[..4], &[1, 2, 3, 0xff]);
        assert_eq!(&buf[8..], b"ab\0\0\0\0\0\0");
    }

    #[test]
    fn test_target_buffers() {
        let mut shared = vec![0u8; 8];
        let mut own = vec![0u8; 8];
        let target = DecodeTarget::new(&mut shared).with_column_buffer(2, &mut own);
        assert!(target.has_column_buffer(2));
        assert!(!target.has_column_buffer(0));
        let (shared, columns) = target.into_dests();
        assert_eq!(shared.map(|d| d.len()), Some(8));
        assert_eq!(columns.len(), 1);
    }
}

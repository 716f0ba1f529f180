//! Frame header serialization.
//!
//! Frame layout:
//!
//! ```text
//! marker      "CSTF" patch:u8 minor:u16 major:u8
//! header_len  u32
//! header      bincode(FrameHeader)
//! header_csum u32
//! data        data_size bytes, one chunk per column
//! data_csum   u32
//! ```
//!
//! Each column chunk holds an optional missing bitmap (present when
//! `missing_count > 0`) followed by `row_count * element_size` value bytes.

use bincode::{Decode, Encode};
use colstream_common::{Error, Result, verify_data};

use crate::{
    bitmap::bitmap_len,
    checksum,
    column::ColumnDescriptor,
    defs::{FRAME_MAGIC, FRAME_MARKER, FRAME_VERSION_MAJOR, MAX_FRAME_ROWS, MAX_HEADER_SIZE},
};

/// Location of one column's data within the frame data section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Encode, Decode)]
pub struct ColumnChunk {
    pub offset: u64,
    pub size: u64,
    pub missing_count: u64,
}

impl ColumnChunk {
    /// Size of a chunk holding `rows` cells of `element_size` bytes, or `None`
    /// when it does not fit in the address space.
    pub fn expected_size(rows: usize, element_size: usize, missing_count: u64) -> Option<u64> {
        let bitmap = if missing_count > 0 {
            bitmap_len(rows)
        } else {
            0
        };
        let size = rows.checked_mul(element_size)?.checked_add(bitmap)?;
        u64::try_from(size).ok()
    }

    pub fn has_bitmap(&self) -> bool {
        self.missing_count > 0
    }
}

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct FrameHeader {
    pub row_count: u64,
    pub columns: Vec<ColumnDescriptor>,
    pub chunks: Vec<ColumnChunk>,
    pub properties: Vec<(String, String)>,
    pub data_size: u64,
}

impl FrameHeader {
    /// Serializes the header as a checksummed message (size prefix, payload, checksum).
    pub fn to_message(&self) -> Result<Vec<u8>> {
        let payload = bincode::encode_to_vec(self, Self::binc_config())
            .map_err(|e| Error::invalid_arg("frame header", e.to_string()))?;
        if payload.len() > MAX_HEADER_SIZE {
            return Err(Error::invalid_arg(
                "frame header",
                format!("{} bytes exceeds the {MAX_HEADER_SIZE} byte limit", payload.len()),
            ));
        }
        Ok(checksum::create_message_vec(&payload))
    }

    /// Deserializes and validates a header payload (the message body, after its
    /// checksum has been verified).
    pub fn from_payload(payload: &[u8]) -> Result<FrameHeader> {
        let (header, consumed): (FrameHeader, usize) =
            bincode::decode_from_slice(payload, Self::binc_config())
                .map_err(|e| Error::invalid_format("frame header", e.to_string()))?;
        if consumed != payload.len() {
            return Err(Error::invalid_format(
                "frame header",
                format!("{} trailing bytes", payload.len() - consumed),
            ));
        }
        header.validate()?;
        Ok(header)
    }

    /// Checks the structural consistency of the header: one chunk per column,
    /// chunk sizes matching the row count and element sizes, chunks contained in
    /// the data section.
    pub fn validate(&self) -> Result<()> {
        if self.chunks.len() != self.columns.len() {
            return Err(Error::invalid_format(
                "frame header",
                format!(
                    "{} chunks for {} columns",
                    self.chunks.len(),
                    self.columns.len()
                ),
            ));
        }
        verify_data!(row_count, self.row_count <= MAX_FRAME_ROWS);
        let rows = usize::try_from(self.row_count)
            .map_err(|_| Error::invalid_format("frame header", "row count overflow"))?;
        for (column, chunk) in self.columns.iter().zip(&self.chunks) {
            column.validate()?;
            if chunk.missing_count > self.row_count {
                return Err(Error::invalid_format(column.name(), "missing count exceeds rows"));
            }
            let expected =
                ColumnChunk::expected_size(rows, column.element_size(), chunk.missing_count)
                    .ok_or_else(|| Error::invalid_format(column.name(), "chunk size overflow"))?;
            if chunk.size != expected {
                return Err(Error::invalid_format(
                    column.name(),
                    format!("chunk size {} (expected {expected})", chunk.size),
                ));
            }
            let end = chunk.offset.checked_add(chunk.size);
            if end.is_none_or(|end| end > self.data_size) {
                return Err(Error::invalid_format(
                    column.name(),
                    "chunk extends past the data section",
                ));
            }
        }
        Ok(())
    }

    fn binc_config() -> impl bincode::config::Config {
        bincode::config::standard().with_fixed_int_encoding()
    }
}

/// Validates a frame marker read from the stream.
pub fn check_marker(marker: &[u8]) -> Result<()> {
    if marker.len() != FRAME_MARKER.len() || marker[..4] != FRAME_MAGIC {
        return Err(Error::invalid_format("frame marker", "bad magic"));
    }
    if marker[7] != FRAME_VERSION_MAJOR {
        return Err(Error::invalid_format(
            "frame marker",
            format!("unsupported major version {}", marker[7]),
        ));
    }
    Ok(())
}

use colstream_common::{ErrorKind, verify_arg};

use crate::defs::{CHECKSUM_SIZE, MESSAGE_LEN_SIZE};

/// Computes a checksum for a given buffer using the xxHash algorithm.
pub fn compute(buf: &[u8]) -> u32 {
    let h = xxhash_rust::xxh3::xxh3_64(buf);
    (h as u32) ^ ((h >> 32) as u32)
}

/// Validates a buffer by comparing its computed checksum with the provided checksum.
///
/// `name` identifies the validated element in the error.
pub fn validate_buffer(buf: &[u8], checksum: u32, name: &str) -> colstream_common::Result<()> {
    if compute(buf) == checksum {
        Ok(())
    } else {
        Err(ErrorKind::ChecksumMismatch {
            element: name.to_string(),
        }
        .into())
    }
}

/// Validates a complete message: a 4-byte little-endian payload size, the payload
/// and a 4-byte checksum of the payload. Returns the payload.
pub fn validate_message(message: &[u8]) -> colstream_common::Result<&[u8]> {
    verify_arg!(message, message.len() >= MESSAGE_LEN_SIZE + CHECKSUM_SIZE);
    let size = read_u32(&message[..MESSAGE_LEN_SIZE]) as usize;
    verify_arg!(size, size + MESSAGE_LEN_SIZE + CHECKSUM_SIZE <= message.len());
    let payload = &message[MESSAGE_LEN_SIZE..MESSAGE_LEN_SIZE + size];
    let checksum = read_u32(&message[MESSAGE_LEN_SIZE + size..]);
    validate_buffer(payload, checksum, "message")?;
    Ok(payload)
}

/// Appends a message built from `payload` (size prefix, payload, checksum) to `out`.
pub fn append_message(payload: &[u8], out: &mut Vec<u8>) {
    out.reserve(MESSAGE_LEN_SIZE + payload.len() + CHECKSUM_SIZE);
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
    out.extend_from_slice(&compute(payload).to_le_bytes());
}

pub fn create_message_vec(payload: &[u8]) -> Vec<u8> {
    let mut message = Vec::new();
    append_message(payload, &mut message);
    message
}

/// Reads a little-endian `u32` from the first four bytes of `bytes`.
pub fn read_u32(bytes: &[u8]) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[..4]);
    u32::from_le_bytes(word)
}

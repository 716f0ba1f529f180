pub const FRAME_MAGIC: [u8; 4] = *b"CSTF";
pub const FRAME_VERSION_MAJOR: u8 = 1;
pub const FRAME_VERSION_MINOR: u16 = 0;
pub const FRAME_VERSION_PATCH: u8 = 0;

/// Marker opening every frame: magic followed by the format version.
pub const FRAME_MARKER: [u8; 8] = [
    FRAME_MAGIC[0],
    FRAME_MAGIC[1],
    FRAME_MAGIC[2],
    FRAME_MAGIC[3],
    FRAME_VERSION_PATCH,
    (FRAME_VERSION_MINOR & 0xff) as u8,
    (FRAME_VERSION_MINOR >> 8) as u8,
    FRAME_VERSION_MAJOR,
];

pub const FRAME_MARKER_SIZE: usize = FRAME_MARKER.len();

/// Size of the header message length prefix.
pub const MESSAGE_LEN_SIZE: usize = 4;

/// Size of the checksum suffix of the header message and of the data section.
pub const CHECKSUM_SIZE: usize = 4;

/// Upper bound on the serialized frame header.
pub const MAX_HEADER_SIZE: usize = 64 * 1024 * 1024;

/// Width of the bit-field container, in bits.
pub const BITFIELD_CAPACITY: u32 = 32;

/// Stored string widths are multiples of this many bytes.
pub const STRING_CHUNK_SIZE: usize = 8;

pub const DEFAULT_MISSING_INTEGER: i64 = 2147483647;
pub const DEFAULT_MISSING_DOUBLE: f64 = -2147483647.0;

/// Largest row count a single frame may declare.
pub const MAX_FRAME_ROWS: u64 = u32::MAX as u64;

/// Default number of rows written per frame.
pub const DEFAULT_ROWS_PER_FRAME: usize = 10_000;

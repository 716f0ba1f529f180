//! Codec configuration shared by the decoder and the encoder, and reader options.

use colstream_format::defs::{DEFAULT_MISSING_DOUBLE, DEFAULT_MISSING_INTEGER};

/// In-memory representation of integer and bit-field cells.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IntegerBehaviour {
    /// Cells are 8-byte `f64` values.
    #[default]
    AsDoubles,
    /// Cells are 8-byte `i64` values.
    AsLongs,
}

/// Missing-value sentinels and integer representation used by a decoder or an
/// encoder instance.
///
/// Sentinels are compared bit-exactly, so a NaN sentinel is a valid choice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CodecSettings {
    pub missing_integer: i64,
    pub missing_double: f64,
    pub integer_behaviour: IntegerBehaviour,
}

impl Default for CodecSettings {
    fn default() -> Self {
        CodecSettings {
            missing_integer: DEFAULT_MISSING_INTEGER,
            missing_double: DEFAULT_MISSING_DOUBLE,
            integer_behaviour: IntegerBehaviour::AsDoubles,
        }
    }
}

impl CodecSettings {
    pub fn with_missing_integer(mut self, value: i64) -> Self {
        self.missing_integer = value;
        self
    }

    pub fn with_missing_double(mut self, value: f64) -> Self {
        self.missing_double = value;
        self
    }

    pub fn with_integer_behaviour(mut self, behaviour: IntegerBehaviour) -> Self {
        self.integer_behaviour = behaviour;
        self
    }

    pub fn integers_as_longs(&self) -> bool {
        self.integer_behaviour == IntegerBehaviour::AsLongs
    }

    #[inline]
    pub fn is_missing_double(&self, value: f64) -> bool {
        value.to_bits() == self.missing_double.to_bits()
    }

    #[inline]
    pub fn is_missing_integer(&self, value: i64) -> bool {
        value == self.missing_integer
    }
}

/// Options of a frame [`Reader`](crate::Reader).
#[derive(Debug, Clone)]
pub struct ReaderOptions {
    /// Verify the header and data checksums of every frame.
    pub verify_checksums: bool,
    /// Frames declaring a larger data section are rejected before allocation.
    pub max_frame_size: u64,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        ReaderOptions {
            verify_checksums: true,
            max_frame_size: 1024 * 1024 * 1024,
        }
    }
}

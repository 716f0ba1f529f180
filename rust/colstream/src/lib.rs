//! Columnar frame stream codec.
//!
//! Tables of integer, real, double, fixed-width string and packed bit-field
//! columns are written as a sequence of self-describing frames by an
//! [`Encoder`], read back frame by frame (or as aggregated row ranges) by a
//! [`Reader`], and unpacked into caller-defined memory layouts by a [`Decoder`].

pub mod decoder;
pub mod encoder;
pub mod frame;
pub mod layout;
pub mod settings;

pub use colstream_common::{Error, ErrorKind, Result, Status};
pub use colstream_format::{ColumnDescriptor, ColumnKind};
pub use colstream_io::{ByteSource, SealingWrite};

pub use decoder::{CellValue, ColumnView, DecodeTarget, DecodedOutput, Decoder};
pub use encoder::{EncodeSource, Encoder};
pub use frame::{BitfieldAttributes, ColumnAttributes, Frame, FrameIter, Reader};
pub use layout::{CellFormat, ColumnLayout, DataArrayShape};
pub use settings::{CodecSettings, IntegerBehaviour, ReaderOptions};

#[cfg(test)]
mod tests;

//! Wire format definitions: column descriptors, frame schema, frame properties,
//! the frame header layout and message checksums.

pub mod bitmap;
pub mod checksum;
pub mod column;
pub mod defs;
pub mod header;
pub mod property_bag;
pub mod schema;

pub use column::{Bitfield, BitfieldField, ColumnDescriptor, ColumnKind, ColumnType};
pub use header::{ColumnChunk, FrameHeader};
pub use property_bag::{PropertyBag, PropertyBagBuilder};
pub use schema::{ColumnRef, Schema};

//! Column descriptors.
//!
//! A column is described by its name, its [`ColumnType`] and its stored element
//! size. Bit-field columns carry an ordered list of named sub-fields packed into a
//! 32-bit container.

use bincode::{Decode, Encode};
use colstream_common::{Error, Result};

use crate::defs::{BITFIELD_CAPACITY, STRING_CHUNK_SIZE};

/// Payload-free column type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ColumnKind {
    Ignore = 0,
    Integer = 1,
    Real = 2,
    String = 3,
    Bitfield = 4,
    Double = 5,
}

impl ColumnKind {
    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn from_tag(tag: u8) -> Option<ColumnKind> {
        match tag {
            0 => Some(ColumnKind::Ignore),
            1 => Some(ColumnKind::Integer),
            2 => Some(ColumnKind::Real),
            3 => Some(ColumnKind::String),
            4 => Some(ColumnKind::Bitfield),
            5 => Some(ColumnKind::Double),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ColumnKind::Ignore => "ignore",
            ColumnKind::Integer => "integer",
            ColumnKind::Real => "real",
            ColumnKind::String => "string",
            ColumnKind::Bitfield => "bitfield",
            ColumnKind::Double => "double",
        }
    }

    /// Stored width of one cell, in bytes.
    pub fn default_element_size(self) -> usize {
        match self {
            ColumnKind::Ignore => 0,
            ColumnKind::Integer | ColumnKind::Double => 8,
            ColumnKind::Real | ColumnKind::Bitfield => 4,
            ColumnKind::String => STRING_CHUNK_SIZE,
        }
    }

    pub fn into_type(self) -> ColumnType {
        match self {
            ColumnKind::Ignore => ColumnType::Ignore,
            ColumnKind::Integer => ColumnType::Integer,
            ColumnKind::Real => ColumnType::Real,
            ColumnKind::String => ColumnType::String,
            ColumnKind::Bitfield => ColumnType::Bitfield(Bitfield::default()),
            ColumnKind::Double => ColumnType::Double,
        }
    }
}

impl std::fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Column type. Variant order matches the [`ColumnKind`] tags, which is also the
/// serialized discriminant.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub enum ColumnType {
    Ignore,
    Integer,
    Real,
    String,
    Bitfield(Bitfield),
    Double,
}

impl ColumnType {
    pub fn kind(&self) -> ColumnKind {
        match self {
            ColumnType::Ignore => ColumnKind::Ignore,
            ColumnType::Integer => ColumnKind::Integer,
            ColumnType::Real => ColumnKind::Real,
            ColumnType::String => ColumnKind::String,
            ColumnType::Bitfield(_) => ColumnKind::Bitfield,
            ColumnType::Double => ColumnKind::Double,
        }
    }

    pub fn bitfield(&self) -> Option<&Bitfield> {
        match self {
            ColumnType::Bitfield(b) => Some(b),
            _ => None,
        }
    }
}

/// Ordered sub-fields of a bit-field column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Encode, Decode)]
pub struct Bitfield {
    fields: Vec<BitfieldField>,
}

impl Bitfield {
    pub fn fields(&self) -> &[BitfieldField] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&BitfieldField> {
        self.fields.get(index)
    }

    /// Total number of bits used by the sub-fields.
    pub fn total_bits(&self) -> u32 {
        self.fields.iter().map(|f| f.size).sum()
    }

    pub fn find(&self, name: &str) -> Option<(usize, &BitfieldField)> {
        self.fields.iter().enumerate().find(|(_, f)| f.name == name)
    }

    fn push(&mut self, column: &str, name: String, size: u32) -> Result<()> {
        if name.is_empty() {
            return Err(Error::invalid_arg(
                "bitfield name",
                format!("empty sub-field name in '{column}'"),
            ));
        }
        if size == 0 {
            return Err(Error::invalid_arg(
                "bitfield size",
                format!("sub-field '{column}.{name}' has zero width"),
            ));
        }
        if self.find(&name).is_some() {
            return Err(Error::invalid_arg(
                "bitfield name",
                format!("duplicate sub-field '{column}.{name}'"),
            ));
        }
        let offset = self.total_bits();
        let bits = offset + size;
        if bits > BITFIELD_CAPACITY {
            return Err(Error::bitfield_overflow(column, bits, BITFIELD_CAPACITY));
        }
        self.fields.push(BitfieldField { name, offset, size });
        Ok(())
    }

    /// Checks the invariants of a deserialized bit-field: contiguous offsets in
    /// order, non-zero widths, unique names and a total width within the container.
    fn validate(&self, column: &str) -> Result<()> {
        let mut rebuilt = Bitfield::default();
        for field in &self.fields {
            if field.offset != rebuilt.total_bits() {
                return Err(Error::invalid_format(
                    column,
                    format!("sub-field '{}' is not at offset {}", field.name, rebuilt.total_bits()),
                ));
            }
            rebuilt.push(column, field.name.clone(), field.size)?;
        }
        Ok(())
    }
}

/// A named bit range within a bit-field container.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct BitfieldField {
    name: String,
    offset: u32,
    size: u32,
}

impl BitfieldField {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn mask(&self) -> u32 {
        if self.size >= 32 {
            u32::MAX
        } else {
            (1u32 << self.size) - 1
        }
    }

    /// Extracts this sub-field from a container value.
    #[inline]
    pub fn extract(&self, container: u32) -> u32 {
        (container >> self.offset) & self.mask()
    }
}

/// Metadata of one column: name, type and stored element size in bytes.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct ColumnDescriptor {
    name: String,
    column_type: ColumnType,
    element_size: u32,
}

impl ColumnDescriptor {
    /// Creates a descriptor with the default element size of `kind`.
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> ColumnDescriptor {
        ColumnDescriptor {
            name: name.into(),
            column_type: kind.into_type(),
            element_size: kind.default_element_size() as u32,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ColumnKind {
        self.column_type.kind()
    }

    pub fn column_type(&self) -> &ColumnType {
        &self.column_type
    }

    /// Stored width of one cell, in bytes.
    pub fn element_size(&self) -> usize {
        self.element_size as usize
    }

    pub fn bitfield(&self) -> Option<&Bitfield> {
        self.column_type.bitfield()
    }

    /// Number of bit-field sub-fields (zero for other column types).
    pub fn bitfield_count(&self) -> usize {
        self.bitfield().map_or(0, Bitfield::len)
    }

    /// Sets the stored element size. Only string columns have a configurable width,
    /// which must be a positive multiple of 8 bytes; other kinds accept their fixed
    /// width only.
    pub fn set_element_size(&mut self, size: usize) -> Result<()> {
        let kind = self.kind();
        let valid = match kind {
            ColumnKind::String => {
                size > 0 && size % STRING_CHUNK_SIZE == 0 && u32::try_from(size).is_ok()
            }
            _ => size == kind.default_element_size(),
        };
        if !valid {
            return Err(Error::invalid_arg(
                "element_size",
                format!("{size} bytes is not a valid width for {kind} column '{}'", self.name),
            ));
        }
        self.element_size = size as u32;
        Ok(())
    }

    /// Appends a sub-field of `size` bits, placed right after the previous one.
    pub fn add_bitfield_field(&mut self, name: impl Into<String>, size: u32) -> Result<()> {
        match &mut self.column_type {
            ColumnType::Bitfield(bitfield) => bitfield.push(&self.name, name.into(), size),
            other => Err(Error::invalid_arg(
                "column",
                format!("'{}' is a {} column, not a bitfield", self.name, other.kind()),
            )),
        }
    }

    /// Validates a descriptor read from the wire.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::invalid_format("column", "empty column name"));
        }
        let size = self.element_size();
        let kind = self.kind();
        let size_ok = match kind {
            ColumnKind::String => size > 0 && size % STRING_CHUNK_SIZE == 0,
            _ => size == kind.default_element_size(),
        };
        if !size_ok {
            return Err(Error::invalid_format(
                &self.name,
                format!("invalid element size {size} for {kind} column"),
            ));
        }
        if let ColumnType::Bitfield(bitfield) = &self.column_type {
            bitfield.validate(&self.name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use colstream_common::ErrorKind;

    use super::*;

    #[test]
    fn test_kind_tags() {
        for tag in 0..6u8 {
            let kind = ColumnKind::from_tag(tag).unwrap();
            assert_eq!(kind.tag(), tag);
            assert_eq!(kind.into_type().kind(), kind);
        }
        assert!(ColumnKind::from_tag(6).is_none());
    }

    #[test]
    fn test_bitfield_layout() {
        let mut col = ColumnDescriptor::new("status", ColumnKind::Bitfield);
        col.add_bitfield_field("active", 1).unwrap();
        col.add_bitfield_field("passive", 1).unwrap();
        col.add_bitfield_field("level", 6).unwrap();
        assert_eq!(col.bitfield_count(), 3);

        let bitfield = col.bitfield().unwrap();
        let offsets: Vec<_> = bitfield.fields().iter().map(|f| f.offset()).collect();
        assert_eq!(offsets, vec![0, 1, 2]);
        assert_eq!(bitfield.total_bits(), 8);

        let (idx, level) = bitfield.find("level").unwrap();
        assert_eq!(idx, 2);
        let container = 0b1011_0110u32;
        assert_eq!(level.extract(container), 0b10_1101);
        assert_eq!(bitfield.get(0).unwrap().extract(container), 0);
        assert_eq!(bitfield.get(1).unwrap().extract(container), 1);
        col.validate().unwrap();
    }

    #[test]
    fn test_bitfield_overflow() {
        let mut col = ColumnDescriptor::new("flags", ColumnKind::Bitfield);
        col.add_bitfield_field("low", 20).unwrap();
        let err = col.add_bitfield_field("high", 13).unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::BitfieldOverflow { bits: 33, capacity: 32, .. }
        ));
        col.add_bitfield_field("high", 12).unwrap();
        assert_eq!(col.bitfield().unwrap().total_bits(), 32);
        assert_eq!(col.bitfield().unwrap().get(1).unwrap().mask(), 0xfff);
    }

    #[test]
    fn test_bitfield_duplicate_and_wrong_kind() {
        let mut col = ColumnDescriptor::new("flags", ColumnKind::Bitfield);
        col.add_bitfield_field("a", 1).unwrap();
        assert!(col.add_bitfield_field("a", 2).is_err());
        assert!(col.add_bitfield_field("b", 0).is_err());

        let mut int_col = ColumnDescriptor::new("n", ColumnKind::Integer);
        assert!(int_col.add_bitfield_field("a", 1).is_err());
    }

    #[test]
    fn test_element_sizes() {
        let mut s = ColumnDescriptor::new("name", ColumnKind::String);
        assert_eq!(s.element_size(), 8);
        s.set_element_size(24).unwrap();
        assert_eq!(s.element_size(), 24);
        assert!(s.set_element_size(12).is_err());
        assert!(s.set_element_size(0).is_err());

        let mut r = ColumnDescriptor::new("lat", ColumnKind::Real);
        assert_eq!(r.element_size(), 4);
        assert!(r.set_element_size(8).is_err());
    }
}

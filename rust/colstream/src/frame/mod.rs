//! Decoded frame views and the frame reader.
//!
//! A [`Frame`] is one on-disk frame, or several consecutive frames with an
//! identical schema presented as a single row range. Frames returned by a
//! [`Reader`] borrow the reader's buffers and are invalidated by the next read;
//! [`Frame::to_owned`] makes an independent copy.

use std::sync::Arc;

use colstream_common::{Error, Result, verify_arg};
use colstream_format::{ColumnDescriptor, ColumnKind, PropertyBag, Schema};

use crate::layout::default_cell_size;

mod reader;
pub(crate) mod segment;

pub use reader::{FrameIter, Reader};
pub(crate) use segment::Segment;

/// A set of rows sharing one schema.
#[derive(Debug, Clone)]
pub struct Frame<'r> {
    schema: Arc<Schema>,
    properties: Arc<Vec<(String, String)>>,
    segments: Vec<Segment<'r>>,
    row_count: usize,
}

/// Attributes of one column, as reported by [`Frame::column_attributes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnAttributes<'a> {
    pub name: &'a str,
    pub kind: ColumnKind,
    /// Default width of a decoded cell: 8 bytes, or the stored width for strings.
    pub element_size: usize,
    /// Width of a cell on disk (4 for Real and Bitfield columns).
    pub stored_size: usize,
    pub bitfield_count: usize,
}

/// Attributes of one bit-field sub-field, as reported by [`Frame::bitfield_attributes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitfieldAttributes<'a> {
    pub name: &'a str,
    pub offset: u32,
    pub size: u32,
}

impl<'r> Frame<'r> {
    pub(crate) fn new(
        schema: Arc<Schema>,
        properties: Arc<Vec<(String, String)>>,
        segments: Vec<Segment<'r>>,
    ) -> Frame<'r> {
        let row_count = segments.iter().map(|s| s.row_count).sum();
        Frame {
            schema,
            properties,
            segments,
            row_count,
        }
    }

    /// Merges frames into one, in order. All frames must have the same schema;
    /// the properties are taken from the first one.
    pub fn aggregate<I>(frames: I) -> Result<Frame<'r>>
    where
        I: IntoIterator<Item = Frame<'r>>,
    {
        let mut frames = frames.into_iter();
        let first = frames
            .next()
            .ok_or_else(|| Error::invalid_arg("frames", "nothing to aggregate"))?;
        let Frame {
            schema,
            properties,
            mut segments,
            mut row_count,
        } = first;
        for (i, frame) in frames.enumerate() {
            if !Arc::ptr_eq(&schema, &frame.schema) && *schema != *frame.schema {
                return Err(Error::schema_mismatch(format!(
                    "frame {} does not match the schema of the first frame",
                    i + 1
                )));
            }
            for mut segment in frame.segments {
                segment.row_start = row_count;
                row_count += segment.row_count;
                segments.push(segment);
            }
        }
        Ok(Frame {
            schema,
            properties,
            segments,
            row_count,
        })
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column_count(&self) -> usize {
        self.schema.len()
    }

    pub fn column(&self, index: usize) -> Option<&ColumnDescriptor> {
        self.schema.column(index)
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        self.schema.columns()
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn column_attributes(&self, index: usize) -> Result<ColumnAttributes<'_>> {
        let column = self.checked_column(index)?;
        Ok(ColumnAttributes {
            name: column.name(),
            kind: column.kind(),
            element_size: default_cell_size(column.kind(), column.element_size()),
            stored_size: column.element_size(),
            bitfield_count: column.bitfield_count(),
        })
    }

    pub fn bitfield_attributes(
        &self,
        column: usize,
        index: usize,
    ) -> Result<BitfieldAttributes<'_>> {
        let descriptor = self.checked_column(column)?;
        let field = descriptor
            .bitfield()
            .and_then(|b| b.get(index))
            .ok_or_else(|| {
                Error::invalid_arg(
                    "bitfield index",
                    format!(
                        "column '{}' has {} sub-fields, requested {index}",
                        descriptor.name(),
                        descriptor.bitfield_count()
                    ),
                )
            })?;
        Ok(BitfieldAttributes {
            name: field.name(),
            offset: field.offset(),
            size: field.size(),
        })
    }

    pub fn properties(&self) -> PropertyBag<'_> {
        PropertyBag::new(&self.properties)
    }

    pub fn property_count(&self) -> usize {
        self.properties.len()
    }

    /// Key and value of the property at `index`, in key order.
    pub fn property(&self, index: usize) -> Result<(&str, &str)> {
        self.properties().get_index(index).ok_or_else(|| {
            Error::invalid_arg(
                "property index",
                format!("{index} out of {} properties", self.property_count()),
            )
        })
    }

    pub fn property_value(&self, key: &str) -> Option<&str> {
        self.properties().get(key)
    }

    /// Number of on-disk frames merged into this one.
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Copies the frame so that it no longer depends on the reader.
    pub fn to_owned(&self) -> Frame<'static> {
        Frame {
            schema: self.schema.clone(),
            properties: self.properties.clone(),
            segments: self.segments.iter().map(Segment::to_owned_segment).collect(),
            row_count: self.row_count,
        }
    }

    pub fn into_owned(self) -> Frame<'static> {
        Frame {
            schema: self.schema,
            properties: self.properties,
            segments: self.segments.into_iter().map(Segment::into_owned).collect(),
            row_count: self.row_count,
        }
    }

    pub(crate) fn segments(&self) -> &[Segment<'r>] {
        &self.segments
    }

    fn checked_column(&self, index: usize) -> Result<&ColumnDescriptor> {
        verify_arg!(index, index < self.column_count());
        Ok(&self.schema.columns()[index])
    }
}

#[cfg(test)]
mod tests {
    use colstream_common::ErrorKind;
    use colstream_format::PropertyBagBuilder;

    use crate::tests::data_gen;

    use super::*;

    #[test]
    fn test_frame_queries() {
        let table = data_gen::mixed_table(50);
        let mut encoder = table.encoder();
        encoder.add_property("origin", "unit-test");
        encoder.add_property("batch", "7");
        let bytes = encoder.encode_to_vec(table.bytes()).unwrap();

        let mut reader = Reader::from_slice(&bytes);
        let frame = reader.next_frame().unwrap().unwrap();
        assert_eq!(frame.row_count(), 50);
        assert_eq!(frame.column_count(), table.columns().len());
        assert_eq!(frame.segment_count(), 1);

        let flags = frame
            .columns()
            .iter()
            .position(|c| c.kind() == ColumnKind::Bitfield)
            .unwrap();
        let attrs = frame.column_attributes(flags).unwrap();
        assert_eq!(attrs.kind, ColumnKind::Bitfield);
        assert_eq!(attrs.element_size, 8);
        assert_eq!(attrs.stored_size, 4);
        assert_eq!(attrs.bitfield_count, 3);
        let sub = frame.bitfield_attributes(flags, 2).unwrap();
        assert_eq!((sub.offset, sub.size), (2, 6));
        assert!(frame.bitfield_attributes(flags, 3).is_err());
        assert!(frame.bitfield_attributes(0, 0).is_err());
        assert!(matches!(
            frame.column_attributes(99).unwrap_err().kind(),
            ErrorKind::InvalidArgument { .. }
        ));

        assert_eq!(frame.property_count(), 2);
        assert_eq!(frame.property(0).unwrap(), ("batch", "7"));
        assert_eq!(frame.property(1).unwrap(), ("origin", "unit-test"));
        assert!(frame.property(2).is_err());
        assert_eq!(frame.property_value("origin"), Some("unit-test"));
        assert_eq!(frame.property_value("nope"), None);
    }

    #[test]
    fn test_aggregate_rejects_mixed_schemas() {
        let a = data_gen::mixed_table(10);
        let b = data_gen::numeric_table(10);
        let bytes_a = a.encoder().encode_to_vec(a.bytes()).unwrap();
        let bytes_b = b.encoder().encode_to_vec(b.bytes()).unwrap();

        let fa = Reader::from_slice(&bytes_a).next_frame().unwrap().unwrap().to_owned();
        let fb = Reader::from_slice(&bytes_b).next_frame().unwrap().unwrap().to_owned();
        let err = Frame::aggregate([fa.clone(), fb]).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::SchemaMismatch { .. }));

        let merged = Frame::aggregate([fa.clone(), fa.clone(), fa]).unwrap();
        assert_eq!(merged.row_count(), 30);
        assert_eq!(merged.segment_count(), 3);
        assert_eq!(merged.segments()[2].row_start, 20);

        assert!(Frame::aggregate(Vec::<Frame>::new()).is_err());
    }

    #[test]
    fn test_properties_come_from_first_frame() {
        let table = data_gen::numeric_table(20);
        let mut first = PropertyBagBuilder::new();
        first.set("part", "1");
        let mut second = PropertyBagBuilder::new();
        second.set("part", "2");

        let mut bytes = Vec::new();
        for props in [first, second] {
            let mut encoder = table.encoder();
            for (k, v) in props.to_pairs() {
                encoder.add_property(k, v);
            }
            bytes.extend(encoder.encode_to_vec(table.bytes()).unwrap());
        }

        let mut reader = Reader::from_slice(&bytes);
        let frame = reader.next_frame_aggregated(1000).unwrap().unwrap();
        assert_eq!(frame.segment_count(), 2);
        assert_eq!(frame.property_value("part"), Some("1"));
    }
}

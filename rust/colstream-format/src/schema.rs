use std::borrow::Borrow;

use ahash::AHashMap;
use colstream_common::{Error, Result};

use crate::column::{ColumnDescriptor, ColumnKind};

/// Separates a column's short name from its table qualifier (`obsvalue@body`).
pub const TABLE_SEPARATOR: char = '@';

/// Ordered column descriptors of a frame, with name lookup.
///
/// Column order is the on-disk order. Two schemas are equal when their column
/// descriptors are equal position by position.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    columns: Vec<ColumnDescriptor>,
    lookup: AHashMap<String, usize>,
    /// Columns by the part of their name before `@`.
    short_lookup: AHashMap<String, Vec<usize>>,
}

/// A resolved column reference: a whole column, or one sub-field of a bit-field
/// column (`column.subfield`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnRef {
    pub column: usize,
    pub bitfield: Option<usize>,
}

impl Schema {
    /// Builds a schema, rejecting empty or duplicate column names.
    pub fn new(columns: Vec<ColumnDescriptor>) -> Result<Schema> {
        let mut lookup = AHashMap::with_capacity(columns.len());
        let mut short_lookup = AHashMap::<String, Vec<usize>>::new();
        for (i, column) in columns.iter().enumerate() {
            if column.name().is_empty() {
                return Err(Error::invalid_arg("column", format!("column {i} has no name")));
            }
            if lookup.insert(column.name().to_string(), i).is_some() {
                return Err(Error::invalid_arg(
                    "column",
                    format!("duplicate column name '{}'", column.name()),
                ));
            }
            short_lookup
                .entry(short_name(column.name()).to_string())
                .or_default()
                .push(i);
        }
        Ok(Schema {
            columns,
            lookup,
            short_lookup,
        })
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column(&self, index: usize) -> Option<&ColumnDescriptor> {
        self.columns.get(index)
    }

    /// Finds a column by its exact name.
    pub fn find<Q>(&self, name: &Q) -> Option<(usize, &ColumnDescriptor)>
    where
        Q: std::hash::Hash + Eq + ?Sized,
        String: Borrow<Q>,
    {
        self.lookup.get(name).map(|&i| (i, &self.columns[i]))
    }

    /// Finds a column by its exact name, or else by its short name (the part
    /// before `@`). A short name shared by several columns is an error.
    pub fn find_column(&self, name: &str) -> Result<Option<usize>> {
        if let Some((column, _)) = self.find(name) {
            return Ok(Some(column));
        }
        match self.short_lookup.get(name).map(Vec::as_slice) {
            None | Some([]) => Ok(None),
            Some([column]) => Ok(Some(*column)),
            Some(candidates) => Err(Error::ambiguous_column(name, candidates.len())),
        }
    }

    /// Resolves a column name, or a `column.subfield` reference into a bit-field.
    ///
    /// Columns are matched by full name first, then by short name. A sub-field
    /// reference may carry the table qualifier after the sub-field name
    /// (`flags.level@hdr` addresses sub-field `level` of `flags@hdr`). A full
    /// column name takes precedence, so column names containing dots remain
    /// addressable.
    pub fn resolve(&self, name: &str) -> Result<ColumnRef> {
        if let Some(column) = self.find_column(name)? {
            return Ok(ColumnRef {
                column,
                bitfield: None,
            });
        }
        let (column_name, field_ref) = name
            .rsplit_once('.')
            .ok_or_else(|| Error::unknown_column(name))?;
        let (field_name, column) = match field_ref.split_once(TABLE_SEPARATOR) {
            Some((field, table)) => {
                let qualified = format!("{column_name}{TABLE_SEPARATOR}{table}");
                (field, self.find_column(&qualified)?)
            }
            None => (field_ref, self.find_column(column_name)?),
        };
        let column = column.ok_or_else(|| Error::unknown_column(name))?;
        let descriptor = &self.columns[column];
        if descriptor.kind() != ColumnKind::Bitfield {
            return Err(Error::unknown_column(name));
        }
        let (field, _) = descriptor
            .bitfield()
            .and_then(|b| b.find(field_name))
            .ok_or_else(|| Error::unknown_column(name))?;
        Ok(ColumnRef {
            column,
            bitfield: Some(field),
        })
    }

    pub fn into_columns(self) -> Vec<ColumnDescriptor> {
        self.columns
    }
}

fn short_name(name: &str) -> &str {
    name.split_once(TABLE_SEPARATOR).map_or(name, |(short, _)| short)
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.columns == other.columns
    }
}

impl Eq for Schema {}

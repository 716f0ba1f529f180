use ahash::AHashMap;

/// Caller memory holding the cells to encode: a shared array addressed by the
/// encoder's layout, plus optional dedicated buffers for individual columns.
#[derive(Debug, Clone, Default)]
pub struct EncodeSource<'a> {
    shared: Option<&'a [u8]>,
    columns: AHashMap<usize, &'a [u8]>,
}

impl<'a> EncodeSource<'a> {
    pub fn new(shared: &'a [u8]) -> EncodeSource<'a> {
        EncodeSource {
            shared: Some(shared),
            columns: AHashMap::new(),
        }
    }

    /// A source without a shared array; every encoded column needs a buffer of
    /// its own.
    pub fn empty() -> EncodeSource<'a> {
        EncodeSource::default()
    }

    /// Reads encoder column `column` from `buf`.
    pub fn with_column_buffer(mut self, column: usize, buf: &'a [u8]) -> EncodeSource<'a> {
        self.columns.insert(column, buf);
        self
    }

    pub fn has_column_buffer(&self, column: usize) -> bool {
        self.columns.contains_key(&column)
    }

    pub(crate) fn shared(&self) -> Option<&'a [u8]> {
        self.shared
    }

    pub(crate) fn column(&self, column: usize) -> Option<&'a [u8]> {
        self.columns.get(&column).copied()
    }

    pub(crate) fn column_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.columns.keys().copied()
    }
}

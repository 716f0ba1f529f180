//! Frame properties: string keys mapped to string values.
//!
//! - [`PropertyBagBuilder`]: a mutable collection used by writers.
//! - [`PropertyBag`]: a read-only view over the key/value pairs of a frame header.
//!
//! Insertion order carries no meaning. Builders emit pairs sorted by key, so that
//! positional access on frames they produce is deterministic.

use ahash::AHashMap;

/// A builder for frame property collections.
#[derive(Debug, Clone, Default)]
pub struct PropertyBagBuilder(AHashMap<String, String>);

impl PropertyBagBuilder {
    pub fn new() -> PropertyBagBuilder {
        PropertyBagBuilder(Default::default())
    }

    /// Sets a property, replacing any previous value under the same key.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: impl AsRef<str>) -> Option<&str> {
        self.0.get(key.as_ref()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the pairs sorted by key.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<_> = self
            .0
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        pairs.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        pairs
    }
}

/// A read-only view over a slice of key/value pairs.
#[derive(Debug, Clone, Copy)]
pub struct PropertyBag<'a>(&'a [(String, String)]);

impl<'a> PropertyBag<'a> {
    pub fn new(pairs: &'a [(String, String)]) -> PropertyBag<'a> {
        PropertyBag(pairs)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, key: impl AsRef<str>) -> bool {
        self.get(key).is_some()
    }

    /// Looks a value up by key.
    pub fn get(&self, key: impl AsRef<str>) -> Option<&'a str> {
        let key = key.as_ref();
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Returns the key/value pair at `index`.
    pub fn get_index(&self, index: usize) -> Option<(&'a str, &'a str)> {
        self.0.get(index).map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_sorted_output() {
        let mut builder = PropertyBagBuilder::new();
        builder.set("version", "2");
        builder.set("encoder", "colstream");
        builder.set("version", "3");
        assert_eq!(builder.len(), 2);
        assert_eq!(builder.get("version"), Some("3"));

        let pairs = builder.to_pairs();
        let bag = PropertyBag::new(&pairs);
        assert_eq!(bag.get_index(0), Some(("encoder", "colstream")));
        assert_eq!(bag.get_index(1), Some(("version", "3")));
        assert_eq!(bag.get_index(2), None);
        assert_eq!(bag.get("version"), Some("3"));
        assert!(!bag.contains("missing"));
    }

    #[test]
    fn test_empty_bag() {
        let bag = PropertyBag::new(&[]);
        assert!(bag.is_empty());
        assert_eq!(bag.iter().count(), 0);
    }
}

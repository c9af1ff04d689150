//! Multi-valued header storage.

use std::collections::BTreeMap;
use std::fmt;

use http::{HeaderMap, HeaderValue};

/// Header names exactly as received, before normalization.
///
/// Keys are case-sensitive here; `Content-Type` and `content-type` are
/// distinct entries until [`Headers::normalize`] merges them.
pub type RawHeaders = BTreeMap<String, Vec<HeaderValue>>;

/// Lowercase header name to ordered values.
///
/// Names are unique after normalization and value order within a name is
/// preserved. `Debug` prints names and value counts only, so a stray
/// `{:?}` in a log line cannot leak credentials.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Headers(BTreeMap<String, Vec<HeaderValue>>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lowercase every name and merge entries that collide.
    ///
    /// Values of colliding names are concatenated in raw-key order; callers
    /// should treat the merged list as a set.
    pub fn normalize(raw: RawHeaders) -> Self {
        let mut merged: BTreeMap<String, Vec<HeaderValue>> = BTreeMap::new();
        for (name, values) in raw {
            merged
                .entry(name.to_ascii_lowercase())
                .or_default()
                .extend(values);
        }
        Self(merged)
    }

    /// Collect an `http::HeaderMap`, keeping every value of repeated names.
    pub fn from_header_map(map: &HeaderMap) -> Self {
        let mut headers = Self::new();
        for (name, value) in map.iter() {
            headers.append(name.as_str(), value.clone());
        }
        headers
    }

    /// Append a value, lowercasing the name.
    pub fn append(&mut self, name: &str, value: HeaderValue) {
        self.0
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(value);
    }

    /// All values for `name`, looked up case-insensitively.
    #[cfg(test)]
    pub fn get_all(&self, name: &str) -> Option<&[HeaderValue]> {
        match self.0.get(name) {
            Some(values) => Some(values.as_slice()),
            None => self
                .0
                .get(&name.to_ascii_lowercase())
                .map(|values| values.as_slice()),
        }
    }

    #[cfg(test)]
    pub fn contains(&self, name: &str) -> bool {
        self.get_all(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[HeaderValue])> {
        self.0
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    /// Number of distinct names.
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Debug for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.0.iter().map(|(name, values)| (name, values.len())))
            .finish()
    }
}

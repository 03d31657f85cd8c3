//! Ordered key/value stores for headers, query parameters and config.
//!
//! An [`ArrayStore`] keeps keys in first-insertion order. Writing an existing key
//! replaces its value in place, so merging several stores in priority order
//! yields "last writer wins" values with a stable key order.

use serde::{Deserialize, Serialize};

use crate::Result;

/// Ordered string-keyed store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArrayStore<V = String> {
    entries: Vec<(String, V)>,
}

/// Header store.
pub type Headers = ArrayStore<String>;

/// Query parameter store.
pub type Query = ArrayStore<String>;

/// Per-call config store, values are arbitrary JSON.
pub type ConfigStore = ArrayStore<serde_json::Value>;

impl<V> Default for ArrayStore<V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<V> ArrayStore<V> {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`ArrayStore::add`].
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<V>) -> Self {
        self.add(key, value);
        self
    }

    /// Sets a value, replacing an existing key in place.
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<V>) -> &mut Self {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
        self
    }

    /// Value for a key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value)
    }

    /// Value for a key, ignoring ASCII case (header lookups).
    #[must_use]
    pub fn get_ignore_case(&self, key: &str) -> Option<&V> {
        self.entries
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(key))
            .map(|(_, value)| value)
    }

    /// Returns `true` if the key is present.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Removes a key, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<V> {
        let index = self.entries.iter().position(|(existing, _)| existing == key)?;
        Some(self.entries.remove(index).1)
    }

    /// Replaces the whole content.
    pub fn set(&mut self, entries: impl IntoIterator<Item = (String, V)>) -> &mut Self {
        self.entries.clear();
        for (key, value) in entries {
            self.add(key, value);
        }
        self
    }

    /// All entries, in order.
    #[must_use]
    pub fn all(&self) -> &[(String, V)] {
        &self.entries
    }

    /// Iterates over entries.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Keys, in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V: Clone> ArrayStore<V> {
    /// Merges `other` on top of `self`: colliding keys take `other`'s value.
    pub fn merge(&mut self, other: &Self) -> &mut Self {
        for (key, value) in &other.entries {
            self.add(key.clone(), value.clone());
        }
        self
    }

    /// Merges several stores, lowest priority first.
    #[must_use]
    pub fn merged<'a>(layers: impl IntoIterator<Item = &'a Self>) -> Self
    where
        V: 'a,
    {
        let mut store = Self::new();
        for layer in layers {
            store.merge(layer);
        }
        store
    }
}

impl ArrayStore<String> {
    /// Builds a store from a serializable value, e.g. a query struct.
    pub fn from_serialize<T: Serialize>(value: &T) -> Result<Self> {
        let encoded = courier_core::to_query_string(value)?;
        Ok(url::form_urlencoded::parse(encoded.as_bytes())
            .into_owned()
            .collect())
    }
}

impl<K: Into<String>, V: Into<T>, T> FromIterator<(K, V)> for ArrayStore<T> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut store = Self::new();
        for (key, value) in iter {
            store.add(key, value);
        }
        store
    }
}

impl<K: Into<String>, V: Into<T>, T, const N: usize> From<[(K, V); N]> for ArrayStore<T> {
    fn from(entries: [(K, V); N]) -> Self {
        entries.into_iter().collect()
    }
}

impl<V> IntoIterator for ArrayStore<V> {
    type Item = (String, V);
    type IntoIter = std::vec::IntoIter<(String, V)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

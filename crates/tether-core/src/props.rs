//! Heterogeneous property bags
//!
//! Module and plugin props are open-ended: a plugin may contribute a number,
//! a callback or a whole service handle. `Props` stores each value behind a
//! shared `Any` so bags are cheap to clone and merge.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

type PropValue = Arc<dyn Any + Send + Sync>;

/// String-keyed bag of shared, type-erased values.
///
/// Merging follows object-spread semantics: on key collision the incoming
/// value replaces the existing one.
#[derive(Clone, Default)]
pub struct Props {
    values: BTreeMap<String, PropValue>,
}

impl Props {
    /// Create an empty bag
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with<T: Any + Send + Sync>(mut self, key: impl Into<String>, value: T) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert a value, replacing any previous value under `key`
    pub fn insert<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) -> &mut Self {
        self.values.insert(key.into(), Arc::new(value));
        self
    }

    /// Insert an already-shared value
    pub fn insert_shared(
        &mut self,
        key: impl Into<String>,
        value: Arc<dyn Any + Send + Sync>,
    ) -> &mut Self {
        self.values.insert(key.into(), value);
        self
    }

    /// Typed lookup. Returns `None` when absent or of another type.
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.values.get(key).and_then(|value| value.downcast_ref::<T>())
    }

    /// Shared handle to a raw value
    pub fn get_shared(&self, key: &str) -> Option<Arc<dyn Any + Send + Sync>> {
        self.values.get(key).cloned()
    }

    /// Check if a key is present
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Remove a key
    pub fn remove(&mut self, key: &str) -> bool {
        self.values.remove(key).is_some()
    }

    /// Shallow-merge `other` into `self`; `other` wins on collision
    pub fn merge(&mut self, other: Props) {
        self.values.extend(other.values);
    }

    /// Return a new bag with `other` merged over `self`
    pub fn merged(mut self, other: Props) -> Self {
        self.merge(other);
        self
    }

    /// Iterate keys in sorted order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the bag is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for Props {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.values.keys()).finish()
    }
}

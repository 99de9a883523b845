//! In-memory document

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tether_core::{DocumentRoot, Element};

/// An element with an optional id and a fixed attribute set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryElement {
    id: Option<String>,
    attributes: BTreeMap<String, String>,
}

impl MemoryElement {
    /// An element without id or attributes
    pub fn new() -> Self {
        Self::default()
    }

    /// An element declaring `behaviour` under `id`
    pub fn behaviour(id: &str, behaviour: &str) -> Self {
        Self::new()
            .with_id(id)
            .with_attribute("data-behaviour", behaviour)
    }

    /// Set the id
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set an attribute
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Set `data-query`
    pub fn with_query(self, query: &str) -> Self {
        self.with_attribute("data-query", query)
    }

    /// Set `data-keep-alive`
    pub fn keep_alive(self) -> Self {
        self.with_attribute("data-keep-alive", "")
    }
}

impl Element for MemoryElement {
    fn id(&self) -> Option<String> {
        self.id.clone()
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.attributes.get(name).cloned()
    }
}

/// A flat, ordered element list standing in for a document subtree.
///
/// Elements can be added and removed while a manager holds the document.
#[derive(Debug, Default)]
pub struct MemoryDocument {
    elements: RwLock<Vec<Arc<MemoryElement>>>,
}

impl MemoryDocument {
    /// An empty document
    pub fn new() -> Self {
        Self::default()
    }

    /// A document holding `elements` in order
    pub fn with_elements(elements: impl IntoIterator<Item = MemoryElement>) -> Self {
        let document = Self::new();
        for element in elements {
            document.push(element);
        }
        document
    }

    /// Append an element and return the shared handle
    pub fn push(&self, element: MemoryElement) -> Arc<MemoryElement> {
        let element = Arc::new(element);
        self.elements.write().push(Arc::clone(&element));
        element
    }

    /// Remove every element whose id is `id`
    pub fn remove(&self, id: &str) -> usize {
        let mut elements = self.elements.write();
        let before = elements.len();
        elements.retain(|element| element.id.as_deref() != Some(id));
        before - elements.len()
    }

    /// First element with `id`
    pub fn get(&self, id: &str) -> Option<Arc<MemoryElement>> {
        self.elements
            .read()
            .iter()
            .find(|element| element.id.as_deref() == Some(id))
            .cloned()
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.elements.read().len()
    }

    /// Check if the document is empty
    pub fn is_empty(&self) -> bool {
        self.elements.read().is_empty()
    }
}

impl DocumentRoot for MemoryDocument {
    fn elements_with_attribute(&self, attribute: &str) -> Vec<Arc<dyn Element>> {
        self.elements
            .read()
            .iter()
            .filter(|element| element.attributes.contains_key(attribute))
            .map(|element| Arc::clone(element) as Arc<dyn Element>)
            .collect()
    }
}

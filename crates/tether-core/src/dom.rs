//! Document boundary
//!
//! Discovery only needs two things from a document: the elements under a
//! root that carry a given attribute, and attribute/id reads on each of them.

use crate::config::AttributeNames;
use crate::error::DeclarationError;
use std::fmt;
use std::sync::Arc;

/// An element that may declare a behaviour
pub trait Element: Send + Sync + fmt::Debug {
    /// The element's own id, if any
    fn id(&self) -> Option<String>;

    /// Read an attribute value. Present-but-empty attributes return `Some("")`.
    fn attribute(&self, name: &str) -> Option<String>;
}

/// A subtree that can be scanned for declaring elements
pub trait DocumentRoot: Send + Sync {
    /// All descendants carrying `attribute`, in document order
    fn elements_with_attribute(&self, attribute: &str) -> Vec<Arc<dyn Element>>;
}

/// A validated behaviour declaration read from one element
#[derive(Clone)]
pub struct BehaviourDescriptor {
    /// Behaviour (module) name
    pub behaviour: String,
    /// Cache key, taken from the element id
    pub id: String,
    /// Responsive condition, if declared
    pub media_query: Option<String>,
    /// Exempt from global teardown
    pub keep_alive: bool,
    /// The declaring element
    pub node: Arc<dyn Element>,
}

impl BehaviourDescriptor {
    /// Read and validate the declaration on `node`.
    ///
    /// The behaviour name is trimmed and must be a single word. The element
    /// must have a non-blank id. A blank media query counts as absent; a
    /// keep-alive attribute counts as set whatever its value.
    pub fn from_element(
        node: Arc<dyn Element>,
        attributes: &AttributeNames,
    ) -> Result<Self, DeclarationError> {
        let raw = node.attribute(&attributes.behaviour).unwrap_or_default();
        let behaviour = raw.trim().to_string();
        let id = element_id(node.as_ref());

        if behaviour.split_whitespace().count() > 1 {
            return Err(DeclarationError::MultipleBehaviours {
                declaration: behaviour,
            });
        }
        let Some(id) = id else {
            return Err(DeclarationError::MissingId {
                declaration: behaviour,
            });
        };
        if behaviour.is_empty() {
            return Err(DeclarationError::EmptyBehaviour { id });
        }

        let media_query = node
            .attribute(&attributes.query)
            .map(|query| query.trim().to_string())
            .filter(|query| !query.is_empty());
        let keep_alive = node.attribute(&attributes.keep_alive).is_some();

        Ok(Self {
            behaviour,
            id,
            media_query,
            keep_alive,
            node,
        })
    }

    /// Check if this declaration is responsive
    pub fn is_responsive(&self) -> bool {
        self.media_query.is_some()
    }
}

impl fmt::Debug for BehaviourDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BehaviourDescriptor")
            .field("behaviour", &self.behaviour)
            .field("id", &self.id)
            .field("media_query", &self.media_query)
            .field("keep_alive", &self.keep_alive)
            .finish_non_exhaustive()
    }
}

/// Element id with blank ids treated as missing
pub(crate) fn element_id(node: &dyn Element) -> Option<String> {
    node.id()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Debug, Default)]
    struct Node {
        id: Option<String>,
        attrs: HashMap<String, String>,
    }

    impl Node {
        fn new(id: Option<&str>, attrs: &[(&str, &str)]) -> Arc<dyn Element> {
            Arc::new(Self {
                id: id.map(str::to_string),
                attrs: attrs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            })
        }
    }

    impl Element for Node {
        fn id(&self) -> Option<String> {
            self.id.clone()
        }

        fn attribute(&self, name: &str) -> Option<String> {
            self.attrs.get(name).cloned()
        }
    }

    fn read(node: Arc<dyn Element>) -> Result<BehaviourDescriptor, DeclarationError> {
        BehaviourDescriptor::from_element(node, &AttributeNames::default())
    }

    #[test]
    fn test_reads_full_declaration() {
        let descriptor = read(Node::new(
            Some("b"),
            &[
                ("data-behaviour", "  responsive "),
                ("data-query", "(min-width: 1000px)"),
                ("data-keep-alive", ""),
            ],
        ))
        .unwrap();

        assert_eq!(descriptor.behaviour, "responsive");
        assert_eq!(descriptor.id, "b");
        assert_eq!(
            descriptor.media_query.as_deref(),
            Some("(min-width: 1000px)")
        );
        assert!(descriptor.keep_alive);
        assert!(descriptor.is_responsive());
    }

    #[test]
    fn test_blank_query_is_absent() {
        let descriptor = read(Node::new(
            Some("a"),
            &[("data-behaviour", "sandbox"), ("data-query", "  ")],
        ))
        .unwrap();
        assert!(!descriptor.is_responsive());
        assert!(!descriptor.keep_alive);
    }

    #[test]
    fn test_rejects_multiple_behaviours() {
        let err = read(Node::new(Some("a"), &[("data-behaviour", "sandbox modal")])).unwrap_err();
        assert_eq!(
            err,
            DeclarationError::MultipleBehaviours {
                declaration: "sandbox modal".to_string()
            }
        );
    }

    #[test]
    fn test_rejects_missing_or_blank_id() {
        let err = read(Node::new(None, &[("data-behaviour", "sandbox")])).unwrap_err();
        assert!(matches!(err, DeclarationError::MissingId { .. }));

        let err = read(Node::new(Some(" "), &[("data-behaviour", "sandbox")])).unwrap_err();
        assert!(matches!(err, DeclarationError::MissingId { .. }));
    }

    #[test]
    fn test_rejects_empty_behaviour() {
        let err = read(Node::new(Some("a"), &[("data-behaviour", "")])).unwrap_err();
        assert_eq!(
            err,
            DeclarationError::EmptyBehaviour {
                id: "a".to_string()
            }
        );
    }
}

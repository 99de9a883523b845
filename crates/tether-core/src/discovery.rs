//! Behaviour discovery
//!
//! Scans a subtree for declaring elements, seeds a cache entry per new id and
//! dispatches each declaration to the loader or to a responsive controller.

use crate::cache::CacheEntry;
use crate::config::AttributeNames;
use crate::dom::{element_id, BehaviourDescriptor, DocumentRoot};
use crate::error::DeclarationError;
use crate::loader::Loader;
use crate::media::MediaMatcher;
use crate::responsive::ResponsiveController;
use std::collections::HashSet;
use std::sync::Arc;

/// What one discovery pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryReport {
    /// Ids dispatched straight to the loader
    pub loaded: Vec<String>,
    /// Ids handed to a responsive controller
    pub responsive: Vec<String>,
    /// Declaring elements whose id was already cached
    pub skipped: usize,
    /// Ids declared by more than one element in this pass
    pub duplicates: Vec<String>,
}

impl DiscoveryReport {
    /// Number of new entries seeded by the pass
    pub fn seeded(&self) -> usize {
        self.loaded.len() + self.responsive.len()
    }
}

/// Finds declaring elements and starts their lifecycle
#[derive(Clone)]
pub struct Discovery {
    loader: Loader,
    matcher: Arc<dyn MediaMatcher>,
    attributes: AttributeNames,
}

impl Discovery {
    /// Create a discovery pass runner
    pub fn new(loader: Loader, matcher: Arc<dyn MediaMatcher>, attributes: AttributeNames) -> Self {
        Self {
            loader,
            matcher,
            attributes,
        }
    }

    /// Attribute names this runner reads
    pub fn attributes(&self) -> &AttributeNames {
        &self.attributes
    }

    /// Run one pass over `root`.
    ///
    /// Elements whose id is already cached are skipped. The first invalid
    /// declaration aborts the pass; entries seeded before it stay in the cache
    /// and their loads stay dispatched.
    pub fn discover(&self, root: &dyn DocumentRoot) -> Result<DiscoveryReport, DeclarationError> {
        let cache = self.loader.cache();
        let mut report = DiscoveryReport::default();
        let mut seen = HashSet::new();

        let fresh: Vec<_> = root
            .elements_with_attribute(&self.attributes.behaviour)
            .into_iter()
            .filter(|node| match element_id(node.as_ref()) {
                Some(id) if cache.has(&id) => {
                    report.skipped += 1;
                    false
                }
                _ => true,
            })
            .collect();

        for node in fresh {
            let descriptor = BehaviourDescriptor::from_element(node, &self.attributes)?;
            let id = descriptor.id.clone();

            if !seen.insert(id.clone()) || cache.has(&id) {
                tracing::warn!(id = %id, behaviour = %descriptor.behaviour, "id declared twice; keeping the first");
                report.duplicates.push(id);
                continue;
            }

            cache.set(id.clone(), CacheEntry::seeded(id.clone(), cache.next_epoch()));

            if descriptor.is_responsive() {
                ResponsiveController::new(descriptor, self.loader.clone()).attach(self.matcher.as_ref());
                report.responsive.push(id);
            } else {
                if let Err(err) = self.loader.fetch(descriptor) {
                    tracing::error!(id = %id, error = %err, "behaviour fetch could not start");
                }
                report.loaded.push(id);
            }
        }

        tracing::debug!(
            loaded = report.loaded.len(),
            responsive = report.responsive.len(),
            skipped = report.skipped,
            duplicates = report.duplicates.len(),
            "discovery pass complete"
        );
        Ok(report)
    }
}

impl std::fmt::Debug for Discovery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Discovery")
            .field("attributes", &self.attributes)
            .finish_non_exhaustive()
    }
}

//! Responsive load/unload
//!
//! A controller owns one id's media-query subscription and moves the entry
//! between loaded and unloaded as the condition changes. Decisions read the
//! entry's `has_loaded` flag from the cache each time; the controller keeps
//! no state of its own.

use crate::cache::{Cache, ResponsiveBinding};
use crate::dom::BehaviourDescriptor;
use crate::loader::Loader;
use crate::media::{MatchEvent, MediaMatcher};
use std::sync::Arc;

/// What a match-change event did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// A fetch was requested
    Load,
    /// The module and its plugins were torn down
    Unload,
    /// An in-flight fetch was invalidated before its module ran
    Cancelled,
    /// Nothing to do for this event
    Ignored,
}

/// Drives one responsive behaviour through the loader
#[derive(Clone, Debug)]
pub struct ResponsiveController {
    descriptor: BehaviourDescriptor,
    cache: Cache,
    loader: Loader,
}

impl ResponsiveController {
    /// Create a controller for `descriptor`
    pub fn new(descriptor: BehaviourDescriptor, loader: Loader) -> Self {
        Self {
            descriptor,
            cache: loader.cache().clone(),
            loader,
        }
    }

    /// The id this controller manages
    pub fn id(&self) -> &str {
        &self.descriptor.id
    }

    /// Subscribe to the descriptor's media query and store the subscription
    /// on the cache entry.
    ///
    /// If the condition already matches, a load is requested first. Returns
    /// `None` for descriptors without a media query.
    pub fn attach(self, matcher: &dyn MediaMatcher) -> Option<ResponsiveBinding> {
        let media = self.descriptor.media_query.clone()?;
        let media_query = matcher.match_media(&media);

        if media_query.matches() {
            self.request_load();
        }

        let id = self.descriptor.id.clone();
        let cache = self.cache.clone();
        let controller = Arc::new(self);
        let listener = media_query.add_listener(Arc::new(move |event| {
            controller.on_change(event);
        }));

        let binding = ResponsiveBinding::new(media_query, listener);
        let stored = cache.update(&id, |entry| entry.query = Some(binding.clone()));
        if stored.is_none() {
            // The entry vanished while subscribing; nothing owns the listener.
            binding.release();
        }
        tracing::debug!(id = %id, media = %media, listener = %binding.listener(), "responsive behaviour attached");
        Some(binding)
    }

    /// Apply one match-change event
    pub fn on_change(&self, event: MatchEvent) -> Transition {
        let id = self.id();
        let Some((has_loaded, pending)) = self
            .cache
            .update(id, |entry| (entry.has_loaded, entry.pending))
        else {
            return Transition::Ignored;
        };

        match (event.matches, has_loaded) {
            (false, true) => self.unload(),
            (false, false) if pending => self.cancel_fetch(),
            (true, false) if !pending => {
                self.request_load();
                Transition::Load
            }
            _ => {
                tracing::trace!(id = %id, matches = event.matches, has_loaded, "match change ignored");
                Transition::Ignored
            }
        }
    }

    fn request_load(&self) {
        if let Err(err) = self.loader.fetch(self.descriptor.clone()) {
            tracing::error!(id = %self.descriptor.id, error = %err, "responsive load failed");
        }
    }

    fn cancel_fetch(&self) -> Transition {
        let id = self.id();
        let epoch = self.cache.next_epoch();
        let cancelled = self
            .cache
            .update(id, |entry| {
                if !entry.pending || entry.has_loaded {
                    return false;
                }
                entry.pending = false;
                entry.epoch = epoch;
                true
            })
            .unwrap_or(false);

        if !cancelled {
            return Transition::Ignored;
        }
        tracing::debug!(id = %id, epoch, "pending fetch cancelled; query no longer matches");
        Transition::Cancelled
    }

    fn unload(&self) -> Transition {
        let id = self.id();
        let epoch = self.cache.next_epoch();

        // Claim the cleanups under the lock so each runs at most once even
        // if two change events race.
        let claimed = self.cache.update(id, |entry| {
            if !entry.has_loaded {
                return None;
            }
            let steps = entry.teardown_steps();
            entry.has_loaded = false;
            entry.destroy = None;
            entry.plugins.clear();
            entry.epoch = epoch;
            Some(steps)
        });
        let Some(Some(steps)) = claimed else {
            return Transition::Ignored;
        };

        for step in &steps {
            step.call();
        }
        tracing::debug!(id = %id, cleanups = steps.len(), epoch, "responsive behaviour unloaded");
        Transition::Unload
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cache::{CacheEntry, Cleanup, PluginRecord};
    use crate::dom::Element;
    use crate::plugins::PluginRegistry;
    use crate::resolver::ModuleCatalog;
    use crate::tasks::TaskRegistry;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct Bare;

    impl Element for Bare {
        fn id(&self) -> Option<String> {
            Some("b".to_string())
        }

        fn attribute(&self, _name: &str) -> Option<String> {
            None
        }
    }

    fn controller() -> ResponsiveController {
        let cache = Cache::new();
        let loader = Loader::new(
            cache.clone(),
            PluginRegistry::new(cache),
            Arc::new(ModuleCatalog::new()),
            Arc::new(TaskRegistry::new()),
        );
        ResponsiveController::new(
            BehaviourDescriptor {
                behaviour: "responsive".to_string(),
                id: "b".to_string(),
                media_query: Some("(min-width: 1000px)".to_string()),
                keep_alive: false,
                node: Arc::new(Bare),
            },
            loader,
        )
    }

    #[test]
    fn test_unload_runs_module_then_plugins_once() {
        let controller = controller();
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let runs = Arc::new(AtomicUsize::new(0));
        let (module_log, plugin_log, counter) =
            (Arc::clone(&order), Arc::clone(&order), Arc::clone(&runs));

        controller.cache.set(
            "b",
            CacheEntry {
                has_loaded: true,
                destroy: Some(Cleanup::new(move || {
                    module_log.lock().push("module");
                })),
                plugins: vec![PluginRecord::cleanup(move || {
                    plugin_log.lock().push("plugin");
                    counter.fetch_add(1, Ordering::SeqCst);
                })],
                ..CacheEntry::seeded("b", 1)
            },
        );

        assert_eq!(controller.on_change(MatchEvent::new(false)), Transition::Unload);
        assert_eq!(controller.on_change(MatchEvent::new(false)), Transition::Ignored);

        assert_eq!(*order.lock(), vec!["module", "plugin"]);
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        let entry = controller.cache.get("b").unwrap();
        assert!(!entry.has_loaded);
        assert!(entry.destroy.is_none());
        assert!(entry.plugins.is_empty());
        assert!(entry.epoch > 1);
    }

    #[test]
    fn test_events_for_missing_entry_are_ignored() {
        let controller = controller();
        assert_eq!(controller.on_change(MatchEvent::new(true)), Transition::Ignored);
        assert_eq!(controller.on_change(MatchEvent::new(false)), Transition::Ignored);
    }

    #[test]
    fn test_match_while_pending_is_ignored() {
        let controller = controller();
        controller.cache.set(
            "b",
            CacheEntry {
                pending: true,
                ..CacheEntry::seeded("b", 1)
            },
        );
        assert_eq!(controller.on_change(MatchEvent::new(true)), Transition::Ignored);
    }

    #[test]
    fn test_unmatch_while_pending_cancels_the_fetch() {
        let controller = controller();
        controller.cache.set(
            "b",
            CacheEntry {
                pending: true,
                ..CacheEntry::seeded("b", 1)
            },
        );

        assert_eq!(controller.on_change(MatchEvent::new(false)), Transition::Cancelled);
        let entry = controller.cache.get("b").unwrap();
        assert!(!entry.pending);
        assert!(!entry.has_loaded);
        assert!(entry.epoch > 1);

        assert_eq!(controller.on_change(MatchEvent::new(false)), Transition::Ignored);
    }
}

//! Plugin registration
//!
//! A [`PluginRegistry`] is bound to one cache. It hands out a [`Register`]
//! capability per behaviour id; plugins call it to append a cleanup-capable
//! record to that id's entry. Teardown paths walk the recorded list later.
//!
//! A register bound to an entry generation only appends while the entry is
//! still at that epoch. A record arriving after the entry was torn down or
//! replaced is run on the spot instead of being attached to nothing.

use crate::cache::{Cache, Cleanup, PluginRecord};
use std::fmt;

/// Produces per-id registration functions for one cache
#[derive(Clone)]
pub struct PluginRegistry {
    cache: Cache,
}

impl PluginRegistry {
    /// Bind a registry to `cache`
    pub fn new(cache: Cache) -> Self {
        Self { cache }
    }

    /// Registration function scoped to `id`
    pub fn register_for(&self, id: impl Into<String>) -> Register {
        Register {
            cache: self.cache.clone(),
            id: id.into(),
            epoch: None,
        }
    }

    /// Registration function scoped to `id` at entry generation `epoch`
    pub fn register_for_epoch(&self, id: impl Into<String>, epoch: u64) -> Register {
        Register {
            cache: self.cache.clone(),
            id: id.into(),
            epoch: Some(epoch),
        }
    }

    /// The cache this registry writes to
    pub fn cache(&self) -> &Cache {
        &self.cache
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("entries", &self.cache.len())
            .finish()
    }
}

/// Appends plugin records to one id's cache entry
#[derive(Clone)]
pub struct Register {
    cache: Cache,
    id: String,
    epoch: Option<u64>,
}

impl Register {
    /// The id this function registers against
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The entry generation this function is bound to, if any
    pub fn epoch(&self) -> Option<u64> {
        self.epoch
    }

    /// Append a record.
    ///
    /// An unbound register creates the entry if the id is not cached yet. A
    /// register bound to an epoch runs the record's cleanup immediately when
    /// the entry is gone or has moved to another epoch.
    pub fn register(&self, plugin: impl Into<PluginRecord>) {
        let plugin = plugin.into();
        let Some(epoch) = self.epoch else {
            let count = self.cache.upsert(&self.id, |entry| {
                entry.plugins.push(plugin);
                entry.plugins.len()
            });
            tracing::trace!(id = %self.id, plugins = count, "plugin registered");
            return;
        };

        let mut slot = Some(plugin);
        let count = self
            .cache
            .update(&self.id, |entry| {
                if entry.epoch != epoch {
                    return None;
                }
                entry.plugins.extend(slot.take());
                Some(entry.plugins.len())
            })
            .flatten();

        match (count, slot) {
            (Some(count), _) => {
                tracing::trace!(id = %self.id, epoch, plugins = count, "plugin registered");
            }
            (None, Some(orphan)) => {
                tracing::debug!(id = %self.id, epoch, "entry moved on; running plugin cleanup now");
                orphan.run();
            }
            (None, None) => {}
        }
    }

    /// Append a bare cleanup closure
    pub fn register_cleanup(&self, f: impl Fn() + Send + Sync + 'static) {
        self.register(Cleanup::new(f));
    }
}

impl fmt::Debug for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Register")
            .field("id", &self.id)
            .field("epoch", &self.epoch)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cache::CacheEntry;

    #[test]
    fn test_register_creates_entry() {
        let cache = Cache::new();
        let registry = PluginRegistry::new(cache.clone());

        let add = registry.register_for("a");
        add.register(PluginRecord::labelled("expander"));
        add.register(PluginRecord::labelled("modal"));

        let entry = cache.get("a").unwrap();
        assert_eq!(entry.name, "a");
        assert!(!entry.has_loaded);
        let labels: Vec<_> = entry.plugins.iter().filter_map(|p| p.label()).collect();
        assert_eq!(labels, vec!["expander", "modal"]);
    }

    #[test]
    fn test_register_keeps_existing_fields() {
        let cache = Cache::new();
        cache.set(
            "a",
            CacheEntry {
                has_loaded: true,
                keep_alive: true,
                ..CacheEntry::seeded("a", 7)
            },
        );

        PluginRegistry::new(cache.clone())
            .register_for("a")
            .register_cleanup(|| {});

        let entry = cache.get("a").unwrap();
        assert!(entry.has_loaded);
        assert!(entry.keep_alive);
        assert_eq!(entry.epoch, 7);
        assert_eq!(entry.plugins.len(), 1);
    }

    #[test]
    fn test_bound_register_appends_at_matching_epoch() {
        let cache = Cache::new();
        cache.set("a", CacheEntry::seeded("a", 3));

        PluginRegistry::new(cache.clone())
            .register_for_epoch("a", 3)
            .register(PluginRecord::labelled("expander"));

        assert_eq!(cache.get("a").unwrap().plugins.len(), 1);
    }

    #[test]
    fn test_bound_register_runs_cleanup_when_entry_moved_on() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let cache = Cache::new();
        let registry = PluginRegistry::new(cache.clone());
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let bump = move || {
            counter.fetch_add(1, Ordering::SeqCst);
        };

        cache.set("a", CacheEntry::seeded("a", 4));
        registry.register_for_epoch("a", 3).register_cleanup(bump.clone());
        assert!(cache.get("a").unwrap().plugins.is_empty());
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        registry.register_for_epoch("gone", 1).register_cleanup(bump);
        assert!(!cache.has("gone"));
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }
}

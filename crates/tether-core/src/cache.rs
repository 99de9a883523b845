//! Behaviour cache
//!
//! One record per behaviour id, owned by a lifecycle manager and shared by
//! clone with every component that needs it. The cache enforces nothing:
//! `set` replaces a whole record, and all lifecycle policy lives in the
//! loader, the responsive controller and the manager.

use crate::media::{ListenerId, MediaQuery};
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cleanup closure returned by a module or registered by a plugin
#[derive(Clone)]
pub struct Cleanup(Arc<dyn Fn() + Send + Sync>);

impl Cleanup {
    /// Wrap a closure
    pub fn new(f: impl Fn() + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Run the cleanup
    pub fn call(&self) {
        (self.0)();
    }

    /// Check whether two handles wrap the same closure
    pub fn ptr_eq(&self, other: &Cleanup) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Cleanup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Cleanup(..)")
    }
}

/// One plugin registration against a behaviour id.
///
/// Registrations without a cleanup are kept (they still occupy their slot in
/// registration order) and skipped at teardown.
#[derive(Clone, Debug, Default)]
pub struct PluginRecord {
    label: Option<String>,
    cleanup: Option<Cleanup>,
}

impl PluginRecord {
    /// A registration that runs `f` at teardown
    pub fn cleanup(f: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            label: None,
            cleanup: Some(Cleanup::new(f)),
        }
    }

    /// A named registration with nothing to clean up
    pub fn labelled(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            cleanup: None,
        }
    }

    /// Attach a label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Attach a cleanup
    pub fn with_cleanup(mut self, cleanup: Cleanup) -> Self {
        self.cleanup = Some(cleanup);
        self
    }

    /// Registration label
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Registered cleanup
    pub fn cleanup_fn(&self) -> Option<&Cleanup> {
        self.cleanup.as_ref()
    }

    /// Run the cleanup if there is one
    pub fn run(&self) {
        if let Some(cleanup) = &self.cleanup {
            cleanup.call();
        }
    }
}

impl From<Cleanup> for PluginRecord {
    fn from(cleanup: Cleanup) -> Self {
        Self {
            label: None,
            cleanup: Some(cleanup),
        }
    }
}

/// A media-query subscription owned by a cache entry.
///
/// Clones share the release flag, so the listener is removed at most once
/// however many copies of the entry exist.
#[derive(Clone)]
pub struct ResponsiveBinding {
    media_query: Arc<dyn MediaQuery>,
    listener: ListenerId,
    released: Arc<AtomicBool>,
}

impl ResponsiveBinding {
    /// Bind an existing subscription
    pub fn new(media_query: Arc<dyn MediaQuery>, listener: ListenerId) -> Self {
        Self {
            media_query,
            listener,
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The subscribed condition
    pub fn media_query(&self) -> &Arc<dyn MediaQuery> {
        &self.media_query
    }

    /// The subscription handle
    pub fn listener(&self) -> ListenerId {
        self.listener
    }

    /// Check whether the subscription was already removed
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Remove the subscription. Returns `false` if it was already removed.
    pub fn release(&self) -> bool {
        if self.released.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.media_query.remove_listener(self.listener);
        true
    }
}

impl fmt::Debug for ResponsiveBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponsiveBinding")
            .field("media", &self.media_query.media())
            .field("listener", &self.listener)
            .field("released", &self.is_released())
            .finish()
    }
}

/// Lifecycle record for one behaviour id
#[derive(Clone, Debug, Default)]
pub struct CacheEntry {
    /// The behaviour id
    pub name: String,
    /// True between a successful load and the next unload
    pub has_loaded: bool,
    /// Cleanup returned by the module for the current load
    pub destroy: Option<Cleanup>,
    /// Plugin registrations for the current load, in registration order
    pub plugins: Vec<PluginRecord>,
    /// Exempt from global teardown
    pub keep_alive: bool,
    /// Media-query subscription, for responsive behaviours
    pub query: Option<ResponsiveBinding>,
    /// Generation tag; fetch results carrying an older epoch are discarded
    pub epoch: u64,
    /// A fetch is in flight for this entry
    pub pending: bool,
    /// Last resolution failure
    pub failure: Option<String>,
}

impl CacheEntry {
    /// A fresh, unloaded entry
    pub fn seeded(name: impl Into<String>, epoch: u64) -> Self {
        Self {
            name: name.into(),
            epoch,
            ..Self::default()
        }
    }

    /// Module cleanup followed by every plugin cleanup, in order
    pub fn teardown_steps(&self) -> Vec<Cleanup> {
        self.destroy
            .iter()
            .cloned()
            .chain(
                self.plugins
                    .iter()
                    .filter_map(|plugin| plugin.cleanup_fn().cloned()),
            )
            .collect()
    }
}

#[derive(Default)]
struct CacheState {
    entries: IndexMap<String, CacheEntry>,
    last_epoch: u64,
}

/// Shared, insertion-ordered map from behaviour id to [`CacheEntry`].
///
/// Cloning yields another handle to the same map.
#[derive(Clone, Default)]
pub struct Cache {
    state: Arc<Mutex<CacheState>>,
}

impl Cache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if an id is present
    pub fn has(&self, id: &str) -> bool {
        self.state.lock().entries.contains_key(id)
    }

    /// Snapshot of one entry
    pub fn get(&self, id: &str) -> Option<CacheEntry> {
        self.state.lock().entries.get(id).cloned()
    }

    /// Replace the whole record for `id`
    pub fn set(&self, id: impl Into<String>, entry: CacheEntry) {
        self.state.lock().entries.insert(id.into(), entry);
    }

    /// Remove and return the record for `id`
    pub fn delete(&self, id: &str) -> Option<CacheEntry> {
        self.state.lock().entries.shift_remove(id)
    }

    /// Read-modify-write one entry under the lock.
    ///
    /// Returns `None` without calling `f` when `id` is absent. `f` must not
    /// call back into the cache.
    pub fn update<R>(&self, id: &str, f: impl FnOnce(&mut CacheEntry) -> R) -> Option<R> {
        self.state.lock().entries.get_mut(id).map(f)
    }

    /// Like [`update`](Self::update), seeding a fresh entry when `id` is absent
    pub fn upsert<R>(&self, id: &str, f: impl FnOnce(&mut CacheEntry) -> R) -> R {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let entry = match state.entries.entry(id.to_string()) {
            indexmap::map::Entry::Occupied(occupied) => occupied.into_mut(),
            indexmap::map::Entry::Vacant(vacant) => {
                state.last_epoch += 1;
                vacant.insert(CacheEntry::seeded(id, state.last_epoch))
            }
        };
        f(entry)
    }

    /// Advance and return the generation counter
    pub fn next_epoch(&self) -> u64 {
        let mut state = self.state.lock();
        state.last_epoch += 1;
        state.last_epoch
    }

    /// Ids in insertion order
    pub fn ids(&self) -> Vec<String> {
        self.state.lock().entries.keys().cloned().collect()
    }

    /// Snapshot of every entry in insertion order
    pub fn entries(&self) -> Vec<(String, CacheEntry)> {
        self.state
            .lock()
            .entries
            .iter()
            .map(|(id, entry)| (id.clone(), entry.clone()))
            .collect()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    /// Drop every entry without running any cleanup
    pub fn clear(&self) {
        self.state.lock().entries.clear();
    }
}

impl fmt::Debug for Cache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Cache")
            .field("len", &state.entries.len())
            .field("ids", &state.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_set_replaces_whole_record() {
        let cache = Cache::new();
        cache.set(
            "a",
            CacheEntry {
                has_loaded: true,
                keep_alive: true,
                ..CacheEntry::seeded("a", 1)
            },
        );
        cache.set("a", CacheEntry::seeded("a", 2));

        let entry = cache.get("a").unwrap();
        assert!(!entry.has_loaded);
        assert!(!entry.keep_alive);
        assert_eq!(entry.epoch, 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_insertion_order_survives_delete() {
        let cache = Cache::new();
        for id in ["a", "b", "c"] {
            cache.set(id, CacheEntry::seeded(id, 0));
        }
        assert!(cache.delete("b").is_some());
        assert!(cache.delete("b").is_none());
        assert_eq!(cache.ids(), vec!["a".to_string(), "c".to_string()]);
    }

    #[test]
    fn test_upsert_seeds_with_fresh_epoch() {
        let cache = Cache::new();
        let first = cache.next_epoch();
        let epoch = cache.upsert("x", |entry| entry.epoch);
        assert!(epoch > first);
        assert_eq!(cache.get("x").unwrap().name, "x");
        assert!(cache.update("missing", |_| ()).is_none());
    }

    #[test]
    fn test_teardown_steps_order_and_skip_inert() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let push = |tag: &'static str| {
            let log = Arc::clone(&log);
            move || log.lock().push(tag)
        };

        let entry = CacheEntry {
            destroy: Some(Cleanup::new(push("module"))),
            plugins: vec![
                PluginRecord::cleanup(push("first")),
                PluginRecord::labelled("inert"),
                PluginRecord::cleanup(push("second")),
            ],
            ..CacheEntry::seeded("a", 1)
        };

        for step in entry.teardown_steps() {
            step.call();
        }
        assert_eq!(*log.lock(), vec!["module", "first", "second"]);
    }

    struct CountingQuery {
        removed: AtomicUsize,
    }

    impl MediaQuery for CountingQuery {
        fn media(&self) -> &str {
            "(min-width: 1px)"
        }

        fn matches(&self) -> bool {
            true
        }

        fn add_listener(&self, _handler: crate::media::ChangeHandler) -> ListenerId {
            ListenerId(1)
        }

        fn remove_listener(&self, _id: ListenerId) {
            self.removed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_binding_releases_once_across_clones() {
        let query = Arc::new(CountingQuery {
            removed: AtomicUsize::new(0),
        });
        let binding = ResponsiveBinding::new(query.clone(), ListenerId(1));
        let copy = binding.clone();

        assert!(binding.release());
        assert!(!copy.release());
        assert!(copy.is_released());
        assert_eq!(query.removed.load(Ordering::SeqCst), 1);
    }
}

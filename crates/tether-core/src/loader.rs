//! Module loading
//!
//! `fetch` resolves a behaviour through the injected resolver and hands the
//! factory to `load_module`; `load_module` invokes a factory directly and
//! records its cleanup. Fetch results are tagged with the entry's epoch at
//! dispatch time and dropped if the entry moved on while they were in flight.

use crate::cache::{Cache, CacheEntry, Cleanup};
use crate::dom::{BehaviourDescriptor, Element};
use crate::error::{LifecycleError, ResolveError};
use crate::plugins::{PluginRegistry, Register};
use crate::props::Props;
use crate::resolver::{ModuleFactory, ModuleProps, ModuleResolver};
use crate::tasks::{SpawnError, TaskRegistry};
use std::fmt;
use std::sync::Arc;

/// A pre-resolved module to load against an id
#[derive(Clone)]
pub struct LoadRequest {
    /// The module factory
    pub module: ModuleFactory,
    /// Cache key
    pub id: String,
    /// Exempt from global teardown
    pub keep_alive: bool,
    /// Element the module attaches to
    pub node: Option<Arc<dyn Element>>,
    /// Extra props forwarded to the module
    pub props: Props,
}

impl LoadRequest {
    /// Load `module` under `id`
    pub fn new(id: impl Into<String>, module: ModuleFactory) -> Self {
        Self {
            module,
            id: id.into(),
            keep_alive: false,
            node: None,
            props: Props::new(),
        }
    }

    /// Attach an element
    pub fn with_node(mut self, node: Arc<dyn Element>) -> Self {
        self.node = Some(node);
        self
    }

    /// Mark as keep-alive
    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Attach extra props
    pub fn with_props(mut self, props: Props) -> Self {
        self.props = props;
        self
    }
}

impl fmt::Debug for LoadRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadRequest")
            .field("id", &self.id)
            .field("keep_alive", &self.keep_alive)
            .field("node", &self.node)
            .field("props", &self.props)
            .finish_non_exhaustive()
    }
}

/// Outcome of checking a resolved fetch against the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchVerdict {
    Current,
    Stale,
}

/// Resolves and instantiates behaviour modules against a cache
#[derive(Clone)]
pub struct Loader {
    cache: Cache,
    registry: PluginRegistry,
    resolver: Arc<dyn ModuleResolver>,
    tasks: Arc<TaskRegistry>,
}

impl Loader {
    pub(crate) fn new(
        cache: Cache,
        registry: PluginRegistry,
        resolver: Arc<dyn ModuleResolver>,
        tasks: Arc<TaskRegistry>,
    ) -> Self {
        Self {
            cache,
            registry,
            resolver,
            tasks,
        }
    }

    /// The cache this loader writes to
    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    /// Resolve `descriptor.behaviour` asynchronously, then load it.
    ///
    /// Returns immediately. A second fetch for an id whose fetch is still in
    /// flight is ignored. Without a Tokio runtime the failure is recorded on
    /// the entry and returned.
    pub fn fetch(&self, descriptor: BehaviourDescriptor) -> Result<(), LifecycleError> {
        let id = descriptor.id.clone();
        let claimed = self.cache.update(&id, |entry| {
            if entry.pending {
                None
            } else {
                entry.pending = true;
                Some(entry.epoch)
            }
        });
        let epoch = match claimed {
            Some(Some(epoch)) => epoch,
            Some(None) => {
                tracing::debug!(id = %id, "fetch already in flight");
                return Ok(());
            }
            None => {
                tracing::warn!(id = %id, "fetch requested for an id that is not cached");
                return Ok(());
            }
        };

        tracing::debug!(id = %id, behaviour = %descriptor.behaviour, epoch, "fetching behaviour");
        let loader = self.clone();
        let behaviour = descriptor.behaviour.clone();
        let spawned = self.tasks.spawn(async move {
            match loader.resolver.resolve(&descriptor.behaviour).await {
                Ok(module) => loader.complete_fetch(descriptor, epoch, module),
                Err(err) => loader.fail_fetch(&descriptor, epoch, err),
            }
        });

        if let Err(err) = spawned {
            let err = match err {
                SpawnError::NoRuntime => LifecycleError::NoRuntime { behaviour },
                SpawnError::ShutDown => LifecycleError::ShutDown { behaviour },
            };
            self.record_failure(&id, epoch, err.to_string());
            return Err(err);
        }
        Ok(())
    }

    fn verdict(&self, id: &str, epoch: u64) -> FetchVerdict {
        let Some((current, query)) = self
            .cache
            .update(id, |entry| (entry.epoch, entry.query.clone()))
        else {
            return FetchVerdict::Stale;
        };
        // Responsive entries must still match when the module arrives.
        let still_wanted = query.map_or(true, |binding| binding.media_query().matches());
        if current == epoch && still_wanted {
            FetchVerdict::Current
        } else {
            FetchVerdict::Stale
        }
    }

    fn complete_fetch(&self, descriptor: BehaviourDescriptor, epoch: u64, module: ModuleFactory) {
        if self.verdict(&descriptor.id, epoch) == FetchVerdict::Stale {
            tracing::debug!(
                id = %descriptor.id,
                behaviour = %descriptor.behaviour,
                epoch,
                "discarding stale fetch"
            );
            self.cache.update(&descriptor.id, |entry| {
                if entry.epoch == epoch {
                    entry.pending = false;
                }
            });
            return;
        }

        self.instantiate(
            LoadRequest {
                module,
                id: descriptor.id,
                keep_alive: descriptor.keep_alive,
                node: Some(descriptor.node),
                props: Props::new(),
            },
            epoch,
        );
    }

    /// Invoke a fetched module for the entry generation `epoch`.
    ///
    /// The result is recorded only if the entry is still at `epoch` once the
    /// module returns. Otherwise the entry was torn down or replaced while
    /// the module ran, and its cleanup runs immediately.
    fn instantiate(&self, request: LoadRequest, epoch: u64) {
        let LoadRequest {
            module,
            id,
            keep_alive,
            node,
            props,
        } = request;

        let register = self.registry.register_for_epoch(id.clone(), epoch);
        let mut destroy = invoke(&module, &id, node, props, register);
        let has_cleanup = destroy.is_some();

        let recorded = self
            .cache
            .update(&id, |entry| {
                if entry.epoch != epoch {
                    return false;
                }
                mark_loaded(entry, keep_alive, destroy.take());
                true
            })
            .unwrap_or(false);

        if recorded {
            tracing::debug!(id = %id, keep_alive, has_cleanup, epoch, "behaviour loaded");
        } else {
            tracing::debug!(id = %id, epoch, has_cleanup, "entry changed while the module ran; cleaning up");
            if let Some(destroy) = destroy {
                destroy.call();
            }
        }
    }

    fn fail_fetch(&self, descriptor: &BehaviourDescriptor, epoch: u64, err: ResolveError) {
        let err = LifecycleError::Resolve {
            behaviour: descriptor.behaviour.clone(),
            source: err,
        };
        tracing::error!(
            id = %descriptor.id,
            behaviour = %descriptor.behaviour,
            error = %err,
            "behaviour resolution failed"
        );
        self.record_failure(&descriptor.id, epoch, err.to_string());
    }

    fn record_failure(&self, id: &str, epoch: u64, message: String) {
        self.cache.update(id, |entry| {
            if entry.epoch == epoch {
                entry.pending = false;
                entry.failure = Some(message);
            }
        });
    }

    /// Invoke a module and record it as loaded.
    ///
    /// The entry is created if missing. The module runs without the cache
    /// lock held, so it may register plugins for its own id.
    pub fn load_module(&self, request: LoadRequest) {
        let LoadRequest {
            module,
            id,
            keep_alive,
            node,
            props,
        } = request;

        let register = self.registry.register_for(id.clone());
        self.cache.upsert(register.id(), |_| ());

        let destroy = invoke(&module, &id, node, props, register);
        let has_cleanup = destroy.is_some();
        self.cache
            .upsert(&id, |entry| mark_loaded(entry, keep_alive, destroy));
        tracing::debug!(id = %id, keep_alive, has_cleanup, "behaviour loaded");
    }

    /// Run an entry's module cleanup and remove it from the cache.
    ///
    /// Plugin cleanups are not run on this path. The entry's media-query
    /// subscription, if any, is released.
    pub fn unload_module(&self, id: &str) -> Result<(), LifecycleError> {
        let entry = self
            .cache
            .delete(id)
            .ok_or_else(|| LifecycleError::not_found(id))?;

        if let Some(binding) = &entry.query {
            binding.release();
        }
        if let Some(destroy) = &entry.destroy {
            destroy.call();
        }
        tracing::debug!(id = %id, "behaviour unloaded");
        Ok(())
    }
}

fn invoke(
    module: &ModuleFactory,
    id: &str,
    node: Option<Arc<dyn Element>>,
    props: Props,
    register: Register,
) -> Option<Cleanup> {
    module(ModuleProps {
        node,
        name: id.to_string(),
        props,
        plugins: Props::new(),
        register: Some(register),
    })
}

fn mark_loaded(entry: &mut CacheEntry, keep_alive: bool, destroy: Option<Cleanup>) {
    entry.keep_alive = keep_alive;
    entry.destroy = destroy;
    entry.has_loaded = true;
    entry.pending = false;
    entry.failure = None;
}

impl fmt::Debug for Loader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loader")
            .field("cache", &self.cache)
            .field("in_flight", &self.tasks.in_flight())
            .finish_non_exhaustive()
    }
}

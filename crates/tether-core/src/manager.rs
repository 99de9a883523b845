//! Lifecycle manager
//!
//! The application-facing facade: owns the cache, schedules discovery on the
//! frame scheduler, loads pre-resolved modules, tears everything down, and
//! hosts the event bus and application plugins.

use crate::bus::{EventBus, EventPayload, SubscriptionId};
use crate::cache::Cache;
use crate::composition::{bind, PluginBinder};
use crate::config::LifecycleConfig;
use crate::discovery::{Discovery, DiscoveryReport};
use crate::dom::DocumentRoot;
use crate::error::{DeclarationError, LifecycleError};
use crate::frame::{render_in_the_loop, FrameScheduler};
use crate::loader::{LoadRequest, Loader};
use crate::media::MediaMatcher;
use crate::plugins::PluginRegistry;
use crate::props::Props;
use crate::resolver::ModuleResolver;
use crate::tasks::TaskRegistry;
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Input handed to an application plugin
#[derive(Clone, Debug)]
pub struct AppPluginContext {
    /// Name the plugin was registered under
    pub name: String,
    /// The manager's event bus
    pub bus: EventBus,
    /// Extra props supplied at registration
    pub props: Props,
}

/// An application-level plugin, invoked once when registered
pub type AppPlugin = Arc<dyn Fn(AppPluginContext) + Send + Sync>;

/// What a global teardown did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    /// Ids removed from the cache
    pub destroyed: Vec<String>,
    /// Keep-alive ids left untouched
    pub kept: Vec<String>,
}

/// Builder for [`LifecycleManager`]
pub struct LifecycleBuilder {
    resolver: Arc<dyn ModuleResolver>,
    matcher: Arc<dyn MediaMatcher>,
    frames: Arc<dyn FrameScheduler>,
    config: LifecycleConfig,
}

impl LifecycleBuilder {
    /// Use `config` instead of the defaults
    pub fn config(mut self, config: LifecycleConfig) -> Self {
        self.config = config;
        self
    }

    /// Validate the configuration and build the manager
    pub fn build(self) -> Result<LifecycleManager, LifecycleError> {
        self.config.validate()?;

        let cache = Cache::new();
        let registry = PluginRegistry::new(cache.clone());
        let tasks = Arc::new(TaskRegistry::new());
        let loader = Loader::new(
            cache.clone(),
            registry.clone(),
            self.resolver,
            Arc::clone(&tasks),
        );
        let discovery = Discovery::new(
            loader.clone(),
            self.matcher,
            self.config.attributes.clone(),
        );

        Ok(LifecycleManager {
            cache,
            registry,
            loader,
            discovery,
            frames: self.frames,
            tasks,
            bus: EventBus::new(),
            app_plugins: Mutex::new(IndexMap::new()),
            hydrate_errors: Arc::new(Mutex::new(Vec::new())),
            config: self.config,
        })
    }

    /// Build the manager and schedule hydration of `root`
    pub fn load(self, root: Arc<dyn DocumentRoot>) -> Result<LifecycleManager, LifecycleError> {
        let manager = self.build()?;
        manager.hydrate(root);
        Ok(manager)
    }
}

impl fmt::Debug for LifecycleBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleBuilder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Owns the behaviour cache and every lifecycle path that mutates it
pub struct LifecycleManager {
    cache: Cache,
    registry: PluginRegistry,
    loader: Loader,
    discovery: Discovery,
    frames: Arc<dyn FrameScheduler>,
    tasks: Arc<TaskRegistry>,
    bus: EventBus,
    app_plugins: Mutex<IndexMap<String, AppPlugin>>,
    hydrate_errors: Arc<Mutex<Vec<DeclarationError>>>,
    config: LifecycleConfig,
}

impl LifecycleManager {
    /// Start building a manager from its collaborators
    pub fn builder(
        resolver: Arc<dyn ModuleResolver>,
        matcher: Arc<dyn MediaMatcher>,
        frames: Arc<dyn FrameScheduler>,
    ) -> LifecycleBuilder {
        LifecycleBuilder {
            resolver,
            matcher,
            frames,
            config: LifecycleConfig::default(),
        }
    }

    /// Schedule a discovery pass over `root` after the configured frames.
    ///
    /// Repeated calls are safe: already-cached ids are skipped. A declaration
    /// error aborts that pass and is queued for [`take_hydrate_errors`].
    ///
    /// [`take_hydrate_errors`]: Self::take_hydrate_errors
    pub fn hydrate(&self, root: Arc<dyn DocumentRoot>) {
        let discovery = self.discovery.clone();
        let errors = Arc::clone(&self.hydrate_errors);
        tracing::trace!(frames = self.config.frame_deferral, "hydrate scheduled");

        render_in_the_loop(
            Arc::clone(&self.frames),
            self.config.frame_deferral,
            Box::new(move || {
                if let Err(err) = discovery.discover(root.as_ref()) {
                    tracing::error!(error = %err, "hydrate aborted");
                    errors.lock().push(err);
                }
            }),
        );
    }

    /// Run a discovery pass over `root` now
    pub fn discover_now(&self, root: &dyn DocumentRoot) -> Result<DiscoveryReport, LifecycleError> {
        Ok(self.discovery.discover(root)?)
    }

    /// Drain declaration errors raised by scheduled hydrate passes
    pub fn take_hydrate_errors(&self) -> Vec<DeclarationError> {
        std::mem::take(&mut *self.hydrate_errors.lock())
    }

    /// Load one pre-resolved module
    pub fn load_module(&self, request: LoadRequest) {
        self.loader.load_module(request);
    }

    /// Load pre-resolved modules in order, bypassing the resolver
    pub fn load_modules(&self, requests: impl IntoIterator<Item = LoadRequest>) {
        for request in requests {
            self.loader.load_module(request);
        }
    }

    /// Run one id's module cleanup and remove it. Plugin cleanups do not run.
    pub fn unload_module(&self, id: &str) -> Result<(), LifecycleError> {
        self.loader.unload_module(id)
    }

    /// Tear down every entry that is not keep-alive.
    ///
    /// For each, the media-query subscription is released, then the module
    /// cleanup runs, then plugin cleanups in registration order. Keep-alive
    /// entries keep their module, plugins and subscription. In-flight
    /// fetches for removed ids are discarded when they resolve.
    pub fn destroy(&self) -> TeardownReport {
        let mut report = TeardownReport::default();

        for (id, entry) in self.cache.entries() {
            if entry.keep_alive {
                report.kept.push(id);
                continue;
            }
            // Another path may have removed it since the snapshot.
            let Some(entry) = self.cache.delete(&id) else {
                continue;
            };
            if let Some(binding) = &entry.query {
                binding.release();
            }
            for step in entry.teardown_steps() {
                step.call();
            }
            report.destroyed.push(id);
        }

        tracing::debug!(
            destroyed = report.destroyed.len(),
            kept = report.kept.len(),
            "lifecycle destroyed"
        );
        report
    }

    /// Register an application plugin and invoke it once.
    ///
    /// Returns `false` without invoking anything if `name` is taken.
    pub fn use_plugin(&self, name: impl Into<String>, plugin: AppPlugin, props: Props) -> bool {
        let name = name.into();
        {
            let mut plugins = self.app_plugins.lock();
            if plugins.contains_key(&name) {
                tracing::warn!(plugin = %name, "application plugin already registered");
                return false;
            }
            plugins.insert(name.clone(), Arc::clone(&plugin));
        }

        plugin(AppPluginContext {
            name: name.clone(),
            bus: self.bus.clone(),
            props,
        });
        tracing::debug!(plugin = %name, "application plugin registered");
        true
    }

    /// Names of registered application plugins, in registration order
    pub fn app_plugins(&self) -> Vec<String> {
        self.app_plugins.lock().keys().cloned().collect()
    }

    /// Subscribe to a bus event
    pub fn on(
        &self,
        event: impl Into<String>,
        handler: impl Fn(&EventPayload) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.bus.on(event, handler)
    }

    /// Unsubscribe from a bus event
    pub fn off(&self, event: &str, id: SubscriptionId) -> bool {
        self.bus.off(event, id)
    }

    /// Emit a bus event
    pub fn emit(&self, event: &str, payload: &EventPayload) -> usize {
        self.bus.emit(event, payload)
    }

    /// The event bus
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Live cache, for inspection
    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    /// Registry that plugin composition registers against
    pub fn plugin_registry(&self) -> &PluginRegistry {
        &self.registry
    }

    /// Plugin composition bound to this manager's registry
    pub fn plugins(&self) -> PluginBinder {
        bind(self.registry.clone())
    }

    /// Active configuration
    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    /// Wait for every in-flight fetch to finish
    pub async fn settle(&self) {
        self.tasks.settle().await;
    }

    /// Abort in-flight fetches and refuse new ones.
    ///
    /// Loaded behaviours are left as they are; call [`LifecycleManager::destroy`]
    /// first to tear them down. Dropping the manager shuts it down.
    pub fn shutdown(&self) {
        self.tasks.shutdown();
    }
}

impl Drop for LifecycleManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for LifecycleManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleManager")
            .field("cache", &self.cache)
            .field("bus", &self.bus)
            .field("app_plugins", &self.app_plugins())
            .field("in_flight", &self.tasks.in_flight())
            .finish_non_exhaustive()
    }
}

//! # Tether Core
//!
//! Lazily attaches behaviour modules to the elements of a rendered document
//! and detaches them again.
//!
//! Elements declare a behaviour through attributes (`data-behaviour`, plus an
//! optional `data-query` media condition and `data-keep-alive` flag). A
//! [`LifecycleManager`] discovers them a couple of frames after `hydrate`,
//! resolves each behaviour through an injected [`ModuleResolver`], invokes the
//! module and keeps its cleanup in a per-manager [`Cache`]. Responsive
//! behaviours load and unload as their media condition flips. `destroy`
//! runs every cleanup except for keep-alive entries.
//!
//! Modules can be decorated with plugins through [`bind`]: each plugin
//! contributes props and may register a cleanup against the module's id.
//!
//! ```rust,ignore
//! use tether_core::{LifecycleManager, ModuleCatalog, module_fn};
//!
//! let catalog = ModuleCatalog::new().with("sandbox", module_fn(|props| {
//!     tracing::info!(id = %props.name, "sandbox mounted");
//!     None
//! }));
//!
//! let app = LifecycleManager::builder(Arc::new(catalog), matcher, frames)
//!     .load(document)?;
//! // ... later, between page views
//! app.destroy();
//! ```

pub mod bus;
pub mod cache;
pub mod composition;
pub mod config;
pub mod discovery;
pub mod dom;
pub mod error;
pub mod frame;
pub mod loader;
pub mod manager;
pub mod media;
pub mod plugins;
pub mod props;
pub mod resolver;
pub mod responsive;

mod tasks;

pub use bus::{EventBus, EventHandler, EventPayload, SubscriptionId};
pub use cache::{Cache, CacheEntry, Cleanup, PluginRecord, ResponsiveBinding};
pub use composition::{bind, plugin_fn, PluginBinder, PluginContext, PluginFactory, WithPlugins};
pub use config::{AttributeNames, LifecycleConfig};
pub use discovery::{Discovery, DiscoveryReport};
pub use dom::{BehaviourDescriptor, DocumentRoot, Element};
pub use error::{ConfigError, DeclarationError, LifecycleError, ResolveError};
pub use frame::{render_in_the_loop, FrameCallback, FrameScheduler};
pub use loader::{LoadRequest, Loader};
pub use manager::{
    AppPlugin, AppPluginContext, LifecycleBuilder, LifecycleManager, TeardownReport,
};
pub use media::{ChangeHandler, ListenerId, MatchEvent, MediaMatcher, MediaQuery};
pub use plugins::{PluginRegistry, Register};
pub use props::Props;
pub use resolver::{module_fn, ModuleCatalog, ModuleFactory, ModuleProps, ModuleResolver};
pub use responsive::{ResponsiveController, Transition};

//! Plugin composition for modules
//!
//! `bind(registry).with_plugins([..]).wrap(module)` produces a module whose
//! props carry a `plugins` bag built from every plugin factory's output.
//! Each factory receives a [`Register`] scoped to the module's id so it can
//! leave a cleanup behind; running those cleanups is left to whichever
//! teardown path later walks the entry.

use crate::dom::Element;
use crate::plugins::{PluginRegistry, Register};
use crate::props::Props;
use crate::resolver::{ModuleFactory, ModuleProps};
use std::fmt;
use std::sync::Arc;

/// Input handed to a plugin factory
#[derive(Clone)]
pub struct PluginContext {
    /// Registration function for the module's id
    pub register: Register,
    /// The module's element, if any
    pub node: Option<Arc<dyn Element>>,
    /// The module's caller-supplied props
    pub props: Props,
}

impl fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginContext")
            .field("register", &self.register)
            .field("props", &self.props)
            .finish_non_exhaustive()
    }
}

/// A plugin: returns the props it contributes
pub type PluginFactory = Arc<dyn Fn(PluginContext) -> Props + Send + Sync>;

/// Wrap a closure as a [`PluginFactory`]
pub fn plugin_fn<F>(f: F) -> PluginFactory
where
    F: Fn(PluginContext) -> Props + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Bind composition to a plugin registry
pub fn bind(registry: PluginRegistry) -> PluginBinder {
    PluginBinder { registry }
}

/// Composition bound to one registry
#[derive(Clone, Debug)]
pub struct PluginBinder {
    registry: PluginRegistry,
}

impl PluginBinder {
    /// Collect plugin factories to apply to a module
    pub fn with_plugins(&self, plugins: impl IntoIterator<Item = PluginFactory>) -> WithPlugins {
        WithPlugins {
            registry: self.registry.clone(),
            plugins: plugins.into_iter().collect(),
        }
    }
}

/// A set of plugin factories ready to decorate modules
#[derive(Clone)]
pub struct WithPlugins {
    registry: PluginRegistry,
    plugins: Vec<PluginFactory>,
}

impl WithPlugins {
    /// Number of plugin factories
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Check if there are no plugin factories
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Decorate `module`.
    ///
    /// On every invocation each factory runs in order; their outputs are
    /// merged with later factories winning on key collision and passed to
    /// the module as `props.plugins`. Plugins register through the loader's
    /// register when one is supplied.
    pub fn wrap(&self, module: ModuleFactory) -> ModuleFactory {
        let registry = self.registry.clone();
        let plugins = self.plugins.clone();

        Arc::new(move |props: ModuleProps| {
            let mut contributed = Props::new();
            for plugin in &plugins {
                contributed.merge(plugin(PluginContext {
                    register: props
                        .register
                        .clone()
                        .unwrap_or_else(|| registry.register_for(props.name.clone())),
                    node: props.node.clone(),
                    props: props.props.clone(),
                }));
            }
            tracing::trace!(id = %props.name, plugins = plugins.len(), "composed plugin props");

            module(ModuleProps {
                plugins: contributed,
                ..props
            })
        })
    }
}

impl fmt::Debug for WithPlugins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WithPlugins")
            .field("plugins", &self.plugins.len())
            .finish()
    }
}

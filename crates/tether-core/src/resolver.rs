//! Module factories and resolution
//!
//! A behaviour module is a factory invoked once per element. Whatever cleanup
//! it returns runs when the behaviour is unloaded. Resolvers turn a behaviour
//! name into a factory asynchronously, so any code-loading mechanism can sit
//! behind them.

use crate::cache::Cleanup;
use crate::dom::Element;
use crate::error::ResolveError;
use crate::plugins::Register;
use crate::props::Props;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Props passed to a module factory
#[derive(Clone)]
pub struct ModuleProps {
    /// The declaring element, if the module was loaded against one
    pub node: Option<Arc<dyn Element>>,
    /// The behaviour id
    pub name: String,
    /// Caller-supplied extra props
    pub props: Props,
    /// Props contributed by composed plugins
    pub plugins: Props,
    /// Registration function for this load, supplied by the loader
    pub register: Option<Register>,
}

impl ModuleProps {
    /// Props for `name` with nothing else attached
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            node: None,
            name: name.into(),
            props: Props::new(),
            plugins: Props::new(),
            register: None,
        }
    }

    /// Attach the declaring element
    pub fn with_node(mut self, node: Arc<dyn Element>) -> Self {
        self.node = Some(node);
        self
    }

    /// Attach extra props
    pub fn with_props(mut self, props: Props) -> Self {
        self.props = props;
        self
    }
}

impl fmt::Debug for ModuleProps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleProps")
            .field("name", &self.name)
            .field("node", &self.node)
            .field("props", &self.props)
            .field("plugins", &self.plugins)
            .field("register", &self.register)
            .finish()
    }
}

/// A behaviour module: invoked with its props, returns an optional cleanup
pub type ModuleFactory = Arc<dyn Fn(ModuleProps) -> Option<Cleanup> + Send + Sync>;

/// Wrap a closure as a [`ModuleFactory`]
pub fn module_fn<F>(f: F) -> ModuleFactory
where
    F: Fn(ModuleProps) -> Option<Cleanup> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Resolves behaviour names to module factories
#[async_trait]
pub trait ModuleResolver: Send + Sync {
    /// Resolve `behaviour` to its module factory
    async fn resolve(&self, behaviour: &str) -> Result<ModuleFactory, ResolveError>;
}

#[async_trait]
impl<F, Fut> ModuleResolver for F
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ModuleFactory, ResolveError>> + Send,
{
    async fn resolve(&self, behaviour: &str) -> Result<ModuleFactory, ResolveError> {
        (self)(behaviour.to_string()).await
    }
}

/// Name → factory table for applications that do not split their modules
#[derive(Clone, Default)]
pub struct ModuleCatalog {
    modules: HashMap<String, ModuleFactory>,
}

impl ModuleCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style registration
    pub fn with(mut self, behaviour: impl Into<String>, module: ModuleFactory) -> Self {
        self.register(behaviour, module);
        self
    }

    /// Register a module under `behaviour`, replacing any previous one
    pub fn register(&mut self, behaviour: impl Into<String>, module: ModuleFactory) {
        self.modules.insert(behaviour.into(), module);
    }

    /// Look up a module
    pub fn get(&self, behaviour: &str) -> Option<&ModuleFactory> {
        self.modules.get(behaviour)
    }

    /// Check if a module is registered
    pub fn contains(&self, behaviour: &str) -> bool {
        self.modules.contains_key(behaviour)
    }

    /// Number of registered modules
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Check if the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

#[async_trait]
impl ModuleResolver for ModuleCatalog {
    async fn resolve(&self, behaviour: &str) -> Result<ModuleFactory, ResolveError> {
        self.get(behaviour)
            .cloned()
            .ok_or_else(|| ResolveError::unknown(behaviour))
    }
}

impl fmt::Debug for ModuleCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.modules.keys().collect();
        names.sort();
        f.debug_struct("ModuleCatalog")
            .field("modules", &names)
            .finish()
    }
}

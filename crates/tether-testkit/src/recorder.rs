//! Instrumented behaviour modules

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tether_core::{module_fn, Cleanup, ModuleFactory, ModuleProps};

#[derive(Default)]
struct RecorderState {
    invocations: AtomicUsize,
    cleanups: AtomicUsize,
    names: Mutex<Vec<String>>,
    last_node: Mutex<Option<String>>,
    last_plugins: Mutex<Vec<String>>,
}

/// Records how a module was invoked and how often its cleanup ran.
///
/// Clones share the same counters, so a test can keep one handle and give
/// the factory to a resolver.
#[derive(Clone, Default)]
pub struct ModuleRecorder {
    state: Arc<RecorderState>,
}

impl ModuleRecorder {
    /// A recorder with zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// A module that records its invocation and returns a counting cleanup
    pub fn factory(&self) -> ModuleFactory {
        let state = Arc::clone(&self.state);
        module_fn(move |props| {
            record(&state, &props);
            let state = Arc::clone(&state);
            Some(Cleanup::new(move || {
                state.cleanups.fetch_add(1, Ordering::SeqCst);
            }))
        })
    }

    /// A module that records its invocation and returns no cleanup
    pub fn factory_without_cleanup(&self) -> ModuleFactory {
        let state = Arc::clone(&self.state);
        module_fn(move |props| {
            record(&state, &props);
            None
        })
    }

    /// Times the module was invoked
    pub fn invocations(&self) -> usize {
        self.state.invocations.load(Ordering::SeqCst)
    }

    /// Times a cleanup returned by the module ran
    pub fn cleanups(&self) -> usize {
        self.state.cleanups.load(Ordering::SeqCst)
    }

    /// Ids the module was invoked for, in order
    pub fn names(&self) -> Vec<String> {
        self.state.names.lock().clone()
    }

    /// Element id of the latest invocation
    pub fn last_node_id(&self) -> Option<String> {
        self.state.last_node.lock().clone()
    }

    /// Plugin prop keys of the latest invocation
    pub fn last_plugin_keys(&self) -> Vec<String> {
        self.state.last_plugins.lock().clone()
    }
}

fn record(state: &RecorderState, props: &ModuleProps) {
    state.invocations.fetch_add(1, Ordering::SeqCst);
    state.names.lock().push(props.name.clone());
    *state.last_node.lock() = props.node.as_ref().and_then(|node| node.id());
    *state.last_plugins.lock() = props.plugins.keys().map(str::to_string).collect();
}

impl fmt::Debug for ModuleRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRecorder")
            .field("invocations", &self.invocations())
            .field("cleanups", &self.cleanups())
            .finish()
    }
}

//! Counting, gateable module resolver

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::fmt;
use tether_core::{ModuleFactory, ModuleResolver, ResolveError};
use tokio::sync::watch;

/// A [`ModuleResolver`] over a fixed table.
///
/// Counts calls per behaviour, can be told to fail a behaviour, and can hold
/// a behaviour's resolution open until the test releases it, which is how
/// tests put a fetch "in flight" across a teardown.
#[derive(Default)]
pub struct StaticResolver {
    modules: Mutex<HashMap<String, ModuleFactory>>,
    calls: Mutex<HashMap<String, usize>>,
    failing: Mutex<HashSet<String>>,
    gates: Mutex<HashMap<String, watch::Sender<bool>>>,
}

impl StaticResolver {
    /// An empty resolver; every behaviour is unknown
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `module` for `behaviour`
    pub fn with(self, behaviour: impl Into<String>, module: ModuleFactory) -> Self {
        self.insert(behaviour, module);
        self
    }

    /// Serve `module` for `behaviour`, replacing any previous module
    pub fn insert(&self, behaviour: impl Into<String>, module: ModuleFactory) {
        self.modules.lock().insert(behaviour.into(), module);
    }

    /// Make every resolution of `behaviour` fail
    pub fn fail(&self, behaviour: impl Into<String>) {
        self.failing.lock().insert(behaviour.into());
    }

    /// Block resolutions of `behaviour` until [`release`](Self::release)
    pub fn hold(&self, behaviour: impl Into<String>) {
        let (gate, _) = watch::channel(false);
        self.gates.lock().insert(behaviour.into(), gate);
    }

    /// Let held resolutions of `behaviour` continue
    pub fn release(&self, behaviour: &str) {
        if let Some(gate) = self.gates.lock().remove(behaviour) {
            tracing::trace!(behaviour, waiting = gate.receiver_count(), "releasing held resolution");
            gate.send_replace(true);
        }
    }

    /// Times `behaviour` was requested
    pub fn calls(&self, behaviour: &str) -> usize {
        self.calls.lock().get(behaviour).copied().unwrap_or_default()
    }

    /// Total requests across every behaviour
    pub fn total_calls(&self) -> usize {
        self.calls.lock().values().sum()
    }
}

#[async_trait]
impl ModuleResolver for StaticResolver {
    async fn resolve(&self, behaviour: &str) -> Result<ModuleFactory, ResolveError> {
        *self.calls.lock().entry(behaviour.to_string()).or_default() += 1;

        let gate = self.gates.lock().get(behaviour).map(watch::Sender::subscribe);
        if let Some(mut gate) = gate {
            // A dropped sender also opens the gate.
            let _ = gate.wait_for(|open| *open).await;
        }

        if self.failing.lock().contains(behaviour) {
            return Err(ResolveError::new(format!("{behaviour} failed to load")));
        }
        self.modules
            .lock()
            .get(behaviour)
            .cloned()
            .ok_or_else(|| ResolveError::unknown(behaviour))
    }
}

impl fmt::Debug for StaticResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut modules: Vec<_> = self.modules.lock().keys().cloned().collect();
        modules.sort();
        f.debug_struct("StaticResolver")
            .field("modules", &modules)
            .field("calls", &self.total_calls())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tether_core::module_fn;

    #[tokio::test]
    async fn test_counts_calls_and_reports_unknown() {
        let resolver = StaticResolver::new().with("sandbox", module_fn(|_| None));

        assert!(resolver.resolve("sandbox").await.is_ok());
        assert!(resolver.resolve("missing").await.is_err());
        resolver.fail("sandbox");
        assert!(resolver.resolve("sandbox").await.is_err());

        assert_eq!(resolver.calls("sandbox"), 2);
        assert_eq!(resolver.calls("missing"), 1);
        assert_eq!(resolver.total_calls(), 3);
    }

    #[tokio::test]
    async fn test_hold_blocks_until_release() {
        let resolver = Arc::new(StaticResolver::new().with("slow", module_fn(|_| None)));
        resolver.hold("slow");

        let task = {
            let resolver = Arc::clone(&resolver);
            tokio::spawn(async move { resolver.resolve("slow").await.is_ok() })
        };
        tokio::task::yield_now().await;
        assert!(!task.is_finished());

        resolver.release("slow");
        assert!(task.await.unwrap());
    }
}

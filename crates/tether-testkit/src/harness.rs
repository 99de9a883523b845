//! Test harness wiring a manager to simulated collaborators

use crate::frames::ManualFrames;
use crate::resolver::StaticResolver;
use crate::viewport::SimulatedViewport;
use std::sync::Arc;
use tether_core::{DocumentRoot, LifecycleBuilder, LifecycleConfig, LifecycleError, LifecycleManager};

/// Owns the frame queue, viewport and resolver a manager under test uses
#[derive(Debug, Clone)]
pub struct Harness {
    /// Frames requested by the manager, flushed by the test
    pub frames: Arc<ManualFrames>,
    /// The viewport media queries evaluate against
    pub viewport: Arc<SimulatedViewport>,
    /// The module resolver
    pub resolver: Arc<StaticResolver>,
    config: LifecycleConfig,
}

impl Harness {
    /// A harness around `resolver` with a 1280x800 viewport
    pub fn new(resolver: StaticResolver) -> Self {
        Self {
            frames: Arc::new(ManualFrames::new()),
            viewport: Arc::new(SimulatedViewport::default()),
            resolver: Arc::new(resolver),
            config: LifecycleConfig::default(),
        }
    }

    /// Start with a `width` by `height` viewport
    pub fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport = Arc::new(SimulatedViewport::new(width, height));
        self
    }

    /// Use `config` for managers built from this harness
    pub fn with_config(mut self, config: LifecycleConfig) -> Self {
        self.config = config;
        self
    }

    /// A manager builder wired to the harness collaborators
    pub fn builder(&self) -> LifecycleBuilder {
        LifecycleManager::builder(
            Arc::clone(&self.resolver) as _,
            Arc::clone(&self.viewport) as _,
            Arc::clone(&self.frames) as _,
        )
        .config(self.config.clone())
    }

    /// Build a manager without hydrating anything
    pub fn manager(&self) -> Result<LifecycleManager, LifecycleError> {
        self.builder().build()
    }

    /// Build a manager and schedule hydration of `root`
    pub fn load(&self, root: Arc<dyn DocumentRoot>) -> Result<LifecycleManager, LifecycleError> {
        self.builder().load(root)
    }

    /// Flush every queued frame, then wait for the fetches they started
    pub async fn settle(&self, manager: &LifecycleManager) {
        self.frames.flush();
        manager.settle().await;
    }
}

//! Tether Testing Infrastructure
//!
//! Deterministic stand-ins for everything a lifecycle manager talks to: an
//! in-memory document, a viewport whose size tests control, a frame
//! scheduler tests flush by hand, and resolvers that count and gate calls.
//!
//! # Usage
//!
//! ```rust,ignore
//! use tether_testkit::*;
//!
//! #[tokio::test]
//! async fn loads_sandbox() {
//!     let recorder = ModuleRecorder::new();
//!     let harness = Harness::new(StaticResolver::new().with("sandbox", recorder.factory()));
//!     let app = harness.load(document)?;
//!     harness.frames.flush();
//!     app.settle().await;
//! }
//! ```

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

pub mod document;
pub mod frames;
pub mod harness;
pub mod logging;
pub mod recorder;
pub mod resolver;
pub mod viewport;

pub use document::{MemoryDocument, MemoryElement};
pub use frames::{ImmediateFrames, ManualFrames};
pub use harness::Harness;
pub use logging::init_test_tracing;
pub use recorder::ModuleRecorder;
pub use resolver::StaticResolver;
pub use viewport::{SimulatedQuery, SimulatedViewport};

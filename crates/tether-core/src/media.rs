//! Media-query boundary
//!
//! Mirrors the platform `matchMedia` surface: evaluate a condition once,
//! then subscribe to match-state changes.

use std::fmt;
use std::sync::Arc;

/// A match-state change notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchEvent {
    /// Whether the condition matches after the change
    pub matches: bool,
}

impl MatchEvent {
    /// Create an event
    pub fn new(matches: bool) -> Self {
        Self { matches }
    }
}

/// Handle identifying one subscription on a [`MediaQuery`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// Callback invoked on every match-state change
pub type ChangeHandler = Arc<dyn Fn(MatchEvent) + Send + Sync>;

/// A live media condition
pub trait MediaQuery: Send + Sync {
    /// The condition text
    fn media(&self) -> &str;

    /// Whether the condition currently matches
    fn matches(&self) -> bool;

    /// Subscribe to changes
    fn add_listener(&self, handler: ChangeHandler) -> ListenerId;

    /// Remove a subscription. Unknown ids are ignored.
    fn remove_listener(&self, id: ListenerId);
}

/// Factory for media conditions (the platform `matchMedia`)
pub trait MediaMatcher: Send + Sync {
    /// Evaluate `query` and return a live handle to it
    fn match_media(&self, query: &str) -> Arc<dyn MediaQuery>;
}

//! Simulated viewport
//!
//! Implements [`MediaMatcher`] over a width and height that tests control.
//! Resizing re-evaluates every query handed out so far and notifies the
//! listeners of the ones whose match state flipped, the way a browser does.

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tether_core::{ChangeHandler, ListenerId, MatchEvent, MediaMatcher, MediaQuery};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Feature {
    MinWidth(u32),
    MaxWidth(u32),
    MinHeight(u32),
    MaxHeight(u32),
    Portrait,
    Landscape,
}

impl Feature {
    fn parse(text: &str) -> Option<Self> {
        let inner = text.strip_prefix('(')?.strip_suffix(')')?;
        let (name, value) = match inner.split_once(':') {
            Some((name, value)) => (name.trim(), value.trim()),
            None => (inner.trim(), ""),
        };
        let pixels = || -> Option<u32> { value.strip_suffix("px").unwrap_or(value).trim().parse().ok() };

        match name {
            "min-width" => pixels().map(Feature::MinWidth),
            "max-width" => pixels().map(Feature::MaxWidth),
            "min-height" => pixels().map(Feature::MinHeight),
            "max-height" => pixels().map(Feature::MaxHeight),
            "orientation" if value == "portrait" => Some(Feature::Portrait),
            "orientation" if value == "landscape" => Some(Feature::Landscape),
            _ => None,
        }
    }

    fn holds(self, width: u32, height: u32) -> bool {
        match self {
            Feature::MinWidth(min) => width >= min,
            Feature::MaxWidth(max) => width <= max,
            Feature::MinHeight(min) => height >= min,
            Feature::MaxHeight(max) => height <= max,
            Feature::Portrait => height >= width,
            Feature::Landscape => width > height,
        }
    }
}

/// Parsed media condition. `None` never matches.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Condition(Option<Vec<Feature>>);

impl Condition {
    fn parse(media: &str) -> Self {
        let lowered = media.trim().to_ascii_lowercase();
        let mut features = Vec::new();

        for part in lowered.split(" and ") {
            let part = part.trim();
            let part = part.strip_prefix("only ").unwrap_or(part).trim();
            match part {
                "all" | "screen" => {}
                _ => match Feature::parse(part) {
                    Some(feature) => features.push(feature),
                    None => return Self(None),
                },
            }
        }
        Self(Some(features))
    }

    fn evaluate(&self, width: u32, height: u32) -> bool {
        self.0
            .as_ref()
            .is_some_and(|features| features.iter().all(|feature| feature.holds(width, height)))
    }
}

/// One live media condition handed out by a [`SimulatedViewport`]
pub struct SimulatedQuery {
    media: String,
    condition: Condition,
    matches: AtomicBool,
    listeners: Mutex<Vec<(ListenerId, ChangeHandler)>>,
    next_listener: AtomicU64,
    removed: AtomicUsize,
}

impl SimulatedQuery {
    fn new(media: &str, width: u32, height: u32) -> Self {
        let condition = Condition::parse(media);
        let matches = condition.evaluate(width, height);
        Self {
            media: media.to_string(),
            condition,
            matches: AtomicBool::new(matches),
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(1),
            removed: AtomicUsize::new(0),
        }
    }

    /// Subscribed listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// How many listeners have been removed over the query's lifetime
    pub fn removed_count(&self) -> usize {
        self.removed.load(Ordering::SeqCst)
    }

    /// Set the match state and notify every listener, changed or not.
    /// Returns the number of listeners invoked.
    pub fn dispatch(&self, matches: bool) -> usize {
        self.matches.store(matches, Ordering::SeqCst);
        let handlers: Vec<ChangeHandler> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();
        for handler in &handlers {
            handler(MatchEvent::new(matches));
        }
        handlers.len()
    }

    fn reevaluate(&self, width: u32, height: u32) -> bool {
        let now = self.condition.evaluate(width, height);
        if self.matches.load(Ordering::SeqCst) == now {
            return false;
        }
        self.dispatch(now);
        true
    }
}

impl MediaQuery for SimulatedQuery {
    fn media(&self) -> &str {
        &self.media
    }

    fn matches(&self) -> bool {
        self.matches.load(Ordering::SeqCst)
    }

    fn add_listener(&self, handler: ChangeHandler) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::SeqCst));
        self.listeners.lock().push((id, handler));
        id
    }

    fn remove_listener(&self, id: ListenerId) {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        if listeners.len() != before {
            self.removed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl fmt::Debug for SimulatedQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulatedQuery")
            .field("media", &self.media)
            .field("matches", &self.matches())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// A viewport of a given size that evaluates media conditions against it
#[derive(Debug)]
pub struct SimulatedViewport {
    size: Mutex<(u32, u32)>,
    queries: Mutex<Vec<Arc<SimulatedQuery>>>,
}

impl SimulatedViewport {
    /// A viewport `width` by `height` pixels
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: Mutex::new((width, height)),
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Current `(width, height)`
    pub fn size(&self) -> (u32, u32) {
        *self.size.lock()
    }

    /// Resize, notifying queries whose match state flipped.
    /// Returns how many queries changed.
    pub fn resize_to(&self, width: u32, height: u32) -> usize {
        *self.size.lock() = (width, height);
        let changed = self
            .snapshot()
            .iter()
            .filter(|query| query.reevaluate(width, height))
            .count();
        tracing::debug!(width, height, changed, "viewport resized");
        changed
    }

    /// Force a change event on every query for `media`, without resizing.
    /// Returns the number of listeners invoked.
    pub fn dispatch(&self, media: &str, matches: bool) -> usize {
        self.queries_for(media)
            .iter()
            .map(|query| query.dispatch(matches))
            .sum()
    }

    /// Every query handed out for `media`
    pub fn queries_for(&self, media: &str) -> Vec<Arc<SimulatedQuery>> {
        self.snapshot()
            .into_iter()
            .filter(|query| query.media == media)
            .collect()
    }

    /// Listeners currently subscribed to `media`, across all its queries
    pub fn listener_count(&self, media: &str) -> usize {
        self.queries_for(media)
            .iter()
            .map(|query| query.listener_count())
            .sum()
    }

    /// Listeners removed from `media`, across all its queries
    pub fn removed_count(&self, media: &str) -> usize {
        self.queries_for(media)
            .iter()
            .map(|query| query.removed_count())
            .sum()
    }

    fn snapshot(&self) -> Vec<Arc<SimulatedQuery>> {
        self.queries.lock().clone()
    }
}

impl Default for SimulatedViewport {
    fn default() -> Self {
        Self::new(1280, 800)
    }
}

impl MediaMatcher for SimulatedViewport {
    fn match_media(&self, query: &str) -> Arc<dyn MediaQuery> {
        let (width, height) = self.size();
        let query = Arc::new(SimulatedQuery::new(query, width, height));
        self.queries.lock().push(Arc::clone(&query));
        query
    }
}

//! Application event bus
//!
//! A plain named-event dispatcher exposed on the manager for modules and app
//! plugins to talk to each other. The lifecycle itself never emits on it.

use indexmap::IndexMap;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Event payload
pub type EventPayload = serde_json::Value;

/// Handler invoked for each emitted event
pub type EventHandler = Arc<dyn Fn(&EventPayload) + Send + Sync>;

/// Handle for removing a handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
struct BusInner {
    handlers: Mutex<IndexMap<String, Vec<(SubscriptionId, EventHandler)>>>,
    next_id: AtomicU64,
}

/// Shared event bus. Clones publish to the same handlers.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    /// Create an empty bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `handler` to `event`
    pub fn on(
        &self,
        event: impl Into<String>,
        handler: impl Fn(&EventPayload) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner
            .handlers
            .lock()
            .entry(event.into())
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Remove one subscription. Returns `false` if it was not registered.
    pub fn off(&self, event: &str, id: SubscriptionId) -> bool {
        let mut handlers = self.inner.handlers.lock();
        let Some(list) = handlers.get_mut(event) else {
            return false;
        };
        let before = list.len();
        list.retain(|(existing, _)| *existing != id);
        let removed = list.len() != before;
        if list.is_empty() {
            handlers.shift_remove(event);
        }
        removed
    }

    /// Invoke every handler for `event` in subscription order.
    ///
    /// Handlers run outside the bus lock and may subscribe or unsubscribe.
    /// Returns the number of handlers invoked.
    pub fn emit(&self, event: &str, payload: &EventPayload) -> usize {
        let handlers: Vec<EventHandler> = self
            .inner
            .handlers
            .lock()
            .get(event)
            .map(|list| list.iter().map(|(_, handler)| Arc::clone(handler)).collect())
            .unwrap_or_default();
        for handler in &handlers {
            handler(payload);
        }
        handlers.len()
    }

    /// Number of handlers subscribed to `event`
    pub fn listener_count(&self, event: &str) -> usize {
        self.inner.handlers.lock().get(event).map_or(0, Vec::len)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers = self.inner.handlers.lock();
        f.debug_struct("EventBus")
            .field("events", &handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_emit_reaches_subscribers_in_order() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let first = Arc::clone(&log);
        bus.on("cart:add", move |payload| first.lock().push(format!("first {payload}")));
        let second = Arc::clone(&log);
        bus.on("cart:add", move |payload| second.lock().push(format!("second {payload}")));

        assert_eq!(bus.emit("cart:add", &json!({"sku": 1})), 2);
        assert_eq!(bus.emit("other", &json!(null)), 0);
        assert_eq!(
            *log.lock(),
            vec![r#"first {"sku":1}"#.to_string(), r#"second {"sku":1}"#.to_string()]
        );
    }

    #[test]
    fn test_off_removes_only_that_handler() {
        let bus = EventBus::new();
        let keep = bus.on("tick", |_| {});
        let dropped = bus.on("tick", |_| {});

        assert!(bus.off("tick", dropped));
        assert!(!bus.off("tick", dropped));
        assert_eq!(bus.listener_count("tick"), 1);

        assert!(bus.off("tick", keep));
        assert_eq!(bus.listener_count("tick"), 0);
        assert!(!bus.off("never", keep));
    }

    #[test]
    fn test_handler_may_unsubscribe_during_emit() {
        let bus = EventBus::new();
        let slot = Arc::new(Mutex::new(None));
        let inner_bus = bus.clone();
        let inner_slot = Arc::clone(&slot);
        let id = bus.on("once", move |_| {
            if let Some(id) = inner_slot.lock().take() {
                inner_bus.off("once", id);
            }
        });
        *slot.lock() = Some(id);

        assert_eq!(bus.emit("once", &json!(1)), 1);
        assert_eq!(bus.emit("once", &json!(2)), 0);
    }
}

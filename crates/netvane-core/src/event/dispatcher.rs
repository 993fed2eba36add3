use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;

use crate::event::{Event, EventHandler, SubscriptionId};

/// Event dispatcher for plugin lifecycle notifications.
///
/// Handlers are keyed by event name and every registration returns a
/// [`SubscriptionId`]. The lifecycle controller records the ids a plugin
/// registered so unload can unsubscribe exactly those, rather than guessing
/// at event names.
pub struct EventDispatcher {
    handlers: HashMap<String, Vec<(SubscriptionId, Box<dyn EventHandler>)>>,
    queue: Vec<Box<dyn Event>>,
    next_id: SubscriptionId,
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handler_count: usize = self.handlers.values().map(|v| v.len()).sum();
        f.debug_struct("EventDispatcher")
            .field("handler_count", &handler_count)
            .field("queued", &self.queue.len())
            .field("next_id", &self.next_id)
            .finish()
    }
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            queue: Vec::new(),
            next_id: 1,
        }
    }

    /// Register a handler for events with the given name.
    pub fn subscribe(&mut self, event_name: &str, handler: Box<dyn EventHandler>) -> SubscriptionId {
        let id = self.next_id;
        self.next_id += 1;
        self.handlers
            .entry(event_name.to_string())
            .or_default()
            .push((id, handler));
        id
    }

    /// Remove a previously registered handler. Returns false if the id was
    /// not found (already removed or never registered).
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let mut found = false;
        self.handlers.values_mut().for_each(|handlers| {
            let len_before = handlers.len();
            handlers.retain(|(h_id, _)| *h_id != id);
            if handlers.len() < len_before {
                found = true;
            }
        });
        found
    }

    /// Dispatch an event to every handler registered under its name.
    pub async fn dispatch(&self, event: &dyn Event) {
        if let Some(handlers) = self.handlers.get(event.name()) {
            for (_, handler) in handlers {
                handler.handle(event).await;
            }
        }
    }

    /// Hold an event for a later [`process_queue`](Self::process_queue).
    /// Useful while the dispatcher is mid-mutation and immediate dispatch
    /// would observe a half-updated handler table.
    pub fn queue_event(&mut self, event: Box<dyn Event>) {
        self.queue.push(event);
    }

    /// Dispatch everything queued, in arrival order. Returns how many
    /// events were processed.
    pub async fn process_queue(&mut self) -> usize {
        let pending: Vec<Box<dyn Event>> = self.queue.drain(..).collect();
        let count = pending.len();
        for event in &pending {
            self.dispatch(event.as_ref()).await;
        }
        count
    }

    /// Number of handlers currently registered for an event name.
    pub fn handler_count(&self, event_name: &str) -> usize {
        self.handlers.get(event_name).map_or(0, |h| h.len())
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Adapter turning a plain closure into an [`EventHandler`].
struct FnHandler<F> {
    callback: F,
}

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F> EventHandler for FnHandler<F>
where
    F: Fn(&dyn Event) + Send + Sync,
{
    async fn handle(&self, event: &dyn Event) {
        (self.callback)(event)
    }
}

/// Helper to create synchronous handlers compatible with the async dispatcher.
pub fn sync_handler<F>(f: F) -> Box<dyn EventHandler>
where
    F: Fn(&dyn Event) + Send + Sync + 'static,
{
    Box::new(FnHandler { callback: f })
}

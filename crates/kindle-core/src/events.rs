//! Event bus for window notifications.
//!
//! Listeners are registered per [`EventKind`] and invoked synchronously by
//! [`EventBus::emit`]. Registration and dispatch share one lock, so a
//! listener must not call [`EventBus::add`], [`EventBus::remove`] or
//! [`EventBus::emit`] on the same bus from inside its callback; doing so
//! deadlocks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use hashbrown::HashMap;
use parking_lot::Mutex;

use crate::types::Dimensions;

/// Kind of event a listener subscribes to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// The window framebuffer changed size.
    Resized,
}

/// Event payload delivered to listeners.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    /// New framebuffer size in pixels.
    Resized(Dimensions),
}

impl Event {
    /// The kind used to route this event.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Resized(_) => EventKind::Resized,
        }
    }
}

/// Identifies one registered listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn Fn(&Event) + Send + Sync>;

/// Thread-safe listener registry.
#[derive(Default)]
pub struct EventBus {
    listeners: Mutex<HashMap<EventKind, Vec<(ListenerId, Listener)>>>,
    next_id: AtomicU64,
}

impl EventBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for `kind`.
    pub fn add<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .lock()
            .entry(kind)
            .or_default()
            .push((id, Box::new(listener)));
        id
    }

    /// Register a listener that is removed when the returned
    /// [`Subscription`] drops.
    pub fn subscribe<F>(self: &Arc<Self>, kind: EventKind, listener: F) -> Subscription
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let id = self.add(kind, listener);
        Subscription {
            bus: Arc::downgrade(self),
            kind,
            id,
        }
    }

    /// Unregister a listener. Returns whether it was registered.
    pub fn remove(&self, kind: EventKind, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let Some(bucket) = listeners.get_mut(&kind) else {
            return false;
        };
        let before = bucket.len();
        bucket.retain(|(registered, _)| *registered != id);
        before != bucket.len()
    }

    /// Invoke every listener registered for the event's kind, in
    /// registration order.
    pub fn emit(&self, event: &Event) {
        let listeners = self.listeners.lock();
        let Some(bucket) = listeners.get(&event.kind()) else {
            tracing::trace!(kind = ?event.kind(), "event has no listeners");
            return;
        };
        for (_, listener) in bucket {
            listener(event);
        }
    }

    /// Number of listeners registered for `kind`.
    #[must_use]
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.lock().get(&kind).map_or(0, Vec::len)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let listeners = self.listeners.lock();
        f.debug_struct("EventBus")
            .field("kinds", &listeners.len())
            .finish_non_exhaustive()
    }
}

/// Removes its listener from the bus on drop. Does not keep the bus alive.
#[derive(Debug)]
pub struct Subscription {
    bus: Weak<EventBus>,
    kind: EventKind,
    id: ListenerId,
}

impl Subscription {
    /// The registered listener.
    #[must_use]
    pub const fn id(&self) -> ListenerId {
        self.id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.remove(self.kind, self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn emit_reaches_every_listener() {
        let bus = EventBus::new();
        let calls = Arc::new(AtomicU32::new(0));

        for _ in 0..2 {
            let counter = calls.clone();
            bus.add(EventKind::Resized, move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        bus.emit(&Event::Resized(Dimensions::new(640, 480)));
        bus.emit(&Event::Resized(Dimensions::new(800, 600)));

        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn listeners_receive_payload() {
        let bus = EventBus::new();
        let width = Arc::new(AtomicU32::new(0));

        let seen = width.clone();
        bus.add(EventKind::Resized, move |event| {
            let Event::Resized(dims) = event;
            seen.store(dims.width, Ordering::SeqCst);
        });

        bus.emit(&Event::Resized(Dimensions::new(1920, 1080)));
        assert_eq!(width.load(Ordering::SeqCst), 1920);
    }

    #[test]
    fn emit_without_listeners_is_noop() {
        let bus = EventBus::new();
        bus.emit(&Event::Resized(Dimensions::new(1, 1)));
        assert_eq!(bus.listener_count(EventKind::Resized), 0);
    }

    #[test]
    fn remove_unregisters_only_that_listener() {
        let bus = EventBus::new();
        let first = bus.add(EventKind::Resized, |_| {});
        let second = bus.add(EventKind::Resized, |_| {});
        assert_ne!(first, second);

        assert!(bus.remove(EventKind::Resized, first));
        assert!(!bus.remove(EventKind::Resized, first));
        assert_eq!(bus.listener_count(EventKind::Resized), 1);
    }

    #[test]
    fn dropped_subscriptions_do_not_accumulate() {
        let bus = Arc::new(EventBus::new());
        let calls = Arc::new(AtomicU32::new(0));

        for _ in 0..5 {
            let counter = calls.clone();
            let subscription = bus.subscribe(EventKind::Resized, move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });
            assert_eq!(bus.listener_count(EventKind::Resized), 1);
            drop(subscription);
        }

        assert_eq!(bus.listener_count(EventKind::Resized), 0);
        bus.emit(&Event::Resized(Dimensions::new(2, 2)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn subscription_outliving_bus_is_harmless() {
        let bus = Arc::new(EventBus::new());
        let subscription = bus.subscribe(EventKind::Resized, |_| {});
        drop(bus);
        drop(subscription);
    }
}

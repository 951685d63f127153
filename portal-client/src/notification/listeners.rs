//! Listener registry: channel name -> callbacks

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use super::event::NotificationEvent;

pub type Listener = Arc<dyn Fn(&NotificationEvent) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    channels: HashMap<String, HashMap<u64, Listener>>,
}

/// Shared, cloneable registry
#[derive(Clone, Default)]
pub struct ListenerRegistry {
    inner: Arc<Mutex<Registry>>,
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.lock();
        let counts: HashMap<&str, usize> = registry
            .channels
            .iter()
            .map(|(channel, listeners)| (channel.as_str(), listeners.len()))
            .collect();
        f.debug_struct("ListenerRegistry")
            .field("channels", &counts)
            .finish()
    }
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register `callback` on `channel`.
    pub fn add<F>(&self, channel: impl Into<String>, callback: F) -> ListenerHandle
    where
        F: Fn(&NotificationEvent) + Send + Sync + 'static,
    {
        let channel = channel.into();
        let mut registry = self.lock();
        registry.next_id += 1;
        let id = registry.next_id;
        registry
            .channels
            .entry(channel.clone())
            .or_default()
            .insert(id, Arc::new(callback));

        ListenerHandle {
            channel,
            id,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Returns whether a listener was removed.
    pub fn remove(&self, channel: &str, id: u64) -> bool {
        let mut registry = self.lock();
        let Some(listeners) = registry.channels.get_mut(channel) else {
            return false;
        };
        let removed = listeners.remove(&id).is_some();
        if listeners.is_empty() {
            registry.channels.remove(channel);
        }
        removed
    }

    pub fn listener_count(&self, channel: &str) -> usize {
        self.lock().channels.get(channel).map_or(0, HashMap::len)
    }

    /// Deliver on the event's channel, and on its secondary channel if any.
    pub fn emit(&self, event: &NotificationEvent) {
        self.emit_on(event.channel(), event);
        if let Some(secondary) = event.secondary_channel() {
            self.emit_on(secondary, event);
        }
    }

    fn emit_on(&self, channel: &str, event: &NotificationEvent) {
        // snapshot so callbacks may (un)register without deadlocking
        let listeners: Vec<Listener> = match self.lock().channels.get(channel) {
            Some(listeners) => listeners.values().cloned().collect(),
            None => return,
        };

        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                tracing::error!("Listener on '{}' panicked", channel);
            }
        }
    }
}

/// Returned by [`ListenerRegistry::add`].
///
/// Dropping the handle keeps the listener registered; call
/// [`unsubscribe`](Self::unsubscribe) to remove it.
#[derive(Debug, Clone)]
pub struct ListenerHandle {
    channel: String,
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl ListenerHandle {
    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Idempotent.
    pub fn unsubscribe(&self) {
        if let Some(inner) = self.registry.upgrade() {
            ListenerRegistry { inner }.remove(&self.channel, self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter(registry: &ListenerRegistry, channel: &str) -> (Arc<AtomicUsize>, ListenerHandle) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let handle = registry.add(channel, move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        (count, handle)
    }

    #[test]
    fn test_channels_are_independent() {
        let registry = ListenerRegistry::new();
        let (new_orders, _h1) = counter(&registry, "new_order");
        let (updates, _h2) = counter(&registry, "order_updated");

        registry.emit(&NotificationEvent::Connected);
        registry.emit(&NotificationEvent::NewOrder(Box::default()));

        assert_eq!(new_orders.load(Ordering::SeqCst), 1);
        assert_eq!(updates.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let registry = ListenerRegistry::new();
        let (count, handle) = counter(&registry, "connected");
        let (_other, _keep) = counter(&registry, "connected");
        assert_eq!(registry.listener_count("connected"), 2);

        handle.unsubscribe();
        handle.unsubscribe();
        assert_eq!(registry.listener_count("connected"), 1);

        registry.emit(&NotificationEvent::Connected);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_typed_message_reaches_both_channels() {
        let registry = ListenerRegistry::new();
        let (messages, _h1) = counter(&registry, "message");
        let (payouts, _h2) = counter(&registry, "payout_ready");

        registry.emit(&NotificationEvent::Message {
            kind: Some("payout_ready".into()),
            payload: json!({"type": "payout_ready"}),
        });

        assert_eq!(messages.load(Ordering::SeqCst), 1);
        assert_eq!(payouts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_listener_does_not_stop_fan_out() {
        let registry = ListenerRegistry::new();
        let _bad = registry.add("error", |_| panic!("listener bug"));
        let (count, _h) = counter(&registry, "error");

        registry.emit(&NotificationEvent::Error("boom".into()));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_listener_may_unsubscribe_itself() {
        let registry = ListenerRegistry::new();
        let slot: Arc<Mutex<Option<ListenerHandle>>> = Arc::default();
        let inner = slot.clone();
        let handle = registry.add("connected", move |_| {
            if let Some(h) = inner.lock().unwrap().as_ref() {
                h.unsubscribe();
            }
        });
        *slot.lock().unwrap() = Some(handle);

        registry.emit(&NotificationEvent::Connected);
        assert_eq!(registry.listener_count("connected"), 0);
    }
}

//! Cross-window message channel.
//!
//! Stands in for the page-global `message` event: every posted message is
//! delivered, in order, to every registered listener, and each listener
//! decides for itself whether the message concerns it.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde_json::Value;

use super::window::WindowId;

/// A message as delivered to listeners.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowMessage {
    /// Window that posted the message, if known.
    pub source: Option<WindowId>,
    /// Message payload.
    pub data: Value,
}

impl WindowMessage {
    /// Creates a message posted by `source`.
    #[must_use]
    pub const fn from_window(source: WindowId, data: Value) -> Self {
        Self {
            source: Some(source),
            data,
        }
    }

    /// Creates a message with no identifiable source window.
    #[must_use]
    pub const fn anonymous(data: Value) -> Self {
        Self { source: None, data }
    }
}

type Handler = Arc<dyn Fn(&WindowMessage) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(u64, Handler)>,
}

/// Broadcast channel for cross-window messages.
///
/// Cloning is cheap; clones post to and register on the same channel.
#[derive(Clone, Default)]
pub struct MessageChannel {
    listeners: Arc<Mutex<Listeners>>,
}

impl fmt::Debug for MessageChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageChannel")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl MessageChannel {
    /// Creates a channel with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` until the returned guard is dropped.
    #[must_use = "dropping the guard removes the listener immediately"]
    pub fn listen<F>(&self, handler: F) -> ListenerGuard
    where
        F: Fn(&WindowMessage) + Send + Sync + 'static,
    {
        let mut listeners = self.lock();
        let id = listeners.next_id;
        listeners.next_id += 1;
        listeners.entries.push((id, Arc::new(handler)));

        ListenerGuard {
            listeners: Arc::downgrade(&self.listeners),
            id,
        }
    }

    /// Delivers `message` to every listener registered at the time of the
    /// call.
    ///
    /// Handlers run outside the registry lock, so they may register or drop
    /// listeners themselves.
    pub fn post(&self, message: &WindowMessage) {
        let handlers: Vec<Handler> = self
            .lock()
            .entries
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();

        for handler in handlers {
            handler(message);
        }
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.lock().entries.len()
    }

    fn lock(&self) -> MutexGuard<'_, Listeners> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Registration on a [`MessageChannel`]; dropping it deregisters.
#[derive(Debug)]
pub struct ListenerGuard {
    listeners: Weak<Mutex<Listeners>>,
    id: u64,
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .entries
                .retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_post_reaches_every_listener() {
        let channel = MessageChannel::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let a = Arc::clone(&hits);
        let _first = channel.listen(move |_| {
            a.fetch_add(1, Ordering::SeqCst);
        });
        let b = Arc::clone(&hits);
        let _second = channel.listen(move |_| {
            b.fetch_add(10, Ordering::SeqCst);
        });

        channel.post(&WindowMessage::anonymous(json!("hello")));
        assert_eq!(hits.load(Ordering::SeqCst), 11);
    }

    #[test]
    fn test_dropping_guard_deregisters() {
        let channel = MessageChannel::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        let guard = channel.listen(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(channel.listener_count(), 1);

        drop(guard);
        assert_eq!(channel.listener_count(), 0);

        channel.post(&WindowMessage::anonymous(json!({})));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_guard_outliving_channel_is_harmless() {
        let channel = MessageChannel::new();
        let guard = channel.listen(|_| {});
        drop(channel);
        drop(guard);
    }

    #[test]
    fn test_messages_arrive_in_order() {
        let channel = MessageChannel::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        let _guard = channel.listen(move |message| {
            sink.lock().unwrap().push(message.data.clone());
        });

        for n in 0..3 {
            channel.post(&WindowMessage::anonymous(json!(n)));
        }
        assert_eq!(*seen.lock().unwrap(), vec![json!(0), json!(1), json!(2)]);
    }
}

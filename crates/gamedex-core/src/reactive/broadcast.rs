//! Transient fan-out channel with no replay.

use super::{ChannelStream, Fanout};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Fan-out channel for one-shot notifications such as button presses.
///
/// A subscriber only receives values sent after it subscribed. Sending with
/// no subscribers drops the value.
pub struct BroadcastReceiveChannel<T> {
    subscribers: Arc<Mutex<Fanout<T>>>,
}

impl<T: Clone + Send + 'static> BroadcastReceiveChannel<T> {
    /// Create an empty channel.
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(Fanout::new())),
        }
    }

    /// Deliver `value` to every current subscriber.
    pub fn send(&self, value: T) {
        self.subscribers.lock().publish(&value);
    }

    /// Subscribe to values sent from now on.
    pub fn subscribe(&self) -> ChannelStream<T> {
        self.subscribers.lock().subscribe()
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().live_count()
    }
}

impl<T: Clone + Send + 'static> Default for BroadcastReceiveChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for BroadcastReceiveChannel<T> {
    fn clone(&self) -> Self {
        Self {
            subscribers: Arc::clone(&self.subscribers),
        }
    }
}

impl<T> fmt::Debug for BroadcastReceiveChannel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BroadcastReceiveChannel").finish_non_exhaustive()
    }
}

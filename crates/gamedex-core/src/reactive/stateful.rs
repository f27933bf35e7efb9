//! StatefulChannel - replay-latest value holder
//!
//! A `StatefulChannel<T>` always has a current value. Subscribing yields the
//! current value first and then every later assignment, in order. Unlike a
//! `tokio::sync::watch`, intermediate values are never coalesced: each
//! subscriber has its own queue.

use super::{ChannelStream, Fanout};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Anything that holds a current value and can be subscribed to with replay.
pub trait ValueChannel<T> {
    /// Snapshot of the current value.
    fn current(&self) -> T;

    /// Subscribe. The stream starts with the current value.
    fn subscribe(&self) -> ChannelStream<T>;
}

/// Replay-latest channel.
///
/// Cloning shares the channel. Assignments are serialized: concurrent `set`
/// calls are applied and delivered one at a time, and every subscriber sees
/// them in the same order.
pub struct StatefulChannel<T> {
    inner: Arc<Inner<T>>,
}

struct Inner<T> {
    state: Mutex<State<T>>,
    /// When set, assignments equal to the current value are suppressed.
    same: Option<fn(&T, &T) -> bool>,
}

struct State<T> {
    value: T,
    version: u64,
    subscribers: Fanout<T>,
}

impl<T: Clone + Send + 'static> StatefulChannel<T> {
    /// Create a channel that re-emits every assignment, equal or not.
    pub fn new(initial: T) -> Self {
        Self::build(initial, None)
    }

    /// Create a channel that only emits when the assigned value differs from
    /// the current one.
    pub fn distinct(initial: T) -> Self
    where
        T: PartialEq,
    {
        Self::build(initial, Some(<T as PartialEq>::eq))
    }

    fn build(initial: T, same: Option<fn(&T, &T) -> bool>) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    value: initial,
                    version: 0,
                    subscribers: Fanout::new(),
                }),
                same,
            }),
        }
    }

    /// Get a clone of the current value.
    pub fn get(&self) -> T {
        self.inner.state.lock().value.clone()
    }

    /// Borrow the current value without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.state.lock().value)
    }

    /// Number of emitted assignments since creation.
    pub fn version(&self) -> u64 {
        self.inner.state.lock().version
    }

    /// Assign a new value and deliver it to every subscriber.
    ///
    /// Returns `false` if a distinct channel suppressed the assignment.
    pub fn set(&self, value: T) -> bool {
        let mut state = self.inner.state.lock();
        if let Some(same) = self.inner.same {
            if same(&state.value, &value) {
                return false;
            }
        }
        state.version += 1;
        state.subscribers.publish(&value);
        state.value = value;
        true
    }

    /// Derive the next value from the current one and assign it.
    pub fn update(&self, f: impl FnOnce(&T) -> T) -> bool {
        let next = self.with(f);
        self.set(next)
    }

    /// Mutate the current value in place and deliver the result.
    ///
    /// On a distinct channel nothing is delivered if `f` left the value equal
    /// to what it was.
    pub fn modify<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut state = self.inner.state.lock();
        let before = self.inner.same.map(|_| state.value.clone());
        let result = f(&mut state.value);
        if let (Some(same), Some(before)) = (self.inner.same, before) {
            if same(&before, &state.value) {
                return result;
            }
        }
        state.version += 1;
        let State {
            value, subscribers, ..
        } = &mut *state;
        subscribers.publish(value);
        result
    }

    /// Subscribe. The first value received is the current value.
    pub fn subscribe(&self) -> ChannelStream<T> {
        let mut state = self.inner.state.lock();
        let current = state.value.clone();
        state.subscribers.subscribe_with(current)
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner.state.lock().subscribers.live_count()
    }

    /// Whether equal assignments are suppressed.
    pub fn is_distinct(&self) -> bool {
        self.inner.same.is_some()
    }

    /// Hand out a view that can observe but not assign.
    pub fn read_only(&self) -> ReadOnlyChannel<T> {
        ReadOnlyChannel {
            channel: self.clone(),
        }
    }
}

impl<T> Clone for StatefulChannel<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for StatefulChannel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("StatefulChannel")
            .field("value", &state.value)
            .field("version", &state.version)
            .finish_non_exhaustive()
    }
}

impl<T: Clone + Send + 'static> ValueChannel<T> for StatefulChannel<T> {
    fn current(&self) -> T {
        self.get()
    }

    fn subscribe(&self) -> ChannelStream<T> {
        StatefulChannel::subscribe(self)
    }
}

/// Observe-only handle to a [`StatefulChannel`].
pub struct ReadOnlyChannel<T> {
    channel: StatefulChannel<T>,
}

impl<T: Clone + Send + 'static> ReadOnlyChannel<T> {
    /// Get a clone of the current value.
    pub fn get(&self) -> T {
        self.channel.get()
    }

    /// Borrow the current value.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.channel.with(f)
    }

    /// Number of emitted assignments since creation.
    pub fn version(&self) -> u64 {
        self.channel.version()
    }

    /// Subscribe. The first value received is the current value.
    pub fn subscribe(&self) -> ChannelStream<T> {
        self.channel.subscribe()
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.channel.subscriber_count()
    }
}

impl<T> Clone for ReadOnlyChannel<T> {
    fn clone(&self) -> Self {
        Self {
            channel: self.channel.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for ReadOnlyChannel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ReadOnlyChannel").field(&self.channel).finish()
    }
}

impl<T: Clone + Send + 'static> ValueChannel<T> for ReadOnlyChannel<T> {
    fn current(&self) -> T {
        self.get()
    }

    fn subscribe(&self) -> ChannelStream<T> {
        ReadOnlyChannel::subscribe(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn subscriber_sees_current_value_first() {
        let channel = StatefulChannel::new(5);
        let mut stream = channel.subscribe();
        channel.set(6);

        assert_eq!(stream.next().await, Some(5));
        assert_eq!(stream.next().await, Some(6));
    }

    #[tokio::test]
    async fn late_subscriber_sees_latest_value_only() {
        let channel = StatefulChannel::new(5);
        let mut early = channel.subscribe();
        channel.set(6);
        let mut late = channel.subscribe();

        assert_eq!(early.try_recv(), Some(5));
        assert_eq!(early.try_recv(), Some(6));
        assert_eq!(late.try_recv(), Some(6));
        assert_eq!(late.try_recv(), None);
    }

    #[tokio::test]
    async fn no_value_is_coalesced() {
        let channel = StatefulChannel::new(0);
        let mut stream = channel.subscribe();
        for v in 1..=100 {
            channel.set(v);
        }

        let received: Vec<i32> = timeout(Duration::from_secs(1), stream.by_ref().take(101).collect())
            .await
            .unwrap();
        assert_eq!(received, (0..=100).collect::<Vec<_>>());
    }

    #[test]
    fn plain_channel_re_emits_equal_values() {
        let channel = StatefulChannel::new("a");
        let mut stream = channel.subscribe();
        assert!(channel.set("a"));

        assert_eq!(stream.try_recv(), Some("a"));
        assert_eq!(stream.try_recv(), Some("a"));
        assert_eq!(channel.version(), 1);
    }

    #[test]
    fn distinct_channel_suppresses_equal_values() {
        let channel = StatefulChannel::distinct("a");
        let mut stream = channel.subscribe();
        assert!(!channel.set("a"));
        assert!(channel.set("b"));

        assert_eq!(stream.try_recv(), Some("a"));
        assert_eq!(stream.try_recv(), Some("b"));
        assert_eq!(stream.try_recv(), None);
        assert!(channel.is_distinct());
    }

    #[test]
    fn modify_mutates_in_place() {
        let channel = StatefulChannel::new(vec![1]);
        let mut stream = channel.subscribe();
        let len = channel.modify(|items| {
            items.push(2);
            items.len()
        });

        assert_eq!(len, 2);
        assert_eq!(stream.try_recv(), Some(vec![1]));
        assert_eq!(stream.try_recv(), Some(vec![1, 2]));
    }

    #[test]
    fn distinct_modify_without_change_is_silent() {
        let channel = StatefulChannel::distinct(3);
        let mut stream = channel.subscribe();
        channel.modify(|v| *v = 3);

        assert_eq!(stream.try_recv(), Some(3));
        assert_eq!(stream.try_recv(), None);
        assert_eq!(channel.version(), 0);
    }

    #[test]
    fn read_only_view_tracks_source() {
        let channel = StatefulChannel::new(1);
        let view = channel.read_only();
        let mut stream = view.subscribe();
        channel.update(|v| v + 1);

        assert_eq!(view.get(), 2);
        assert_eq!(stream.try_recv(), Some(1));
        assert_eq!(stream.try_recv(), Some(2));
        assert_eq!(view.subscriber_count(), 1);
    }

    #[test]
    fn dropping_a_stream_releases_the_subscription() {
        let channel = StatefulChannel::new(());
        let stream = channel.subscribe();
        assert_eq!(channel.subscriber_count(), 1);
        drop(stream);
        assert_eq!(channel.subscriber_count(), 0);
    }
}

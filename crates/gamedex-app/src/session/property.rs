//! View-local mutable fields that presenters write into.

use gamedex_core::{ChannelStream, StatefulChannel};
use std::fmt;

/// A field owned by a view and written by its presenter.
///
/// The view renders from it and can subscribe to learn about writes.
/// Cloning shares the field.
pub struct ViewProperty<T> {
    channel: StatefulChannel<T>,
}

impl<T: Clone + Send + 'static> ViewProperty<T> {
    /// Create a property holding `initial`.
    pub fn new(initial: T) -> Self {
        Self {
            channel: StatefulChannel::new(initial),
        }
    }

    /// Current value.
    pub fn get(&self) -> T {
        self.channel.get()
    }

    /// Overwrite the value.
    pub fn set(&self, value: T) {
        self.channel.set(value);
    }

    /// Mutate the value in place.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        self.channel.modify(f)
    }

    /// Observe writes. The stream starts with the current value.
    pub fn subscribe(&self) -> ChannelStream<T> {
        self.channel.subscribe()
    }

    /// Number of writes since creation.
    pub fn version(&self) -> u64 {
        self.channel.version()
    }
}

impl<T: Clone + Default + Send + 'static> Default for ViewProperty<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> Clone for ViewProperty<T> {
    fn clone(&self) -> Self {
        Self {
            channel: self.channel.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for ViewProperty<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ViewProperty").field(&self.channel).finish()
    }
}

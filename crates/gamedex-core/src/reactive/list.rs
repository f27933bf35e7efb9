//! ListObservable - ordered sequence with diff events
//!
//! Every mutation of a [`ListObservable`] is published as exactly one
//! [`ListChange`]. A subscriber that takes a snapshot and then applies each
//! change with [`apply_change`] always ends up with the same contents as the
//! source list.
//!
//! # Example
//!
//! ```rust
//! use gamedex_core::reactive::{apply_change, ListObservable};
//!
//! let list = ListObservable::new();
//! let (mut mirror, mut changes) = list.subscribe_with_snapshot();
//! list.add("a");
//! list.add_all(vec!["b", "c"]);
//! list.remove_at(0);
//!
//! while let Some(change) = changes.try_recv() {
//!     apply_change(&mut mirror, change);
//! }
//! assert_eq!(mirror, list.to_vec());
//! ```

use super::{ChannelStream, Fanout};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// A single mutation of a [`ListObservable`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListChange<T> {
    /// One item appended at the end.
    ItemAdded {
        /// The appended item
        item: T,
    },

    /// Several items appended at the end, in order.
    ItemsAdded {
        /// The appended items
        items: Vec<T>,
    },

    /// The item at `index` was removed. Later items shift left.
    ItemRemoved {
        /// Position the item occupied
        index: usize,
        /// The removed item
        item: T,
    },

    /// Every occurrence of each of these items was removed.
    ItemsRemoved {
        /// The removed values
        items: Vec<T>,
    },

    /// The item at `index` was replaced in place.
    ItemSet {
        /// Position that was replaced
        index: usize,
        /// The new item
        item: T,
    },

    /// The whole contents were replaced.
    ItemsSet {
        /// The new contents
        items: Vec<T>,
    },
}

/// Error returned by [`try_apply_change`] when a change does not fit the target.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ListChangeError {
    /// The change names a position past the end of the target.
    #[error("index {index} out of bounds for list of length {len}")]
    IndexOutOfBounds {
        /// The index that was accessed
        index: usize,
        /// The length of the list
        len: usize,
    },
}

/// Apply a change to a mirror of the source list.
///
/// # Panics
///
/// Panics if the change names an index outside `items`, which means the
/// mirror has diverged from the source.
pub fn apply_change<T: PartialEq>(items: &mut Vec<T>, change: ListChange<T>) {
    if let Err(err) = try_apply_change(items, change) {
        panic!("list mirror diverged from its source: {err}");
    }
}

/// Fallible version of [`apply_change`].
pub fn try_apply_change<T: PartialEq>(
    items: &mut Vec<T>,
    change: ListChange<T>,
) -> Result<(), ListChangeError> {
    match change {
        ListChange::ItemAdded { item } => items.push(item),
        ListChange::ItemsAdded { items: added } => items.extend(added),
        ListChange::ItemRemoved { index, .. } => {
            if index >= items.len() {
                return Err(ListChangeError::IndexOutOfBounds {
                    index,
                    len: items.len(),
                });
            }
            items.remove(index);
        }
        ListChange::ItemsRemoved { items: removed } => {
            items.retain(|item| !removed.contains(item));
        }
        ListChange::ItemSet { index, item } => {
            let len = items.len();
            let slot = items
                .get_mut(index)
                .ok_or(ListChangeError::IndexOutOfBounds { index, len })?;
            *slot = item;
        }
        ListChange::ItemsSet { items: replaced } => *items = replaced,
    }
    Ok(())
}

/// Observable ordered sequence.
///
/// Mutations and their notifications happen under one lock, so subscribers
/// receive changes in the exact order they were applied.
pub struct ListObservable<T> {
    inner: Arc<Mutex<ListState<T>>>,
}

struct ListState<T> {
    items: Vec<T>,
    subscribers: Fanout<ListChange<T>>,
}

impl<T: Clone + PartialEq + Send + 'static> ListObservable<T> {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::from_vec(Vec::new())
    }

    /// Create a list with initial contents. No change is emitted for them.
    pub fn from_vec(items: Vec<T>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ListState {
                items,
                subscribers: Fanout::new(),
            })),
        }
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().items.is_empty()
    }

    /// Clone of the item at `index`.
    pub fn get(&self, index: usize) -> Option<T> {
        self.inner.lock().items.get(index).cloned()
    }

    /// Clone of the whole contents.
    pub fn to_vec(&self) -> Vec<T> {
        self.inner.lock().items.clone()
    }

    /// Subscribe to changes made from now on.
    pub fn subscribe(&self) -> ChannelStream<ListChange<T>> {
        self.inner.lock().subscribers.subscribe()
    }

    /// Atomically take the current contents and subscribe to later changes.
    ///
    /// No change can slip between the snapshot and the first received diff.
    pub fn subscribe_with_snapshot(&self) -> (Vec<T>, ChannelStream<ListChange<T>>) {
        let mut state = self.inner.lock();
        let snapshot = state.items.clone();
        (snapshot, state.subscribers.subscribe())
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.live_count()
    }

    /// Append one item.
    pub fn add(&self, item: T) {
        let mut state = self.inner.lock();
        state.items.push(item.clone());
        state.subscribers.publish(&ListChange::ItemAdded { item });
    }

    /// Append several items. Appending nothing emits nothing.
    pub fn add_all(&self, items: Vec<T>) {
        if items.is_empty() {
            return;
        }
        let mut state = self.inner.lock();
        state.items.extend(items.iter().cloned());
        state.subscribers.publish(&ListChange::ItemsAdded { items });
    }

    /// Remove and return the item at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn remove_at(&self, index: usize) -> T {
        let mut state = self.inner.lock();
        let len = state.items.len();
        assert!(
            index < len,
            "remove_at index {index} out of bounds for list of length {len}"
        );
        let item = state.items.remove(index);
        state.subscribers.publish(&ListChange::ItemRemoved {
            index,
            item: item.clone(),
        });
        item
    }

    /// Remove every occurrence of each of `items`.
    ///
    /// Emits one [`ListChange::ItemsRemoved`] naming the values that were
    /// actually present. Returns `false`, and emits nothing, if none were.
    pub fn remove_all(&self, items: &[T]) -> bool {
        let mut state = self.inner.lock();
        let mut removed: Vec<T> = Vec::new();
        state.items.retain(|item| {
            if items.contains(item) {
                if !removed.contains(item) {
                    removed.push(item.clone());
                }
                false
            } else {
                true
            }
        });
        if removed.is_empty() {
            return false;
        }
        state
            .subscribers
            .publish(&ListChange::ItemsRemoved { items: removed });
        true
    }

    /// Replace the item at `index`, returning the previous one.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn set(&self, index: usize, item: T) -> T {
        let mut state = self.inner.lock();
        let len = state.items.len();
        assert!(
            index < len,
            "set index {index} out of bounds for list of length {len}"
        );
        let previous = std::mem::replace(&mut state.items[index], item.clone());
        state
            .subscribers
            .publish(&ListChange::ItemSet { index, item });
        previous
    }

    /// Replace the whole contents.
    pub fn set_all(&self, items: Vec<T>) {
        let mut state = self.inner.lock();
        state.items.clone_from(&items);
        state.subscribers.publish(&ListChange::ItemsSet { items });
    }
}

impl<T: Clone + PartialEq + Send + 'static> Default for ListObservable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for ListObservable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for ListObservable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListObservable")
            .field("items", &self.inner.lock().items)
            .finish_non_exhaustive()
    }
}

//! SettingsRepository - transactional settings with per-field channels
//!
//! A repository owns one settings value `D`, persisted as a JSON document
//! under its namespace. Observers subscribe to individual fields through
//! distinct [`FieldChannel`]s, so changing one field never wakes observers
//! of another.
//!
//! ## Snapshots
//!
//! `save_snapshot` pushes the current value on a stack and defers all
//! persistence until the stack is empty again:
//!
//! - `commit_snapshot` pops and keeps the current value. Popping the last
//!   snapshot flushes once.
//! - `revert_snapshot` pops and restores the saved value, re-emitting every
//!   field that differs. It never writes.
//! - `clear_snapshot` pops without restoring and without writing.
//!
//! Calling any of the three with no open snapshot is a programming error and
//! panics.

use crate::errors::SettingsError;
use gamedex_core::{ReadOnlyChannel, SettingsStorage, StatefulChannel};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Observe-only, distinct channel for one field of a settings value.
pub type FieldChannel<T> = ReadOnlyChannel<T>;

/// Limits applied to a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepositoryConfig {
    /// Deepest allowed snapshot nesting
    pub max_snapshot_depth: usize,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            max_snapshot_depth: 16,
        }
    }
}

/// Whether writes are currently deferred by an open snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotState {
    /// No snapshot open; writes go straight to storage.
    Clean,
    /// `depth` snapshots open; writes are held back.
    Snapshotted(usize),
}

/// Bounds required of a settings value.
pub trait SettingsData:
    Clone + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

impl<D> SettingsData for D where
    D: Clone + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

/// Transactional settings repository.
///
/// Cloning shares the repository.
pub struct SettingsRepository<D> {
    inner: Arc<Inner<D>>,
}

struct Inner<D> {
    namespace: String,
    storage: Arc<dyn SettingsStorage>,
    defaults: Box<dyn Fn() -> D + Send + Sync>,
    config: RepositoryConfig,
    data: StatefulChannel<D>,
    state: Mutex<State<D>>,
}

struct State<D> {
    snapshots: Vec<D>,
    write_enabled: bool,
    fields: Vec<Box<dyn Projection<D>>>,
}

trait Projection<D>: Send {
    fn refresh(&self, previous: &D, current: &D);
}

struct Field<A, T> {
    name: &'static str,
    accessor: A,
    channel: StatefulChannel<T>,
}

impl<D, A, T> Projection<D> for Field<A, T>
where
    A: Fn(&D) -> T + Send,
    T: Clone + PartialEq + Send + 'static,
{
    fn refresh(&self, previous: &D, current: &D) {
        let next = (self.accessor)(current);
        if (self.accessor)(previous) != next {
            trace!(field = self.name, "settings field changed");
            self.channel.set(next);
        }
    }
}

impl<D: SettingsData> SettingsRepository<D> {
    /// Open the repository for `namespace`.
    ///
    /// Uses the stored document if there is one, otherwise `defaults()`.
    /// Opening never writes.
    pub fn open<F>(
        namespace: impl Into<String>,
        storage: Arc<dyn SettingsStorage>,
        config: RepositoryConfig,
        defaults: F,
    ) -> Result<Self, SettingsError>
    where
        F: Fn() -> D + Send + Sync + 'static,
    {
        let namespace = namespace.into();
        let stored = storage
            .load(&namespace)
            .map_err(|source| SettingsError::Load {
                namespace: namespace.clone(),
                source,
            })?;
        let initial = match stored {
            Some(document) => serde_json::from_value(document).map_err(|e| {
                SettingsError::Serialization {
                    namespace: namespace.clone(),
                    message: e.to_string(),
                }
            })?,
            None => {
                debug!(namespace = %namespace, "no stored settings, using defaults");
                defaults()
            }
        };

        Ok(Self {
            inner: Arc::new(Inner {
                namespace,
                storage,
                defaults: Box::new(defaults),
                config,
                data: StatefulChannel::distinct(initial),
                state: Mutex::new(State {
                    snapshots: Vec::new(),
                    write_enabled: true,
                    fields: Vec::new(),
                }),
            }),
        })
    }

    /// Namespace this repository persists under.
    pub fn namespace(&self) -> &str {
        &self.inner.namespace
    }

    /// Clone of the current value.
    pub fn get(&self) -> D {
        self.inner.data.get()
    }

    /// Borrow the current value.
    pub fn with<R>(&self, f: impl FnOnce(&D) -> R) -> R {
        self.inner.data.with(f)
    }

    /// Channel of whole values. Emits once per effective change.
    pub fn data_channel(&self) -> ReadOnlyChannel<D> {
        self.inner.data.read_only()
    }

    /// Project a field into its own distinct channel.
    ///
    /// On every change of the settings value the projection is recomputed
    /// and emitted only if it differs from the previous projection. Fields
    /// are refreshed in registration order.
    pub fn field<T, A>(&self, name: &'static str, accessor: A) -> FieldChannel<T>
    where
        T: Clone + PartialEq + Send + 'static,
        A: Fn(&D) -> T + Send + 'static,
    {
        let mut state = self.inner.state.lock();
        let channel = StatefulChannel::distinct(self.inner.data.with(|d| accessor(d)));
        let read_only = channel.read_only();
        state.fields.push(Box::new(Field {
            name,
            accessor,
            channel,
        }));
        read_only
    }

    /// Replace the value with `f(current)`.
    ///
    /// Observers are notified synchronously. When no snapshot is open and
    /// writes are enabled the new value is persisted before returning. If
    /// that write fails the in-memory value stays applied and the error is
    /// returned.
    ///
    /// `f` runs under the repository lock and must not call back into it.
    pub fn modify(&self, f: impl FnOnce(D) -> D) -> Result<(), SettingsError> {
        let state = self.inner.state.lock();
        let previous = self.inner.data.get();
        let next = f(previous.clone());
        if next == previous {
            return Ok(());
        }
        self.apply(&state, &previous, next.clone());
        if state.snapshots.is_empty() && state.write_enabled {
            self.persist(&next)?;
        }
        Ok(())
    }

    /// Open a snapshot of the current value.
    ///
    /// # Panics
    ///
    /// Panics if `max_snapshot_depth` snapshots are already open.
    pub fn save_snapshot(&self) {
        let mut state = self.inner.state.lock();
        let depth = state.snapshots.len();
        assert!(
            depth < self.inner.config.max_snapshot_depth,
            "settings '{}' snapshot depth limit {} exceeded",
            self.inner.namespace,
            self.inner.config.max_snapshot_depth
        );
        state.snapshots.push(self.inner.data.get());
        debug!(namespace = %self.inner.namespace, depth = depth + 1, "settings snapshot saved");
    }

    /// Close the innermost snapshot, keeping the current value.
    ///
    /// Closing the outermost snapshot persists the current value once.
    ///
    /// # Panics
    ///
    /// Panics if no snapshot is open.
    pub fn commit_snapshot(&self) -> Result<(), SettingsError> {
        let mut state = self.inner.state.lock();
        self.pop(&mut state, "commit_snapshot");
        debug!(namespace = %self.inner.namespace, depth = state.snapshots.len(), "settings snapshot committed");
        if state.snapshots.is_empty() {
            self.persist(&self.inner.data.get())?;
        }
        Ok(())
    }

    /// Close the innermost snapshot, restoring the value it saved.
    ///
    /// Every field that differs from the restored value re-emits. Nothing is
    /// written: an enclosing snapshot, or storage itself, still holds the
    /// restored value's last committed form.
    ///
    /// # Panics
    ///
    /// Panics if no snapshot is open.
    pub fn revert_snapshot(&self) {
        let mut state = self.inner.state.lock();
        let saved = self.pop(&mut state, "revert_snapshot");
        let previous = self.inner.data.get();
        if saved != previous {
            self.apply(&state, &previous, saved);
        }
        debug!(namespace = %self.inner.namespace, depth = state.snapshots.len(), "settings snapshot reverted");
    }

    /// Close the innermost snapshot without restoring and without writing.
    ///
    /// # Panics
    ///
    /// Panics if no snapshot is open.
    pub fn clear_snapshot(&self) {
        let mut state = self.inner.state.lock();
        self.pop(&mut state, "clear_snapshot");
        debug!(namespace = %self.inner.namespace, depth = state.snapshots.len(), "settings snapshot cleared");
    }

    /// Current snapshot state.
    pub fn snapshot_state(&self) -> SnapshotState {
        match self.inner.state.lock().snapshots.len() {
            0 => SnapshotState::Clean,
            depth => SnapshotState::Snapshotted(depth),
        }
    }

    /// Stop persisting on `modify`. Observers are still notified.
    pub fn disable_write(&self) {
        self.inner.state.lock().write_enabled = false;
    }

    /// Resume persisting on `modify`. Does not flush by itself.
    pub fn enable_write(&self) {
        self.inner.state.lock().write_enabled = true;
    }

    /// Whether `modify` currently persists.
    pub fn is_write_enabled(&self) -> bool {
        self.inner.state.lock().write_enabled
    }

    /// Persist the current value now, regardless of the write gate.
    ///
    /// # Panics
    ///
    /// Panics if a snapshot is open.
    pub fn flush(&self) -> Result<(), SettingsError> {
        let state = self.inner.state.lock();
        assert!(
            state.snapshots.is_empty(),
            "settings '{}' flushed with {} open snapshot(s)",
            self.inner.namespace,
            state.snapshots.len()
        );
        self.persist(&self.inner.data.get())
    }

    /// Replace the value with the defaults, as a normal `modify`.
    pub fn reset_defaults(&self) -> Result<(), SettingsError> {
        let defaults = (self.inner.defaults)();
        self.modify(move |_| defaults)
    }

    fn pop(&self, state: &mut State<D>, operation: &str) -> D {
        match state.snapshots.pop() {
            Some(saved) => saved,
            None => panic!(
                "{operation} called on settings '{}' with no open snapshot",
                self.inner.namespace
            ),
        }
    }

    fn apply(&self, state: &State<D>, previous: &D, next: D) {
        self.inner.data.set(next.clone());
        for field in &state.fields {
            field.refresh(previous, &next);
        }
    }

    fn persist(&self, value: &D) -> Result<(), SettingsError> {
        let namespace = &self.inner.namespace;
        let document =
            serde_json::to_value(value).map_err(|e| SettingsError::Serialization {
                namespace: namespace.clone(),
                message: e.to_string(),
            })?;
        self.inner
            .storage
            .persist(namespace, &document)
            .map_err(|source| {
                warn!(namespace = %namespace, error = %source, "failed to persist settings");
                SettingsError::Persist {
                    namespace: namespace.clone(),
                    source,
                }
            })?;
        debug!(namespace = %namespace, "settings persisted");
        Ok(())
    }
}

impl<D> Clone for SettingsRepository<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D> fmt::Debug for SettingsRepository<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettingsRepository")
            .field("namespace", &self.inner.namespace)
            .finish_non_exhaustive()
    }
}

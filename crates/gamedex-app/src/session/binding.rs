//! Bindings between model channels and view properties.

use super::{PresentationSession, ViewProperty};
use crate::settings::{FieldChannel, SettingsData, SettingsRepository};
use futures::Stream;
use gamedex_core::reactive::try_apply_change;
use gamedex_core::{ListObservable, ValueChannel};
use std::future;

impl PresentationSession {
    /// Keep `property` equal to the latest value of `channel`.
    ///
    /// The current value is written before this call returns.
    pub fn report_changes_to<T, C>(&self, channel: &C, property: ViewProperty<T>)
    where
        T: Clone + Send + 'static,
        C: ValueChannel<T> + ?Sized,
    {
        self.for_each_immediately(channel, move |value| property.set(value));
    }

    /// Mirror `list` into `property`.
    ///
    /// The property is set to a snapshot of the list immediately, then each
    /// diff is applied as it arrives. The snapshot and the subscription are
    /// taken atomically, so no change is missed or applied twice.
    pub fn bind_list<T>(&self, list: &ListObservable<T>, property: ViewProperty<Vec<T>>)
    where
        T: Clone + PartialEq + Send + 'static,
    {
        if self.is_destroyed() {
            return;
        }
        let (snapshot, changes) = list.subscribe_with_snapshot();
        property.set(snapshot);
        self.for_each(changes, move |change| {
            let applied = property.update(|items| try_apply_change(items, change));
            future::ready(applied.map_err(anyhow::Error::from))
        });
    }

    /// Two-way binding between one settings field and a view property.
    ///
    /// Model to view: `property` tracks `field`, starting with its current
    /// value. View to model: every value from `changes` is folded into the
    /// repository with `apply`. Because field channels are distinct, writing
    /// the value the view just produced does not echo back to the view.
    pub fn bind_settings<D, T, S, F>(
        &self,
        repo: &SettingsRepository<D>,
        field: &FieldChannel<T>,
        property: ViewProperty<T>,
        changes: S,
        apply: F,
    ) where
        D: SettingsData,
        T: Clone + Send + 'static,
        S: Stream<Item = T> + Send + 'static,
        F: Fn(D, T) -> D + Send + Sync + 'static,
    {
        self.report_changes_to(field, property);
        let repo = repo.clone();
        self.for_each(changes, move |value| {
            let written = repo.modify(|data| apply(data, value));
            future::ready(written.map_err(anyhow::Error::from))
        });
    }
}

//! # Gamedex Core
//!
//! UI-agnostic building blocks shared by every Gamedex presenter:
//!
//! - [`reactive`]: replay-latest channels, transient broadcast channels and
//!   diff-emitting list observables.
//! - [`bus`]: typed publish/subscribe keyed by event variant.
//! - [`storage`]: the persisted-settings boundary and its backends.
//! - [`filter`]: rule trees and the per-pass evaluation context used by
//!   filters and reports.
//!
//! Nothing in this crate knows how a view is rendered. Views consume channels
//! and publish their own action channels; presenters in `gamedex-app` wire the
//! two together.

pub mod bus;
pub mod errors;
pub mod filter;
pub mod reactive;
pub mod storage;

pub use bus::{BusEvent, EventBus, EventSubscription};
pub use errors::{CoreError, ErrorSink, HandlerFailure, StorageError};
pub use reactive::{
    apply_change, try_apply_change, BroadcastReceiveChannel, ChannelStream, ListChange,
    ListChangeError, ListObservable, ReadOnlyChannel, StatefulChannel, ValueChannel,
};
pub use storage::{JsonFileStorage, MemorySettingsStorage, SettingsStorage};

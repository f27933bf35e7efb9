//! # Reactive primitives
//!
//! - [`StatefulChannel`]: holds a current value; every subscriber first sees
//!   that value, then every later assignment.
//! - [`BroadcastReceiveChannel`]: transient fan-out with no replay.
//! - [`ListObservable`]: an ordered sequence whose mutations are published as
//!   [`ListChange`] diffs.
//!
//! Every subscription is a [`ChannelStream`] backed by its own unbounded
//! queue, so a slow subscriber never drops values and never blocks the
//! publisher. Dropping the stream ends the subscription.

mod broadcast;
mod list;
mod stateful;
mod stream;

pub use broadcast::BroadcastReceiveChannel;
pub use list::{apply_change, try_apply_change, ListChange, ListChangeError, ListObservable};
pub use stateful::{ReadOnlyChannel, StatefulChannel, ValueChannel};
pub use stream::ChannelStream;

pub(crate) use stream::Fanout;

//! Subscription streams and the fan-out list behind every channel.

use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// One subscriber's view of a channel.
///
/// Values arrive in publication order. Implements [`futures::Stream`], so it
/// can be driven with `StreamExt` combinators or handed to a presentation
/// session.
#[derive(Debug)]
pub struct ChannelStream<T> {
    rx: mpsc::UnboundedReceiver<T>,
}

impl<T> ChannelStream<T> {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<T>) -> Self {
        Self { rx }
    }

    /// Wait for the next value. `None` once the channel is gone.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Take the next value if one is already queued.
    pub fn try_recv(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Stop receiving. Already-queued values can still be drained.
    pub fn close(&mut self) {
        self.rx.close();
    }
}

impl<T> Stream for ChannelStream<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

/// Subscriber list shared by all channel types.
///
/// Closed receivers are pruned on the next publish, so abandoned streams do
/// not accumulate.
#[derive(Debug)]
pub(crate) struct Fanout<T> {
    senders: Vec<mpsc::UnboundedSender<T>>,
}

impl<T: Clone> Fanout<T> {
    pub(crate) fn new() -> Self {
        Self {
            senders: Vec::new(),
        }
    }

    pub(crate) fn subscribe(&mut self) -> ChannelStream<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.push(tx);
        ChannelStream::new(rx)
    }

    /// Subscribe with `initial` already queued ahead of anything published later.
    pub(crate) fn subscribe_with(&mut self, initial: T) -> ChannelStream<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        // The receiver is alive, so this cannot fail.
        let _ = tx.send(initial);
        self.senders.push(tx);
        ChannelStream::new(rx)
    }

    pub(crate) fn publish(&mut self, value: &T) {
        self.senders.retain(|tx| tx.send(value.clone()).is_ok());
    }

    pub(crate) fn live_count(&mut self) -> usize {
        self.senders.retain(|tx| !tx.is_closed());
        self.senders.len()
    }
}

//! # Event bus
//!
//! Typed publish/subscribe keyed by event variant. Each [`BusEvent`] names
//! its variant through [`BusEvent::kind`]; handlers register for one kind
//! and only see events of that kind.
//!
//! Each registration is served by its own tokio task fed from its own
//! unbounded queue. `send` never waits for handlers, a handler never
//! receives two events at once, and a slow handler does not hold up the
//! others. Handler errors and panics go to the bus's [`ErrorSink`].

use crate::errors::{CoreError, ErrorSink};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

/// An event that can travel on an [`EventBus`].
pub trait BusEvent: Clone + Send + Sync + 'static {
    /// Discriminant used to route events to handlers.
    type Kind: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static;

    /// The variant of this event.
    fn kind(&self) -> Self::Kind;
}

/// Typed publish/subscribe bus.
///
/// Cloning shares the bus.
pub struct EventBus<E: BusEvent> {
    inner: Arc<BusInner<E>>,
}

struct BusInner<E: BusEvent> {
    routes: Mutex<HashMap<E::Kind, Vec<Route<E>>>>,
    next_id: AtomicU64,
    sink: ErrorSink,
}

struct Route<E> {
    id: u64,
    tx: mpsc::UnboundedSender<E>,
}

impl<E: BusEvent> BusInner<E> {
    fn attach(&self, kind: E::Kind) -> (u64, mpsc::UnboundedReceiver<E>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.routes
            .lock()
            .entry(kind)
            .or_default()
            .push(Route { id, tx });
        (id, rx)
    }

    fn detach(&self, kind: E::Kind, id: u64) {
        let mut routes = self.routes.lock();
        if let Some(list) = routes.get_mut(&kind) {
            list.retain(|route| route.id != id);
            if list.is_empty() {
                routes.remove(&kind);
            }
        }
    }
}

impl<E: BusEvent> EventBus<E> {
    /// Create a bus whose handler failures are logged.
    pub fn new() -> Self {
        Self::with_error_sink(ErrorSink::logging())
    }

    /// Create a bus that reports handler failures to `sink`.
    pub fn with_error_sink(sink: ErrorSink) -> Self {
        Self {
            inner: Arc::new(BusInner {
                routes: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(0),
                sink,
            }),
        }
    }

    /// Register `handler` for events of `kind`.
    ///
    /// Must be called from within a tokio runtime. The handler keeps running
    /// until [`EventSubscription::cancel`] is called or the bus is dropped.
    pub fn on<F, Fut>(&self, kind: E::Kind, mut handler: F) -> EventSubscription
    where
        F: FnMut(E) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let (id, mut rx) = self.inner.attach(kind);
        let cancelled = Arc::new(AtomicBool::new(false));
        let sink = self.inner.sink.clone();
        let origin = format!("event handler {kind:?}#{id}");
        tracing::trace!(?kind, id, "event handler registered");

        let task = {
            let cancelled = cancelled.clone();
            tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    if cancelled.load(Ordering::Acquire) {
                        break;
                    }
                    sink.guard(&origin, handler(event)).await;
                }
            })
        };

        let bus = Arc::downgrade(&self.inner);
        EventSubscription {
            cancelled,
            task: Some(task.abort_handle()),
            detach: Mutex::new(Some(Box::new(move || {
                if let Some(inner) = bus.upgrade() {
                    inner.detach(kind, id);
                }
            }))),
        }
    }

    /// Publish `event` to every handler registered for its kind.
    ///
    /// Returns immediately. With no handlers for the kind this is a no-op.
    pub fn send(&self, event: E) {
        let kind = event.kind();
        let mut routes = self.inner.routes.lock();
        match routes.get_mut(&kind) {
            Some(list) => list.retain(|route| route.tx.send(event.clone()).is_ok()),
            None => tracing::trace!(?kind, "event sent with no subscribers"),
        }
    }

    /// Wait for the next event of `kind` that satisfies `predicate`.
    ///
    /// The waiter is registered when this is called, not when the returned
    /// future is first polled, so an event sent between the call and the
    /// `.await` is still seen. The temporary subscription is removed when the
    /// future completes or is dropped.
    pub fn await_event<P>(
        &self,
        kind: E::Kind,
        predicate: P,
    ) -> impl Future<Output = Result<E, CoreError>> + Send + 'static
    where
        P: Fn(&E) -> bool + Send + 'static,
    {
        let (id, mut rx) = self.inner.attach(kind);
        let waiter = WaiterGuard {
            bus: Arc::downgrade(&self.inner),
            kind,
            id,
        };
        async move {
            let _waiter = waiter;
            while let Some(event) = rx.recv().await {
                if predicate(&event) {
                    return Ok(event);
                }
            }
            Err(CoreError::cancelled(format!(
                "event bus dropped while awaiting {kind:?}"
            )))
        }
    }

    /// Number of registrations (handlers and waiters) for `kind`.
    pub fn subscriber_count(&self, kind: E::Kind) -> usize {
        self.inner
            .routes
            .lock()
            .get(&kind)
            .map_or(0, |list| list.iter().filter(|r| !r.tx.is_closed()).count())
    }
}

impl<E: BusEvent> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: BusEvent> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: BusEvent> fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("kinds", &self.inner.routes.lock().len())
            .finish_non_exhaustive()
    }
}

struct WaiterGuard<E: BusEvent> {
    bus: Weak<BusInner<E>>,
    kind: E::Kind,
    id: u64,
}

impl<E: BusEvent> Drop for WaiterGuard<E> {
    fn drop(&mut self) {
        if let Some(inner) = self.bus.upgrade() {
            inner.detach(self.kind, self.id);
        }
    }
}

/// Handle to one [`EventBus::on`] registration.
///
/// Dropping the handle does not unregister the handler.
#[must_use = "dropping an EventSubscription leaves the handler registered; call cancel() to stop it"]
pub struct EventSubscription {
    cancelled: Arc<AtomicBool>,
    task: Option<AbortHandle>,
    detach: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl EventSubscription {
    /// Stop delivery to this handler. Idempotent.
    ///
    /// Events already queued but not yet handled are discarded. A handler
    /// invocation in progress is aborted at its next await point.
    pub fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(detach) = self.detach.lock().take() {
            detach();
        }
        if let Some(task) = &self.task {
            task.abort();
        }
    }

    /// Whether [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl fmt::Debug for EventSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSubscription")
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[derive(Debug, Clone, PartialEq)]
    enum Ev {
        Started(u32),
        Finished(u32),
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum EvKind {
        Started,
        Finished,
    }

    impl BusEvent for Ev {
        type Kind = EvKind;

        fn kind(&self) -> EvKind {
            match self {
                Ev::Started(_) => EvKind::Started,
                Ev::Finished(_) => EvKind::Finished,
            }
        }
    }

    #[tokio::test]
    async fn handler_only_sees_its_kind() {
        let bus = EventBus::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sub = bus.on(EvKind::Started, move |event| {
            let tx = tx.clone();
            async move {
                tx.send(event)?;
                Ok(())
            }
        });

        bus.send(Ev::Finished(1));
        bus.send(Ev::Started(2));

        let got = timeout(Duration::from_secs(1), rx.recv()).await.unwrap();
        assert_eq!(got, Some(Ev::Started(2)));
        sub.cancel();
    }

    #[tokio::test]
    async fn send_without_subscribers_is_noop() {
        let bus: EventBus<Ev> = EventBus::new();
        bus.send(Ev::Started(1));
        assert_eq!(bus.subscriber_count(EvKind::Started), 0);
    }

    #[tokio::test]
    async fn cancel_is_idempotent_and_unregisters() {
        let bus: EventBus<Ev> = EventBus::new();
        let sub = bus.on(EvKind::Started, |_| async { Ok(()) });
        assert_eq!(bus.subscriber_count(EvKind::Started), 1);

        sub.cancel();
        sub.cancel();
        assert!(sub.is_cancelled());
        assert_eq!(bus.subscriber_count(EvKind::Started), 0);
    }

    #[tokio::test]
    async fn await_event_filters_by_predicate() {
        let bus = EventBus::new();
        let sender = bus.clone();
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            sender.send(Ev::Finished(1));
            sender.send(Ev::Finished(7));
        });

        let event = timeout(
            Duration::from_secs(1),
            bus.await_event(EvKind::Finished, |e| matches!(e, Ev::Finished(7))),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(event, Ev::Finished(7));
        assert_eq!(bus.subscriber_count(EvKind::Finished), 0);
    }

    #[tokio::test]
    async fn await_event_sees_events_sent_before_first_poll() {
        let bus = EventBus::new();
        let done = bus.await_event(EvKind::Finished, |_| true);
        assert_eq!(bus.subscriber_count(EvKind::Finished), 1);

        bus.send(Ev::Finished(3));

        let event = timeout(Duration::from_secs(1), done).await.unwrap().unwrap();
        assert_eq!(event, Ev::Finished(3));
        assert_eq!(bus.subscriber_count(EvKind::Finished), 0);
    }

    #[tokio::test]
    async fn dropping_an_unpolled_waiter_detaches_it() {
        let bus: EventBus<Ev> = EventBus::new();
        let done = bus.await_event(EvKind::Finished, |_| true);
        assert_eq!(bus.subscriber_count(EvKind::Finished), 1);

        drop(done);
        assert_eq!(bus.subscriber_count(EvKind::Finished), 0);
    }

    #[tokio::test]
    async fn dropping_the_bus_cancels_pending_waiters() {
        let bus: EventBus<Ev> = EventBus::new();
        let done = bus.await_event(EvKind::Finished, |_| true);
        drop(bus);

        let err = timeout(Duration::from_secs(1), done).await.unwrap().unwrap_err();
        assert!(matches!(err, CoreError::Cancelled { .. }));
        assert!(err.to_string().contains("Finished"));
    }
}

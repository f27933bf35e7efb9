//! # Presentation sessions
//!
//! A [`PresentationSession`] owns everything a presenter registered for one
//! view: stream handlers, bus subscriptions, show/hide hooks. Destroying the
//! session tears all of it down.
//!
//! Handlers registered on one session never run concurrently with each
//! other. Each invocation holds the session's turn lock and re-checks the
//! destroyed flag after acquiring it, so no handler starts once `destroy`
//! has returned. A handler that fails or panics is reported to the
//! session's [`ErrorSink`] and the session keeps running.
//!
//! Handlers must not wait on other handlers of the same session; the turn
//! lock is not re-entrant.

mod binding;
mod property;

pub use property::ViewProperty;

use futures::{Stream, StreamExt};
use gamedex_core::{
    BusEvent, ErrorSink, EventBus, EventSubscription, HandlerFailure, ValueChannel,
};
use parking_lot::Mutex;
use std::fmt;
use std::future::{self, Future};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Built but never shown.
    Created,
    /// Currently on screen.
    Showing,
    /// Shown at least once, currently off screen.
    Hidden,
    /// Torn down. Terminal.
    Destroyed,
}

/// Something that can wire itself to a view.
pub trait Presenter<V: ?Sized> {
    /// Register this presenter's handlers for `view` on a new session.
    fn present(&self, view: Arc<V>) -> PresentationSession;
}

type Hook = Arc<dyn Fn() + Send + Sync>;

/// Lifetime scope for one presenter/view pairing.
///
/// Cloning shares the session. Dropping the last clone tears it down as if
/// [`destroy`](Self::destroy) had been called, without running hide hooks.
#[derive(Clone)]
pub struct PresentationSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    name: String,
    sink: ErrorSink,
    lifecycle: Mutex<Lifecycle>,
    destroyed: Arc<AtomicBool>,
    turn: Arc<tokio::sync::Mutex<()>>,
    tasks: TaskRegistry,
    subscriptions: Mutex<Vec<EventSubscription>>,
}

struct Lifecycle {
    state: SessionState,
    on_show: Vec<Hook>,
    on_hide: Vec<Hook>,
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        self.destroyed.store(true, Ordering::Release);
        self.tasks.shutdown();
        for subscription in self.subscriptions.get_mut().drain(..) {
            subscription.cancel();
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Task registry
// ─────────────────────────────────────────────────────────────────────────────

struct TaskRegistry {
    shutdown_tx: watch::Sender<bool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl TaskRegistry {
    fn new() -> Self {
        let (shutdown_tx, _shutdown_rx) = watch::channel(false);
        Self {
            shutdown_tx,
            handles: Mutex::new(Vec::new()),
        }
    }

    fn spawn_cancellable<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = shutdown_rx.changed() => {}
                _ = fut => {}
            }
        });
        let mut handles = self.handles.lock();
        handles.retain(|h| !h.is_finished());
        // A shutdown that raced this spawn would otherwise miss the new task.
        if *self.shutdown_tx.borrow() {
            handle.abort();
        } else {
            handles.push(handle);
        }
    }

    fn shutdown(&self) {
        // send_replace stores the flag even when no task is listening
        self.shutdown_tx.send_replace(true);
        for handle in self.handles.lock().drain(..) {
            handle.abort();
        }
    }

    fn live(&self) -> usize {
        let mut handles = self.handles.lock();
        handles.retain(|h| !h.is_finished());
        handles.len()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

impl PresentationSession {
    /// Create a session whose handler failures are logged.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_error_sink(name, ErrorSink::logging())
    }

    /// Create a session that reports handler failures to `sink`.
    pub fn with_error_sink(name: impl Into<String>, sink: ErrorSink) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                name: name.into(),
                sink,
                lifecycle: Mutex::new(Lifecycle {
                    state: SessionState::Created,
                    on_show: Vec::new(),
                    on_hide: Vec::new(),
                }),
                destroyed: Arc::new(AtomicBool::new(false)),
                turn: Arc::new(tokio::sync::Mutex::new(())),
                tasks: TaskRegistry::new(),
                subscriptions: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Session name, used in logs and failure reports.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.inner.lifecycle.lock().state
    }

    /// Whether the session is on screen.
    pub fn is_showing(&self) -> bool {
        self.state() == SessionState::Showing
    }

    /// Whether the session has been destroyed.
    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::Acquire)
    }

    /// Number of stream handlers still running.
    pub fn active_handlers(&self) -> usize {
        self.inner.tasks.live()
    }

    /// Run `hook` every time the session is shown.
    pub fn on_show(&self, hook: impl Fn() + Send + Sync + 'static) {
        self.inner.lifecycle.lock().on_show.push(Arc::new(hook));
    }

    /// Run `hook` every time the session is hidden, including by `destroy`.
    pub fn on_hide(&self, hook: impl Fn() + Send + Sync + 'static) {
        self.inner.lifecycle.lock().on_hide.push(Arc::new(hook));
    }

    /// Mark the session as on screen and run show hooks.
    ///
    /// # Panics
    ///
    /// Panics if the session is already showing or has been destroyed.
    pub fn show(&self) {
        let hooks = {
            let mut lifecycle = self.inner.lifecycle.lock();
            match lifecycle.state {
                SessionState::Showing => {
                    panic!("session '{}' shown while already showing", self.inner.name)
                }
                SessionState::Destroyed => {
                    panic!("session '{}' shown after destroy", self.inner.name)
                }
                SessionState::Created | SessionState::Hidden => {}
            }
            lifecycle.state = SessionState::Showing;
            lifecycle.on_show.clone()
        };
        debug!(session = %self.inner.name, "shown");
        for hook in hooks {
            self.run_hook("show hook", &hook);
        }
    }

    /// Mark the session as off screen and run hide hooks.
    ///
    /// # Panics
    ///
    /// Panics if the session is not showing.
    pub fn hide(&self) {
        let hooks = {
            let mut lifecycle = self.inner.lifecycle.lock();
            assert!(
                lifecycle.state == SessionState::Showing,
                "session '{}' hidden while {:?}",
                self.inner.name,
                lifecycle.state
            );
            lifecycle.state = SessionState::Hidden;
            lifecycle.on_hide.clone()
        };
        debug!(session = %self.inner.name, "hidden");
        for hook in hooks {
            self.run_hook("hide hook", &hook);
        }
    }

    /// Tear the session down. Idempotent.
    ///
    /// Hides first if showing. Afterwards no handler of this session is
    /// invoked again and every bus subscription it made is cancelled.
    pub fn destroy(&self) {
        if self.is_showing() {
            self.hide();
        }
        if self.inner.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.lifecycle.lock().state = SessionState::Destroyed;
        self.inner.tasks.shutdown();
        let subscriptions: Vec<_> = self.inner.subscriptions.lock().drain(..).collect();
        for subscription in subscriptions {
            subscription.cancel();
        }
        debug!(session = %self.inner.name, "destroyed");
    }

    fn run_hook(&self, what: &str, hook: &Hook) {
        if let Err(payload) = std::panic::catch_unwind(AssertUnwindSafe(|| hook())) {
            self.inner.sink.report(HandlerFailure::from_panic(
                format!("session {} {what}", self.inner.name),
                payload,
            ));
        }
    }

    fn origin(&self, what: &str) -> String {
        format!("session {} {what}", self.inner.name)
    }

    /// Run `handler` for every item of `stream`, in order, until the stream
    /// ends or the session is destroyed.
    ///
    /// Must be called from within a tokio runtime. On a destroyed session the
    /// stream is dropped and nothing is registered.
    pub fn for_each<S, F, Fut>(&self, stream: S, mut handler: F)
    where
        S: Stream + Send + 'static,
        S::Item: Send + 'static,
        F: FnMut(S::Item) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        if self.is_destroyed() {
            debug!(session = %self.inner.name, "handler registered after destroy, ignoring");
            return;
        }
        let destroyed = Arc::clone(&self.inner.destroyed);
        let turn = Arc::clone(&self.inner.turn);
        let sink = self.inner.sink.clone();
        let origin = self.origin("handler");
        self.inner.tasks.spawn_cancellable(async move {
            let mut stream = Box::pin(stream);
            while let Some(item) = stream.next().await {
                let _turn = turn.lock().await;
                if destroyed.load(Ordering::Acquire) {
                    break;
                }
                sink.guard(&origin, handler(item)).await;
            }
        });
    }

    /// Like [`for_each`](Self::for_each) over `channel`, but the current value
    /// is handled synchronously before this call returns.
    pub fn for_each_immediately<T, C, F>(&self, channel: &C, mut handler: F)
    where
        T: Send + 'static,
        C: ValueChannel<T> + ?Sized,
        F: FnMut(T) + Send + 'static,
    {
        if self.is_destroyed() {
            debug!(session = %self.inner.name, "handler registered after destroy, ignoring");
            return;
        }
        let mut stream = channel.subscribe();
        if let Some(current) = stream.try_recv() {
            if let Err(payload) = std::panic::catch_unwind(AssertUnwindSafe(|| handler(current))) {
                self.inner.sink.report(HandlerFailure::from_panic(
                    self.origin("handler"),
                    payload,
                ));
            }
        }
        self.for_each(stream, move |value| {
            handler(value);
            future::ready(Ok(()))
        });
    }

    /// Register `handler` on `bus` for events of `kind`, scoped to this
    /// session: it shares the session's turn lock and is cancelled by
    /// `destroy`.
    pub fn on_event<E, F, Fut>(&self, bus: &EventBus<E>, kind: E::Kind, handler: F)
    where
        E: BusEvent,
        F: FnMut(E) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        if self.is_destroyed() {
            debug!(session = %self.inner.name, "event handler registered after destroy, ignoring");
            return;
        }
        let destroyed = Arc::clone(&self.inner.destroyed);
        let turn = Arc::clone(&self.inner.turn);
        let handler = Arc::new(Mutex::new(handler));
        let subscription = bus.on(kind, move |event| {
            let destroyed = Arc::clone(&destroyed);
            let turn = Arc::clone(&turn);
            let handler = Arc::clone(&handler);
            async move {
                let _turn = turn.lock().await;
                if destroyed.load(Ordering::Acquire) {
                    return Ok(());
                }
                let invocation = (*handler.lock())(event);
                invocation.await
            }
        });
        let mut subscriptions = self.inner.subscriptions.lock();
        if self.is_destroyed() {
            subscription.cancel();
        } else {
            subscriptions.push(subscription);
        }
    }
}

impl fmt::Debug for PresentationSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PresentationSession")
            .field("name", &self.inner.name)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

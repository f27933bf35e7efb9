//! Error types for the core primitives
//!
//! Two kinds of failure live here:
//! - [`CoreError`] / [`StorageError`]: ordinary `Result` errors returned to
//!   the caller of an operation.
//! - [`HandlerFailure`]: an error or panic that escaped a subscriber callback.
//!   These never propagate to the publisher; they are handed to an
//!   [`ErrorSink`] instead.

use futures::FutureExt;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Failure of the persisted-settings backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// Reading or writing the backing store failed
    #[error("Storage I/O failed for '{namespace}': {message}")]
    Io {
        /// Settings namespace being accessed
        namespace: String,
        /// Underlying failure description
        message: String,
    },

    /// The stored document exists but cannot be decoded
    #[error("Stored settings for '{namespace}' are corrupt: {message}")]
    Corrupt {
        /// Settings namespace being accessed
        namespace: String,
        /// Decoder failure description
        message: String,
    },

    /// The backend was asked for something it cannot represent
    #[error("Storage configuration error: {reason}")]
    Configuration {
        /// Why the request was rejected
        reason: String,
    },
}

impl StorageError {
    /// Create an I/O error for `namespace`.
    pub fn io(namespace: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Io {
            namespace: namespace.into(),
            message: message.into(),
        }
    }

    /// Create a corrupt-document error for `namespace`.
    pub fn corrupt(namespace: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Corrupt {
            namespace: namespace.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }
}

/// Failure of an awaited core operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// A pending operation was torn down before it completed
    #[error("Cancelled: {message}")]
    Cancelled {
        /// What was cancelled
        message: String,
    },
}

impl CoreError {
    /// Create a cancellation error
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::Cancelled {
            message: message.into(),
        }
    }
}

/// An error or panic that escaped a subscriber callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerFailure {
    /// Which registration produced the failure (e.g. `"session settings:general"`)
    pub origin: String,
    /// Rendered error or panic message
    pub message: String,
    /// Whether the handler panicked rather than returning an error
    pub panicked: bool,
}

impl HandlerFailure {
    /// Wrap an error returned by a handler.
    pub fn from_error(origin: impl Into<String>, err: &anyhow::Error) -> Self {
        Self {
            origin: origin.into(),
            message: format!("{err:#}"),
            panicked: false,
        }
    }

    /// Wrap a panic payload caught at the dispatch boundary.
    pub fn from_panic(origin: impl Into<String>, payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(text) = payload.downcast_ref::<&str>() {
            (*text).to_string()
        } else if let Some(text) = payload.downcast_ref::<String>() {
            text.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self {
            origin: origin.into(),
            message,
            panicked: true,
        }
    }
}

impl fmt::Display for HandlerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.panicked { "panicked" } else { "failed" };
        write!(f, "{} {kind}: {}", self.origin, self.message)
    }
}

/// Destination for failures that escape subscriber callbacks.
///
/// The default sink logs through `tracing`. Tests and hosts can install their
/// own to collect failures.
#[derive(Clone)]
pub struct ErrorSink {
    report: Arc<dyn Fn(&HandlerFailure) + Send + Sync>,
}

impl ErrorSink {
    /// Create a sink that forwards every failure to `report`.
    pub fn new<F>(report: F) -> Self
    where
        F: Fn(&HandlerFailure) + Send + Sync + 'static,
    {
        Self {
            report: Arc::new(report),
        }
    }

    /// Sink that logs failures at `error` level.
    pub fn logging() -> Self {
        Self::new(|failure| {
            tracing::error!(
                origin = %failure.origin,
                panicked = failure.panicked,
                "uncaught handler failure: {}",
                failure.message
            );
        })
    }

    /// Report a failure.
    pub fn report(&self, failure: HandlerFailure) {
        (self.report)(&failure);
    }

    /// Drive one handler invocation, routing any error or panic to this sink.
    ///
    /// Returns `true` if the handler completed successfully.
    pub async fn guard<F>(&self, origin: &str, invocation: F) -> bool
    where
        F: Future<Output = anyhow::Result<()>>,
    {
        match AssertUnwindSafe(invocation).catch_unwind().await {
            Ok(Ok(())) => true,
            Ok(Err(err)) => {
                self.report(HandlerFailure::from_error(origin, &err));
                false
            }
            Err(payload) => {
                self.report(HandlerFailure::from_panic(origin, payload));
                false
            }
        }
    }
}

impl Default for ErrorSink {
    fn default() -> Self {
        Self::logging()
    }
}

impl fmt::Debug for ErrorSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorSink").finish_non_exhaustive()
    }
}

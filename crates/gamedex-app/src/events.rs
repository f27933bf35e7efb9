//! Application-wide events carried on the core event bus.

use gamedex_core::{BusEvent, EventBus};

/// Events published between presenters and services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreEvent {
    /// A background task started.
    TaskStarted {
        /// Task identifier
        task_id: u64,
        /// Human-readable title
        title: String,
    },
    /// A background task finished.
    TaskFinished {
        /// Task identifier
        task_id: u64,
        /// Whether it completed without error
        success: bool,
    },
    /// A presenter asks the host to close a view.
    RequestHideView {
        /// Id of the view to close
        view_id: String,
    },
    /// A settings dialog committed its changes.
    SettingsCommitted {
        /// Namespace of the committed repository
        namespace: String,
    },
    /// A settings dialog discarded its changes.
    SettingsReverted {
        /// Namespace of the reverted repository
        namespace: String,
    },
}

/// Discriminant of [`CoreEvent`], used to subscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum CoreEventKind {
    TaskStarted,
    TaskFinished,
    RequestHideView,
    SettingsCommitted,
    SettingsReverted,
}

impl BusEvent for CoreEvent {
    type Kind = CoreEventKind;

    fn kind(&self) -> CoreEventKind {
        match self {
            CoreEvent::TaskStarted { .. } => CoreEventKind::TaskStarted,
            CoreEvent::TaskFinished { .. } => CoreEventKind::TaskFinished,
            CoreEvent::RequestHideView { .. } => CoreEventKind::RequestHideView,
            CoreEvent::SettingsCommitted { .. } => CoreEventKind::SettingsCommitted,
            CoreEvent::SettingsReverted { .. } => CoreEventKind::SettingsReverted,
        }
    }
}

/// The application's event bus.
pub type CoreEventBus = EventBus<CoreEvent>;

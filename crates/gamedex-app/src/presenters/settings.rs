//! Settings dialog presenter
//!
//! Showing the dialog opens a snapshot on the repository. Edits made while
//! it is open are applied live but not written. Accept commits (one write),
//! cancel reverts (no write). Hiding the dialog any other way also reverts.

use crate::events::{CoreEvent, CoreEventBus};
use crate::session::{PresentationSession, Presenter, ViewProperty};
use crate::settings::{SettingsData, SettingsRepository};
use gamedex_core::BroadcastReceiveChannel;
use std::fmt;
use std::future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Whether the dialog may be accepted; `Err` carries the reason shown to the user.
pub type IsValid = Result<(), String>;

/// What a settings dialog exposes to its presenter.
pub trait SettingsView: Send + Sync + 'static {
    /// Id used when asking the host to close this view.
    fn view_id(&self) -> &str;

    /// Fires when the user presses accept.
    fn accept_actions(&self) -> &BroadcastReceiveChannel<()>;

    /// Fires when the user presses cancel.
    fn cancel_actions(&self) -> &BroadcastReceiveChannel<()>;

    /// Fires when the user asks to restore defaults.
    fn reset_defaults_actions(&self) -> &BroadcastReceiveChannel<()>;

    /// Whether accept is currently allowed.
    fn can_accept(&self) -> &ViewProperty<IsValid>;

    /// Ask the user to confirm restoring defaults.
    fn confirm_reset_defaults(&self) -> bool;
}

type Validator<D> = Arc<dyn Fn(&D) -> IsValid + Send + Sync>;

/// Presenter for a settings dialog over one repository.
pub struct SettingsPresenter<D> {
    repo: SettingsRepository<D>,
    bus: CoreEventBus,
    validate: Validator<D>,
}

impl<D: SettingsData> SettingsPresenter<D> {
    /// Create a presenter that accepts any value.
    pub fn new(repo: SettingsRepository<D>, bus: CoreEventBus) -> Self {
        Self {
            repo,
            bus,
            validate: Arc::new(|_| Ok(())),
        }
    }

    /// Block accept while `validate` rejects the current value.
    pub fn with_validation(
        mut self,
        validate: impl Fn(&D) -> IsValid + Send + Sync + 'static,
    ) -> Self {
        self.validate = Arc::new(validate);
        self
    }
}

impl<D: SettingsData, V: SettingsView> Presenter<V> for SettingsPresenter<D> {
    fn present(&self, view: Arc<V>) -> PresentationSession {
        let session = PresentationSession::new(format!("settings:{}", view.view_id()));
        let open = Arc::new(AtomicBool::new(false));

        {
            let repo = self.repo.clone();
            let open = open.clone();
            session.on_show(move || {
                repo.save_snapshot();
                open.store(true, Ordering::Release);
            });
        }

        {
            let repo = self.repo.clone();
            let bus = self.bus.clone();
            let open = open.clone();
            session.on_hide(move || {
                if open.swap(false, Ordering::AcqRel) {
                    debug!(namespace = repo.namespace(), "settings closed without accept, reverting");
                    repo.revert_snapshot();
                    bus.send(CoreEvent::SettingsReverted {
                        namespace: repo.namespace().to_string(),
                    });
                }
            });
        }

        {
            let validate = self.validate.clone();
            let view = view.clone();
            session.for_each_immediately(&self.repo.data_channel(), move |data: D| {
                view.can_accept().set(validate(&data));
            });
        }

        {
            let repo = self.repo.clone();
            let bus = self.bus.clone();
            let validate = self.validate.clone();
            let open = open.clone();
            let view_id = view.view_id().to_string();
            session.for_each(view.accept_actions().subscribe(), move |()| {
                future::ready(accept(&repo, &bus, &validate, &open, &view_id))
            });
        }

        {
            let repo = self.repo.clone();
            let bus = self.bus.clone();
            let open = open.clone();
            let view_id = view.view_id().to_string();
            session.for_each(view.cancel_actions().subscribe(), move |()| {
                if open.swap(false, Ordering::AcqRel) {
                    repo.revert_snapshot();
                    bus.send(CoreEvent::SettingsReverted {
                        namespace: repo.namespace().to_string(),
                    });
                }
                bus.send(CoreEvent::RequestHideView {
                    view_id: view_id.clone(),
                });
                future::ready(Ok(()))
            });
        }

        {
            let repo = self.repo.clone();
            let view_ref = view.clone();
            session.for_each(view.reset_defaults_actions().subscribe(), move |()| {
                let result = if view_ref.confirm_reset_defaults() {
                    repo.reset_defaults().map_err(anyhow::Error::from)
                } else {
                    Ok(())
                };
                future::ready(result)
            });
        }

        session
    }
}

fn accept<D: SettingsData>(
    repo: &SettingsRepository<D>,
    bus: &CoreEventBus,
    validate: &Validator<D>,
    open: &AtomicBool,
    view_id: &str,
) -> anyhow::Result<()> {
    if let Err(reason) = repo.with(|data| validate(data)) {
        debug!(namespace = repo.namespace(), %reason, "accept blocked by validation");
        return Ok(());
    }
    if !open.swap(false, Ordering::AcqRel) {
        debug!(namespace = repo.namespace(), "accept with no open dialog, ignoring");
        return Ok(());
    }
    repo.commit_snapshot()?;
    bus.send(CoreEvent::SettingsCommitted {
        namespace: repo.namespace().to_string(),
    });
    bus.send(CoreEvent::RequestHideView {
        view_id: view_id.to_string(),
    });
    Ok(())
}

impl<D> fmt::Debug for SettingsPresenter<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettingsPresenter")
            .field("repo", &self.repo)
            .finish_non_exhaustive()
    }
}

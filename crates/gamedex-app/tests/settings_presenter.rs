#![allow(missing_docs)]
//! Settings dialog flow: show, edit, accept or cancel, reset defaults.

use gamedex_app::settings::GeneralSettings;
use gamedex_app::{
    AppConfig, AppContext, CoreEvent, CoreEventKind, IsValid, PresentationSession, Presenter,
    SettingsPresenter, SettingsView, SnapshotState, ViewProperty,
};
use gamedex_core::{BroadcastReceiveChannel, EventSubscription, MemorySettingsStorage};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

struct TestView {
    accept: BroadcastReceiveChannel<()>,
    cancel: BroadcastReceiveChannel<()>,
    reset: BroadcastReceiveChannel<()>,
    can_accept: ViewProperty<IsValid>,
    confirm: AtomicBool,
}

impl TestView {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            accept: BroadcastReceiveChannel::new(),
            cancel: BroadcastReceiveChannel::new(),
            reset: BroadcastReceiveChannel::new(),
            can_accept: ViewProperty::new(Ok(())),
            confirm: AtomicBool::new(true),
        })
    }
}

impl SettingsView for TestView {
    fn view_id(&self) -> &str {
        "general-settings"
    }

    fn accept_actions(&self) -> &BroadcastReceiveChannel<()> {
        &self.accept
    }

    fn cancel_actions(&self) -> &BroadcastReceiveChannel<()> {
        &self.cancel
    }

    fn reset_defaults_actions(&self) -> &BroadcastReceiveChannel<()> {
        &self.reset
    }

    fn can_accept(&self) -> &ViewProperty<IsValid> {
        &self.can_accept
    }

    fn confirm_reset_defaults(&self) -> bool {
        self.confirm.load(Ordering::SeqCst)
    }
}

struct Harness {
    ctx: AppContext,
    storage: Arc<MemorySettingsStorage>,
    view: Arc<TestView>,
    session: PresentationSession,
}

fn harness() -> Harness {
    let storage = Arc::new(MemorySettingsStorage::new());
    let ctx = AppContext::with_storage(AppConfig::default(), storage.clone()).unwrap();
    let presenter = SettingsPresenter::new(ctx.general().repo().clone(), ctx.bus().clone())
        .with_validation(|s: &GeneralSettings| {
            if s.search_result_limit == 0 {
                Err("search result limit must be positive".to_string())
            } else {
                Ok(())
            }
        });
    let view = TestView::new();
    let session = presenter.present(view.clone());
    Harness {
        ctx,
        storage,
        view,
        session,
    }
}

fn collect(
    ctx: &AppContext,
    kind: CoreEventKind,
) -> (EventSubscription, mpsc::UnboundedReceiver<CoreEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let subscription = ctx.bus().on(kind, move |event| {
        let tx = tx.clone();
        async move {
            tx.send(event)?;
            Ok::<_, anyhow::Error>(())
        }
    });
    (subscription, rx)
}

async fn eventually(mut condition: impl FnMut() -> bool) {
    timeout(Duration::from_secs(1), async {
        while !condition() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn accept_commits_once_and_requests_hide() {
    let h = harness();
    let (_hide_sub, mut hides) = collect(&h.ctx, CoreEventKind::RequestHideView);
    let (_commit_sub, mut commits) = collect(&h.ctx, CoreEventKind::SettingsCommitted);

    h.session.show();
    assert_eq!(h.ctx.general().repo().snapshot_state(), SnapshotState::Snapshotted(1));

    h.ctx.general().set_search_result_limit(50).unwrap();
    h.ctx.general().set_log_tail(false).unwrap();
    assert_eq!(h.storage.persist_count("general"), 0);

    h.view.accept.send(());
    let hide = timeout(Duration::from_secs(1), hides.recv()).await.unwrap();
    assert_eq!(
        hide,
        Some(CoreEvent::RequestHideView {
            view_id: "general-settings".to_string()
        })
    );
    let commit = timeout(Duration::from_secs(1), commits.recv()).await.unwrap();
    assert_eq!(
        commit,
        Some(CoreEvent::SettingsCommitted {
            namespace: "general".to_string()
        })
    );

    assert_eq!(h.storage.persist_count("general"), 1);
    assert_eq!(h.ctx.general().repo().snapshot_state(), SnapshotState::Clean);

    // the host closes the view; nothing is reverted
    h.session.hide();
    assert_eq!(h.ctx.general().search_result_limit().get(), 50);
    h.session.destroy();
}

#[tokio::test]
async fn cancel_reverts_without_writing() {
    let h = harness();
    let (_hide_sub, mut hides) = collect(&h.ctx, CoreEventKind::RequestHideView);
    let (_revert_sub, mut reverts) = collect(&h.ctx, CoreEventKind::SettingsReverted);

    h.session.show();
    h.ctx.general().set_search_result_limit(50).unwrap();
    assert_eq!(h.ctx.general().search_result_limit().get(), 50);

    h.view.cancel.send(());
    timeout(Duration::from_secs(1), hides.recv()).await.unwrap();
    let reverted = timeout(Duration::from_secs(1), reverts.recv()).await.unwrap();
    assert!(matches!(reverted, Some(CoreEvent::SettingsReverted { .. })));

    assert_eq!(h.ctx.general().search_result_limit().get(), 10);
    assert_eq!(h.ctx.general().repo().snapshot_state(), SnapshotState::Clean);
    assert_eq!(h.storage.persist_count("general"), 0);
    h.session.destroy();
}

#[tokio::test]
async fn validation_blocks_accept_until_fixed() {
    let h = harness();
    h.session.show();
    assert_eq!(h.view.can_accept.get(), Ok(()));

    h.ctx.general().set_search_result_limit(0).unwrap();
    eventually(|| h.view.can_accept.get().is_err()).await;

    h.view.accept.send(());
    sleep(Duration::from_millis(50)).await;
    assert_eq!(h.ctx.general().repo().snapshot_state(), SnapshotState::Snapshotted(1));
    assert_eq!(h.storage.persist_count("general"), 0);

    h.ctx.general().set_search_result_limit(5).unwrap();
    eventually(|| h.view.can_accept.get().is_ok()).await;

    h.view.accept.send(());
    eventually(|| h.ctx.general().repo().snapshot_state() == SnapshotState::Clean).await;
    assert_eq!(h.storage.persist_count("general"), 1);
    h.session.destroy();
}

#[tokio::test]
async fn hiding_without_accept_reverts() {
    let h = harness();
    h.session.show();
    h.ctx.general().set_use_internal_browser(false).unwrap();

    h.session.hide();
    assert!(h.ctx.general().use_internal_browser().get());
    assert_eq!(h.ctx.general().repo().snapshot_state(), SnapshotState::Clean);
    assert_eq!(h.storage.persist_count("general"), 0);

    // showing again opens a fresh snapshot
    h.session.show();
    assert_eq!(h.ctx.general().repo().snapshot_state(), SnapshotState::Snapshotted(1));
    h.session.destroy();
    assert_eq!(h.ctx.general().repo().snapshot_state(), SnapshotState::Clean);
}

#[tokio::test]
async fn reset_defaults_is_part_of_the_dialog_transaction() {
    let h = harness();
    h.ctx.general().set_search_result_limit(30).unwrap();
    assert_eq!(h.storage.persist_count("general"), 1);

    h.session.show();
    h.view.reset.send(());
    eventually(|| h.ctx.general().search_result_limit().get() == 10).await;
    assert_eq!(h.storage.persist_count("general"), 1);

    h.view.cancel.send(());
    eventually(|| h.ctx.general().repo().snapshot_state() == SnapshotState::Clean).await;
    assert_eq!(h.ctx.general().search_result_limit().get(), 30);
    assert_eq!(h.storage.persist_count("general"), 1);
    h.session.destroy();
}

#[tokio::test]
async fn declined_reset_changes_nothing() {
    let h = harness();
    h.ctx.general().set_search_result_limit(30).unwrap();
    h.view.confirm.store(false, Ordering::SeqCst);

    h.session.show();
    h.view.reset.send(());
    sleep(Duration::from_millis(50)).await;
    assert_eq!(h.ctx.general().search_result_limit().get(), 30);
    h.session.destroy();
}

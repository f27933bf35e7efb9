//! Event bus delivery, isolation and cancellation

#![allow(missing_docs)]

use gamedex_core::{BusEvent, ErrorSink, EventBus, HandlerFailure};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

#[derive(Debug, Clone, PartialEq)]
enum TaskEvent {
    Started { id: u32 },
    Finished { id: u32, success: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum TaskEventKind {
    Started,
    Finished,
}

impl BusEvent for TaskEvent {
    type Kind = TaskEventKind;

    fn kind(&self) -> TaskEventKind {
        match self {
            TaskEvent::Started { .. } => TaskEventKind::Started,
            TaskEvent::Finished { .. } => TaskEventKind::Finished,
        }
    }
}

fn collecting_sink() -> (ErrorSink, Arc<Mutex<Vec<HandlerFailure>>>) {
    let failures = Arc::new(Mutex::new(Vec::new()));
    let collected = failures.clone();
    (
        ErrorSink::new(move |f| collected.lock().push(f.clone())),
        failures,
    )
}

#[tokio::test]
async fn handlers_receive_events_in_send_order() {
    let bus = EventBus::new();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _sub = bus.on(TaskEventKind::Started, move |event| {
        let tx = tx.clone();
        async move {
            if let TaskEvent::Started { id } = event {
                tx.send(id)?;
            }
            Ok(())
        }
    });

    for id in 0..20 {
        bus.send(TaskEvent::Started { id });
    }

    let mut seen = Vec::new();
    for _ in 0..20 {
        seen.push(timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap());
    }
    assert_eq!(seen, (0..20).collect::<Vec<_>>());
}

#[tokio::test]
async fn failing_handler_does_not_affect_others() {
    let (sink, failures) = collecting_sink();
    let bus = EventBus::with_error_sink(sink);
    let (tx, mut rx) = mpsc::unbounded_channel();

    fn explode() -> anyhow::Result<()> {
        panic!("handler exploded")
    }
    let _panicking = bus.on(TaskEventKind::Finished, |_| async { explode() });
    let _erroring = bus.on(TaskEventKind::Finished, |_| async {
        Err(anyhow::anyhow!("handler refused"))
    });
    let _healthy = bus.on(TaskEventKind::Finished, move |event| {
        let tx = tx.clone();
        async move {
            tx.send(event)?;
            Ok(())
        }
    });

    bus.send(TaskEvent::Finished {
        id: 1,
        success: true,
    });

    let got = timeout(Duration::from_secs(1), rx.recv()).await.unwrap();
    assert_eq!(
        got,
        Some(TaskEvent::Finished {
            id: 1,
            success: true
        })
    );

    sleep(Duration::from_millis(20)).await;
    let failures = failures.lock();
    assert_eq!(failures.len(), 2);
    assert!(failures.iter().any(|f| f.panicked && f.message == "handler exploded"));
    assert!(failures.iter().any(|f| !f.panicked && f.message == "handler refused"));
}

#[tokio::test]
async fn cancelled_handler_sees_no_later_events() {
    let bus = EventBus::new();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let sub = bus.on(TaskEventKind::Started, move |event| {
        let tx = tx.clone();
        async move {
            tx.send(event)?;
            Ok(())
        }
    });

    bus.send(TaskEvent::Started { id: 1 });
    assert!(timeout(Duration::from_secs(1), rx.recv()).await.unwrap().is_some());

    sub.cancel();
    bus.send(TaskEvent::Started { id: 2 });
    sleep(Duration::from_millis(20)).await;

    assert!(rx.try_recv().is_err());
    assert_eq!(bus.subscriber_count(TaskEventKind::Started), 0);
}

#[tokio::test]
async fn handler_may_cancel_itself() {
    let bus = EventBus::new();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let slot: Arc<Mutex<Option<gamedex_core::EventSubscription>>> = Arc::new(Mutex::new(None));

    let own = slot.clone();
    let sub = bus.on(TaskEventKind::Started, move |event| {
        let tx = tx.clone();
        let own = own.clone();
        async move {
            tx.send(event)?;
            if let Some(sub) = own.lock().as_ref() {
                sub.cancel();
            }
            Ok(())
        }
    });
    *slot.lock() = Some(sub);

    bus.send(TaskEvent::Started { id: 1 });
    bus.send(TaskEvent::Started { id: 2 });

    let first = timeout(Duration::from_secs(1), rx.recv()).await.unwrap();
    assert_eq!(first, Some(TaskEvent::Started { id: 1 }));
    sleep(Duration::from_millis(20)).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn abandoned_await_leaves_no_subscription() {
    let bus: EventBus<TaskEvent> = EventBus::new();

    let waited = timeout(
        Duration::from_millis(10),
        bus.await_event(TaskEventKind::Finished, |_| true),
    )
    .await;

    assert!(waited.is_err());
    assert_eq!(bus.subscriber_count(TaskEventKind::Finished), 0);
}

#[tokio::test]
async fn await_event_sees_only_later_events() {
    let bus = EventBus::new();
    bus.send(TaskEvent::Finished {
        id: 1,
        success: true,
    });

    let sender = bus.clone();
    tokio::spawn(async move {
        sleep(Duration::from_millis(5)).await;
        sender.send(TaskEvent::Finished {
            id: 2,
            success: false,
        });
    });

    let event = timeout(
        Duration::from_secs(1),
        bus.await_event(TaskEventKind::Finished, |_| true),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(
        event,
        TaskEvent::Finished {
            id: 2,
            success: false
        }
    );
}

use super::*;
use crate::transport::AbortController;
use anyhow::anyhow;
use serde_json::{json, Value};
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};
use studio_shared::{
    domain::LockState,
    protocol::{topics, CoreNotification, KeymapNotification, LightingNotification},
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

type Seen = Arc<Mutex<Vec<(String, Value)>>>;

fn record_topics(router: &NotificationRouter, topics: &[&str]) -> Seen {
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    for topic in topics {
        let sink = Arc::clone(&seen);
        let name = topic.to_string();
        router.subscribe(*topic, move |payload| {
            sink.lock()
                .expect("seen")
                .push((name.clone(), payload.clone()));
            Ok(())
        });
    }
    seen
}

fn unsaved(status: bool) -> Notification {
    Notification {
        keymap: Some(KeymapNotification {
            unsaved_changes_status_changed: Some(status),
        }),
        ..Notification::default()
    }
}

fn lock_state(state: LockState) -> Notification {
    Notification {
        core: Some(CoreNotification {
            lock_state_changed: Some(state),
        }),
        ..Notification::default()
    }
}

#[test]
fn unsaved_changes_envelope_publishes_coarse_then_fine() {
    let router = NotificationRouter::new();
    let seen = record_topics(
        &router,
        &[NOTIFICATION_TOPIC, topics::UNSAVED_CHANGES_STATUS_CHANGED],
    );

    let envelope: Notification =
        serde_json::from_value(json!({ "keymap": { "unsavedChangesStatusChanged": true } }))
            .expect("decode");
    assert_eq!(publish_notification(&router, &envelope), 2);

    let seen = seen.lock().expect("seen").clone();
    assert_eq!(
        seen,
        vec![
            (
                "rpc_notification".to_string(),
                json!({ "keymap": { "unsavedChangesStatusChanged": true } })
            ),
            (
                "rpc_notification.keymap.unsavedChangesStatusChanged".to_string(),
                json!(true)
            ),
        ]
    );
}

#[test]
fn envelopes_with_no_active_arm_publish_nothing() {
    let router = NotificationRouter::new();
    let seen = record_topics(&router, &[NOTIFICATION_TOPIC]);

    assert_eq!(publish_notification(&router, &Notification::default()), 0);
    let empty_subsystem = Notification {
        lighting: Some(LightingNotification::default()),
        ..Notification::default()
    };
    assert_eq!(publish_notification(&router, &empty_subsystem), 0);
    assert!(seen.lock().expect("seen").is_empty());
}

#[test]
fn identical_shapes_route_to_identical_topics() {
    let first = lock_state(LockState::Locked).active_event().expect("event");
    let second = lock_state(LockState::Unlocked).active_event().expect("event");
    assert_eq!(first.topic(), second.topic());
    assert_eq!(first.topic(), "rpc_notification.core.lockStateChanged");
    assert_ne!(first.topic(), unsaved(true).active_event().expect("event").topic());
}

#[tokio::test]
async fn publishes_in_arrival_order_until_end_of_stream() {
    let router = NotificationRouter::new();
    let seen = record_topics(
        &router,
        &[
            topics::UNSAVED_CHANGES_STATUS_CHANGED,
            topics::LOCK_STATE_CHANGED,
        ],
    );
    let controller = AbortController::new();

    let stream = futures::stream::iter(vec![
        Ok(unsaved(true)),
        Ok(Notification::default()),
        Ok(lock_state(LockState::Unlocked)),
        Ok(unsaved(false)),
    ]);
    let outcome = listen_for_notifications(stream, &router, controller.signal())
        .await
        .expect("listen");
    assert_eq!(outcome, ListenOutcome::EndOfStream);

    let payloads: Vec<Value> = seen
        .lock()
        .expect("seen")
        .iter()
        .map(|(_, payload)| payload.clone())
        .collect();
    assert_eq!(payloads, vec![json!(true), json!("UNLOCKED"), json!(false)]);
}

#[tokio::test]
async fn read_error_ends_the_loop_with_that_error() {
    let router = NotificationRouter::new();
    let controller = AbortController::new();
    let stream = futures::stream::iter(vec![
        Ok(unsaved(true)),
        Err(anyhow!("serial port unplugged")),
        Ok(unsaved(false)),
    ]);
    let seen = record_topics(&router, &[topics::UNSAVED_CHANGES_STATUS_CHANGED]);

    let err = listen_for_notifications(stream, &router, controller.signal())
        .await
        .expect_err("read failure");
    assert!(err.to_string().contains("serial port unplugged"));
    assert_eq!(seen.lock().expect("seen").len(), 1);
}

#[tokio::test]
async fn abort_while_blocked_on_read_stops_without_further_publishes() {
    let router = NotificationRouter::new();
    let seen = record_topics(&router, &[topics::UNSAVED_CHANGES_STATUS_CHANGED]);
    let controller = AbortController::new();
    let (tx, rx) = mpsc::channel::<anyhow::Result<Notification>>(8);

    let listener = {
        let router = router.clone();
        let signal = controller.signal();
        tokio::spawn(async move {
            listen_for_notifications(ReceiverStream::new(rx), &router, signal).await
        })
    };

    tx.send(Ok(unsaved(true))).await.expect("send");
    tokio::time::timeout(Duration::from_secs(1), async {
        while seen.lock().expect("seen").is_empty() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("first envelope published");

    controller.abort();
    let outcome = tokio::time::timeout(Duration::from_secs(1), listener)
        .await
        .expect("listener exits")
        .expect("join")
        .expect("no error past the abort");
    assert_eq!(outcome, ListenOutcome::Aborted);

    // The stream was released: the transport side sees it closed.
    assert!(tx.send(Ok(unsaved(false))).await.is_err());
    assert_eq!(seen.lock().expect("seen").len(), 1);
}

#[tokio::test]
async fn already_aborted_signal_reads_nothing() {
    let router = NotificationRouter::new();
    let seen = record_topics(&router, &[topics::UNSAVED_CHANGES_STATUS_CHANGED]);
    let controller = AbortController::new();
    controller.abort();

    let outcome = listen_for_notifications(
        futures::stream::iter(vec![Ok(unsaved(true))]),
        &router,
        controller.signal(),
    )
    .await
    .expect("listen");
    assert_eq!(outcome, ListenOutcome::Aborted);
    assert!(seen.lock().expect("seen").is_empty());
}

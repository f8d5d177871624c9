use super::*;
use anyhow::anyhow;
use serde_json::json;

fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> NotificationHandler) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let factory_log = Arc::clone(&log);
    let factory = move |name: &str| -> NotificationHandler {
        let log = Arc::clone(&factory_log);
        let name = name.to_string();
        Arc::new(move |payload: &Value| {
            log.lock().expect("log").push(format!("{name}:{payload}"));
            Ok::<(), anyhow::Error>(())
        })
    };
    (log, factory)
}

fn entries(log: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
    log.lock().expect("log").clone()
}

#[test]
fn publishes_to_topic_subscribers_in_registration_order() {
    let router = NotificationRouter::new();
    let (log, handler) = recorder();
    let first = handler("first");
    let second = handler("second");
    let other = handler("other");
    router.subscribe("rpc_notification.keymap.unsavedChangesStatusChanged", move |p| first(p));
    router.subscribe("rpc_notification.keymap.unsavedChangesStatusChanged", move |p| second(p));
    router.subscribe("rpc_notification.core.lockStateChanged", move |p| other(p));

    let delivered = router.publish(
        "rpc_notification.keymap.unsavedChangesStatusChanged",
        &json!(true),
    );

    assert_eq!(delivered, 2);
    assert_eq!(entries(&log), vec!["first:true", "second:true"]);
}

#[test]
fn publish_without_subscribers_delivers_nothing() {
    let router = NotificationRouter::new();
    assert_eq!(router.publish("rpc_notification.core.lockStateChanged", &json!(null)), 0);
}

#[test]
fn identical_handlers_unsubscribe_independently() {
    let router = NotificationRouter::new();
    let (log, handler) = recorder();
    let shared = handler("same");
    let a = {
        let shared = Arc::clone(&shared);
        router.subscribe("topic", move |p| shared(p))
    };
    let _b = router.subscribe("topic", move |p| shared(p));
    assert_eq!(router.subscriber_count("topic"), 2);

    assert!(a.unsubscribe());
    assert!(!a.unsubscribe());
    assert_eq!(router.subscriber_count("topic"), 1);

    router.publish("topic", &json!(1));
    assert_eq!(entries(&log), vec!["same:1"]);
}

#[test]
fn failing_or_panicking_subscriber_does_not_block_the_rest() {
    let router = NotificationRouter::new();
    let (log, handler) = recorder();
    let after = handler("after");

    router.subscribe("topic", |_| Err(anyhow!("handler rejected")));
    router.subscribe("topic", |_| panic!("handler blew up"));
    router.subscribe("topic", move |p| after(p));

    assert_eq!(router.publish("topic", &json!("x")), 3);
    assert_eq!(entries(&log), vec![r#"after:"x""#]);

    // The router is still usable for subsequent publishes.
    assert_eq!(router.publish("topic", &json!("y")), 3);
    assert_eq!(entries(&log).len(), 2);
}

#[test]
fn registrations_made_during_publish_apply_to_the_next_pass() {
    let router = NotificationRouter::new();
    let (log, handler) = recorder();
    let late = handler("late");
    let late = Arc::new(Mutex::new(Some(late)));

    let inner_router = router.clone();
    router.subscribe("topic", move |_| {
        if let Some(late) = late.lock().expect("late").take() {
            inner_router.subscribe("topic", move |p| late(p));
        }
        Ok(())
    });

    assert_eq!(router.publish("topic", &json!(1)), 1);
    assert!(entries(&log).is_empty());

    assert_eq!(router.publish("topic", &json!(2)), 2);
    assert_eq!(entries(&log), vec!["late:2"]);
}

#[test]
fn unsubscribing_during_publish_does_not_skip_the_current_pass() {
    let router = NotificationRouter::new();
    let (log, handler) = recorder();
    let victim_handler = handler("victim");
    let victim: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

    let remover = Arc::clone(&victim);
    router.subscribe("topic", move |_| {
        if let Some(subscription) = remover.lock().expect("victim").take() {
            subscription.unsubscribe();
        }
        Ok(())
    });
    *victim.lock().expect("victim") =
        Some(router.subscribe("topic", move |p| victim_handler(p)));

    router.publish("topic", &json!(1));
    assert_eq!(entries(&log), vec!["victim:1"]);

    router.publish("topic", &json!(2));
    assert_eq!(entries(&log), vec!["victim:1"]);
}

#[test]
fn typed_subscription_decodes_payload() {
    let router = NotificationRouter::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    router.subscribe_typed::<bool, _>("topic", move |unsaved| {
        sink.lock().expect("seen").push(unsaved);
        Ok(())
    });

    router.publish("topic", &json!(true));
    router.publish("topic", &json!("not a bool"));

    assert_eq!(*seen.lock().expect("seen"), vec![true]);
}

#[tokio::test]
async fn async_subscription_runs_on_the_runtime() {
    let router = NotificationRouter::new();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    router.subscribe_async("topic", move |payload| {
        let tx = tx.clone();
        async move {
            tx.send(payload).map_err(|_| anyhow!("receiver dropped"))?;
            Ok::<(), anyhow::Error>(())
        }
    });

    router.publish("topic", &json!({"on": true}));
    assert_eq!(rx.recv().await, Some(json!({"on": true})));
}

#[tokio::test]
async fn rejecting_async_subscriber_does_not_block_the_next_one() {
    let router = NotificationRouter::new();
    let attempts = Arc::new(Mutex::new(0usize));
    let counted = Arc::clone(&attempts);
    router.subscribe_async("topic", move |_| {
        let counted = Arc::clone(&counted);
        async move {
            *counted.lock().expect("attempts") += 1;
            Err::<(), anyhow::Error>(anyhow!("device went away"))
        }
    });
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    router.subscribe_async("topic", move |payload| {
        let tx = tx.clone();
        async move {
            tx.send(payload).map_err(|_| anyhow!("receiver dropped"))?;
            Ok::<(), anyhow::Error>(())
        }
    });

    assert_eq!(router.publish("topic", &json!(1)), 2);
    assert_eq!(router.publish("topic", &json!(2)), 2);

    assert_eq!(rx.recv().await, Some(json!(1)));
    assert_eq!(rx.recv().await, Some(json!(2)));
    tokio::task::yield_now().await;
    assert_eq!(*attempts.lock().expect("attempts"), 2);
}

#[test]
fn separate_routers_do_not_share_subscribers() {
    let first = NotificationRouter::new();
    let second = NotificationRouter::new();
    first.subscribe("topic", |_| Ok(()));

    assert_eq!(first.subscriber_count("topic"), 1);
    assert_eq!(second.subscriber_count("topic"), 0);
}

#[test]
fn subscription_outliving_router_unsubscribes_as_noop() {
    let router = NotificationRouter::new();
    let subscription = router.subscribe("topic", |_| Ok(()));
    assert_eq!(subscription.topic(), "topic");
    drop(router);
    assert!(!subscription.unsubscribe());
}

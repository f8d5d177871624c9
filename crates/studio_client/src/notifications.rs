//! Read loop that feeds the transport's notification stream into a router.

use anyhow::Result;
use futures::{Stream, StreamExt};
use studio_shared::protocol::{Notification, NOTIFICATION_TOPIC};
use tracing::{debug, info, warn};

use crate::{notification_router::NotificationRouter, transport::AbortSignal};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenOutcome {
    /// The connection's abort signal fired.
    Aborted,
    /// The transport ended the stream.
    EndOfStream,
}

/// Publishes one envelope: the raw envelope on [`NOTIFICATION_TOPIC`], then
/// its event payload on the event's own topic. Envelopes without an active
/// event are dropped. Returns the number of publishes made.
pub fn publish_notification(router: &NotificationRouter, envelope: &Notification) -> usize {
    let event = match envelope.active_event() {
        Ok(event) => event,
        Err(empty) => {
            debug!("notifications: dropping envelope ({empty})");
            return 0;
        }
    };

    let (raw, payload) = match (serde_json::to_value(envelope), event.payload()) {
        (Ok(raw), Ok(payload)) => (raw, payload),
        (Err(err), _) | (_, Err(err)) => {
            warn!(topic = event.topic(), "notifications: failed to encode payload: {err}");
            return 0;
        }
    };

    router.publish(NOTIFICATION_TOPIC, &raw);
    router.publish(event.topic(), &payload);
    2
}

/// Reads envelopes one at a time and publishes each before reading the next,
/// until the stream ends or `abort` fires. A read error ends the loop with
/// that error. The stream is dropped, and so cancelled, on every exit path.
pub async fn listen_for_notifications<S>(
    mut notifications: S,
    router: &NotificationRouter,
    mut abort: AbortSignal,
) -> Result<ListenOutcome>
where
    S: Stream<Item = Result<Notification>> + Unpin,
{
    let mut received: u64 = 0;
    let outcome = loop {
        if abort.is_aborted() {
            break ListenOutcome::Aborted;
        }
        let next = tokio::select! {
            biased;
            _ = abort.aborted() => break ListenOutcome::Aborted,
            next = notifications.next() => next,
        };
        match next {
            Some(Ok(envelope)) => {
                received += 1;
                debug!(?envelope, "notifications: received");
                publish_notification(router, &envelope);
            }
            Some(Err(err)) => {
                warn!(received, "notifications: stream read failed: {err:#}");
                return Err(err);
            }
            None => break ListenOutcome::EndOfStream,
        }
    };
    drop(notifications);
    info!(received, ?outcome, "notifications: listener stopped");
    Ok(outcome)
}

#[cfg(test)]
#[path = "tests/notifications_tests.rs"]
mod tests;

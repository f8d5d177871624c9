//! Topic-addressed fan-out for device notifications.

use std::{
    collections::HashMap,
    future::Future,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{Arc, Mutex, MutexGuard, Weak},
};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, warn};

pub type NotificationHandler = Arc<dyn Fn(&Value) -> Result<()> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

#[derive(Default)]
struct RouterState {
    next_id: u64,
    topics: HashMap<String, Vec<(SubscriberId, NotificationHandler)>>,
}

/// Routes published payloads to every handler registered for their topic.
///
/// One router belongs to one connection; clones share subscribers.
#[derive(Clone, Default)]
pub struct NotificationRouter {
    state: Arc<Mutex<RouterState>>,
}

/// Handle for exactly one registration made through [`NotificationRouter`].
///
/// Dropping it leaves the registration in place.
#[derive(Debug)]
pub struct Subscription {
    router: Weak<Mutex<RouterState>>,
    topic: String,
    id: SubscriberId,
}

impl Subscription {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Removes this registration. Returns false if it was already gone.
    pub fn unsubscribe(&self) -> bool {
        let Some(state) = self.router.upgrade() else {
            return false;
        };
        let mut state = state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let Some(handlers) = state.topics.get_mut(&self.topic) else {
            return false;
        };
        let before = handlers.len();
        handlers.retain(|(id, _)| *id != self.id);
        let removed = handlers.len() != before;
        if handlers.is_empty() {
            state.topics.remove(&self.topic);
        }
        removed
    }
}

impl NotificationRouter {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RouterState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn subscribe<F>(&self, topic: impl Into<String>, handler: F) -> Subscription
    where
        F: Fn(&Value) -> Result<()> + Send + Sync + 'static,
    {
        let topic = topic.into();
        let mut state = self.lock();
        state.next_id += 1;
        let id = SubscriberId(state.next_id);
        state
            .topics
            .entry(topic.clone())
            .or_default()
            .push((id, Arc::new(handler)));
        debug!(topic = %topic, subscriber = id.0, "router: subscribed");
        Subscription {
            router: Arc::downgrade(&self.state),
            topic,
            id,
        }
    }

    /// Subscribes with the payload decoded into `T` first. A payload that
    /// does not decode counts as a handler failure.
    pub fn subscribe_typed<T, F>(&self, topic: impl Into<String>, handler: F) -> Subscription
    where
        T: DeserializeOwned,
        F: Fn(T) -> Result<()> + Send + Sync + 'static,
    {
        let topic = topic.into();
        let context = format!("decoding payload for {topic}");
        self.subscribe(topic, move |payload| {
            let decoded = serde_json::from_value::<T>(payload.clone())
                .with_context(|| context.clone())?;
            handler(decoded)
        })
    }

    /// Subscribes a handler whose work is asynchronous. Each invocation is
    /// spawned onto the runtime; its failure is logged.
    pub fn subscribe_async<F, Fut>(&self, topic: impl Into<String>, handler: F) -> Subscription
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let topic = topic.into();
        let task_topic = topic.clone();
        self.subscribe(topic, move |payload| {
            let work = handler(payload.clone());
            let topic = task_topic.clone();
            tokio::spawn(async move {
                if let Err(err) = work.await {
                    warn!(topic = %topic, "router: async subscriber failed: {err:#}");
                }
            });
            Ok(())
        })
    }

    /// Invokes every handler registered for `topic`, in registration order,
    /// and returns how many ran. Registrations changed by a handler take
    /// effect from the next publish.
    pub fn publish(&self, topic: &str, payload: &Value) -> usize {
        let handlers: Vec<(SubscriberId, NotificationHandler)> = match self.lock().topics.get(topic)
        {
            Some(handlers) => handlers.clone(),
            None => return 0,
        };

        for (id, handler) in &handlers {
            match catch_unwind(AssertUnwindSafe(|| handler(payload))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    warn!(topic, subscriber = id.0, "router: subscriber failed: {err:#}");
                }
                Err(_) => {
                    error!(topic, subscriber = id.0, "router: subscriber panicked");
                }
            }
        }
        handlers.len()
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.lock().topics.get(topic).map_or(0, Vec::len)
    }
}

#[cfg(test)]
#[path = "tests/notification_router_tests.rs"]
mod tests;

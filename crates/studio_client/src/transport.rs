//! Boundary with the RPC transport: request/response calls, the notification
//! stream, and the per-connection abort signal.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use studio_shared::protocol::{Notification, Request, Response};
use tokio::sync::watch;

#[async_trait]
pub trait RpcTransport: Send + Sync {
    /// Issues one request. Several calls may be outstanding at once;
    /// correlating responses is the transport's job.
    async fn call(&self, request: Request) -> Result<Response>;

    /// Closes the request side. Called once on disconnect.
    async fn close(&self) -> Result<()>;
}

pub type NotificationStream = BoxStream<'static, Result<Notification>>;

/// A freshly established connection, as handed over by the transport layer.
pub struct RpcConnection {
    pub transport: Arc<dyn RpcTransport>,
    pub notifications: NotificationStream,
}

impl RpcConnection {
    pub fn new(transport: Arc<dyn RpcTransport>, notifications: NotificationStream) -> Self {
        Self {
            transport,
            notifications,
        }
    }
}

/// Owner side of a connection-scoped cancellation signal.
#[derive(Debug)]
pub struct AbortController {
    tx: watch::Sender<bool>,
}

/// Observer side of an [`AbortController`]. Cheap to clone.
#[derive(Debug, Clone)]
pub struct AbortSignal {
    rx: watch::Receiver<bool>,
}

impl Default for AbortController {
    fn default() -> Self {
        Self::new()
    }
}

impl AbortController {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    pub fn signal(&self) -> AbortSignal {
        AbortSignal {
            rx: self.tx.subscribe(),
        }
    }

    /// Fires the signal. Idempotent.
    pub fn abort(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_aborted(&self) -> bool {
        *self.tx.borrow()
    }
}

impl AbortSignal {
    pub fn is_aborted(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the signal fires. A dropped controller counts as
    /// aborted: nothing is left to tear the connection down otherwise.
    pub async fn aborted(&mut self) {
        let _ = self.rx.wait_for(|aborted| *aborted).await;
    }
}

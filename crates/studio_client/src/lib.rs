pub mod command_stack;
pub mod config;
pub mod controller;
pub mod error;
pub mod hid;
pub mod notification_router;
pub mod notifications;
pub mod parameters;
pub mod transport;

pub use command_stack::{Action, CommandStack, HistoryEntry, HistoryStatus, Inverse};
pub use config::{load_settings, SyncSettings};
pub use controller::{DeviceMirror, DeviceSyncController};
pub use error::SyncError;
pub use notification_router::{NotificationRouter, Subscription};
pub use notifications::{listen_for_notifications, publish_notification, ListenOutcome};
pub use parameters::{validate_binding, validate_value};
pub use transport::{AbortController, AbortSignal, RpcConnection, RpcTransport};

//! Connected-device session: connects a transport, keeps a [`DeviceMirror`]
//! in step with device notifications, and routes keymap edits through the
//! undo/redo history.

mod edits;
mod link;
mod mirror;

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use studio_shared::{
    domain::{
        BacklightState, BacklightUpdate, BehaviorBinding, DeviceInfo, LockState,
        RgbUnderglowState, RgbUnderglowUpdate,
    },
    protocol::topics,
};
use tokio::{sync::Mutex, task::JoinHandle};
use tracing::{info, warn};

use self::{link::DeviceLink, mirror::SharedMirror};
use crate::{
    command_stack::CommandStack,
    config::SyncSettings,
    error::SyncError,
    notification_router::{NotificationRouter, Subscription},
    notifications::{listen_for_notifications, ListenOutcome},
    parameters::check_binding,
    transport::{AbortController, AbortSignal, NotificationStream, RpcConnection},
};

pub use self::mirror::DeviceMirror;

struct ActiveSession {
    id: u64,
    link: DeviceLink,
    abort: AbortController,
    listener: JoinHandle<()>,
    subscriptions: Vec<Subscription>,
}

pub struct DeviceSyncController {
    settings: SyncSettings,
    router: NotificationRouter,
    history: CommandStack,
    mirror: SharedMirror,
    session: Mutex<Option<ActiveSession>>,
    next_session: AtomicU64,
}

impl DeviceSyncController {
    pub fn new(settings: SyncSettings) -> Arc<Self> {
        Self::with_router(settings, NotificationRouter::new())
    }

    /// Uses a router the caller already holds subscriptions on.
    pub fn with_router(settings: SyncSettings, router: NotificationRouter) -> Arc<Self> {
        Arc::new(Self {
            settings,
            router,
            history: CommandStack::new(),
            mirror: SharedMirror::default(),
            session: Mutex::new(None),
            next_session: AtomicU64::new(1),
        })
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn router(&self) -> &NotificationRouter {
        &self.router
    }

    pub fn history(&self) -> &CommandStack {
        &self.history
    }

    /// Snapshot of the mirrored device state.
    pub fn mirror(&self) -> DeviceMirror {
        mirror::read(&self.mirror).clone()
    }

    pub async fn is_connected(&self) -> bool {
        self.session.lock().await.is_some()
    }

    /// Replaces any current session with `connection`. The device must
    /// answer `core.getDeviceInfo` within the configured timeout; otherwise
    /// the new transport is closed and the controller is left disconnected,
    /// since the previous session was already torn down.
    pub async fn connect(
        self: &Arc<Self>,
        connection: RpcConnection,
    ) -> Result<DeviceInfo, SyncError> {
        self.disconnect().await;

        let RpcConnection {
            transport,
            notifications,
        } = connection;
        let link = DeviceLink::new(transport, Arc::clone(&self.mirror));
        let timeout = self.settings.device_info_timeout;
        let info = match tokio::time::timeout(timeout, link.device_info()).await {
            Ok(Ok(info)) => info,
            Ok(Err(err)) => {
                warn!("connect: device info request failed: {err}");
                link.close().await;
                return Err(err);
            }
            Err(_) => {
                warn!(?timeout, "connect: device did not answer in time");
                link.close().await;
                return Err(SyncError::DeviceUnresponsive {
                    request: "core.getDeviceInfo",
                    timeout_ms: timeout.as_millis(),
                });
            }
        };

        self.history.reset();
        *mirror::write(&self.mirror) = DeviceMirror {
            device_info: Some(info.clone()),
            ..DeviceMirror::default()
        };

        let id = self.next_session.fetch_add(1, Ordering::Relaxed);
        {
            let mut session = self.session.lock().await;
            let abort = AbortController::new();
            let subscriptions = self.subscribe_mirror(&link);
            let listener = self.spawn_listener(id, notifications, abort.signal());
            *session = Some(ActiveSession {
                id,
                link: link.clone(),
                abort,
                listener,
                subscriptions,
            });
        }
        info!(session = id, device = %info.name, "connect: device session started");

        if let Err(err) = self.sync_lock_state(&link).await {
            warn!(session = id, "connect: initial lock state read failed: {err}");
        }
        Ok(info)
    }

    /// Ends the current session, if any: cancels the notification reader,
    /// drops this session's subscriptions, closes the transport, and clears
    /// history and mirror.
    pub async fn disconnect(&self) {
        let session = self.session.lock().await.take();
        let Some(session) = session else {
            return;
        };
        let id = session.id;
        let listener = self.teardown(session).await;
        if let Err(err) = listener.await {
            warn!(session = id, "disconnect: listener task failed: {err}");
        }
        info!(session = id, "disconnect: device session closed");
    }

    async fn end_session(&self, id: u64) {
        let session = {
            let mut guard = self.session.lock().await;
            if guard.as_ref().map(|session| session.id) == Some(id) {
                guard.take()
            } else {
                None
            }
        };
        if let Some(session) = session {
            warn!(session = id, "session: device stream ended, dropping session");
            // Running on the listener itself, so its handle is not awaited.
            let _listener = self.teardown(session).await;
        }
    }

    async fn teardown(&self, session: ActiveSession) -> JoinHandle<()> {
        session.abort.abort();
        for subscription in &session.subscriptions {
            subscription.unsubscribe();
        }
        session.link.close().await;
        self.history.reset();
        *mirror::write(&self.mirror) = DeviceMirror::default();
        session.listener
    }

    fn spawn_listener(
        self: &Arc<Self>,
        id: u64,
        notifications: NotificationStream,
        signal: AbortSignal,
    ) -> JoinHandle<()> {
        let controller = Arc::downgrade(self);
        let router = self.router.clone();
        tokio::spawn(async move {
            match listen_for_notifications(notifications, &router, signal).await {
                Ok(ListenOutcome::Aborted) => return,
                Ok(ListenOutcome::EndOfStream) => {}
                Err(err) => warn!(session = id, "session: notification read failed: {err:#}"),
            }
            if let Some(controller) = controller.upgrade() {
                controller.end_session(id).await;
            }
        })
    }

    fn subscribe_mirror(self: &Arc<Self>, link: &DeviceLink) -> Vec<Subscription> {
        let mut subscriptions = Vec::with_capacity(4);

        let shared = Arc::clone(&self.mirror);
        let controller = Arc::downgrade(self);
        let reload_link = link.clone();
        subscriptions.push(self.router.subscribe_typed(
            topics::LOCK_STATE_CHANGED,
            move |state: LockState| {
                let previous = {
                    let mut mirror = mirror::write(&shared);
                    let previous = std::mem::replace(&mut mirror.lock_state, state);
                    if state == LockState::Locked {
                        mirror.forget_unlocked_data();
                    }
                    previous
                };
                info!(?previous, ?state, "lock: state changed");
                if previous != LockState::Unlocked && state == LockState::Unlocked {
                    if let Some(controller) = controller.upgrade() {
                        let link = reload_link.clone();
                        tokio::spawn(async move {
                            if let Err(err) = controller.load_device_data(&link).await {
                                warn!("lock: reload after unlock failed: {err}");
                            }
                        });
                    }
                }
                Ok(())
            },
        ));

        let shared = Arc::clone(&self.mirror);
        subscriptions.push(self.router.subscribe_typed(
            topics::UNSAVED_CHANGES_STATUS_CHANGED,
            move |unsaved: bool| {
                mirror::write(&shared).unsaved_changes = unsaved;
                Ok(())
            },
        ));

        let shared = Arc::clone(&self.mirror);
        subscriptions.push(self.router.subscribe_typed(
            topics::RGB_UNDERGLOW_STATE_CHANGED,
            move |state: RgbUnderglowState| {
                mirror::write(&shared).rgb_underglow = Some(state);
                Ok(())
            },
        ));

        let shared = Arc::clone(&self.mirror);
        subscriptions.push(self.router.subscribe_typed(
            topics::BACKLIGHT_STATE_CHANGED,
            move |state: BacklightState| {
                mirror::write(&shared).backlight = Some(state);
                Ok(())
            },
        ));

        subscriptions
    }

    async fn load_device_data(&self, link: &DeviceLink) -> Result<(), SyncError> {
        let keymap = link.load_keymap().await?;
        let unsaved = link.check_unsaved_changes().await?;
        let behaviors = link.load_behaviors().await?;
        link.load_lighting().await;
        info!(
            layers = keymap.layers.len(),
            behaviors,
            unsaved,
            "sync: device data loaded"
        );
        Ok(())
    }

    /// Reads the lock state into the mirror, loading device data when the
    /// device has just become unlocked.
    async fn sync_lock_state(&self, link: &DeviceLink) -> Result<LockState, SyncError> {
        let previous = mirror::read(&self.mirror).lock_state;
        let state = link.lock_state().await?;
        if previous != LockState::Unlocked && state == LockState::Unlocked {
            self.load_device_data(link).await?;
        }
        Ok(state)
    }

    async fn connected_link(&self) -> Result<DeviceLink, SyncError> {
        self.session
            .lock()
            .await
            .as_ref()
            .map(|session| session.link.clone())
            .ok_or(SyncError::NotConnected)
    }

    async fn editable_link(&self) -> Result<DeviceLink, SyncError> {
        let link = self.connected_link().await?;
        let unlocked = mirror::read(&self.mirror).is_unlocked();
        if !unlocked {
            return Err(SyncError::Locked);
        }
        Ok(link)
    }

    pub async fn refresh_lock_state(&self) -> Result<LockState, SyncError> {
        let link = self.connected_link().await?;
        self.sync_lock_state(&link).await
    }

    /// Validates `binding` against the behavior's parameter schema and, if it
    /// passes, records the change in history. The returned task settles once
    /// the device has answered.
    pub async fn set_layer_binding(
        &self,
        layer_index: usize,
        key_position: usize,
        binding: BehaviorBinding,
    ) -> Result<JoinHandle<()>, SyncError> {
        let link = self.editable_link().await?;
        let (layer_id, previous) = {
            let mirror = mirror::read(&self.mirror);
            let keymap = mirror.keymap.as_ref().ok_or(SyncError::KeymapUnavailable)?;
            let layer = keymap
                .layers
                .get(layer_index)
                .ok_or(SyncError::LayerOutOfRange {
                    index: layer_index,
                    len: keymap.layers.len(),
                })?;
            let previous = *layer.bindings.get(key_position).ok_or(
                SyncError::KeyPositionOutOfRange {
                    layer_index,
                    position: key_position,
                    len: layer.bindings.len(),
                },
            )?;
            let behavior = mirror
                .behaviors
                .get(&binding.behavior_id)
                .ok_or(SyncError::UnknownBehavior(binding.behavior_id))?;
            check_binding(
                &behavior.metadata,
                &keymap.layer_ids(),
                Some(binding.param1),
                Some(binding.param2),
            )
            .map_err(|issue| SyncError::InvalidBinding {
                behavior_id: binding.behavior_id,
                param1: binding.param1,
                param2: binding.param2,
                issue,
            })?;
            (layer.id, previous)
        };

        Ok(self.history.do_it(edits::set_binding(
            link,
            layer_id,
            key_position as u32,
            binding,
            previous,
        )))
    }

    pub async fn add_layer(&self) -> Result<JoinHandle<()>, SyncError> {
        let link = self.editable_link().await?;
        {
            let mirror = mirror::read(&self.mirror);
            let keymap = mirror.keymap.as_ref().ok_or(SyncError::KeymapUnavailable)?;
            if keymap.available_layers == 0 {
                return Err(SyncError::NoLayerSpace);
            }
        }
        Ok(self.history.do_it(edits::add_layer(link)))
    }

    pub async fn remove_layer(&self, layer_index: usize) -> Result<JoinHandle<()>, SyncError> {
        let link = self.editable_link().await?;
        let layer_id = {
            let mirror = mirror::read(&self.mirror);
            let keymap = mirror.keymap.as_ref().ok_or(SyncError::KeymapUnavailable)?;
            keymap
                .layers
                .get(layer_index)
                .map(|layer| layer.id)
                .ok_or(SyncError::LayerOutOfRange {
                    index: layer_index,
                    len: keymap.layers.len(),
                })?
        };
        Ok(self
            .history
            .do_it(edits::remove_layer(link, layer_index as u32, layer_id)))
    }

    pub async fn rename_layer(
        &self,
        layer_index: usize,
        name: impl Into<String>,
    ) -> Result<JoinHandle<()>, SyncError> {
        let name = name.into();
        let link = self.editable_link().await?;
        let (layer_id, previous) = {
            let mirror = mirror::read(&self.mirror);
            let keymap = mirror.keymap.as_ref().ok_or(SyncError::KeymapUnavailable)?;
            let max = keymap.max_layer_name_length;
            if max > 0 && name.chars().count() > max as usize {
                return Err(SyncError::LayerNameTooLong { max });
            }
            let layer = keymap
                .layers
                .get(layer_index)
                .ok_or(SyncError::LayerOutOfRange {
                    index: layer_index,
                    len: keymap.layers.len(),
                })?;
            (layer.id, layer.name.clone())
        };
        Ok(self
            .history
            .do_it(edits::rename_layer(link, layer_id, name, previous)))
    }

    pub async fn move_layer(
        &self,
        start_index: usize,
        dest_index: usize,
    ) -> Result<JoinHandle<()>, SyncError> {
        let link = self.editable_link().await?;
        {
            let mirror = mirror::read(&self.mirror);
            let keymap = mirror.keymap.as_ref().ok_or(SyncError::KeymapUnavailable)?;
            let len = keymap.layers.len();
            for index in [start_index, dest_index] {
                if index >= len {
                    return Err(SyncError::LayerOutOfRange { index, len });
                }
            }
        }
        Ok(self.history.do_it(edits::move_layer(
            link,
            start_index as u32,
            dest_index as u32,
        )))
    }

    /// Persists pending keymap changes on the device. History is kept.
    pub async fn save_changes(&self) -> Result<(), SyncError> {
        let link = self.editable_link().await?;
        link.save_changes().await?;
        info!("keymap: changes saved");
        Ok(())
    }

    /// Reverts the device to its saved keymap, then re-reads it once the
    /// device has had time to reload. History no longer applies afterwards
    /// and is cleared.
    pub async fn discard_changes(&self) -> Result<(), SyncError> {
        let link = self.editable_link().await?;
        link.discard_changes().await?;
        self.history.reset();
        tokio::time::sleep(self.settings.discard_reload_delay).await;
        link.load_keymap().await?;
        mirror::write(&self.mirror).unsaved_changes = false;
        info!("keymap: changes discarded");
        Ok(())
    }

    /// Restores factory settings. History is cleared and device data
    /// re-read even when the device reports failure.
    pub async fn reset_settings(&self) -> Result<(), SyncError> {
        let link = self.connected_link().await?;
        let outcome = link.reset_settings().await;
        if let Err(err) = &outcome {
            warn!("settings: reset failed: {err}");
        }
        self.history.reset();
        let unlocked = mirror::read(&self.mirror).is_unlocked();
        if unlocked {
            if let Err(err) = self.load_device_data(&link).await {
                warn!("settings: reload after reset failed: {err}");
            }
        }
        outcome
    }

    pub async fn set_rgb_underglow(
        &self,
        update: RgbUnderglowUpdate,
    ) -> Result<RgbUnderglowState, SyncError> {
        let link = self.connected_link().await?;
        link.set_rgb_underglow(update).await
    }

    pub async fn set_backlight(&self, update: BacklightUpdate) -> Result<BacklightState, SyncError> {
        let link = self.connected_link().await?;
        link.set_backlight(update).await
    }
}

#[cfg(test)]
#[path = "../tests/controller_tests.rs"]
mod tests;

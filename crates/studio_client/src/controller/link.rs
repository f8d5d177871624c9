use std::{collections::BTreeMap, sync::Arc};

use futures::future::try_join_all;
use studio_shared::{
    behaviors::BehaviorDetails,
    domain::{
        BacklightState, BacklightUpdate, BehaviorBinding, BehaviorId, DeviceInfo, Keymap, Layer,
        LayerId, LockState, RgbUnderglowState, RgbUnderglowUpdate,
    },
    protocol::{
        AddedLayer, BehaviorsRequest, BehaviorsResponse, CoreRequest, CoreResponse,
        KeymapOutcome, KeymapRequest, KeymapResponse, LightingRequest, LightingResponse, Request,
        Response,
    },
};
use tracing::{debug, info, warn};

use super::mirror::{self, SharedMirror};
use crate::{error::SyncError, transport::RpcTransport};

/// Typed calls against one connected device. Every successful call that
/// changes device state also folds the change into the mirror.
#[derive(Clone)]
pub(crate) struct DeviceLink {
    transport: Arc<dyn RpcTransport>,
    mirror: SharedMirror,
}

fn accepted<T>(request: &'static str, outcome: KeymapOutcome<T>) -> Result<T, SyncError> {
    outcome.into_result().map_err(|code| {
        warn!(request, ?code, "keymap: device rejected edit");
        SyncError::Rejected { request, code }
    })
}

fn succeeded(request: &'static str, ok: bool) -> Result<(), SyncError> {
    if ok {
        Ok(())
    } else {
        warn!(request, "rpc: device reported failure");
        Err(SyncError::Failed { request })
    }
}

impl DeviceLink {
    pub(crate) fn new(transport: Arc<dyn RpcTransport>, mirror: SharedMirror) -> Self {
        Self { transport, mirror }
    }

    pub(crate) async fn close(&self) {
        if let Err(err) = self.transport.close().await {
            warn!("rpc: closing transport failed: {err:#}");
        }
    }

    async fn call(&self, request: Request) -> Result<Response, SyncError> {
        let name = request.name();
        debug!(request = name, "rpc: call");
        let response = self.transport.call(request).await.map_err(|err| {
            warn!(request = name, "rpc: call failed: {err:#}");
            SyncError::Transport(err)
        })?;
        if let Response::Meta(error) = response {
            warn!(request = name, code = ?error.code, message = %error.message, "rpc: device error");
            return Err(SyncError::remote(name, error));
        }
        Ok(response)
    }

    pub(crate) async fn device_info(&self) -> Result<DeviceInfo, SyncError> {
        let request = Request::Core(CoreRequest::GetDeviceInfo);
        let name = request.name();
        match self.call(request).await? {
            Response::Core(CoreResponse::GetDeviceInfo(info)) => Ok(info),
            _ => Err(SyncError::UnexpectedResponse { request: name }),
        }
    }

    pub(crate) async fn lock_state(&self) -> Result<LockState, SyncError> {
        let request = Request::Core(CoreRequest::GetLockState);
        let name = request.name();
        let state = match self.call(request).await? {
            Response::Core(CoreResponse::GetLockState(state)) => state,
            _ => return Err(SyncError::UnexpectedResponse { request: name }),
        };
        let mut mirror = mirror::write(&self.mirror);
        mirror.lock_state = state;
        if state == LockState::Locked {
            mirror.forget_unlocked_data();
        }
        Ok(state)
    }

    pub(crate) async fn reset_settings(&self) -> Result<(), SyncError> {
        let request = Request::Core(CoreRequest::ResetSettings);
        let name = request.name();
        match self.call(request).await? {
            Response::Core(CoreResponse::ResetSettings(ok)) => succeeded(name, ok),
            _ => Err(SyncError::UnexpectedResponse { request: name }),
        }
    }

    pub(crate) async fn load_keymap(&self) -> Result<Keymap, SyncError> {
        let request = Request::Keymap(KeymapRequest::GetKeymap);
        let name = request.name();
        let keymap = match self.call(request).await? {
            Response::Keymap(KeymapResponse::GetKeymap(keymap)) => keymap,
            _ => return Err(SyncError::UnexpectedResponse { request: name }),
        };
        mirror::write(&self.mirror).keymap = Some(keymap.clone());
        Ok(keymap)
    }

    async fn behavior_details(&self, behavior_id: BehaviorId) -> Result<BehaviorDetails, SyncError> {
        let request = Request::Behaviors(BehaviorsRequest::GetBehaviorDetails { behavior_id });
        let name = request.name();
        match self.call(request).await? {
            Response::Behaviors(BehaviorsResponse::GetBehaviorDetails(details)) => Ok(details),
            _ => Err(SyncError::UnexpectedResponse { request: name }),
        }
    }

    pub(crate) async fn load_behaviors(&self) -> Result<usize, SyncError> {
        let request = Request::Behaviors(BehaviorsRequest::ListAllBehaviors);
        let name = request.name();
        let ids = match self.call(request).await? {
            Response::Behaviors(BehaviorsResponse::ListAllBehaviors(ids)) => ids,
            _ => return Err(SyncError::UnexpectedResponse { request: name }),
        };
        let details = try_join_all(ids.into_iter().map(|id| self.behavior_details(id))).await?;
        let behaviors: BTreeMap<BehaviorId, BehaviorDetails> = details
            .into_iter()
            .map(|details| (details.id, details))
            .collect();
        let count = behaviors.len();
        mirror::write(&self.mirror).behaviors = behaviors;
        Ok(count)
    }

    /// Lighting subsystems are optional on the device, so a failed read
    /// leaves that subsystem absent from the mirror instead of failing.
    pub(crate) async fn load_lighting(&self) {
        let request = Request::Lighting(LightingRequest::GetRgbUnderglowState);
        let rgb = match self.call(request).await {
            Ok(Response::Lighting(LightingResponse::GetRgbUnderglowState(state))) => Some(state),
            Ok(_) => None,
            Err(err) => {
                info!("lighting: no rgb underglow: {err}");
                None
            }
        };
        let request = Request::Lighting(LightingRequest::GetBacklightState);
        let backlight = match self.call(request).await {
            Ok(Response::Lighting(LightingResponse::GetBacklightState(state))) => Some(state),
            Ok(_) => None,
            Err(err) => {
                info!("lighting: no backlight: {err}");
                None
            }
        };
        let mut mirror = mirror::write(&self.mirror);
        mirror.rgb_underglow = rgb;
        mirror.backlight = backlight;
    }

    pub(crate) async fn set_layer_binding(
        &self,
        layer_id: LayerId,
        key_position: u32,
        binding: BehaviorBinding,
    ) -> Result<(), SyncError> {
        let request = Request::Keymap(KeymapRequest::SetLayerBinding {
            layer_id,
            key_position,
            binding,
        });
        let name = request.name();
        match self.call(request).await? {
            Response::Keymap(KeymapResponse::SetLayerBinding(outcome)) => accepted(name, outcome)?,
            _ => return Err(SyncError::UnexpectedResponse { request: name }),
        }
        let mut mirror = mirror::write(&self.mirror);
        if let Some(slot) = mirror
            .keymap
            .as_mut()
            .and_then(|keymap| keymap.layers.iter_mut().find(|layer| layer.id == layer_id))
            .and_then(|layer| layer.bindings.get_mut(key_position as usize))
        {
            *slot = binding;
        }
        mirror.unsaved_changes = true;
        Ok(())
    }

    pub(crate) async fn add_layer(&self) -> Result<AddedLayer, SyncError> {
        let request = Request::Keymap(KeymapRequest::AddLayer);
        let name = request.name();
        let added = match self.call(request).await? {
            Response::Keymap(KeymapResponse::AddLayer(outcome)) => accepted(name, outcome)?,
            _ => return Err(SyncError::UnexpectedResponse { request: name }),
        };
        self.insert_layer(added.index, added.layer.clone());
        Ok(added)
    }

    pub(crate) async fn remove_layer(&self, layer_index: u32) -> Result<(), SyncError> {
        let request = Request::Keymap(KeymapRequest::RemoveLayer { layer_index });
        let name = request.name();
        match self.call(request).await? {
            Response::Keymap(KeymapResponse::RemoveLayer(outcome)) => accepted(name, outcome)?,
            _ => return Err(SyncError::UnexpectedResponse { request: name }),
        }
        let mut mirror = mirror::write(&self.mirror);
        if let Some(keymap) = mirror.keymap.as_mut() {
            let index = layer_index as usize;
            if index < keymap.layers.len() {
                keymap.layers.remove(index);
                keymap.available_layers += 1;
            }
        }
        mirror.unsaved_changes = true;
        Ok(())
    }

    pub(crate) async fn restore_layer(
        &self,
        layer_id: LayerId,
        at_index: u32,
    ) -> Result<Layer, SyncError> {
        let request = Request::Keymap(KeymapRequest::RestoreLayer { layer_id, at_index });
        let name = request.name();
        let layer = match self.call(request).await? {
            Response::Keymap(KeymapResponse::RestoreLayer(outcome)) => accepted(name, outcome)?,
            _ => return Err(SyncError::UnexpectedResponse { request: name }),
        };
        self.insert_layer(at_index, layer.clone());
        Ok(layer)
    }

    fn insert_layer(&self, index: u32, layer: Layer) {
        let mut mirror = mirror::write(&self.mirror);
        if let Some(keymap) = mirror.keymap.as_mut() {
            let index = (index as usize).min(keymap.layers.len());
            keymap.layers.insert(index, layer);
            keymap.available_layers = keymap.available_layers.saturating_sub(1);
        }
        mirror.unsaved_changes = true;
    }

    pub(crate) async fn set_layer_name(
        &self,
        layer_id: LayerId,
        layer_name: String,
    ) -> Result<(), SyncError> {
        let request = Request::Keymap(KeymapRequest::SetLayerProps {
            layer_id,
            name: layer_name.clone(),
        });
        let name = request.name();
        match self.call(request).await? {
            Response::Keymap(KeymapResponse::SetLayerProps(outcome)) => accepted(name, outcome)?,
            _ => return Err(SyncError::UnexpectedResponse { request: name }),
        }
        let mut mirror = mirror::write(&self.mirror);
        if let Some(layer) = mirror
            .keymap
            .as_mut()
            .and_then(|keymap| keymap.layers.iter_mut().find(|layer| layer.id == layer_id))
        {
            layer.name = layer_name;
        }
        mirror.unsaved_changes = true;
        Ok(())
    }

    pub(crate) async fn move_layer(&self, start_index: u32, dest_index: u32) -> Result<(), SyncError> {
        let request = Request::Keymap(KeymapRequest::MoveLayer {
            start_index,
            dest_index,
        });
        let name = request.name();
        let keymap = match self.call(request).await? {
            Response::Keymap(KeymapResponse::MoveLayer(outcome)) => accepted(name, outcome)?,
            _ => return Err(SyncError::UnexpectedResponse { request: name }),
        };
        let mut mirror = mirror::write(&self.mirror);
        mirror.keymap = Some(keymap);
        mirror.unsaved_changes = true;
        Ok(())
    }

    pub(crate) async fn save_changes(&self) -> Result<(), SyncError> {
        let request = Request::Keymap(KeymapRequest::SaveChanges);
        let name = request.name();
        match self.call(request).await? {
            Response::Keymap(KeymapResponse::SaveChanges(outcome)) => accepted(name, outcome)?,
            _ => return Err(SyncError::UnexpectedResponse { request: name }),
        }
        mirror::write(&self.mirror).unsaved_changes = false;
        Ok(())
    }

    pub(crate) async fn check_unsaved_changes(&self) -> Result<bool, SyncError> {
        let request = Request::Keymap(KeymapRequest::CheckUnsavedChanges);
        let name = request.name();
        let unsaved = match self.call(request).await? {
            Response::Keymap(KeymapResponse::CheckUnsavedChanges(unsaved)) => unsaved,
            _ => return Err(SyncError::UnexpectedResponse { request: name }),
        };
        mirror::write(&self.mirror).unsaved_changes = unsaved;
        Ok(unsaved)
    }

    pub(crate) async fn discard_changes(&self) -> Result<(), SyncError> {
        let request = Request::Keymap(KeymapRequest::DiscardChanges);
        let name = request.name();
        match self.call(request).await? {
            Response::Keymap(KeymapResponse::DiscardChanges(ok)) => succeeded(name, ok),
            _ => Err(SyncError::UnexpectedResponse { request: name }),
        }
    }

    pub(crate) async fn set_rgb_underglow(
        &self,
        update: RgbUnderglowUpdate,
    ) -> Result<RgbUnderglowState, SyncError> {
        let request = Request::Lighting(LightingRequest::SetRgbUnderglowState(update));
        let name = request.name();
        match self.call(request).await? {
            Response::Lighting(LightingResponse::SetRgbUnderglowState(ok)) => succeeded(name, ok)?,
            _ => return Err(SyncError::UnexpectedResponse { request: name }),
        }
        let mut mirror = mirror::write(&self.mirror);
        let state = mirror.rgb_underglow.unwrap_or_default().merged(&update);
        mirror.rgb_underglow = Some(state);
        Ok(state)
    }

    pub(crate) async fn set_backlight(
        &self,
        update: BacklightUpdate,
    ) -> Result<BacklightState, SyncError> {
        let request = Request::Lighting(LightingRequest::SetBacklightState(update));
        let name = request.name();
        match self.call(request).await? {
            Response::Lighting(LightingResponse::SetBacklightState(ok)) => succeeded(name, ok)?,
            _ => return Err(SyncError::UnexpectedResponse { request: name }),
        }
        let mut mirror = mirror::write(&self.mirror);
        let state = mirror.backlight.unwrap_or_default().merged(&update);
        mirror.backlight = Some(state);
        Ok(state)
    }
}

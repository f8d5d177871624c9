use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    behaviors::BehaviorDetails,
    domain::{
        BacklightState, BacklightUpdate, BehaviorBinding, BehaviorId, DeviceInfo, Keymap, Layer,
        LayerId, LockState, RgbUnderglowState, RgbUnderglowUpdate,
    },
    error::RpcError,
};

/// Coarse topic every routed notification envelope is published under.
pub const NOTIFICATION_TOPIC: &str = "rpc_notification";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Request {
    Core(CoreRequest),
    Keymap(KeymapRequest),
    Behaviors(BehaviorsRequest),
    Lighting(LightingRequest),
}

impl Request {
    /// Stable `subsystem.call` name, used for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Core(CoreRequest::GetDeviceInfo) => "core.getDeviceInfo",
            Self::Core(CoreRequest::GetLockState) => "core.getLockState",
            Self::Core(CoreRequest::ResetSettings) => "core.resetSettings",
            Self::Keymap(KeymapRequest::GetKeymap) => "keymap.getKeymap",
            Self::Keymap(KeymapRequest::SetLayerBinding { .. }) => "keymap.setLayerBinding",
            Self::Keymap(KeymapRequest::AddLayer) => "keymap.addLayer",
            Self::Keymap(KeymapRequest::RemoveLayer { .. }) => "keymap.removeLayer",
            Self::Keymap(KeymapRequest::RestoreLayer { .. }) => "keymap.restoreLayer",
            Self::Keymap(KeymapRequest::SetLayerProps { .. }) => "keymap.setLayerProps",
            Self::Keymap(KeymapRequest::MoveLayer { .. }) => "keymap.moveLayer",
            Self::Keymap(KeymapRequest::SaveChanges) => "keymap.saveChanges",
            Self::Keymap(KeymapRequest::DiscardChanges) => "keymap.discardChanges",
            Self::Keymap(KeymapRequest::CheckUnsavedChanges) => "keymap.checkUnsavedChanges",
            Self::Behaviors(BehaviorsRequest::ListAllBehaviors) => "behaviors.listAllBehaviors",
            Self::Behaviors(BehaviorsRequest::GetBehaviorDetails { .. }) => {
                "behaviors.getBehaviorDetails"
            }
            Self::Lighting(LightingRequest::GetRgbUnderglowState) => {
                "lighting.getRgbUnderglowState"
            }
            Self::Lighting(LightingRequest::GetBacklightState) => "lighting.getBacklightState",
            Self::Lighting(LightingRequest::SetRgbUnderglowState(_)) => {
                "lighting.setRgbUnderglowState"
            }
            Self::Lighting(LightingRequest::SetBacklightState(_)) => "lighting.setBacklightState",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CoreRequest {
    GetDeviceInfo,
    GetLockState,
    ResetSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum KeymapRequest {
    GetKeymap,
    SetLayerBinding {
        layer_id: LayerId,
        key_position: u32,
        binding: BehaviorBinding,
    },
    AddLayer,
    RemoveLayer {
        layer_index: u32,
    },
    RestoreLayer {
        layer_id: LayerId,
        at_index: u32,
    },
    SetLayerProps {
        layer_id: LayerId,
        name: String,
    },
    MoveLayer {
        start_index: u32,
        dest_index: u32,
    },
    SaveChanges,
    DiscardChanges,
    CheckUnsavedChanges,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum BehaviorsRequest {
    ListAllBehaviors,
    GetBehaviorDetails { behavior_id: BehaviorId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LightingRequest {
    GetRgbUnderglowState,
    GetBacklightState,
    SetRgbUnderglowState(RgbUnderglowUpdate),
    SetBacklightState(BacklightUpdate),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Response {
    Core(CoreResponse),
    Keymap(KeymapResponse),
    Behaviors(BehaviorsResponse),
    Lighting(LightingResponse),
    Meta(RpcError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CoreResponse {
    GetDeviceInfo(DeviceInfo),
    GetLockState(LockState),
    ResetSettings(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeymapErrorCode {
    Generic,
    NoSpace,
    InvalidLocation,
    InvalidId,
    InvalidBehavior,
    InvalidParameters,
    NotSupported,
}

/// `ok`/`err` pair carried by every mutating keymap call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeymapOutcome<T> {
    Ok(T),
    Err(KeymapErrorCode),
}

impl<T> KeymapOutcome<T> {
    pub fn into_result(self) -> Result<T, KeymapErrorCode> {
        match self {
            Self::Ok(value) => Ok(value),
            Self::Err(code) => Err(code),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddedLayer {
    pub index: u32,
    pub layer: Layer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeymapResponse {
    GetKeymap(Keymap),
    SetLayerBinding(KeymapOutcome<()>),
    AddLayer(KeymapOutcome<AddedLayer>),
    RemoveLayer(KeymapOutcome<()>),
    RestoreLayer(KeymapOutcome<Layer>),
    SetLayerProps(KeymapOutcome<()>),
    MoveLayer(KeymapOutcome<Keymap>),
    SaveChanges(KeymapOutcome<()>),
    DiscardChanges(bool),
    CheckUnsavedChanges(bool),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BehaviorsResponse {
    ListAllBehaviors(Vec<BehaviorId>),
    GetBehaviorDetails(BehaviorDetails),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LightingResponse {
    GetRgbUnderglowState(RgbUnderglowState),
    GetBacklightState(BacklightState),
    SetRgbUnderglowState(bool),
    SetBacklightState(bool),
}

/// Notification envelope as decoded off the wire.
///
/// At most one subsystem arm is expected to be populated, and within it at
/// most one event field. Empty envelopes are legal on the wire (keepalives)
/// and route nowhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub core: Option<CoreNotification>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keymap: Option<KeymapNotification>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lighting: Option<LightingNotification>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CoreNotification {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_state_changed: Option<LockState>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct KeymapNotification {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unsaved_changes_status_changed: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct LightingNotification {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rgb_underglow_state_changed: Option<RgbUnderglowState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backlight_state_changed: Option<BacklightState>,
}

/// Why an envelope could not be resolved to a single event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyArm {
    /// No subsystem field was populated.
    Subsystem,
    /// The named subsystem was populated but carried no event.
    Event(&'static str),
}

impl std::fmt::Display for EmptyArm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Subsystem => f.write_str("no subsystem populated"),
            Self::Event(subsystem) => write!(f, "subsystem {subsystem} carries no event"),
        }
    }
}

impl Notification {
    /// Resolves the envelope to its active event, scanning arms in
    /// declaration order and taking the first populated one at each level.
    pub fn active_event(&self) -> Result<NotificationEvent, EmptyArm> {
        if let Some(core) = &self.core {
            return core
                .active_event()
                .map(NotificationEvent::Core)
                .ok_or(EmptyArm::Event("core"));
        }
        if let Some(keymap) = &self.keymap {
            return keymap
                .active_event()
                .map(NotificationEvent::Keymap)
                .ok_or(EmptyArm::Event("keymap"));
        }
        if let Some(lighting) = &self.lighting {
            return lighting
                .active_event()
                .map(NotificationEvent::Lighting)
                .ok_or(EmptyArm::Event("lighting"));
        }
        Err(EmptyArm::Subsystem)
    }
}

impl CoreNotification {
    fn active_event(&self) -> Option<CoreEvent> {
        self.lock_state_changed.map(CoreEvent::LockStateChanged)
    }
}

impl KeymapNotification {
    fn active_event(&self) -> Option<KeymapEvent> {
        self.unsaved_changes_status_changed
            .map(KeymapEvent::UnsavedChangesStatusChanged)
    }
}

impl LightingNotification {
    fn active_event(&self) -> Option<LightingEvent> {
        self.rgb_underglow_state_changed
            .map(LightingEvent::RgbUnderglowStateChanged)
            .or_else(|| {
                self.backlight_state_changed
                    .map(LightingEvent::BacklightStateChanged)
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationEvent {
    Core(CoreEvent),
    Keymap(KeymapEvent),
    Lighting(LightingEvent),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreEvent {
    LockStateChanged(LockState),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeymapEvent {
    UnsavedChangesStatusChanged(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightingEvent {
    RgbUnderglowStateChanged(RgbUnderglowState),
    BacklightStateChanged(BacklightState),
}

pub mod topics {
    pub const LOCK_STATE_CHANGED: &str = "rpc_notification.core.lockStateChanged";
    pub const UNSAVED_CHANGES_STATUS_CHANGED: &str =
        "rpc_notification.keymap.unsavedChangesStatusChanged";
    pub const RGB_UNDERGLOW_STATE_CHANGED: &str =
        "rpc_notification.lighting.rgbUnderglowStateChanged";
    pub const BACKLIGHT_STATE_CHANGED: &str = "rpc_notification.lighting.backlightStateChanged";
}

impl NotificationEvent {
    pub fn subsystem(&self) -> &'static str {
        match self {
            Self::Core(_) => "core",
            Self::Keymap(_) => "keymap",
            Self::Lighting(_) => "lighting",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Core(CoreEvent::LockStateChanged(_)) => "lockStateChanged",
            Self::Keymap(KeymapEvent::UnsavedChangesStatusChanged(_)) => {
                "unsavedChangesStatusChanged"
            }
            Self::Lighting(LightingEvent::RgbUnderglowStateChanged(_)) => {
                "rgbUnderglowStateChanged"
            }
            Self::Lighting(LightingEvent::BacklightStateChanged(_)) => "backlightStateChanged",
        }
    }

    /// Fine-grained topic: `rpc_notification.<subsystem>.<event>`.
    pub fn topic(&self) -> &'static str {
        match self {
            Self::Core(CoreEvent::LockStateChanged(_)) => topics::LOCK_STATE_CHANGED,
            Self::Keymap(KeymapEvent::UnsavedChangesStatusChanged(_)) => {
                topics::UNSAVED_CHANGES_STATUS_CHANGED
            }
            Self::Lighting(LightingEvent::RgbUnderglowStateChanged(_)) => {
                topics::RGB_UNDERGLOW_STATE_CHANGED
            }
            Self::Lighting(LightingEvent::BacklightStateChanged(_)) => {
                topics::BACKLIGHT_STATE_CHANGED
            }
        }
    }

    /// The event's own payload, as subscribers of [`Self::topic`] see it.
    pub fn payload(&self) -> serde_json::Result<Value> {
        match self {
            Self::Core(CoreEvent::LockStateChanged(state)) => serde_json::to_value(state),
            Self::Keymap(KeymapEvent::UnsavedChangesStatusChanged(unsaved)) => {
                Ok(Value::Bool(*unsaved))
            }
            Self::Lighting(LightingEvent::RgbUnderglowStateChanged(state)) => {
                serde_json::to_value(state)
            }
            Self::Lighting(LightingEvent::BacklightStateChanged(state)) => {
                serde_json::to_value(state)
            }
        }
    }
}

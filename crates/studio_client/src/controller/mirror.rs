use std::{
    collections::BTreeMap,
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use studio_shared::{
    behaviors::BehaviorDetails,
    domain::{BacklightState, BehaviorId, DeviceInfo, Keymap, LockState, RgbUnderglowState},
};

/// Local copy of the device state the UI renders from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceMirror {
    pub device_info: Option<DeviceInfo>,
    pub lock_state: LockState,
    pub keymap: Option<Keymap>,
    pub unsaved_changes: bool,
    pub behaviors: BTreeMap<BehaviorId, BehaviorDetails>,
    pub rgb_underglow: Option<RgbUnderglowState>,
    pub backlight: Option<BacklightState>,
}

impl DeviceMirror {
    pub fn is_unlocked(&self) -> bool {
        self.lock_state == LockState::Unlocked
    }

    /// Drops everything only readable while unlocked.
    pub(crate) fn forget_unlocked_data(&mut self) {
        self.behaviors.clear();
        self.rgb_underglow = None;
        self.backlight = None;
    }
}

pub(crate) type SharedMirror = Arc<RwLock<DeviceMirror>>;

pub(crate) fn read(mirror: &SharedMirror) -> RwLockReadGuard<'_, DeviceMirror> {
    mirror.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub(crate) fn write(mirror: &SharedMirror) -> RwLockWriteGuard<'_, DeviceMirror> {
    mirror.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

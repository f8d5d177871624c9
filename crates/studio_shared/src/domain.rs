use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident, $repr:ty) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub $repr);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

id_newtype!(LayerId, u32);
id_newtype!(BehaviorId, i32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LockState {
    #[default]
    Locked,
    Unlocked,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub name: String,
    #[serde(default)]
    pub serial_number: Vec<u8>,
}

/// One key's action on one layer: a behavior plus up to two parameters.
///
/// A parameter of `0` is how the device encodes "absent".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorBinding {
    pub behavior_id: BehaviorId,
    #[serde(default)]
    pub param1: u32,
    #[serde(default)]
    pub param2: u32,
}

impl BehaviorBinding {
    pub fn new(behavior_id: BehaviorId, param1: u32, param2: u32) -> Self {
        Self {
            behavior_id,
            param1,
            param2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layer {
    pub id: LayerId,
    #[serde(default)]
    pub name: String,
    pub bindings: Vec<BehaviorBinding>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Keymap {
    pub layers: Vec<Layer>,
    pub available_layers: u32,
    pub max_layer_name_length: u32,
}

impl Keymap {
    pub fn layer_ids(&self) -> Vec<LayerId> {
        self.layers.iter().map(|layer| layer.id).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RgbUnderglowState {
    pub on: bool,
    pub hue: u32,
    pub saturation: u32,
    pub brightness: u32,
    pub speed: u32,
    pub effect: u32,
}

/// Partial update for the underglow; `None` fields are left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RgbUnderglowUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hue: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saturation: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<u32>,
}

impl RgbUnderglowState {
    pub fn merged(mut self, update: &RgbUnderglowUpdate) -> Self {
        if let Some(on) = update.on {
            self.on = on;
        }
        if let Some(hue) = update.hue {
            self.hue = hue;
        }
        if let Some(saturation) = update.saturation {
            self.saturation = saturation;
        }
        if let Some(brightness) = update.brightness {
            self.brightness = brightness;
        }
        if let Some(speed) = update.speed {
            self.speed = speed;
        }
        if let Some(effect) = update.effect {
            self.effect = effect;
        }
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct BacklightState {
    pub on: bool,
    pub brightness: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct BacklightUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness: Option<u32>,
}

impl BacklightState {
    pub fn merged(mut self, update: &BacklightUpdate) -> Self {
        if let Some(on) = update.on {
            self.on = on;
        }
        if let Some(brightness) = update.brightness {
            self.brightness = brightness;
        }
        self
    }
}

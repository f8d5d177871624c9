//! Device-declared behavior catalog and the parameter schemas attached to it.

use serde::{Deserialize, Serialize};

use crate::domain::BehaviorId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorDetails {
    pub id: BehaviorId,
    pub display_name: String,
    #[serde(default)]
    pub metadata: Vec<BehaviorBindingParametersSet>,
}

/// One accepted shape for a binding's parameters.
///
/// `param2` only applies when this set is the first one whose `param1`
/// descriptions accept the binding's first parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorBindingParametersSet {
    #[serde(default)]
    pub param1: Vec<BehaviorParameterValueDescription>,
    #[serde(default)]
    pub param2: Vec<BehaviorParameterValueDescription>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorParameterValueDescription {
    #[serde(default)]
    pub name: String,
    pub value: ParameterValue,
}

impl BehaviorParameterValueDescription {
    pub fn new(name: impl Into<String>, value: ParameterValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParameterValue {
    Constant(u32),
    Range {
        min: i32,
        max: i32,
    },
    LayerId,
    #[serde(rename_all = "camelCase")]
    HidUsage {
        keyboard_max: u32,
        consumer_max: u32,
    },
}

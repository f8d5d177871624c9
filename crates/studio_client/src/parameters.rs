//! Validation of binding parameters against a behavior's declared schema.
//!
//! A schema is a list of parameter sets. The first set whose `param1`
//! descriptions accept the binding's first parameter governs the second.

use studio_shared::{
    behaviors::{BehaviorBindingParametersSet, BehaviorParameterValueDescription, ParameterValue},
    domain::LayerId,
};

use crate::hid::{
    hid_usage_page_and_id, mask_modifiers, CONSUMER_PAGE, KEYBOARD_MIN_ID, KEYBOARD_PAGE,
    LEFT_CONTROL_ID, RIGHT_GUI_ID,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingIssue {
    /// No parameter set accepts the first parameter.
    Param1Rejected,
    /// The governing set (by index) rejects the second parameter.
    Param2Rejected { parameter_set: usize },
}

impl std::fmt::Display for BindingIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Param1Rejected => f.write_str("no parameter set accepts param1"),
            Self::Param2Rejected { parameter_set } => {
                write!(f, "parameter set {parameter_set} rejects param2")
            }
        }
    }
}

/// True when any description in `accepted` matches `candidate`. An empty
/// list accepts every value, including an absent one.
pub fn validate_value(
    layer_ids: &[LayerId],
    candidate: Option<u32>,
    accepted: &[BehaviorParameterValueDescription],
) -> bool {
    if accepted.is_empty() {
        return true;
    }
    let Some(value) = candidate else {
        return false;
    };
    accepted
        .iter()
        .any(|description| value_matches(layer_ids, value, &description.value))
}

fn value_matches(layer_ids: &[LayerId], value: u32, description: &ParameterValue) -> bool {
    match *description {
        ParameterValue::Constant(constant) => value == constant,
        ParameterValue::Range { min, max } => {
            let value = i64::from(value);
            i64::from(min) <= value && value <= i64::from(max)
        }
        ParameterValue::LayerId => layer_ids.contains(&LayerId(value)),
        ParameterValue::HidUsage {
            keyboard_max,
            consumer_max,
        } => hid_usage_in_bounds(value, keyboard_max, consumer_max),
    }
}

fn hid_usage_in_bounds(value: u32, keyboard_max: u32, consumer_max: u32) -> bool {
    let (page, id) = hid_usage_page_and_id(mask_modifiers(value));
    match page {
        KEYBOARD_PAGE => {
            (KEYBOARD_MIN_ID..=keyboard_max).contains(&id)
                || (LEFT_CONTROL_ID..=RIGHT_GUI_ID).contains(&id)
        }
        CONSUMER_PAGE => (1..=consumer_max).contains(&id),
        _ => false,
    }
}

/// The parameter set that governs `param1`, with its index: the first whose
/// `param1` descriptions accept it.
pub fn resolve_parameter_set<'a>(
    schema: &'a [BehaviorBindingParametersSet],
    layer_ids: &[LayerId],
    param1: Option<u32>,
) -> Option<(usize, &'a BehaviorBindingParametersSet)> {
    schema
        .iter()
        .enumerate()
        .find(|(_, set)| validate_value(layer_ids, param1, &set.param1))
}

fn takes_no_parameters(schema: &[BehaviorBindingParametersSet], param1: Option<u32>) -> bool {
    matches!(param1, None | Some(0)) && schema.iter().all(|set| set.param1.is_empty())
}

/// Like [`validate_binding`], but says which parameter failed.
pub fn check_binding(
    schema: &[BehaviorBindingParametersSet],
    layer_ids: &[LayerId],
    param1: Option<u32>,
    param2: Option<u32>,
) -> Result<(), BindingIssue> {
    if takes_no_parameters(schema, param1) {
        return Ok(());
    }
    let (index, set) =
        resolve_parameter_set(schema, layer_ids, param1).ok_or(BindingIssue::Param1Rejected)?;
    if validate_value(layer_ids, param2, &set.param2) {
        Ok(())
    } else {
        Err(BindingIssue::Param2Rejected {
            parameter_set: index,
        })
    }
}

pub fn validate_binding(
    schema: &[BehaviorBindingParametersSet],
    layer_ids: &[LayerId],
    param1: Option<u32>,
    param2: Option<u32>,
) -> bool {
    check_binding(schema, layer_ids, param1, param2).is_ok()
}

#[cfg(test)]
#[path = "tests/parameters_tests.rs"]
mod tests;

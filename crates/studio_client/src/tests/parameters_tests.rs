use super::*;
use crate::hid::{apply_modifiers, hid_usage_from_page_and_id, Modifier};

fn desc(value: ParameterValue) -> BehaviorParameterValueDescription {
    BehaviorParameterValueDescription::new("", value)
}

fn set(
    param1: Vec<ParameterValue>,
    param2: Vec<ParameterValue>,
) -> BehaviorBindingParametersSet {
    BehaviorBindingParametersSet {
        param1: param1.into_iter().map(desc).collect(),
        param2: param2.into_iter().map(desc).collect(),
    }
}

const HID: ParameterValue = ParameterValue::HidUsage {
    keyboard_max: 0xFF,
    consumer_max: 0x29D,
};

fn layers() -> Vec<LayerId> {
    vec![LayerId(0), LayerId(1), LayerId(2)]
}

#[test]
fn constant_matches_only_its_value() {
    let accepted = [desc(ParameterValue::Constant(3))];
    assert!(validate_value(&layers(), Some(3), &accepted));
    assert!(!validate_value(&layers(), Some(4), &accepted));
    assert!(!validate_value(&layers(), None, &accepted));
}

#[test]
fn range_bounds_are_inclusive() {
    let accepted = [desc(ParameterValue::Range { min: 0, max: 10 })];
    assert!(validate_value(&layers(), Some(0), &accepted));
    assert!(validate_value(&layers(), Some(10), &accepted));
    assert!(!validate_value(&layers(), Some(11), &accepted));
}

#[test]
fn range_handles_negative_minimum_without_wrapping() {
    let accepted = [desc(ParameterValue::Range { min: -5, max: 5 })];
    assert!(validate_value(&layers(), Some(5), &accepted));
    assert!(!validate_value(&layers(), Some(u32::MAX), &accepted));
}

#[test]
fn layer_reference_requires_known_layer() {
    let accepted = [desc(ParameterValue::LayerId)];
    assert!(validate_value(&layers(), Some(2), &accepted));
    assert!(!validate_value(&layers(), Some(3), &accepted));
    assert!(!validate_value(&[], Some(0), &accepted));
}

#[test]
fn hid_usage_checks_page_bounds_after_masking_modifiers() {
    let accepted = [desc(HID)];
    let a = hid_usage_from_page_and_id(0x07, 0x04);
    let left_shift = hid_usage_from_page_and_id(0x07, 0xE1);
    let volume_up = hid_usage_from_page_and_id(0x0C, 0xE9);

    assert!(validate_value(&layers(), Some(a), &accepted));
    assert!(validate_value(
        &layers(),
        Some(apply_modifiers(a, &[Modifier::LeftShift])),
        &accepted
    ));
    assert!(validate_value(&layers(), Some(left_shift), &accepted));
    assert!(validate_value(&layers(), Some(volume_up), &accepted));

    // Reserved keyboard ids, over-range consumer ids, and unknown pages.
    assert!(!validate_value(
        &layers(),
        Some(hid_usage_from_page_and_id(0x07, 0x01)),
        &accepted
    ));
    assert!(!validate_value(
        &layers(),
        Some(hid_usage_from_page_and_id(0x0C, 0x2A0)),
        &accepted
    ));
    assert!(!validate_value(
        &layers(),
        Some(hid_usage_from_page_and_id(0x01, 0x04)),
        &accepted
    ));
}

#[test]
fn hid_usage_respects_narrow_keyboard_maximum() {
    let accepted = [desc(ParameterValue::HidUsage {
        keyboard_max: 0x65,
        consumer_max: 0,
    })];
    assert!(validate_value(
        &layers(),
        Some(hid_usage_from_page_and_id(0x07, 0x65)),
        &accepted
    ));
    assert!(!validate_value(
        &layers(),
        Some(hid_usage_from_page_and_id(0x07, 0x66)),
        &accepted
    ));
    assert!(!validate_value(
        &layers(),
        Some(hid_usage_from_page_and_id(0x0C, 0x01)),
        &accepted
    ));
}

#[test]
fn any_matching_description_is_enough() {
    let accepted = [
        desc(ParameterValue::Constant(100)),
        desc(ParameterValue::LayerId),
    ];
    assert!(validate_value(&layers(), Some(100), &accepted));
    assert!(validate_value(&layers(), Some(1), &accepted));
    assert!(!validate_value(&layers(), Some(50), &accepted));
}

#[test]
fn empty_description_list_accepts_anything() {
    assert!(validate_value(&layers(), None, &[]));
    assert!(validate_value(&layers(), Some(12345), &[]));
}

#[test]
fn layer_then_range_binding() {
    let schema = [set(
        vec![ParameterValue::LayerId],
        vec![ParameterValue::Range { min: 0, max: 10 }],
    )];
    assert!(validate_binding(&schema, &layers(), Some(1), Some(5)));
    assert!(!validate_binding(&schema, &layers(), Some(1), Some(99)));
    assert_eq!(
        check_binding(&schema, &layers(), Some(1), Some(99)),
        Err(BindingIssue::Param2Rejected { parameter_set: 0 })
    );
    assert_eq!(
        check_binding(&schema, &layers(), Some(7), Some(5)),
        Err(BindingIssue::Param1Rejected)
    );
}

#[test]
fn parameterless_behavior_is_valid_without_parameters() {
    let schema = [BehaviorBindingParametersSet::default()];
    assert!(validate_binding(&schema, &layers(), None, None));
    assert!(validate_binding(&schema, &layers(), Some(0), Some(0)));
    assert!(validate_binding(&[], &layers(), Some(0), None));
}

#[test]
fn behavior_without_variants_rejects_nonzero_param1() {
    assert!(!validate_binding(&[], &layers(), Some(4), None));
}

#[test]
fn empty_param2_rules_accept_absent_second_parameter() {
    let schema = [set(vec![HID], vec![])];
    let a = hid_usage_from_page_and_id(0x07, 0x04);
    assert!(validate_binding(&schema, &layers(), Some(a), None));
    assert!(validate_binding(&schema, &layers(), Some(a), Some(0)));
    assert!(validate_binding(&schema, &layers(), Some(a), Some(42)));
}

#[test]
fn first_matching_variant_governs_param2() {
    let layer_tap = set(vec![ParameterValue::LayerId], vec![HID]);
    let wildcard = set(
        vec![ParameterValue::Range { min: 0, max: 1000 }],
        vec![ParameterValue::Constant(7)],
    );
    let schema = [layer_tap, wildcard];
    let a = hid_usage_from_page_and_id(0x07, 0x04);

    // Layer 1 selects the layer-tap variant; its HID rule governs param2.
    assert!(validate_binding(&schema, &layers(), Some(1), Some(a)));
    assert!(!validate_binding(&schema, &layers(), Some(1), Some(7)));
    // A non-layer value falls through to the second variant.
    assert!(validate_binding(&schema, &layers(), Some(500), Some(7)));
    assert_eq!(
        resolve_parameter_set(&schema, &layers(), Some(500)).map(|(index, _)| index),
        Some(1)
    );
}

#[test]
fn mod_tap_requires_hid_usage_in_both_slots() {
    let schema = [set(vec![HID], vec![HID])];
    let left_control = hid_usage_from_page_and_id(0x07, 0xE0);
    let a = hid_usage_from_page_and_id(0x07, 0x04);
    assert!(validate_binding(&schema, &layers(), Some(left_control), Some(a)));
    assert!(!validate_binding(&schema, &layers(), Some(left_control), Some(0)));
}

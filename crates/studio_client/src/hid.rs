//! HID usage encoding as carried in binding parameters.
//!
//! A usage value packs `page << 16 | id`; the top byte optionally carries
//! implicit modifier flags (e.g. `LS(A)`).

pub const KEYBOARD_PAGE: u32 = 0x07;
pub const CONSUMER_PAGE: u32 = 0x0C;

/// Lowest keyboard-page id that names a real key (`A`).
pub const KEYBOARD_MIN_ID: u32 = 0x04;
pub const LEFT_CONTROL_ID: u32 = 0xE0;
pub const RIGHT_GUI_ID: u32 = 0xE7;

const MODIFIER_SHIFT: u32 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Modifier {
    LeftControl = 0x01,
    LeftShift = 0x02,
    LeftAlt = 0x04,
    LeftGui = 0x08,
    RightControl = 0x10,
    RightShift = 0x20,
    RightAlt = 0x40,
    RightGui = 0x80,
}

pub const ALL_MODIFIERS: [Modifier; 8] = [
    Modifier::LeftControl,
    Modifier::RightControl,
    Modifier::LeftShift,
    Modifier::RightShift,
    Modifier::LeftAlt,
    Modifier::RightAlt,
    Modifier::LeftGui,
    Modifier::RightGui,
];

pub fn modifiers_to_flags(modifiers: &[Modifier]) -> u8 {
    modifiers.iter().fold(0, |flags, modifier| flags | *modifier as u8)
}

pub fn hid_usage_from_page_and_id(page: u32, id: u32) -> u32 {
    ((page & 0xFF) << 16) | (id & 0xFFFF)
}

pub fn hid_usage_page_and_id(usage: u32) -> (u32, u32) {
    ((usage >> 16) & 0xFF, usage & 0xFFFF)
}

/// Strips the implicit-modifier byte.
pub fn mask_modifiers(usage: u32) -> u32 {
    usage & !((modifiers_to_flags(&ALL_MODIFIERS) as u32) << MODIFIER_SHIFT)
}

pub fn modifier_flags(usage: u32) -> u8 {
    (usage >> MODIFIER_SHIFT) as u8
}

pub fn apply_modifiers(usage: u32, modifiers: &[Modifier]) -> u32 {
    mask_modifiers(usage) | ((modifiers_to_flags(modifiers) as u32) << MODIFIER_SHIFT)
}

//! Key name table for the HID Keyboard/Keypad usage page (0x07).
//!
//! Names are the upper-case identifiers used in the mapping config
//! (`"A"`, `"LEFT_CTRL"`, `"VOLUME_UP"`). Lookup is case-insensitive and never
//! fails: an unknown name resolves to [`KeyCode::NONE`], which the report state
//! machine treats as a no-op.
//!
//! Media keys are keyboard-page placeholders, not Consumer Control usages.
//! Hosts that honour the keyboard-page media usages will react to them; others
//! ignore them.

use std::collections::HashMap;
use std::sync::OnceLock;

/// HID modifier bitmask constants (byte 0 of the keyboard report).
pub mod mods {
    pub const NONE: u8 = 0x00;
    pub const LCTRL: u8 = 0x01;
    pub const LSHIFT: u8 = 0x02;
    pub const LALT: u8 = 0x04;
    pub const LGUI: u8 = 0x08;
    pub const RCTRL: u8 = 0x10;
    pub const RSHIFT: u8 = 0x20;
    pub const RALT: u8 = 0x40;
    pub const RGUI: u8 = 0x80;
}

/// Resolved key: modifier bits to set plus a usage code for a key slot.
///
/// `usage == 0x00` marks a pure modifier (or `NONE`), which never consumes a
/// key slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct KeyCode {
    pub modifier: u8,
    pub usage: u8,
}

impl KeyCode {
    /// The safe no-op every unknown name resolves to.
    pub const NONE: KeyCode = KeyCode {
        modifier: mods::NONE,
        usage: 0x00,
    };

    const fn key(usage: u8) -> Self {
        Self {
            modifier: mods::NONE,
            usage,
        }
    }

    const fn modifier(mask: u8) -> Self {
        Self {
            modifier: mask,
            usage: 0x00,
        }
    }

    pub fn is_modifier(&self) -> bool {
        self.modifier != mods::NONE
    }

    pub fn is_noop(&self) -> bool {
        *self == Self::NONE
    }
}

/// Every known key name, in display order.
#[rustfmt::skip]
pub const KEY_TABLE: &[(&str, KeyCode)] = &[
    // Letters
    ("A", KeyCode::key(0x04)), ("B", KeyCode::key(0x05)), ("C", KeyCode::key(0x06)),
    ("D", KeyCode::key(0x07)), ("E", KeyCode::key(0x08)), ("F", KeyCode::key(0x09)),
    ("G", KeyCode::key(0x0A)), ("H", KeyCode::key(0x0B)), ("I", KeyCode::key(0x0C)),
    ("J", KeyCode::key(0x0D)), ("K", KeyCode::key(0x0E)), ("L", KeyCode::key(0x0F)),
    ("M", KeyCode::key(0x10)), ("N", KeyCode::key(0x11)), ("O", KeyCode::key(0x12)),
    ("P", KeyCode::key(0x13)), ("Q", KeyCode::key(0x14)), ("R", KeyCode::key(0x15)),
    ("S", KeyCode::key(0x16)), ("T", KeyCode::key(0x17)), ("U", KeyCode::key(0x18)),
    ("V", KeyCode::key(0x19)), ("W", KeyCode::key(0x1A)), ("X", KeyCode::key(0x1B)),
    ("Y", KeyCode::key(0x1C)), ("Z", KeyCode::key(0x1D)),
    // Digits
    ("1", KeyCode::key(0x1E)), ("2", KeyCode::key(0x1F)), ("3", KeyCode::key(0x20)),
    ("4", KeyCode::key(0x21)), ("5", KeyCode::key(0x22)), ("6", KeyCode::key(0x23)),
    ("7", KeyCode::key(0x24)), ("8", KeyCode::key(0x25)), ("9", KeyCode::key(0x26)),
    ("0", KeyCode::key(0x27)),
    // Editing and punctuation
    ("ENTER", KeyCode::key(0x28)), ("ESCAPE", KeyCode::key(0x29)),
    ("BACKSPACE", KeyCode::key(0x2A)), ("TAB", KeyCode::key(0x2B)),
    ("SPACE", KeyCode::key(0x2C)), ("MINUS", KeyCode::key(0x2D)),
    ("EQUAL", KeyCode::key(0x2E)), ("LEFT_BRACKET", KeyCode::key(0x2F)),
    ("RIGHT_BRACKET", KeyCode::key(0x30)), ("BACKSLASH", KeyCode::key(0x31)),
    ("HASH", KeyCode::key(0x32)), ("SEMICOLON", KeyCode::key(0x33)),
    ("QUOTE", KeyCode::key(0x34)), ("GRAVE", KeyCode::key(0x35)),
    ("COMMA", KeyCode::key(0x36)), ("PERIOD", KeyCode::key(0x37)),
    ("SLASH", KeyCode::key(0x38)), ("CAPS_LOCK", KeyCode::key(0x39)),
    // Function row
    ("F1", KeyCode::key(0x3A)), ("F2", KeyCode::key(0x3B)), ("F3", KeyCode::key(0x3C)),
    ("F4", KeyCode::key(0x3D)), ("F5", KeyCode::key(0x3E)), ("F6", KeyCode::key(0x3F)),
    ("F7", KeyCode::key(0x40)), ("F8", KeyCode::key(0x41)), ("F9", KeyCode::key(0x42)),
    ("F10", KeyCode::key(0x43)), ("F11", KeyCode::key(0x44)), ("F12", KeyCode::key(0x45)),
    // Navigation
    ("PRINT_SCREEN", KeyCode::key(0x46)), ("SCROLL_LOCK", KeyCode::key(0x47)),
    ("PAUSE", KeyCode::key(0x48)), ("INSERT", KeyCode::key(0x49)),
    ("HOME", KeyCode::key(0x4A)), ("PAGE_UP", KeyCode::key(0x4B)),
    ("DELETE", KeyCode::key(0x4C)), ("END", KeyCode::key(0x4D)),
    ("PAGE_DOWN", KeyCode::key(0x4E)), ("RIGHT_ARROW", KeyCode::key(0x4F)),
    ("LEFT_ARROW", KeyCode::key(0x50)), ("DOWN_ARROW", KeyCode::key(0x51)),
    ("UP_ARROW", KeyCode::key(0x52)),
    // Keypad
    ("KP_NUMLOCK", KeyCode::key(0x53)), ("KP_SLASH", KeyCode::key(0x54)),
    ("KP_ASTERISK", KeyCode::key(0x55)), ("KP_MINUS", KeyCode::key(0x56)),
    ("KP_PLUS", KeyCode::key(0x57)), ("KP_ENTER", KeyCode::key(0x58)),
    ("KP_1", KeyCode::key(0x59)), ("KP_2", KeyCode::key(0x5A)), ("KP_3", KeyCode::key(0x5B)),
    ("KP_4", KeyCode::key(0x5C)), ("KP_5", KeyCode::key(0x5D)), ("KP_6", KeyCode::key(0x5E)),
    ("KP_7", KeyCode::key(0x5F)), ("KP_8", KeyCode::key(0x60)), ("KP_9", KeyCode::key(0x61)),
    ("KP_0", KeyCode::key(0x62)), ("KP_PERIOD", KeyCode::key(0x63)),
    // Modifiers
    ("LEFT_CTRL", KeyCode::modifier(mods::LCTRL)),
    ("LEFT_SHIFT", KeyCode::modifier(mods::LSHIFT)),
    ("LEFT_ALT", KeyCode::modifier(mods::LALT)),
    ("LEFT_GUI", KeyCode::modifier(mods::LGUI)),
    ("RIGHT_CTRL", KeyCode::modifier(mods::RCTRL)),
    ("RIGHT_SHIFT", KeyCode::modifier(mods::RSHIFT)),
    ("RIGHT_ALT", KeyCode::modifier(mods::RALT)),
    ("RIGHT_GUI", KeyCode::modifier(mods::RGUI)),
    // Media placeholders (keyboard page)
    ("MUTE", KeyCode::key(0x7F)), ("VOLUME_UP", KeyCode::key(0x80)),
    ("VOLUME_DOWN", KeyCode::key(0x81)), ("NEXT_TRACK", KeyCode::key(0xB5)),
    ("PREV_TRACK", KeyCode::key(0xB6)), ("STOP_MEDIA", KeyCode::key(0xB7)),
    ("PLAY_PAUSE", KeyCode::key(0xCD)),
    ("NONE", KeyCode::NONE),
];

fn index() -> &'static HashMap<&'static str, KeyCode> {
    static INDEX: OnceLock<HashMap<&'static str, KeyCode>> = OnceLock::new();
    INDEX.get_or_init(|| KEY_TABLE.iter().copied().collect())
}

/// Resolve a key name. Unknown names resolve to [`KeyCode::NONE`].
pub fn lookup(name: &str) -> KeyCode {
    index()
        .get(name.trim().to_ascii_uppercase().as_str())
        .copied()
        .unwrap_or(KeyCode::NONE)
}

/// Whether `name` is present in the table (case-insensitive).
pub fn is_known(name: &str) -> bool {
    index().contains_key(name.trim().to_ascii_uppercase().as_str())
}

/// Primary name for a slot usage code, for log output.
pub fn name_of(usage: u8) -> Option<&'static str> {
    if usage == 0x00 {
        return None;
    }
    KEY_TABLE
        .iter()
        .find(|(_, code)| code.usage == usage)
        .map(|(name, _)| *name)
}

/// All key names in display order.
pub fn names() -> impl Iterator<Item = &'static str> {
    KEY_TABLE.iter().map(|(name, _)| *name)
}

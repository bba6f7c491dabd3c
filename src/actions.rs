//! Static action table: every physical interaction and its default triggers.

use evdev::{EventType, Key, RelativeAxisType};

use crate::input::CanonicalEvent;

/// Identifier of one physical interaction.
pub type ActionId = &'static str;

/// All actions, in table order. Trigger collisions are resolved against
/// this order.
pub const ACTION_IDS: &[ActionId] = &[
    "knob_cw",
    "knob_ccw",
    "front_button_press",
    "front_button_release",
    "top_button_1_press",
    "top_button_2_press",
    "top_button_3_press",
    "top_button_4_press",
    "top_button_1_release",
    "top_button_2_release",
    "top_button_3_release",
    "top_button_4_release",
];

fn key(key: Key, value: i32) -> CanonicalEvent {
    CanonicalEvent::new(EventType::KEY.0, key.code(), value)
}

fn dial(value: i32) -> CanonicalEvent {
    CanonicalEvent::new(EventType::RELATIVE.0, RelativeAxisType::REL_DIAL.0, value)
}

/// Resolve a configured name to its static identifier.
pub fn lookup(name: &str) -> Option<ActionId> {
    ACTION_IDS.iter().copied().find(|id| *id == name)
}

pub fn is_known(name: &str) -> bool {
    lookup(name).is_some()
}

/// Built-in trigger events for `action`.
pub fn default_triggers(action: &str) -> Vec<CanonicalEvent> {
    let top = |n: usize| [Key::KEY_1, Key::KEY_2, Key::KEY_3, Key::KEY_4][n - 1];
    match action {
        "knob_cw" => vec![dial(1)],
        "knob_ccw" => vec![dial(-1)],
        "front_button_press" => vec![key(Key::KEY_ENTER, 1)],
        "front_button_release" => vec![key(Key::KEY_ENTER, 0)],
        _ => {
            let parsed = action
                .strip_prefix("top_button_")
                .and_then(|rest| rest.split_once('_'))
                .and_then(|(n, edge)| Some((n.parse::<usize>().ok()?, edge)));
            match parsed {
                Some((n @ 1..=4, "press")) => vec![key(top(n), 1)],
                Some((n @ 1..=4, "release")) => vec![key(top(n), 0)],
                _ => Vec::new(),
            }
        }
    }
}

//! Action mapping store: action id → what to do with which keys.
//!
//! The store holds an immutable snapshot behind a lock. Readers clone the
//! `Arc` and drop the lock immediately; writers swap the whole table.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use macropad_hid::keycodes;
use parking_lot::RwLock;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{info, warn};

use crate::actions;

/// How a mapping turns into commands.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MappingKind {
    Press,
    Release,
    Tap,
    None,
    /// Kind string not understood; treated as `None`.
    Unrecognized(String),
}

impl MappingKind {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "press" | "key_press" => MappingKind::Press,
            "release" | "key_release" => MappingKind::Release,
            "tap" | "key_tap" => MappingKind::Tap,
            "none" | "" => MappingKind::None,
            _ => MappingKind::Unrecognized(s.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            MappingKind::Press => "press",
            MappingKind::Release => "release",
            MappingKind::Tap => "tap",
            MappingKind::None => "none",
            MappingKind::Unrecognized(s) => s,
        }
    }
}

impl fmt::Display for MappingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for MappingKind {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for MappingKind {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        Ok(MappingKind::parse(&s))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub kind: MappingKind,
    #[serde(default)]
    pub keys: Vec<String>,
}

impl MappingEntry {
    pub fn new<I, S>(kind: MappingKind, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind,
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    pub fn tap(key: &str) -> Self {
        Self::new(MappingKind::Tap, [key])
    }
}

impl fmt::Display for MappingEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.kind, self.keys.join(", "))
    }
}

pub type ActionMap = BTreeMap<String, MappingEntry>;

/// Built-in mapping table.
pub fn default_mappings() -> ActionMap {
    let mut map = ActionMap::new();
    map.insert("knob_cw".into(), MappingEntry::tap("VOLUME_UP"));
    map.insert("knob_ccw".into(), MappingEntry::tap("VOLUME_DOWN"));
    map.insert(
        "front_button_press".into(),
        MappingEntry::new(MappingKind::Press, ["LEFT_CTRL", "C"]),
    );
    map.insert(
        "front_button_release".into(),
        MappingEntry::new(MappingKind::Release, ["LEFT_CTRL", "C"]),
    );
    for (n, key) in ["A", "B", "C", "D"].into_iter().enumerate() {
        map.insert(format!("top_button_{}_press", n + 1), MappingEntry::tap(key));
        map.insert(
            format!("top_button_{}_release", n + 1),
            MappingEntry::new(MappingKind::None, Vec::<String>::new()),
        );
    }
    map
}

/// A problem found in a mapping table. None of these stop the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingIssue {
    UnknownAction(String),
    UnrecognizedKind { action: String, kind: String },
    UnknownKey { action: String, key: String },
}

impl fmt::Display for MappingIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MappingIssue::UnknownAction(action) => {
                write!(f, "mapping for unknown action {action:?}")
            }
            MappingIssue::UnrecognizedKind { action, kind } => {
                write!(f, "{action}: unrecognized kind {kind:?} (treated as none)")
            }
            MappingIssue::UnknownKey { action, key } => {
                write!(f, "{action}: unknown key {key:?} (ignored)")
            }
        }
    }
}

pub fn validate(map: &ActionMap) -> Vec<MappingIssue> {
    let mut issues = Vec::new();
    for (action, entry) in map {
        if !actions::is_known(action) {
            issues.push(MappingIssue::UnknownAction(action.clone()));
        }
        if let MappingKind::Unrecognized(kind) = &entry.kind {
            issues.push(MappingIssue::UnrecognizedKind {
                action: action.clone(),
                kind: kind.clone(),
            });
        }
        for key in &entry.keys {
            if !keycodes::is_known(key) {
                issues.push(MappingIssue::UnknownKey {
                    action: action.clone(),
                    key: key.clone(),
                });
            }
        }
    }
    issues
}

/// Shared, swappable mapping table. Clones share the same table.
#[derive(Clone, Default)]
pub struct MappingStore {
    current: Arc<RwLock<Arc<ActionMap>>>,
}

impl MappingStore {
    pub fn new(map: ActionMap) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(map))),
        }
    }

    /// The current table as an independent copy.
    pub fn get(&self) -> ActionMap {
        (*self.snapshot()).clone()
    }

    /// Replace the whole table.
    ///
    /// Issues in the new table are logged but never rejected; unknown names
    /// resolve to no-ops downstream. Returns `true` once the swap happened.
    pub fn set(&self, map: ActionMap) -> bool {
        for issue in validate(&map) {
            warn!("Mapping: {}", issue);
        }
        let count = map.len();
        *self.current.write() = Arc::new(map);
        info!("Mapping table replaced ({} entries)", count);
        true
    }

    /// The current table, shared. Later `set` calls do not affect it.
    pub fn snapshot(&self) -> Arc<ActionMap> {
        Arc::clone(&self.current.read())
    }

    pub fn lookup(&self, action: &str) -> Option<MappingEntry> {
        self.snapshot().get(action).cloned()
    }
}

impl fmt::Debug for MappingStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappingStore")
            .field("entries", &self.snapshot().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_accepts_current_and_legacy_names() {
        assert_eq!(MappingKind::parse("tap"), MappingKind::Tap);
        assert_eq!(MappingKind::parse("key_tap"), MappingKind::Tap);
        assert_eq!(MappingKind::parse("KEY_PRESS"), MappingKind::Press);
        assert_eq!(MappingKind::parse("release"), MappingKind::Release);
        assert_eq!(MappingKind::parse("none"), MappingKind::None);
        assert_eq!(
            MappingKind::parse("hold"),
            MappingKind::Unrecognized("hold".to_string())
        );
    }

    #[test]
    fn entry_deserializes_from_toml() {
        let entry: MappingEntry = toml::from_str("kind = \"key_tap\"\nkeys = [\"A\"]").unwrap();
        assert_eq!(entry, MappingEntry::tap("A"));

        let entry: MappingEntry = toml::from_str("kind = \"macro\"").unwrap();
        assert_eq!(entry.kind, MappingKind::Unrecognized("macro".to_string()));
        assert!(entry.keys.is_empty());
    }

    #[test]
    fn defaults_cover_every_action_and_are_clean() {
        let map = default_mappings();
        for id in actions::ACTION_IDS {
            assert!(map.contains_key(*id), "{id}");
        }
        assert!(validate(&map).is_empty());
        assert_eq!(map["knob_cw"], MappingEntry::tap("VOLUME_UP"));
        assert_eq!(map["top_button_3_press"], MappingEntry::tap("C"));
        assert_eq!(map["top_button_3_release"].kind, MappingKind::None);
    }

    #[test]
    fn validate_reports_each_problem() {
        let mut map = ActionMap::new();
        map.insert("knob_cw".into(), MappingEntry::new(MappingKind::Tap, ["VOLUME_UPP"]));
        map.insert("knob_left".into(), MappingEntry::tap("A"));
        map.insert(
            "knob_ccw".into(),
            MappingEntry::new(MappingKind::Unrecognized("spin".into()), ["A"]),
        );
        let issues = validate(&map);
        assert_eq!(issues.len(), 3);
        assert!(issues.contains(&MappingIssue::UnknownAction("knob_left".into())));
        assert!(issues.contains(&MappingIssue::UnknownKey {
            action: "knob_cw".into(),
            key: "VOLUME_UPP".into()
        }));
    }

    #[test]
    fn get_returns_independent_copy() {
        let store = MappingStore::new(default_mappings());
        let mut copy = store.get();
        copy.clear();
        assert_eq!(store.get().len(), default_mappings().len());
    }

    #[test]
    fn set_replaces_whole_table() {
        let store = MappingStore::new(default_mappings());
        let shared = store.clone();
        let held = store.snapshot();

        let mut map = ActionMap::new();
        map.insert("knob_cw".into(), MappingEntry::tap("MUTE"));
        assert!(shared.set(map));

        assert_eq!(store.lookup("knob_cw"), Some(MappingEntry::tap("MUTE")));
        assert_eq!(store.lookup("knob_ccw"), None);
        // Earlier snapshots are unaffected
        assert_eq!(held["knob_ccw"], MappingEntry::tap("VOLUME_DOWN"));
    }
}

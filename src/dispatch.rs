//! Action dispatcher: canonical events → action ids → commands.

use std::collections::HashMap;

use macropad_hid::Command;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, trace, warn};

use crate::actions::ActionId;
use crate::input::CanonicalEvent;
use crate::mapping::{MappingEntry, MappingKind, MappingStore};

/// Two actions claim the same trigger event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("trigger {event} is claimed by both {first} and {second}")]
pub struct TriggerConflict {
    pub event: CanonicalEvent,
    pub first: ActionId,
    pub second: ActionId,
}

/// Immutable event → action lookup, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct TriggerTable {
    map: HashMap<CanonicalEvent, ActionId>,
}

impl TriggerTable {
    /// Build from per-action trigger lists, in action order.
    ///
    /// The first conflicting trigger aborts the build.
    pub fn build(entries: &[(ActionId, Vec<CanonicalEvent>)]) -> Result<Self, TriggerConflict> {
        match Self::conflicts(entries).into_iter().next() {
            Some(conflict) => Err(conflict),
            None => Ok(Self::collect(entries)),
        }
    }

    /// Every collision in `entries`. The earlier action owns each trigger.
    pub fn conflicts(entries: &[(ActionId, Vec<CanonicalEvent>)]) -> Vec<TriggerConflict> {
        let mut owners: HashMap<CanonicalEvent, ActionId> = HashMap::new();
        let mut conflicts = Vec::new();
        for (action, triggers) in entries {
            for &event in triggers {
                match owners.get(&event) {
                    Some(&first) if first != *action => conflicts.push(TriggerConflict {
                        event,
                        first,
                        second: *action,
                    }),
                    Some(_) => {}
                    None => {
                        owners.insert(event, *action);
                    }
                }
            }
        }
        conflicts
    }

    fn collect(entries: &[(ActionId, Vec<CanonicalEvent>)]) -> Self {
        let mut map = HashMap::new();
        for (action, triggers) in entries {
            for &event in triggers {
                map.entry(event).or_insert(*action);
            }
        }
        Self { map }
    }

    pub fn lookup(&self, event: &CanonicalEvent) -> Option<ActionId> {
        self.map.get(event).copied()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Commands a mapping entry expands to.
pub fn commands_for(entry: &MappingEntry) -> Vec<Command> {
    match &entry.kind {
        MappingKind::Press => vec![Command::press(entry.keys.iter().cloned())],
        MappingKind::Release => vec![Command::release(entry.keys.iter().cloned())],
        MappingKind::Tap => vec![
            Command::press(entry.keys.iter().cloned()),
            Command::release(entry.keys.iter().cloned()),
        ],
        MappingKind::None => Vec::new(),
        MappingKind::Unrecognized(kind) => {
            warn!("Unrecognized mapping kind {:?}, ignoring", kind);
            Vec::new()
        }
    }
}

pub struct Dispatcher {
    triggers: TriggerTable,
    store: MappingStore,
    commands: UnboundedSender<Command>,
}

impl Dispatcher {
    pub fn new(triggers: TriggerTable, store: MappingStore, commands: UnboundedSender<Command>) -> Self {
        Self {
            triggers,
            store,
            commands,
        }
    }

    /// Dispatch one event. Returns the number of commands queued.
    ///
    /// The mapping is read from the store's current snapshot on every call.
    pub fn dispatch(&self, event: CanonicalEvent) -> usize {
        let Some(action) = self.triggers.lookup(&event) else {
            trace!("No action for {}", event);
            return 0;
        };
        let Some(entry) = self.store.lookup(action) else {
            warn!("No mapping for action {}", action);
            return 0;
        };

        let commands = commands_for(&entry);
        debug!("{} -> {} -> {}", event, action, entry);
        let mut sent = 0;
        for command in commands {
            if self.commands.send(command).is_err() {
                warn!("Command channel closed, dropping {}", action);
                break;
            }
            sent += 1;
        }
        sent
    }
}

// MacroPad Bluetooth HID bridge - shared library
// Input devices, action dispatch, mapping store, configuration and the daemon

pub mod actions;
pub mod config;
pub mod daemon;
pub mod dispatch;
pub mod input;
pub mod mapping;

pub use config::{Config, ConfigError};
pub use dispatch::{Dispatcher, TriggerConflict, TriggerTable};
pub use input::{CanonicalEvent, InputDevice, InputSource};
pub use mapping::{ActionMap, MappingEntry, MappingKind, MappingStore};

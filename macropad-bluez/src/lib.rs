//! Bluetooth HID transport over the BlueZ D-Bus API
//!
//! Registers an `org.bluez.Profile1` HID keyboard profile, accepts one host
//! at a time and forwards report changes over the interrupt channel BlueZ
//! hands over in `NewConnection`.
//!
//! - [`service`]: adapter setup, profile registration and the reactor
//! - [`link`]: connection state machine and report transmission
//! - [`channel`]: the interrupt channel descriptor
//! - [`profile`]: the callback object BlueZ invokes
//! - [`bluez`]: D-Bus proxies for `Adapter1` and `ProfileManager1`

pub mod bluez;
pub mod channel;
pub mod error;
pub mod link;
pub mod profile;
pub mod service;

pub use error::{Result, TransportError};
pub use link::{ConnectionState, Link};
pub use profile::ProfileEvent;
pub use service::{HidService, Reactor, ServiceConfig, DEFAULT_PROFILE_PATH};

//! The `org.bluez.Profile1` object BlueZ calls back into.
//!
//! Callbacks only forward events to the reactor; all connection state lives
//! in [`crate::link::Link`] and is mutated from the reactor alone.

use std::collections::HashMap;
use std::os::fd::OwnedFd;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};
use zbus::interface;
use zbus::zvariant::{self, OwnedObjectPath, OwnedValue};

/// A profile callback, in the order BlueZ delivered it.
#[derive(Debug)]
pub enum ProfileEvent {
    NewConnection { device: String, fd: OwnedFd },
    RequestDisconnection { device: String },
    Release,
}

pub struct HidProfile {
    events: UnboundedSender<ProfileEvent>,
}

impl HidProfile {
    pub fn new(events: UnboundedSender<ProfileEvent>) -> Self {
        Self { events }
    }

    fn forward(&self, event: ProfileEvent) -> zbus::fdo::Result<()> {
        self.events
            .send(event)
            .map_err(|_| zbus::fdo::Error::Failed("reactor stopped".to_string()))
    }
}

#[interface(name = "org.bluez.Profile1")]
impl HidProfile {
    /// BlueZ unregistered the profile.
    async fn release(&self) {
        info!("Profile released by BlueZ");
        let _ = self.forward(ProfileEvent::Release);
    }

    /// A host connected; `fd` is the interrupt channel.
    async fn new_connection(
        &self,
        device: OwnedObjectPath,
        fd: zvariant::OwnedFd,
        properties: HashMap<String, OwnedValue>,
    ) -> zbus::fdo::Result<()> {
        debug!(
            "NewConnection from {} (properties: {:?})",
            device.as_str(),
            properties.keys().collect::<Vec<_>>()
        );
        self.forward(ProfileEvent::NewConnection {
            device: device.as_str().to_string(),
            fd: fd.into(),
        })
    }

    async fn request_disconnection(&self, device: OwnedObjectPath) -> zbus::fdo::Result<()> {
        debug!("RequestDisconnection for {}", device.as_str());
        self.forward(ProfileEvent::RequestDisconnection {
            device: device.as_str().to_string(),
        })
    }
}

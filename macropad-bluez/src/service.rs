//! HID service: adapter setup, profile registration and the reactor.
//!
//! The reactor is the single owner of the [`Link`]. Profile callbacks, channel
//! readiness and the command drain tick all run on it, one at a time.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use macropad_hid::{Command, ServiceRecord, HID_PSM_CONTROL, HID_SERVICE_UUID};
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use zbus::zvariant::{OwnedObjectPath, Value};
use zbus::Connection;

use crate::bluez::{self, Adapter1Proxy, ProfileManager1Proxy};
use crate::error::{Result, TransportError};
use crate::link::Link;
use crate::profile::{HidProfile, ProfileEvent};

pub const DEFAULT_PROFILE_PATH: &str = "/org/bluez/macropad_hid";

/// Everything `start` needs to bring the profile up.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Adapter alias advertised to hosts.
    pub alias: String,
    pub service_name: String,
    pub service_description: String,
    pub provider: String,
    /// L2CAP PSM passed to `RegisterProfile`; `None` lets BlueZ pick.
    pub psm: Option<u16>,
    pub profile_path: String,
    /// Command drain interval.
    pub tick: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        let record = ServiceRecord::default();
        Self {
            alias: record.name.clone(),
            service_name: record.name,
            service_description: record.description,
            provider: record.provider,
            psm: Some(HID_PSM_CONTROL),
            profile_path: DEFAULT_PROFILE_PATH.to_string(),
            tick: Duration::from_millis(10),
        }
    }
}

impl ServiceConfig {
    pub fn record(&self) -> ServiceRecord {
        ServiceRecord {
            name: self.service_name.clone(),
            description: self.service_description.clone(),
            provider: self.provider.clone(),
            psm: self.psm.unwrap_or(HID_PSM_CONTROL),
        }
    }

    /// Options dictionary for `ProfileManager1.RegisterProfile`.
    pub fn profile_options<'a>(&self, record_xml: &'a str) -> HashMap<&'static str, Value<'a>> {
        let mut options = HashMap::new();
        options.insert("ServiceRecord", Value::from(record_xml));
        options.insert("Role", Value::from("server"));
        options.insert("RequireAuthentication", Value::from(false));
        options.insert("RequireAuthorization", Value::from(false));
        options.insert("AutoConnect", Value::from(true));
        if let Some(psm) = self.psm {
            options.insert("PSM", Value::from(psm));
        }
        options
    }
}

/// Event loop owning the link.
pub struct Reactor {
    link: Link,
    events: UnboundedReceiver<ProfileEvent>,
    commands: UnboundedReceiver<Command>,
    tick: Duration,
}

impl Reactor {
    pub fn new(
        events: UnboundedReceiver<ProfileEvent>,
        commands: UnboundedReceiver<Command>,
        tick: Duration,
    ) -> Self {
        Self {
            link: Link::new(),
            events,
            commands,
            tick,
        }
    }

    pub fn link(&self) -> &Link {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut Link {
        &mut self.link
    }

    /// Apply one profile callback to the link.
    pub fn handle_event(&mut self, event: ProfileEvent) -> Result<()> {
        match event {
            ProfileEvent::NewConnection { device, fd } => {
                // A failed initial write already cleaned the link up
                if let Err(e) = self.link.connect(&device, fd) {
                    warn!("Connection from {} dropped: {}", device, e);
                }
                Ok(())
            }
            ProfileEvent::RequestDisconnection { device } => {
                self.link.request_disconnection(&device);
                Ok(())
            }
            ProfileEvent::Release => {
                self.link.cleanup("profile released");
                Err(TransportError::ProfileReleased)
            }
        }
    }

    /// Apply every queued command in arrival order. Returns how many ran.
    ///
    /// A closed command channel is an error unless shutdown is underway.
    pub fn drain(&mut self, running: &AtomicBool) -> Result<usize> {
        let mut count = 0;
        loop {
            match self.commands.try_recv() {
                Ok(command) => {
                    count += 1;
                    match self.link.apply(&command) {
                        Ok(()) | Err(TransportError::NotConnected) => {}
                        // Link already cleaned up; later commands are discarded
                        Err(e) => debug!("{} not delivered: {}", command, e),
                    }
                }
                Err(TryRecvError::Empty) => return Ok(count),
                Err(TryRecvError::Disconnected) => {
                    if running.load(Ordering::SeqCst) {
                        return Err(TransportError::ReactorClosed);
                    }
                    return Ok(count);
                }
            }
        }
    }

    /// Run until `running` clears or the profile is released.
    pub async fn run(&mut self, running: &AtomicBool) -> Result<()> {
        let mut tick = tokio::time::interval(self.tick);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(event) => self.handle_event(event)?,
                    None => return Err(TransportError::ReactorClosed),
                },
                _ = tick.tick() => {
                    if !running.load(Ordering::SeqCst) {
                        info!("Reactor stopping");
                        return Ok(());
                    }
                    self.drain(running)?;
                }
                ready = self.link.readable() => match ready {
                    Ok(()) => self.link.service_channel(),
                    Err(e) => {
                        warn!("Interrupt channel readiness error: {}", e);
                        self.link.cleanup("readiness error");
                    }
                },
            }
        }
    }
}

/// A registered HID profile on the system bus.
pub struct HidService {
    conn: Connection,
    profile_path: OwnedObjectPath,
    reactor: Reactor,
}

impl HidService {
    /// Connect to BlueZ, prepare the default adapter and register the profile.
    ///
    /// Fails on a missing adapter or a rejected registration; neither is
    /// retried.
    pub async fn start(config: &ServiceConfig, commands: UnboundedReceiver<Command>) -> Result<Self> {
        let conn = Connection::system().await?;

        let adapter_path = bluez::find_adapter(&conn).await?;
        let adapter = Adapter1Proxy::builder(&conn)
            .path(adapter_path.clone())?
            .build()
            .await?;
        bluez::prepare_adapter(&adapter, &config.alias).await?;
        info!(
            "Adapter {} ({}) powered, discoverable as {:?}",
            adapter_path.as_str(),
            adapter.address().await.unwrap_or_default(),
            config.alias
        );

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let mut reactor = Reactor::new(events_rx, commands, config.tick);
        reactor.link_mut().begin_registration();

        let profile_path = OwnedObjectPath::try_from(config.profile_path.as_str())
            .map_err(zbus::Error::from)?;
        conn.object_server()
            .at(profile_path.as_str(), HidProfile::new(events_tx))
            .await?;

        let record_xml = config.record().to_xml();
        let manager = ProfileManager1Proxy::new(&conn).await?;
        let registered = manager
            .register_profile(
                &profile_path,
                HID_SERVICE_UUID,
                config.profile_options(&record_xml),
            )
            .await;
        reactor.link_mut().end_registration(registered.is_ok());
        if let Err(e) = registered {
            error!("RegisterProfile failed: {}", e);
            return Err(TransportError::Registration(e));
        }
        info!(
            "HID profile registered at {} (PSM {:?})",
            profile_path.as_str(),
            config.psm
        );

        Ok(Self {
            conn,
            profile_path,
            reactor,
        })
    }

    pub fn link(&self) -> &Link {
        self.reactor.link()
    }

    pub async fn run(&mut self, running: &AtomicBool) -> Result<()> {
        self.reactor.run(running).await
    }

    /// Drop any host, unregister the profile and release the bus connection.
    pub async fn stop(mut self) -> Result<()> {
        if self.reactor.link().is_connected() {
            self.reactor.link_mut().cleanup("service stopping");
        }

        let manager = ProfileManager1Proxy::new(&self.conn).await?;
        let result = match manager.unregister_profile(&self.profile_path).await {
            Ok(()) => {
                info!("HID profile unregistered");
                Ok(())
            }
            Err(e) if bluez::is_does_not_exist(&e) => {
                debug!("Profile already unregistered");
                Ok(())
            }
            Err(e) => Err(TransportError::DBus(e)),
        };

        if let Err(e) = self
            .conn
            .object_server()
            .remove::<HidProfile, _>(self.profile_path.as_str())
            .await
        {
            debug!("Removing profile object: {}", e);
        }
        drop(self.conn);
        result
    }
}

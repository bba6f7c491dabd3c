//! Connection state machine for the single host link.
//!
//! ```text
//! Idle ──start──▶ Registering ──registered──▶ Idle
//! Idle ──NewConnection──▶ Connected ──hangup / write error / RequestDisconnection──▶ Disconnecting ──▶ Idle
//! ```
//!
//! A `NewConnection` while already connected tears the old link down first.
//! Every transition into `Idle` zeroes the report and the last-sent cache.

use std::io;
use std::os::fd::OwnedFd;

use macropad_hid::{Command, KeyboardReport, ReportMachine, ReportSink};
use tracing::{debug, info, trace, warn};

use crate::channel::{Inbound, InterruptChannel};
use crate::error::{Result, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Registering,
    Connected,
    Disconnecting,
}

/// HIDP header of a host-to-device output report on the interrupt channel.
const HIDP_DATA_OUTPUT: u8 = 0xA2;

/// Host LED bits (NumLock, CapsLock, ScrollLock, Compose, Kana).
pub mod leds {
    pub const NUM_LOCK: u8 = 0x01;
    pub const CAPS_LOCK: u8 = 0x02;
    pub const SCROLL_LOCK: u8 = 0x04;
    pub const COMPOSE: u8 = 0x08;
    pub const KANA: u8 = 0x10;
}

/// Extract the LED bitmask from host data, if it carries one.
pub fn decode_leds(data: &[u8]) -> Option<u8> {
    match data {
        [mask] => Some(mask & 0x1F),
        [HIDP_DATA_OUTPUT, mask] => Some(mask & 0x1F),
        _ => None,
    }
}

struct ChannelSink<'a>(&'a InterruptChannel);

impl ReportSink for ChannelSink<'_> {
    fn send_report(&mut self, report: &KeyboardReport) -> io::Result<()> {
        self.0.write(&report.to_bytes())
    }
}

struct Active {
    device: String,
    channel: InterruptChannel,
}

/// Owns the connection identity, its interrupt channel and the report state.
pub struct Link {
    state: ConnectionState,
    active: Option<Active>,
    reports: ReportMachine,
    host_leds: Option<u8>,
    discarded: u64,
}

impl Default for Link {
    fn default() -> Self {
        Self::new()
    }
}

impl Link {
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Idle,
            active: None,
            reports: ReportMachine::new(),
            host_leds: None,
            discarded: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn device(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.device.as_str())
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn report(&self) -> &KeyboardReport {
        self.reports.state()
    }

    pub fn last_sent(&self) -> &KeyboardReport {
        self.reports.last_sent()
    }

    /// LED state the host last sent, if any.
    pub fn host_leds(&self) -> Option<u8> {
        self.host_leds
    }

    /// Commands dropped because no host was connected.
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    pub fn rollover_count(&self) -> u64 {
        self.reports.rollover_count()
    }

    pub fn begin_registration(&mut self) {
        if self.state == ConnectionState::Idle {
            self.state = ConnectionState::Registering;
        }
    }

    /// Registration finished; `ok == false` leaves the link idle for good.
    pub fn end_registration(&mut self, ok: bool) {
        if self.state == ConnectionState::Registering {
            self.state = ConnectionState::Idle;
        }
        if !ok {
            debug!("Registration failed, link stays idle");
        }
    }

    /// Adopt a new host connection.
    ///
    /// Any current connection is cleaned up first. The new host immediately
    /// receives an all-zero report; if that write fails the link is cleaned
    /// up again and the error returned.
    pub fn connect(&mut self, device: &str, fd: OwnedFd) -> Result<()> {
        if let Some(old) = self.device() {
            info!("Replacing connection {} with {}", old, device);
            self.cleanup("replaced by new connection");
        }

        let channel = InterruptChannel::new(fd)?;
        info!(
            "Host {} connected (interrupt channel fd {})",
            device,
            channel.raw_fd()
        );
        self.reports.reset();
        self.host_leds = None;
        self.active = Some(Active {
            device: device.to_string(),
            channel,
        });
        self.state = ConnectionState::Connected;

        if let Err(e) = self.send_raw(&KeyboardReport::EMPTY) {
            warn!("Initial report to {} failed: {}", device, e);
            self.cleanup("initial report failed");
            return Err(e.into());
        }
        Ok(())
    }

    fn send_raw(&self, report: &KeyboardReport) -> io::Result<()> {
        let active = self
            .active
            .as_ref()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotConnected))?;
        active.channel.write(&report.to_bytes())
    }

    /// BlueZ asked to drop `device`. Returns whether it was the current host.
    pub fn request_disconnection(&mut self, device: &str) -> bool {
        if self.device() == Some(device) {
            self.cleanup("disconnection requested");
            return true;
        }
        debug!(
            "Ignoring RequestDisconnection for {} (current: {:?})",
            device,
            self.device()
        );
        false
    }

    /// Apply one command and transmit the result if it changed.
    ///
    /// With no host connected the command is discarded, so the report stays
    /// all-zero until the next connection.
    pub fn apply(&mut self, command: &Command) -> Result<()> {
        let Some(active) = self.active.as_ref() else {
            self.discarded += 1;
            trace!("No host, discarding {}", command);
            return Err(TransportError::NotConnected);
        };

        let mut sink = ChannelSink(&active.channel);
        match self.reports.process(command, &mut sink) {
            Ok(_) => Ok(()),
            Err(e) => {
                warn!("Report send failed: {}", e);
                self.cleanup("send failed");
                Err(e.into())
            }
        }
    }

    /// Wait for the interrupt channel to become readable.
    ///
    /// Pending forever when idle, so it can sit in a `select!` unconditionally.
    pub async fn readable(&self) -> io::Result<()> {
        match self.active.as_ref() {
            Some(active) => active.channel.readable().await,
            None => std::future::pending().await,
        }
    }

    /// Handle readability on the interrupt channel.
    pub fn service_channel(&mut self) {
        let Some(active) = self.active.as_ref() else {
            return;
        };
        match active.channel.read() {
            Ok(Inbound::Data(data)) => {
                debug!("Host data: {}", hex(&data));
                if let Some(mask) = decode_leds(&data) {
                    if self.host_leds != Some(mask) {
                        debug!("Host LEDs 0x{:02x}", mask);
                    }
                    self.host_leds = Some(mask);
                }
            }
            Ok(Inbound::Empty) => {}
            Ok(Inbound::Closed) => self.cleanup("host hung up"),
            Err(e) => {
                warn!("Interrupt channel error: {}", e);
                self.cleanup("channel error");
            }
        }
    }

    /// Tear down the current connection, if any, and return to `Idle`.
    pub fn cleanup(&mut self, reason: &str) {
        if let Some(active) = self.active.take() {
            self.state = ConnectionState::Disconnecting;
            info!(
                "Cleaning up connection {} (fd {}): {}",
                active.device,
                active.channel.raw_fd(),
                reason
            );
            // Dropping the channel deregisters and closes the descriptor
            drop(active);
        }
        self.reports.reset();
        self.host_leds = None;
        if self.state != ConnectionState::Registering {
            self.state = ConnectionState::Idle;
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

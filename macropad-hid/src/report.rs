//! Boot keyboard input report and the state machine that maintains it.
//!
//! Wire layout (8 bytes, no report ID prefix):
//!
//! ```text
//! [modifier] [reserved=0x00] [key1] [key2] [key3] [key4] [key5] [key6]
//! ```
//!
//! Key slots are filled left-to-right and never compacted: releasing a key
//! zeroes its slot in place, so the remaining keys keep their positions.

use std::fmt;
use std::io;

use tracing::{debug, warn};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::command::{Command, Direction};
use crate::keycodes;

/// Number of simultaneously reportable non-modifier keys.
pub const KEY_SLOTS: usize = 6;

/// Size of one input report on the wire.
pub const REPORT_LEN: usize = 8;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, IntoBytes, FromBytes, KnownLayout, Immutable,
)]
#[repr(C)]
pub struct KeyboardReport {
    pub modifier: u8,
    reserved: u8,
    pub keys: [u8; KEY_SLOTS],
}

/// Result of seating a usage code in the key slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Seat {
    Seated,
    AlreadyHeld,
    Rollover,
}

impl KeyboardReport {
    /// All keys up.
    pub const EMPTY: KeyboardReport = KeyboardReport {
        modifier: 0,
        reserved: 0,
        keys: [0; KEY_SLOTS],
    };

    pub fn new(modifier: u8, keys: [u8; KEY_SLOTS]) -> Self {
        Self {
            modifier,
            reserved: 0,
            keys,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }

    pub fn to_bytes(&self) -> [u8; REPORT_LEN] {
        let mut out = [0u8; REPORT_LEN];
        out.copy_from_slice(self.as_bytes());
        out
    }

    /// Usage codes currently held, in slot order.
    pub fn held(&self) -> impl Iterator<Item = u8> + '_ {
        self.keys.iter().copied().filter(|&code| code != 0)
    }

    fn seat(&mut self, usage: u8) -> Seat {
        if self.keys.contains(&usage) {
            return Seat::AlreadyHeld;
        }
        match self.keys.iter_mut().find(|slot| **slot == 0) {
            Some(slot) => {
                *slot = usage;
                Seat::Seated
            }
            None => Seat::Rollover,
        }
    }

    fn unseat(&mut self, usage: u8) -> bool {
        match self.keys.iter_mut().find(|slot| **slot == usage) {
            Some(slot) => {
                *slot = 0;
                true
            }
            None => false,
        }
    }
}

impl fmt::Display for KeyboardReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.as_bytes().iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Destination for reports that differ from the last one transmitted.
///
/// The Bluetooth link implements this over its interrupt channel; tests use a
/// recording sink.
pub trait ReportSink {
    fn send_report(&mut self, report: &KeyboardReport) -> io::Result<()>;
}

/// What applying one command did to the report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Applied {
    /// Report contents changed.
    pub changed: bool,
    /// Usage codes dropped because all six slots were occupied.
    pub dropped: Vec<u8>,
}

impl Applied {
    pub fn rollover(&self) -> bool {
        !self.dropped.is_empty()
    }
}

/// Report state plus the cache of the last report the host confirmed.
///
/// Owned by the reactor; nothing outside it touches either report.
#[derive(Debug, Default)]
pub struct ReportMachine {
    state: KeyboardReport,
    last_sent: KeyboardReport,
    rollovers: u64,
}

impl ReportMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &KeyboardReport {
        &self.state
    }

    pub fn last_sent(&self) -> &KeyboardReport {
        &self.last_sent
    }

    /// Number of key presses lost to rollover since creation.
    pub fn rollover_count(&self) -> u64 {
        self.rollovers
    }

    /// Apply one command to the report state.
    pub fn apply(&mut self, command: &Command) -> Applied {
        let before = self.state;
        let mut dropped = Vec::new();

        for name in &command.keys {
            let code = keycodes::lookup(name);
            if code.is_modifier() {
                match command.direction {
                    Direction::Press => self.state.modifier |= code.modifier,
                    Direction::Release => self.state.modifier &= !code.modifier,
                }
            }
            if code.usage == 0 {
                continue;
            }
            match command.direction {
                Direction::Press => {
                    if self.state.seat(code.usage) == Seat::Rollover {
                        warn!(
                            "Key slots full (max {} simultaneous keys), dropping {}",
                            KEY_SLOTS, name
                        );
                        dropped.push(code.usage);
                    }
                }
                Direction::Release => {
                    if !self.state.unseat(code.usage) {
                        debug!("Release of {} which is not held", name);
                    }
                }
            }
        }

        self.rollovers += dropped.len() as u64;
        debug!("{} -> report {}", command, self.state);
        Applied {
            changed: self.state != before,
            dropped,
        }
    }

    /// The current report if it differs from the last one sent.
    pub fn pending(&self) -> Option<KeyboardReport> {
        (self.state != self.last_sent).then_some(self.state)
    }

    /// Record a confirmed transmission.
    pub fn mark_sent(&mut self, report: KeyboardReport) {
        self.last_sent = report;
    }

    /// Send the pending report, if any.
    ///
    /// Returns `Ok(true)` when a report went out and `Ok(false)` when there was
    /// nothing new. On error `last_sent` stays stale, so the next differing
    /// state is sent again.
    pub fn flush<S: ReportSink + ?Sized>(&mut self, sink: &mut S) -> io::Result<bool> {
        let Some(report) = self.pending() else {
            return Ok(false);
        };
        sink.send_report(&report)?;
        self.mark_sent(report);
        Ok(true)
    }

    /// Apply a command and flush the result.
    pub fn process<S: ReportSink + ?Sized>(
        &mut self,
        command: &Command,
        sink: &mut S,
    ) -> io::Result<Applied> {
        let applied = self.apply(command);
        self.flush(sink)?;
        Ok(applied)
    }

    /// Zero both the state and the last-sent cache.
    pub fn reset(&mut self) {
        self.state = KeyboardReport::EMPTY;
        self.last_sent = KeyboardReport::EMPTY;
    }
}

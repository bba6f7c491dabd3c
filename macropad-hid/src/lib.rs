//! HID keyboard logic for the MacroPad Bluetooth bridge
//!
//! Everything in this crate is pure state and byte layout, with no I/O:
//!
//! - [`keycodes`]: key name → (modifier mask, usage code) table
//! - [`command`]: press/release commands flowing from the dispatcher
//! - [`report`]: the 8-byte boot keyboard report and its state machine
//! - [`descriptor`]: the HID report descriptor and SDP service record

pub mod command;
pub mod descriptor;
pub mod keycodes;
pub mod report;

pub use command::{Command, Direction};
pub use descriptor::{
    descriptor_hex, report_layout, ReportLayout, ServiceRecord, HID_PSM_CONTROL, HID_SERVICE_UUID,
    KEYBOARD_REPORT_DESCRIPTOR,
};
pub use keycodes::{mods, KeyCode};
pub use report::{Applied, KeyboardReport, ReportMachine, ReportSink, KEY_SLOTS, REPORT_LEN};

//! Command handlers for the CLI application.
//!
//! - `run`: the bridge daemon (default)
//! - `keys`: key name table
//! - `actions`: actions, triggers and current mappings
//! - `check`: config validation
//! - `sdp`: SDP record and report descriptor dump

pub mod actions;
pub mod check;
pub mod keys;
pub mod run;
pub mod sdp;

use anyhow::{Context, Result};
use macropad::Config;
use std::path::Path;

/// Load the config without writing defaults back.
pub fn load_config(path: &Path) -> Result<Config> {
    Config::load(path).with_context(|| format!("loading {}", path.display()))
}

/// `0x04` style, or `-` for zero.
pub fn hex_or_dash(value: u8) -> String {
    if value == 0 {
        "-".to_string()
    } else {
        format!("0x{value:02X}")
    }
}

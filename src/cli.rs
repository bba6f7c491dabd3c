// CLI definitions using clap

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "macropad")]
#[command(author, version, about = "Bluetooth HID keyboard bridge for a knob-and-buttons macro pad")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file path (default: ~/.config/macropad/config.toml)
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the bridge (default)
    Run,

    /// List key names with their modifier mask and usage code
    Keys {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List actions with their triggers and current mapping
    Actions {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate the config file
    Check,

    /// Print the SDP service record and HID report descriptor
    Sdp,
}

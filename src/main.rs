//! MacroPad Bluetooth HID bridge
//!
//! Reads knob and button events from evdev and types them on a paired host
//! as a Bluetooth keyboard.

use anyhow::Result;
use clap::Parser;

// CLI definitions
mod cli;
use cli::{Cli, Commands};

// Command handlers
mod commands;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config_path = cli.config.unwrap_or_else(macropad::Config::default_path);

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => commands::run::run(config_path).await,
        Commands::Keys { json } => commands::keys::keys(json),
        Commands::Actions { json } => commands::actions::actions(&config_path, json),
        Commands::Check => commands::check::check(&config_path),
        Commands::Sdp => commands::sdp::sdp(&config_path),
    }
}

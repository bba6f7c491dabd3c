//! `check`: validate the config file.
//!
//! Trigger conflicts fail the check; everything else is a warning because the
//! daemon tolerates it at runtime.

use anyhow::{bail, Result};
use macropad::dispatch::TriggerTable;
use macropad::mapping;
use std::path::Path;

use super::load_config;

pub fn check(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    println!("Config: {}", config_path.display());
    if !config_path.exists() {
        println!("  (file does not exist, checked defaults)");
    }

    let mut warnings = 0;
    for name in config.unknown_trigger_actions() {
        println!("  warning: [triggers] names unknown action {name:?}");
        warnings += 1;
    }
    for issue in mapping::validate(&config.mappings) {
        println!("  warning: {issue}");
        warnings += 1;
    }
    for path in &config.device_paths {
        if !path.exists() {
            println!("  warning: input device {} not present", path.display());
            warnings += 1;
        }
    }

    let conflicts = TriggerTable::conflicts(&config.trigger_entries());
    for conflict in &conflicts {
        println!("  error: {conflict}");
    }
    if !conflicts.is_empty() {
        bail!("{} trigger conflict(s)", conflicts.len());
    }

    println!("OK ({warnings} warning(s))");
    Ok(())
}

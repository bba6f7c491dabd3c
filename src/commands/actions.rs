//! `actions`: list actions with trigger events and current mapping.

use anyhow::Result;
use serde_json::json;
use std::path::Path;

use super::load_config;

pub fn actions(config_path: &Path, json: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let entries = config.trigger_entries();

    if json {
        let rows: Vec<_> = entries
            .iter()
            .map(|(id, triggers)| {
                json!({
                    "action": id,
                    "triggers": triggers,
                    "mapping": config.mappings.get(*id),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    for (id, triggers) in &entries {
        let triggers: Vec<String> = triggers.iter().map(ToString::to_string).collect();
        let mapping = config
            .mappings
            .get(*id)
            .map(ToString::to_string)
            .unwrap_or_else(|| "(unmapped)".to_string());
        println!("{:<22} {:<14} {}", id, triggers.join(" "), mapping);
    }
    Ok(())
}

//! `keys`: print the key name table.

use anyhow::Result;
use macropad_hid::keycodes::KEY_TABLE;
use serde_json::json;

use super::hex_or_dash;

pub fn keys(json: bool) -> Result<()> {
    if json {
        let rows: Vec<_> = KEY_TABLE
            .iter()
            .map(|(name, code)| json!({ "name": name, "modifier": code.modifier, "usage": code.usage }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!("{:<16} {:>8} {:>6}", "KEY", "MODIFIER", "USAGE");
    for (name, code) in KEY_TABLE {
        println!(
            "{:<16} {:>8} {:>6}",
            name,
            hex_or_dash(code.modifier),
            hex_or_dash(code.usage)
        );
    }
    println!("\n{} keys", KEY_TABLE.len());
    Ok(())
}

//! `sdp`: dump the SDP service record and report descriptor.

use anyhow::Result;
use macropad_hid::{descriptor_hex, report_layout, KEYBOARD_REPORT_DESCRIPTOR};
use std::path::Path;

use super::load_config;

pub fn sdp(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let service = config.service_config();

    print!("{}", service.record().to_xml());

    let layout = report_layout(&KEYBOARD_REPORT_DESCRIPTOR);
    println!();
    println!("Report descriptor ({} bytes):", KEYBOARD_REPORT_DESCRIPTOR.len());
    println!("  {}", descriptor_hex(&KEYBOARD_REPORT_DESCRIPTOR));
    println!(
        "  input report: {} bytes, output report: {} bytes, report IDs: {}",
        layout.input_bytes(),
        layout.output_bytes(),
        if layout.report_ids.is_empty() {
            "none".to_string()
        } else {
            format!("{:?}", layout.report_ids)
        }
    );
    println!("Profile path: {}", service.profile_path);
    match service.psm {
        Some(psm) => println!("PSM: 0x{psm:04X}"),
        None => println!("PSM: chosen by BlueZ"),
    }
    Ok(())
}

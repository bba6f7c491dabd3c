//! HID report descriptor and the SDP service record advertised with the
//! BlueZ profile.

use std::fmt::Write as _;

/// Human Interface Device service class UUID.
pub const HID_SERVICE_UUID: &str = "00001124-0000-1000-8000-00805f9b34fb";

/// L2CAP PSM of the HID control channel.
pub const HID_PSM_CONTROL: u16 = 0x0011;

/// Boot-compatible keyboard: one 8-byte input report (modifiers, reserved,
/// six key slots) and a one-byte LED output report. No report IDs.
#[rustfmt::skip]
pub const KEYBOARD_REPORT_DESCRIPTOR: [u8; 63] = [
    0x05, 0x01,       // Usage Page (Generic Desktop)
    0x09, 0x06,       // Usage (Keyboard)
    0xA1, 0x01,       // Collection (Application)
    0x05, 0x07,       //   Usage Page (Keyboard/Keypad)
    0x19, 0xE0,       //   Usage Minimum (Left Control)
    0x29, 0xE7,       //   Usage Maximum (Right GUI)
    0x15, 0x00,       //   Logical Minimum (0)
    0x25, 0x01,       //   Logical Maximum (1)
    0x75, 0x01,       //   Report Size (1)
    0x95, 0x08,       //   Report Count (8)
    0x81, 0x02,       //   Input (Data, Variable, Absolute) modifiers
    0x95, 0x01,       //   Report Count (1)
    0x75, 0x08,       //   Report Size (8)
    0x81, 0x03,       //   Input (Constant) reserved
    0x95, 0x05,       //   Report Count (5)
    0x75, 0x01,       //   Report Size (1)
    0x05, 0x08,       //   Usage Page (LEDs)
    0x19, 0x01,       //   Usage Minimum (Num Lock)
    0x29, 0x05,       //   Usage Maximum (Kana)
    0x91, 0x02,       //   Output (Data, Variable, Absolute) LEDs
    0x95, 0x01,       //   Report Count (1)
    0x75, 0x03,       //   Report Size (3)
    0x91, 0x03,       //   Output (Constant) padding
    0x95, 0x06,       //   Report Count (6)
    0x75, 0x08,       //   Report Size (8)
    0x15, 0x00,       //   Logical Minimum (0)
    0x25, 0x65,       //   Logical Maximum (101)
    0x05, 0x07,       //   Usage Page (Keyboard/Keypad)
    0x19, 0x00,       //   Usage Minimum (0)
    0x29, 0x65,       //   Usage Maximum (101)
    0x81, 0x00,       //   Input (Data, Array) key slots
    0xC0,             // End Collection
];

/// Lower-case hex of a descriptor, as embedded in the SDP record.
pub fn descriptor_hex(descriptor: &[u8]) -> String {
    let mut out = String::with_capacity(descriptor.len() * 2);
    for byte in descriptor {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Report sizes a descriptor declares, summed over main items. Sums saturate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportLayout {
    pub input_bits: u32,
    pub output_bits: u32,
    pub feature_bits: u32,
    pub report_ids: Vec<u8>,
}

impl ReportLayout {
    pub fn input_bytes(&self) -> u32 {
        self.input_bits.div_ceil(8)
    }

    pub fn output_bytes(&self) -> u32 {
        self.output_bits.div_ceil(8)
    }
}

/// Walk the short items of a report descriptor and total the bits of each
/// Input/Output/Feature item (`Report Size * Report Count`).
///
/// Long items are skipped. A truncated trailing item is ignored.
pub fn report_layout(descriptor: &[u8]) -> ReportLayout {
    let mut layout = ReportLayout::default();
    let mut report_size = 0u32;
    let mut report_count = 0u32;
    let mut i = 0;

    while i < descriptor.len() {
        let prefix = descriptor[i];

        // Long item: 0xFE, data size, tag, data
        if prefix == 0xFE {
            let len = descriptor.get(i + 1).copied().unwrap_or(0) as usize;
            i += 3 + len;
            continue;
        }

        let size = match prefix & 0x03 {
            3 => 4,
            n => n as usize,
        };
        let Some(data) = descriptor.get(i + 1..i + 1 + size) else {
            break;
        };
        let value = data
            .iter()
            .rev()
            .fold(0u32, |acc, &b| (acc << 8) | u32::from(b));

        let field_bits = report_size.saturating_mul(report_count);
        match prefix & 0xFC {
            0x74 => report_size = value,
            0x94 => report_count = value,
            0x84 => layout.report_ids.push(value as u8),
            0x80 => layout.input_bits = layout.input_bits.saturating_add(field_bits),
            0x90 => layout.output_bits = layout.output_bits.saturating_add(field_bits),
            0xB0 => layout.feature_bits = layout.feature_bits.saturating_add(field_bits),
            _ => {}
        }
        i += 1 + size;
    }
    layout
}

/// Strings and PSM that vary per installation; everything else in the
/// record is fixed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRecord {
    pub name: String,
    pub description: String,
    pub provider: String,
    pub psm: u16,
}

impl Default for ServiceRecord {
    fn default() -> Self {
        Self {
            name: "MacroPad HID".to_string(),
            description: "Bluetooth HID Keyboard".to_string(),
            provider: "MacroPad".to_string(),
            psm: HID_PSM_CONTROL,
        }
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

impl ServiceRecord {
    /// SDP record XML for `org.bluez.ProfileManager1.RegisterProfile`.
    pub fn to_xml(&self) -> String {
        let mut xml = String::with_capacity(2048);
        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\" ?>\n<record>\n");

        // ServiceClassIDList
        attr_seq(&mut xml, 0x0001, &["<uuid value=\"0x1124\" />"]);
        // ProtocolDescriptorList: L2CAP(psm), HIDP
        let l2cap = format!(
            "<sequence><uuid value=\"0x0100\" /><uint16 value=\"0x{:04x}\" /></sequence>",
            self.psm
        );
        attr_seq(
            &mut xml,
            0x0004,
            &[&l2cap, "<sequence><uuid value=\"0x0011\" /></sequence>"],
        );
        // BrowseGroupList
        attr_seq(&mut xml, 0x0005, &["<uuid value=\"0x1002\" />"]);
        // LanguageBaseAttributeIDList: "en", UTF-8, base 0x0100
        attr_seq(
            &mut xml,
            0x0006,
            &[
                "<uint16 value=\"0x656e\" />",
                "<uint16 value=\"0x006a\" />",
                "<uint16 value=\"0x0100\" />",
            ],
        );
        // BluetoothProfileDescriptorList: HID v1.01
        attr_seq(
            &mut xml,
            0x0009,
            &["<sequence><uuid value=\"0x1124\" /><uint16 value=\"0x0101\" /></sequence>"],
        );
        attr(&mut xml, 0x0100, &text(&self.name));
        attr(&mut xml, 0x0101, &text(&self.description));
        attr(&mut xml, 0x0102, &text(&self.provider));
        // HIDParserVersion, HIDDeviceSubclass (keyboard), HIDCountryCode
        attr(&mut xml, 0x0201, "<uint16 value=\"0x0111\" />");
        attr(&mut xml, 0x0202, "<uint8 value=\"0x40\" />");
        attr(&mut xml, 0x0203, "<uint8 value=\"0x00\" />");
        // HIDVirtualCable, HIDReconnectInitiate
        attr(&mut xml, 0x0204, "<boolean value=\"true\" />");
        attr(&mut xml, 0x0205, "<boolean value=\"true\" />");
        // HIDDescriptorList: report descriptor (0x22)
        let descriptor = format!(
            "<sequence><uint8 value=\"0x22\" /><text encoding=\"hex\" value=\"{}\" /></sequence>",
            descriptor_hex(&KEYBOARD_REPORT_DESCRIPTOR)
        );
        attr_seq(&mut xml, 0x0206, &[&descriptor]);
        // HIDLANGIDBaseList
        attr_seq(
            &mut xml,
            0x0207,
            &["<sequence><uint16 value=\"0x0409\" /><uint16 value=\"0x0100\" /></sequence>"],
        );
        // HIDBatteryPower, HIDRemoteWake, HIDNormallyConnectable
        attr(&mut xml, 0x0209, "<boolean value=\"true\" />");
        attr(&mut xml, 0x020B, "<boolean value=\"false\" />");
        attr(&mut xml, 0x020E, "<boolean value=\"true\" />");

        xml.push_str("</record>\n");
        xml
    }
}

fn text(value: &str) -> String {
    format!("<text value=\"{}\" />", escape(value))
}

fn attr(xml: &mut String, id: u16, body: &str) {
    let _ = writeln!(xml, "  <attribute id=\"0x{id:04x}\">{body}</attribute>");
}

fn attr_seq(xml: &mut String, id: u16, items: &[&str]) {
    attr(xml, id, &format!("<sequence>{}</sequence>", items.concat()));
}

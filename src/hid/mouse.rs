//! USB HID mouse report (boot protocol compatible).
//!
//! Layout (4 bytes):
//! ```text
//! Byte 0: Button bitfield
//!         Bit 0 = Left (trackpad click), Bit 1 = Right (app)
//! Byte 1: X displacement (signed)
//! Byte 2: Y displacement (signed)
//! Byte 3: Scroll wheel  (signed)
//! ```

/// Mouse report size in bytes.
pub const MOUSE_REPORT_SIZE: usize = 4;

pub const BUTTON_LEFT: u8 = 1 << 0;
pub const BUTTON_RIGHT: u8 = 1 << 1;

/// Standard USB HID boot-protocol mouse report.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MouseReport {
    /// Button bitfield (bit 0 = left, bit 1 = right).
    pub buttons: u8,
    /// Relative X movement (signed).
    pub x: i8,
    /// Relative Y movement (signed).
    pub y: i8,
    /// Scroll wheel delta (signed).
    pub wheel: i8,
}

impl MouseReport {
    /// Create an idle (no movement, no buttons) report.
    pub const fn empty() -> Self {
        Self {
            buttons: 0,
            x: 0,
            y: 0,
            wheel: 0,
        }
    }

    /// Serialise into a byte slice for USB HID transmission.
    /// Returns the number of bytes written (always 4).
    pub fn serialize(&self, buf: &mut [u8]) -> usize {
        if buf.len() < MOUSE_REPORT_SIZE {
            return 0;
        }
        buf[0] = self.buttons;
        buf[1] = self.x as u8;
        buf[2] = self.y as u8;
        buf[3] = self.wheel as u8;
        MOUSE_REPORT_SIZE
    }

    pub fn to_bytes(&self) -> [u8; MOUSE_REPORT_SIZE] {
        let mut buf = [0u8; MOUSE_REPORT_SIZE];
        self.serialize(&mut buf);
        buf
    }

    /// Returns `true` when no buttons are pressed and there is no movement.
    #[cfg(test)]
    pub fn is_idle(&self) -> bool {
        self.buttons == 0 && self.x == 0 && self.y == 0 && self.wheel == 0
    }
}

// USB HID report descriptor for a boot-protocol mouse

/// USB HID Report Descriptor for a 2-button mouse with scroll wheel.
pub const MOUSE_REPORT_DESCRIPTOR: &[u8] = &[
    0x05, 0x01, // Usage Page (Generic Desktop)
    0x09, 0x02, // Usage (Mouse)
    0xA1, 0x01, // Collection (Application)
    0x09, 0x01, //   Usage (Pointer)
    0xA1, 0x00, //   Collection (Physical)
    //
    //   - Buttons (2 bits + 6 padding) -
    0x05, 0x09, //     Usage Page (Buttons)
    0x19, 0x01, //     Usage Minimum (Button 1)
    0x29, 0x02, //     Usage Maximum (Button 2)
    0x15, 0x00, //     Logical Minimum (0)
    0x25, 0x01, //     Logical Maximum (1)
    0x95, 0x02, //     Report Count (2)
    0x75, 0x01, //     Report Size (1)
    0x81, 0x02, //     Input (Data, Variable, Absolute)
    0x95, 0x01, //     Report Count (1)
    0x75, 0x06, //     Report Size (6)
    0x81, 0x01, //     Input (Constant) - padding
    //
    //   - X, Y displacement -
    0x05, 0x01, //     Usage Page (Generic Desktop)
    0x09, 0x30, //     Usage (X)
    0x09, 0x31, //     Usage (Y)
    0x15, 0x81, //     Logical Minimum (-127)
    0x25, 0x7F, //     Logical Maximum (127)
    0x75, 0x08, //     Report Size (8)
    0x95, 0x02, //     Report Count (2)
    0x81, 0x06, //     Input (Data, Variable, Relative)
    //
    //   - Scroll wheel -
    0x09, 0x38, //     Usage (Wheel)
    0x15, 0x81, //     Logical Minimum (-127)
    0x25, 0x7F, //     Logical Maximum (127)
    0x75, 0x08, //     Report Size (8)
    0x95, 0x01, //     Report Count (1)
    0x81, 0x06, //     Input (Data, Variable, Relative)
    //
    0xC0, //   End Collection (Physical)
    0xC0, // End Collection (Application)
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_layout() {
        let report = MouseReport {
            buttons: BUTTON_LEFT | BUTTON_RIGHT,
            x: -1,
            y: 127,
            wheel: -128,
        };
        assert_eq!(report.to_bytes(), [0x03, 0xFF, 0x7F, 0x80]);
    }

    #[test]
    fn serialize_rejects_short_buffer() {
        let mut buf = [0u8; 3];
        assert_eq!(MouseReport::empty().serialize(&mut buf), 0);
    }

    #[test]
    fn empty_is_idle() {
        assert!(MouseReport::empty().is_idle());
        assert!(!MouseReport { wheel: 1, ..MouseReport::empty() }.is_idle());
    }

    #[test]
    fn descriptor_declares_four_byte_input() {
        // 2 button bits + 6 padding + X + Y + wheel = 32 bits
        let d = MOUSE_REPORT_DESCRIPTOR;
        assert_eq!(d.first(), Some(&0x05));
        assert_eq!(d.last(), Some(&0xC0));
        let button_bits = 2 * 1 + 6;
        let axis_bits = 2 * 8 + 8;
        assert_eq!((button_bits + axis_bits) / 8, MOUSE_REPORT_SIZE);
    }
}

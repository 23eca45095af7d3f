//! Typed samples and sequence / timestamp bookkeeping.

use super::bits::{extract_signed, extract_unsigned, FieldSpec};
use super::RawPacket;

/// Wire field table. Y axes are mirrored into the mouse frame after
/// extraction.
pub mod layout {
    use super::FieldSpec;

    pub const TIMESTAMP: FieldSpec = FieldSpec::new(0, 8, 1, 7);
    pub const SQN: FieldSpec = FieldSpec::new(1, 7, 1, 2);

    pub const ORIENT_X: FieldSpec = FieldSpec::new(1, 2, 3, 5);
    pub const ORIENT_Z: FieldSpec = FieldSpec::new(3, 5, 4, 0);
    pub const ORIENT_Y: FieldSpec = FieldSpec::new(5, 8, 6, 3);

    pub const ACCEL_X: FieldSpec = FieldSpec::new(6, 3, 8, 6);
    pub const ACCEL_Z: FieldSpec = FieldSpec::new(8, 6, 9, 1);
    pub const ACCEL_Y: FieldSpec = FieldSpec::new(9, 1, 11, 4);

    pub const GYRO_X: FieldSpec = FieldSpec::new(11, 4, 13, 7);
    pub const GYRO_Z: FieldSpec = FieldSpec::new(13, 7, 14, 2);
    pub const GYRO_Y: FieldSpec = FieldSpec::new(14, 2, 16, 5);

    pub const TRACKPAD_X: FieldSpec = FieldSpec::new(16, 5, 17, 5);
    pub const TRACKPAD_Y: FieldSpec = FieldSpec::new(17, 5, 18, 5);

    /// Button flags: the low five bits of byte 18, below TRACKPAD_Y's tail.
    pub const BUTTONS: FieldSpec = FieldSpec::new(18, 5, 18, 0);
    pub const VOL_UP: u8 = 0x10;
    pub const VOL_DOWN: u8 = 0x08;
    pub const APP: u8 = 0x04;
    pub const HOME: u8 = 0x02;
    pub const TRACKPAD_CLICK: u8 = 0x01;
}

/// Modulus of the 5-bit sequence counter.
pub const SQN_MODULUS: u8 = 32;

/// Modulus of the 9-bit device clock.
pub const TIMESTAMP_MODULUS: u16 = 512;

/// Three signed axes of one sensor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Axes {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

/// Button flags from the status byte.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ButtonFlags {
    pub vol_up: bool,
    pub vol_down: bool,
    pub app: bool,
    pub home: bool,
    pub trackpad_click: bool,
}

impl ButtonFlags {
    pub fn from_status(status: u8) -> Self {
        Self {
            vol_up: status & layout::VOL_UP != 0,
            vol_down: status & layout::VOL_DOWN != 0,
            app: status & layout::APP != 0,
            home: status & layout::HOME != 0,
            trackpad_click: status & layout::TRACKPAD_CLICK != 0,
        }
    }
}

/// One decoded observation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DecodedSample {
    pub sqn: u8,
    pub timestamp: u16,
    /// Device ticks (ms) since the previous sample of the session.
    pub duration: i32,
    pub orient: Axes,
    pub accel: Axes,
    pub gyro: Axes,
    /// Absolute trackpad position; `(0, 0)` means the finger is lifted.
    pub trackpad_x: u8,
    pub trackpad_y: u8,
    pub buttons: ButtonFlags,
}

impl DecodedSample {
    /// Decode every field of `packet`; `duration` comes from the assembler.
    pub fn decode(packet: &RawPacket, duration: i32) -> Self {
        Self {
            sqn: read_sqn(packet),
            timestamp: read_timestamp(packet),
            duration,
            orient: Axes {
                x: extract_signed(packet, layout::ORIENT_X),
                y: -extract_signed(packet, layout::ORIENT_Y),
                z: extract_signed(packet, layout::ORIENT_Z),
            },
            accel: Axes {
                x: extract_signed(packet, layout::ACCEL_X),
                y: -extract_signed(packet, layout::ACCEL_Y),
                z: extract_signed(packet, layout::ACCEL_Z),
            },
            gyro: Axes {
                x: extract_signed(packet, layout::GYRO_X),
                y: -extract_signed(packet, layout::GYRO_Y),
                z: extract_signed(packet, layout::GYRO_Z),
            },
            trackpad_x: extract_unsigned(packet, layout::TRACKPAD_X) as u8,
            trackpad_y: extract_unsigned(packet, layout::TRACKPAD_Y) as u8,
            buttons: ButtonFlags::from_status(extract_unsigned(packet, layout::BUTTONS) as u8),
        }
    }

    /// True when the finger is off the trackpad.
    pub fn trackpad_lifted(&self) -> bool {
        self.trackpad_x == 0 && self.trackpad_y == 0
    }
}

pub fn read_sqn(packet: &RawPacket) -> u8 {
    extract_unsigned(packet, layout::SQN) as u8
}

pub fn read_timestamp(packet: &RawPacket) -> u16 {
    extract_unsigned(packet, layout::TIMESTAMP) as u16
}

/// Ticks between two device clock readings. An unchanged reading counts
/// as a full wrap.
pub fn elapsed_ticks(previous: u16, current: u16) -> i32 {
    if current <= previous {
        i32::from(TIMESTAMP_MODULUS) - i32::from(previous) + i32::from(current)
    } else {
        i32::from(current) - i32::from(previous)
    }
}

/// Sequence counter discontinuity: packets were lost on the link.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SequenceGap {
    pub expected: u8,
    pub got: u8,
}

/// Result of feeding one packet to the assembler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Assembled {
    /// `None` for the first packet of a session, which only seeds state.
    pub sample: Option<DecodedSample>,
    pub gap: Option<SequenceGap>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Previous {
    sqn: u8,
    timestamp: u16,
}

/// Session-scoped sequence / timestamp continuity tracker.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SampleAssembler {
    previous: Option<Previous>,
}

impl SampleAssembler {
    pub const fn new() -> Self {
        Self { previous: None }
    }

    pub fn reset(&mut self) {
        self.previous = None;
    }

    /// Whether the next packet will be the first of the session.
    pub fn is_seeded(&self) -> bool {
        self.previous.is_some()
    }

    pub fn push(&mut self, packet: &RawPacket) -> Assembled {
        let sqn = read_sqn(packet);
        let timestamp = read_timestamp(packet);

        let assembled = match self.previous {
            None => Assembled {
                sample: None,
                gap: None,
            },
            Some(prev) => {
                let expected = (prev.sqn + 1) % SQN_MODULUS;
                let gap = (expected != sqn).then_some(SequenceGap { expected, got: sqn });
                let duration = elapsed_ticks(prev.timestamp, timestamp);
                Assembled {
                    sample: Some(DecodedSample::decode(packet, duration)),
                    gap,
                }
            }
        };

        self.previous = Some(Previous { sqn, timestamp });
        assembled
    }
}

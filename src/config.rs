//! Application-wide constants and compile-time configuration.
//!
//! Controller identity, link timing, queue sizing, and the motion
//! tuning constants live here so they can be tuned in one place.

// Controller identity

/// Complete Local Name advertised by the controller (matched byte-for-byte).
pub const CONTROLLER_NAME: &str = "Daydream controller";

/// 16-bit UUID of the controller's primary service.
pub const CONTROLLER_SERVICE_UUID: u16 = 0xFE55;

/// 128-bit UUID of the sensor data characteristic,
/// `00000001-1000-1000-8000-00805f9b34fb`, in little-endian byte order.
pub const CONTROLLER_DATA_UUID: [u8; 16] = [
    0xFB, 0x34, 0x9B, 0x5F, 0x80, 0x00, 0x00, 0x80, //
    0x00, 0x10, 0x00, 0x10, 0x01, 0x00, 0x00, 0x00,
];

/// Client Characteristic Configuration descriptor UUID.
pub const CCC_DESCRIPTOR_UUID: u16 = 0x2902;

/// CCC value enabling notifications.
pub const CCC_NOTIFY: u16 = 0x0001;

/// Full ATT handle range searched for the service.
pub const ATT_FIRST_HANDLE: u16 = 0x0001;
pub const ATT_LAST_HANDLE: u16 = 0xFFFF;

// BLE link

/// Connection interval bounds used while connecting (ms).
pub const BLE_INITIAL_INTERVAL_MIN_MS: u16 = 30;
pub const BLE_INITIAL_INTERVAL_MAX_MS: u16 = 50;

/// Supervision timeout used while connecting (ms).
pub const BLE_INITIAL_SUP_TIMEOUT_MS: u16 = 4000;

/// Connection interval requested once streaming (ms, both bounds).
pub const BLE_CONN_INTERVAL_MS: u16 = 15;

/// Peripheral latency (connection events the controller may skip).
pub const BLE_PERIPHERAL_LATENCY: u16 = 1;

/// Supervision timeout (ms).
pub const BLE_SUP_TIMEOUT_MS: u16 = 2000;

/// ATT MTU configured on the SoftDevice.
pub const BLE_ATT_MTU: u16 = 65;

// Pipeline

/// Capacity of the notification → decoder queue.
pub const RAW_QUEUE_DEPTH: usize = 8;

/// Capacity of the decoder → USB queue.
pub const REPORT_QUEUE_DEPTH: usize = 8;

/// Pause before scanning again after the SoftDevice refused a scan (ms).
pub const SCAN_RETRY_MS: u64 = 1000;

/// Decoder idle wait before re-checking the link state (ms).
pub const PACKET_WAIT_MS: u64 = 500;

/// Longest wait for a free report-queue slot (ms).
pub const REPORT_PUSH_WAIT_MS: u64 = 5;

// Trackpad motion

/// Full-scale trackpad reading.
pub const TRACKPAD_IN_MAX: i32 = 255;
pub const TRACKPAD_VELOCITY: i32 = 2500;
pub const TRACKPAD_ACCELERATION: i32 = 150;

/// Trackpad centre (both axes).
pub const TRACKPAD_CENTER: i32 = 127;

/// Distance from centre at which a held click becomes a cursor drag.
pub const TRACKPAD_DRAG_RADIUS: i32 = 100;
pub const TRACKPAD_DRAG_DIVISOR: i32 = 20;

// Gyro motion

/// Full-scale gyro / accelerometer reading (13-bit signed fields).
pub const GYRO_IN_MAX: i32 = 4096;
pub const GYRO_VELOCITY: i32 = 500;
pub const GYRO_ACCELERATION: i32 = 20;
pub const ACCEL_IN_MAX: i32 = 4096;
pub const ACCEL_MIX_VELOCITY: i32 = 10;

// Scroll (volume buttons)

/// A press shorter than this scrolls one notch per report.
pub const SCROLL_TAP_MS: i32 = 70;

/// Held this long, scrolling ramps up.
pub const SCROLL_RAMP_MS: i32 = 700;

/// Held this long, scrolling runs at full speed.
pub const SCROLL_FULL_MS: i32 = 1500;
pub const SCROLL_MAX_VELOCITY: i8 = 5;

// Indicators

/// Link LED while scanning (on ms, off ms).
pub const SCAN_BLINK_MS: (u32, u32) = (750, 250);

/// Link LED while connected but not yet streaming.
pub const CONNECT_BLINK_MS: (u32, u32) = (150, 250);

// USB

/// USB VID/PID - use the "pid.codes" open-source test VID.
/// Replace with your own allocated VID/PID for production.
pub const USB_VID: u16 = 0x1209;
pub const USB_PID: u16 = 0x0002;

/// USB device strings.
pub const USB_MANUFACTURER: &str = "daydream2usb";
pub const USB_PRODUCT: &str = "Daydream-to-USB Mouse Bridge";
pub const USB_SERIAL_NUMBER: &str = "000001";

/// USB HID polling interval (ms).
pub const USB_HID_POLL_MS: u8 = 1;

/// Bus power draw advertised to the host (mA).
pub const USB_MAX_POWER_MA: u16 = 100;

// GPIO pin assignments (nRF52840-DK defaults, LEDs active-low)
//
//   LED1 link status   → P0.13
//   LED2 USB ready     → P0.14
//   LED3 gyro active   → P0.15

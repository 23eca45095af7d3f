//! HID report types sent to the USB host.

pub mod mouse;

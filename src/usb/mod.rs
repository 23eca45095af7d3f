//! USB Device subsystem - presents a HID mouse to the host.
//!
//! The nRF52840's built-in USB 2.0 Full-Speed controller is driven by
//! `embassy-usb`. One HID interface carries the 4-byte boot-style mouse
//! report (buttons, X, Y, wheel).
//!
//! The writer task takes reports off the pipeline's report queue and
//! waits for each transfer to finish before taking the next one.

pub mod hid_device;

//! Daydream controller → USB HID mouse bridge.
//!
//! The portable core (decoder, motion translator, session state machine,
//! pipeline) builds for the host and is tested there:
//!
//! Usage: `cargo test`
//!
//! The nRF52840 firmware (`src/main.rs`, `#![no_std]` + `#![no_main]`)
//! needs `--features embedded`, which also pulls in the SoftDevice, USB
//! and LED bindings below.

#![cfg_attr(not(test), no_std)]

pub mod ble;
pub mod config;
pub mod daydream;
pub mod error;
pub mod hid;
pub mod indicator;
pub mod motion;
pub mod pipeline;

#[cfg(feature = "embedded")]
pub mod leds;
#[cfg(feature = "embedded")]
pub mod usb;
#[cfg(feature = "embedded")]
pub mod worker;

pub use error::Error;

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests - whole-chain behaviour across modules
// ═══════════════════════════════════════════════════════════════════════════

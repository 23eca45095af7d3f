//! Unified error type for daydream2usb.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Implements `defmt::Format` for efficient on-target logging.
//!
//! Decoder field-table mistakes are not represented here: they are
//! programming errors and fail an assertion instead.

/// Top-level error type used across the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    // BLE
    /// The SoftDevice returned a BLE-level error.
    Ble(BleError),

    // Ingress
    /// A notification was rejected before decoding.
    Ingress(IngressError),

    // Pipeline
    /// A bounded queue stayed full for longer than its wait budget.
    QueueFull,

    // USB
    /// USB stack returned an error.
    Usb,
}

/// Subset of BLE errors we propagate (keeps the enum `Copy`-friendly).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BleError {
    /// Scan was cancelled or could not start.
    ScanFailed,
    /// Connection attempt failed.
    ConnectFailed,
    /// GATT discovery failed.
    DiscoveryFailed,
    /// CCC descriptor write failed.
    SubscribeFailed,
    /// Pairing / encryption request was refused.
    SecurityFailed,
    /// Connection parameter update was rejected.
    ConnParamsRejected,
}

/// Why a notification payload never reached the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IngressError {
    /// Null or zero-length payload.
    Empty,
    /// Payload length other than the fixed packet size.
    BadLength(usize),
}

// Convenience conversions

impl From<BleError> for Error {
    fn from(e: BleError) -> Self {
        Error::Ble(e)
    }
}

impl From<IngressError> for Error {
    fn from(e: IngressError) -> Self {
        Error::Ingress(e)
    }
}

//! Daydream controller wire protocol.
//!
//! The controller streams one 20-byte notification per sampling
//! interval. Nothing in it is byte-aligned except the status byte:
//!
//! ```text
//! bytes 0-1   timestamp (9 bit) | sqn (5 bit) | orient_x ...
//! bytes 1-6   orientation x, z, y    (13 bit signed each)
//! bytes 6-11  acceleration x, z, y   (13 bit signed each)
//! bytes 11-16 gyro x, z, y           (13 bit signed each)
//! bytes 16-18 trackpad x, y          (8 bit unsigned each)
//! byte  18    ...|vol_up|vol_dn|app|home|click
//! ```
//!
//! - [`bits`] extracts / packs individual fields.
//! - [`sample`] applies the field table and tracks sequence / timestamp
//!   continuity across packets.

pub mod bits;
pub mod sample;

use crate::error::IngressError;

/// Size of every controller notification.
pub const PACKET_LEN: usize = 20;

/// One undecoded notification payload.
pub type RawPacket = [u8; PACKET_LEN];

/// Accept a notification payload for decoding.
///
/// `None` stands for the null payload the link layer delivers when a
/// subscription ends.
pub fn validate(payload: Option<&[u8]>) -> Result<RawPacket, IngressError> {
    let data = match payload {
        Some(data) if !data.is_empty() => data,
        _ => return Err(IngressError::Empty),
    };

    RawPacket::try_from(data).map_err(|_| IngressError::BadLength(data.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_length_is_accepted() {
        let data = [7u8; PACKET_LEN];
        assert_eq!(validate(Some(&data[..])), Ok(data));
    }

    #[test]
    fn null_and_empty_payloads_are_rejected() {
        assert_eq!(validate(None), Err(IngressError::Empty));
        assert_eq!(validate(Some(&[0u8; 0][..])), Err(IngressError::Empty));
    }

    #[test]
    fn wrong_lengths_are_rejected() {
        assert_eq!(
            validate(Some(&[0u8; 19][..])),
            Err(IngressError::BadLength(19))
        );
        assert_eq!(
            validate(Some(&[0u8; 21][..])),
            Err(IngressError::BadLength(21))
        );
    }
}

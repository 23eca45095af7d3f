//! Arbitrary-width bit-field extraction over the fixed packet buffer.
//!
//! Bits are numbered big-endian: byte 0 comes first and bit 7 is the MSB
//! of each byte. A field runs from `start_byte:start_bit` (exclusive upper
//! bound, so `8` means "the whole byte") down to `end_byte:end_bit`
//! (inclusive), which gives
//!
//! ```text
//! width = (end_byte - start_byte) * 8 + start_bit - end_bit
//! ```
//!
//! Field descriptors are compile-time data; a width outside `1..=31` or a
//! range past the end of the buffer is a defect in the table and panics.

/// Location of one field inside a packet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FieldSpec {
    pub start_byte: u8,
    pub start_bit: u8,
    pub end_byte: u8,
    pub end_bit: u8,
}

impl FieldSpec {
    pub const fn new(start_byte: u8, start_bit: u8, end_byte: u8, end_bit: u8) -> Self {
        Self {
            start_byte,
            start_bit,
            end_byte,
            end_bit,
        }
    }

    /// Field width in bits. May be out of range for a malformed descriptor.
    pub const fn width(&self) -> i32 {
        (self.end_byte as i32 - self.start_byte as i32) * 8 + self.start_bit as i32
            - self.end_bit as i32
    }

    fn checked_width(&self) -> u32 {
        let nbits = self.width();
        assert!(nbits > 0 && nbits < 32, "bit field width out of range");
        nbits as u32
    }

    fn mask(nbits: u32) -> u32 {
        (1u32 << nbits) - 1
    }
}

/// Extract `field` as an unsigned value; the result is `< 2^width`.
pub fn extract_unsigned(buf: &[u8], field: FieldSpec) -> u32 {
    let nbits = field.checked_width();

    // At most five bytes can contribute to a field narrower than 32 bits.
    let mut acc: u64 = 0;
    for &byte in &buf[field.start_byte as usize..=field.end_byte as usize] {
        acc = (acc << 8) | u64::from(byte);
    }

    ((acc >> field.end_bit) as u32) & FieldSpec::mask(nbits)
}

/// Extract `field` as a two's-complement value with its top bit as sign.
pub fn extract_signed(buf: &[u8], field: FieldSpec) -> i32 {
    let nbits = field.checked_width();
    let raw = extract_unsigned(buf, field);

    if raw & (1u32 << (nbits - 1)) != 0 {
        let magnitude = (!raw & FieldSpec::mask(nbits)) + 1;
        -(magnitude as i32)
    } else {
        raw as i32
    }
}

/// Store the low `width` bits of `value` into `field`, leaving every other
/// bit of `buf` untouched. Inverse of [`extract_unsigned`].
pub fn pack_unsigned(buf: &mut [u8], field: FieldSpec, value: u32) {
    let nbits = field.checked_width();
    let end_byte = field.end_byte as usize;

    for i in 0..nbits {
        let pos = field.end_bit as u32 + i;
        let byte = end_byte - (pos / 8) as usize;
        let bit = 1u8 << (pos % 8);
        if (value >> i) & 1 != 0 {
            buf[byte] |= bit;
        } else {
            buf[byte] &= !bit;
        }
    }
}

/// Store `value` as a `width`-bit two's-complement field.
/// Inverse of [`extract_signed`] for values representable in `width` bits.
pub fn pack_signed(buf: &mut [u8], field: FieldSpec, value: i32) {
    pack_unsigned(buf, field, value as u32);
}

//! BER length octets (X.690 Section 8.1.3).
//!
//! Short form covers lengths 0-127 in one octet; long form prefixes the
//! big-endian length bytes with a count octet. The indefinite form (0x80)
//! is rejected, matching net-snmp.

use crate::error::{DecodeErrorKind, Error, Result};

/// Upper bound on any decoded length.
///
/// 2 MB is orders of magnitude beyond a legitimate SNMP message (typically
/// hundreds of bytes) and bounds allocations driven by attacker-controlled
/// length fields.
pub const MAX_LENGTH: usize = 0x20_0000;

/// Encode a length field.
///
/// Returns the octets in reverse order, sized for prepending into a
/// reverse-buffer encoder: `buf[0]` is the last wire octet.
pub fn encode_length(len: usize) -> ([u8; 5], usize) {
    let mut buf = [0u8; 5];

    if len <= 127 {
        buf[0] = len as u8;
        return (buf, 1);
    }

    // Long form: emit value bytes little-endian-first (reverse order),
    // then the count octet with bit 8 set.
    let mut remaining = len;
    let mut n = 0;
    while remaining > 0 {
        buf[n] = remaining as u8;
        remaining >>= 8;
        n += 1;
    }
    buf[n] = 0x80 | n as u8;
    (buf, n + 1)
}

/// Decode a length field, returning `(length, octets_consumed)`.
///
/// `base_offset` is the absolute position of `data[0]` in the original
/// message, used for error reporting.
pub fn decode_length(data: &[u8], base_offset: usize) -> Result<(usize, usize)> {
    let first = *data
        .first()
        .ok_or_else(|| Error::decode(base_offset, DecodeErrorKind::TruncatedData))?;

    if first == 0x80 {
        return Err(Error::decode(
            base_offset,
            DecodeErrorKind::IndefiniteLength,
        ));
    }

    if first & 0x80 == 0 {
        return Ok((first as usize, 1));
    }

    let num_octets = (first & 0x7F) as usize;
    if num_octets == 0 {
        return Err(Error::decode(base_offset, DecodeErrorKind::InvalidLength));
    }
    if num_octets > 4 {
        return Err(Error::decode(
            base_offset,
            DecodeErrorKind::LengthTooLong { octets: num_octets },
        ));
    }
    if data.len() < 1 + num_octets {
        return Err(Error::decode(base_offset, DecodeErrorKind::TruncatedData));
    }

    let mut len: usize = 0;
    for &byte in &data[1..=num_octets] {
        len = (len << 8) | byte as usize;
    }

    if len > MAX_LENGTH {
        return Err(Error::decode(
            base_offset,
            DecodeErrorKind::LengthExceedsMax {
                length: len,
                max: MAX_LENGTH,
            },
        ));
    }

    Ok((len, 1 + num_octets))
}

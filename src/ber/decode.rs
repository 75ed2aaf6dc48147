//! BER decoding.
//!
//! Zero-copy decoding over `Bytes`. Sub-decoders share the underlying
//! buffer and carry the absolute offset of their slice, so every error
//! reports a position in the original datagram.

use super::length::decode_length;
use super::tag;
use crate::error::{DecodeErrorKind, Error, Result};
use crate::oid::Oid;
use bytes::Bytes;

/// BER decoder reading from a shared byte buffer.
pub struct Decoder {
    data: Bytes,
    offset: usize,
    /// Absolute position of `data[0]` in the originating message.
    base: usize,
}

impl Decoder {
    /// Create a decoder over a buffer.
    pub fn new(data: Bytes) -> Self {
        Self {
            data,
            offset: 0,
            base: 0,
        }
    }

    /// Create a decoder from a slice (copies the data).
    pub fn from_slice(data: &[u8]) -> Self {
        Self::new(Bytes::copy_from_slice(data))
    }

    /// Absolute offset of the next unread byte in the original message.
    pub fn pos(&self) -> usize {
        self.base + self.offset
    }

    /// Bytes left in this decoder's slice.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    /// True once the slice is fully consumed.
    pub fn is_empty(&self) -> bool {
        self.offset >= self.data.len()
    }

    /// Peek at the next tag octet without consuming it.
    pub fn peek_tag(&self) -> Option<u8> {
        self.data.get(self.offset).copied()
    }

    /// Read a single byte.
    pub fn read_byte(&mut self) -> Result<u8> {
        let byte = *self
            .data
            .get(self.offset)
            .ok_or_else(|| Error::decode(self.pos(), DecodeErrorKind::TruncatedData))?;
        self.offset += 1;
        Ok(byte)
    }

    /// Read a tag octet.
    pub fn read_tag(&mut self) -> Result<u8> {
        self.read_byte()
    }

    /// Read a length field.
    pub fn read_length(&mut self) -> Result<usize> {
        let (len, consumed) = decode_length(&self.data[self.offset..], self.pos())?;
        self.offset += consumed;
        Ok(len)
    }

    /// Read `len` raw bytes without copying.
    pub fn read_bytes(&mut self, len: usize) -> Result<Bytes> {
        // saturating_add so a huge len cannot wrap past the bounds check
        if self.offset.saturating_add(len) > self.data.len() {
            return Err(Error::decode(self.pos(), DecodeErrorKind::TruncatedData));
        }
        let bytes = self.data.slice(self.offset..self.offset + len);
        self.offset += len;
        Ok(bytes)
    }

    /// Require a specific tag; returns the content length.
    pub fn expect_tag(&mut self, expected: u8) -> Result<usize> {
        let at = self.pos();
        let actual = self.read_tag()?;
        if actual != expected {
            return Err(Error::decode(at, DecodeErrorKind::UnexpectedTag {
                expected,
                actual,
            }));
        }
        self.read_length()
    }

    /// Read an INTEGER.
    pub fn read_integer(&mut self) -> Result<i32> {
        let len = self.expect_tag(tag::universal::INTEGER)?;
        self.read_integer_content(len)
    }

    /// Read INTEGER content after the header has been consumed.
    pub fn read_integer_content(&mut self, len: usize) -> Result<i32> {
        if len == 0 {
            return Err(Error::decode(self.pos(), DecodeErrorKind::ZeroLengthInteger));
        }
        if len > 4 {
            // Permissive: truncate to 32 bits like net-snmp instead of failing.
            tracing::warn!(
                offset = self.pos(),
                length = len,
                "integer wider than 4 bytes, truncating"
            );
        }

        let bytes = self.read_bytes(len)?;
        let mut value: i32 = if bytes[0] & 0x80 != 0 { -1 } else { 0 };
        for &byte in bytes.iter().take(4) {
            value = (value << 8) | byte as i32;
        }
        Ok(value)
    }

    /// Read an unsigned 32-bit value under the given application tag.
    pub fn read_unsigned32(&mut self, expected_tag: u8) -> Result<u32> {
        let len = self.expect_tag(expected_tag)?;
        self.read_unsigned32_content(len)
    }

    /// Read unsigned 32-bit content after the header has been consumed.
    pub fn read_unsigned32_content(&mut self, len: usize) -> Result<u32> {
        if len == 0 {
            return Err(Error::decode(self.pos(), DecodeErrorKind::ZeroLengthInteger));
        }
        if len > 5 {
            // 5 legitimate octets at most (leading zero + 4 value bytes)
            tracing::warn!(
                offset = self.pos(),
                length = len,
                "unsigned value wider than 4 bytes, truncating"
            );
        }

        let bytes = self.read_bytes(len)?;
        let mut value: u32 = 0;
        for &byte in bytes.iter().take(5) {
            value = (value << 8) | byte as u32;
        }
        Ok(value)
    }

    /// Read a Counter64 value.
    pub fn read_counter64(&mut self) -> Result<u64> {
        let len = self.expect_tag(tag::application::COUNTER64)?;
        self.read_counter64_content(len)
    }

    /// Read Counter64 content after the header has been consumed.
    pub fn read_counter64_content(&mut self, len: usize) -> Result<u64> {
        if len == 0 {
            return Err(Error::decode(self.pos(), DecodeErrorKind::ZeroLengthInteger));
        }
        if len > 9 {
            return Err(Error::decode(
                self.pos(),
                DecodeErrorKind::Integer64TooLong { length: len },
            ));
        }

        let bytes = self.read_bytes(len)?;
        let mut value: u64 = 0;
        for &byte in bytes.iter() {
            value = (value << 8) | byte as u64;
        }
        Ok(value)
    }

    /// Read an OCTET STRING.
    pub fn read_octet_string(&mut self) -> Result<Bytes> {
        let len = self.expect_tag(tag::universal::OCTET_STRING)?;
        self.read_bytes(len)
    }

    /// Read a NULL.
    pub fn read_null(&mut self) -> Result<()> {
        let at = self.pos();
        let len = self.expect_tag(tag::universal::NULL)?;
        if len != 0 {
            return Err(Error::decode(at, DecodeErrorKind::InvalidNull));
        }
        Ok(())
    }

    /// Read an OBJECT IDENTIFIER.
    pub fn read_oid(&mut self) -> Result<Oid> {
        let len = self.expect_tag(tag::universal::OBJECT_IDENTIFIER)?;
        self.read_oid_content(len)
    }

    /// Read OID content after the header has been consumed.
    pub fn read_oid_content(&mut self, len: usize) -> Result<Oid> {
        let at = self.pos();
        let bytes = self.read_bytes(len)?;
        Oid::from_ber(&bytes).map_err(|_| Error::decode(at, DecodeErrorKind::InvalidOidEncoding))
    }

    /// Read an IpAddress (4 octets).
    pub fn read_ip_address(&mut self) -> Result<[u8; 4]> {
        let at = self.pos();
        let len = self.expect_tag(tag::application::IP_ADDRESS)?;
        if len != 4 {
            return Err(Error::decode(
                at,
                DecodeErrorKind::InvalidIpAddressLength { length: len },
            ));
        }
        let bytes = self.read_bytes(4)?;
        Ok([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    /// Read a SEQUENCE, returning a decoder over its content.
    pub fn read_sequence(&mut self) -> Result<Decoder> {
        self.read_constructed(tag::universal::SEQUENCE)
    }

    /// Read a constructed TLV with the given tag, returning a decoder
    /// over its content.
    pub fn read_constructed(&mut self, expected_tag: u8) -> Result<Decoder> {
        let len = self.expect_tag(expected_tag)?;
        self.sub_decoder(len)
    }

    /// Split off a decoder over the next `len` bytes.
    pub fn sub_decoder(&mut self, len: usize) -> Result<Decoder> {
        let base = self.pos();
        let content = self.read_bytes(len)?;
        Ok(Decoder {
            data: content,
            offset: 0,
            base,
        })
    }

    /// Skip one TLV without interpreting it.
    pub fn skip_tlv(&mut self) -> Result<()> {
        let _tag = self.read_tag()?;
        let len = self.read_length()?;
        if self.offset.saturating_add(len) > self.data.len() {
            return Err(Error::decode(self.pos(), DecodeErrorKind::TlvOverflow));
        }
        self.offset += len;
        Ok(())
    }

    /// Unread remainder of this decoder's slice.
    pub fn remaining_slice(&self) -> &[u8] {
        &self.data[self.offset..]
    }
}

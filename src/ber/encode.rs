//! BER encoding.
//!
//! Writes into a reverse buffer: content is emitted back-to-front and the
//! buffer is reversed once on [`EncodeBuf::finish`]. Writing backwards means
//! a constructed type's length is known when its header is written, with no
//! length pre-pass and no buffer shifting.

use super::length::encode_length;
use super::tag;
use bytes::Bytes;

/// Reverse-order BER encode buffer.
///
/// All `push_*` methods prepend to the front of the eventual output, so a
/// SEQUENCE's fields must be pushed in reverse field order.
pub struct EncodeBuf {
    buf: Vec<u8>,
}

impl EncodeBuf {
    /// Create a buffer with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(512)
    }

    /// Create a buffer with the given capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Prepend a single byte.
    pub fn push_byte(&mut self, byte: u8) {
        self.buf.push(byte);
    }

    /// Prepend a byte slice, preserving its order in the output.
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend(bytes.iter().rev());
    }

    /// Prepend BER length octets.
    pub fn push_length(&mut self, len: usize) {
        let (octets, count) = encode_length(len);
        // encode_length already returns reverse-ordered octets.
        self.buf.extend_from_slice(&octets[..count]);
    }

    /// Prepend a tag octet.
    pub fn push_tag(&mut self, tag: u8) {
        self.buf.push(tag);
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Encode a constructed type (SEQUENCE, PDU, ...).
    ///
    /// The closure writes the content; the header is added once the content
    /// length is known.
    pub fn push_constructed<F>(&mut self, tag: u8, f: F)
    where
        F: FnOnce(&mut Self),
    {
        let mark = self.len();
        f(self);
        let content_len = self.len() - mark;
        self.push_length(content_len);
        self.push_tag(tag);
    }

    /// Encode a SEQUENCE.
    pub fn push_sequence<F>(&mut self, f: F)
    where
        F: FnOnce(&mut Self),
    {
        self.push_constructed(tag::universal::SEQUENCE, f);
    }

    /// Encode an INTEGER in minimal two's complement form.
    pub fn push_integer(&mut self, value: i32) {
        let mark = self.len();
        let mut v = value;
        loop {
            self.buf.push(v as u8);
            let sign_bit = v as u8 & 0x80 != 0;
            v >>= 8; // arithmetic shift keeps the sign
            if (v == 0 && !sign_bit) || (v == -1 && sign_bit) {
                break;
            }
        }
        self.push_length(self.len() - mark);
        self.push_tag(tag::universal::INTEGER);
    }

    /// Encode an unsigned 32-bit value under an application tag
    /// (Counter32, Gauge32, TimeTicks).
    pub fn push_unsigned32(&mut self, tag: u8, value: u32) {
        let mark = self.len();
        let mut v = value;
        loop {
            self.buf.push(v as u8);
            v >>= 8;
            if v == 0 {
                break;
            }
        }
        // A set MSB would read as negative; prefix a zero octet.
        if self.buf[self.len() - 1] & 0x80 != 0 {
            self.buf.push(0);
        }
        self.push_length(self.len() - mark);
        self.push_tag(tag);
    }

    /// Encode a Counter64.
    pub fn push_counter64(&mut self, value: u64) {
        let mark = self.len();
        let mut v = value;
        loop {
            self.buf.push(v as u8);
            v >>= 8;
            if v == 0 {
                break;
            }
        }
        if self.buf[self.len() - 1] & 0x80 != 0 {
            self.buf.push(0);
        }
        self.push_length(self.len() - mark);
        self.push_tag(tag::application::COUNTER64);
    }

    /// Encode an OCTET STRING.
    pub fn push_octet_string(&mut self, data: &[u8]) {
        self.push_bytes(data);
        self.push_length(data.len());
        self.push_tag(tag::universal::OCTET_STRING);
    }

    /// Encode a NULL.
    pub fn push_null(&mut self) {
        self.push_length(0);
        self.push_tag(tag::universal::NULL);
    }

    /// Encode an OBJECT IDENTIFIER.
    pub fn push_oid(&mut self, oid: &crate::oid::Oid) {
        let content = oid.to_ber();
        self.push_bytes(&content);
        self.push_length(content.len());
        self.push_tag(tag::universal::OBJECT_IDENTIFIER);
    }

    /// Encode an IpAddress (application tag, 4 octets).
    pub fn push_ip_address(&mut self, addr: [u8; 4]) {
        self.push_bytes(&addr);
        self.push_length(4);
        self.push_tag(tag::application::IP_ADDRESS);
    }

    /// Reverse and return the encoded message.
    pub fn finish(mut self) -> Bytes {
        self.buf.reverse();
        Bytes::from(self.buf)
    }

    /// Reverse and return the encoded message as a `Vec<u8>`.
    pub fn finish_vec(mut self) -> Vec<u8> {
        self.buf.reverse();
        self.buf
    }
}

impl Default for EncodeBuf {
    fn default() -> Self {
        Self::new()
    }
}

//! USM security parameters (RFC 3414 Section 2.4).
//!
//! Carried opaquely in msgSecurityParameters as a BER-encoded sequence:
//!
//! ```text
//! UsmSecurityParameters ::= SEQUENCE {
//!     msgAuthoritativeEngineID     OCTET STRING,
//!     msgAuthoritativeEngineBoots  INTEGER (0..2147483647),
//!     msgAuthoritativeEngineTime   INTEGER (0..2147483647),
//!     msgUserName                  OCTET STRING,
//!     msgAuthenticationParameters  OCTET STRING,
//!     msgPrivacyParameters         OCTET STRING
//! }
//! ```

use bytes::Bytes;

use crate::ber::{Decoder, EncodeBuf, tag};
use crate::error::{DecodeErrorKind, Error, Result};

/// Decoded USM security parameters.
#[derive(Debug, Clone)]
pub struct UsmSecurityParams {
    pub engine_id: Bytes,
    pub engine_boots: u32,
    pub engine_time: u32,
    pub username: Bytes,
    /// HMAC digest, or empty when unauthenticated.
    pub auth_params: Bytes,
    /// Cipher salt, or empty when unencrypted.
    pub priv_params: Bytes,
}

impl UsmSecurityParams {
    pub fn new(
        engine_id: impl Into<Bytes>,
        engine_boots: u32,
        engine_time: u32,
        username: impl Into<Bytes>,
    ) -> Self {
        Self {
            engine_id: engine_id.into(),
            engine_boots,
            engine_time,
            username: username.into(),
            auth_params: Bytes::new(),
            priv_params: Bytes::new(),
        }
    }

    /// All-empty parameters, as sent in a discovery probe.
    pub fn empty() -> Self {
        Self::new(Bytes::new(), 0, 0, Bytes::new())
    }

    pub fn with_auth_params(mut self, auth_params: impl Into<Bytes>) -> Self {
        self.auth_params = auth_params.into();
        self
    }

    /// Zero-filled MAC field of the given length, to be patched after
    /// the HMAC is computed over the encoded message.
    pub fn with_auth_placeholder(mut self, mac_len: usize) -> Self {
        self.auth_params = Bytes::from(vec![0u8; mac_len]);
        self
    }

    pub fn with_priv_params(mut self, priv_params: impl Into<Bytes>) -> Self {
        self.priv_params = priv_params.into();
        self
    }

    /// Encode to BER.
    pub fn encode(&self) -> Bytes {
        let mut buf = EncodeBuf::new();
        buf.push_sequence(|buf| {
            buf.push_octet_string(&self.priv_params);
            buf.push_octet_string(&self.auth_params);
            buf.push_octet_string(&self.username);
            buf.push_unsigned32(tag::universal::INTEGER, self.engine_time);
            buf.push_unsigned32(tag::universal::INTEGER, self.engine_boots);
            buf.push_octet_string(&self.engine_id);
        });
        buf.finish()
    }

    /// Decode from the content of msgSecurityParameters.
    pub fn decode(data: Bytes) -> Result<Self> {
        let mut decoder = Decoder::new(data);
        let mut seq = decoder.read_sequence()?;

        let engine_id = seq.read_octet_string()?;

        let at = seq.pos();
        let boots = seq.read_integer()?;
        if boots < 0 {
            return Err(Error::decode(at, DecodeErrorKind::InvalidEngineBoots(boots)));
        }

        let at = seq.pos();
        let time = seq.read_integer()?;
        if time < 0 {
            return Err(Error::decode(at, DecodeErrorKind::InvalidEngineTime(time)));
        }

        let username = seq.read_octet_string()?;
        let auth_params = seq.read_octet_string()?;
        let priv_params = seq.read_octet_string()?;

        Ok(Self {
            engine_id,
            engine_boots: boots as u32,
            engine_time: time as u32,
            username,
            auth_params,
            priv_params,
        })
    }

    /// Locate the msgAuthenticationParameters content inside a fully
    /// encoded v3 message, as `(offset, length)`.
    ///
    /// Signing and verification both need this: the MAC is computed over
    /// the whole message with this field zeroed, then written back here.
    pub fn locate_auth_params(message: &[u8]) -> Option<(usize, usize)> {
        fn walk(message: &[u8]) -> Result<(usize, usize)> {
            let mut decoder = Decoder::from_slice(message);
            let mut msg = decoder.read_sequence()?;
            msg.skip_tlv()?; // version
            msg.skip_tlv()?; // msgGlobalData

            let len = msg.expect_tag(tag::universal::OCTET_STRING)?;
            let mut params = msg.sub_decoder(len)?;
            let mut seq = params.read_sequence()?;
            seq.skip_tlv()?; // engine ID
            seq.skip_tlv()?; // boots
            seq.skip_tlv()?; // time
            seq.skip_tlv()?; // username

            let auth_len = seq.expect_tag(tag::universal::OCTET_STRING)?;
            Ok((seq.pos(), auth_len))
        }
        walk(message).ok()
    }
}

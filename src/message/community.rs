//! Community-based message format (v1/v2c).
//!
//! Both versions share one layout, `SEQUENCE { version, community, pdu }`,
//! differing only in the version integer (0 for v1, 1 for v2c).

use bytes::Bytes;

use crate::ber::{Decoder, EncodeBuf};
use crate::error::{DecodeErrorKind, Error, Result};
use crate::pdu::Pdu;
use crate::version::Version;

/// An SNMPv1 or SNMPv2c message.
#[derive(Debug, Clone)]
pub struct CommunityMessage {
    pub version: Version,
    pub community: Bytes,
    pub pdu: Pdu,
}

impl CommunityMessage {
    /// Wrap a PDU in a community message.
    ///
    /// `version` must be `V1` or `V2c`; v3 messages use [`super::V3Message`].
    pub fn new(version: Version, community: impl Into<Bytes>, pdu: Pdu) -> Self {
        debug_assert!(version != Version::V3);
        Self {
            version,
            community: community.into(),
            pdu,
        }
    }

    pub fn v1(community: impl Into<Bytes>, pdu: Pdu) -> Self {
        Self::new(Version::V1, community, pdu)
    }

    pub fn v2c(community: impl Into<Bytes>, pdu: Pdu) -> Self {
        Self::new(Version::V2c, community, pdu)
    }

    /// Encode to BER wire form.
    pub fn encode(&self) -> Bytes {
        let mut buf = EncodeBuf::new();
        buf.push_sequence(|buf| {
            self.pdu.encode(buf);
            buf.push_octet_string(&self.community);
            buf.push_integer(self.version.as_i32());
        });
        buf.finish()
    }

    /// Decode a full message from wire bytes.
    pub fn decode(data: Bytes) -> Result<Self> {
        let mut decoder = Decoder::new(data);
        let mut seq = decoder.read_sequence()?;

        let at = seq.pos();
        let version_num = seq.read_integer()?;
        let version = Version::from_i32(version_num)
            .filter(|v| *v != Version::V3)
            .ok_or_else(|| Error::decode(at, DecodeErrorKind::UnknownVersion(version_num)))?;

        Self::decode_body(&mut seq, version)
    }

    /// Decode the fields after the version integer.
    pub(crate) fn decode_body(seq: &mut Decoder, version: Version) -> Result<Self> {
        let community = seq.read_octet_string()?;
        let pdu = Pdu::decode(seq)?;
        Ok(Self {
            version,
            community,
            pdu,
        })
    }
}

//! SNMP message framing.
//!
//! A message wraps a PDU with version and security information:
//! community strings for v1/v2c ([`CommunityMessage`]), the USM-secured
//! header for v3 ([`V3Message`]).

mod community;
mod v3;

pub use community::CommunityMessage;
pub use v3::{
    DEFAULT_MSG_MAX_SIZE, MsgFlags, MsgGlobalData, ScopedPdu, SecurityLevel, SecurityModel,
    V3Message, V3MessageData,
};

use bytes::Bytes;

use crate::ber::Decoder;
use crate::error::{DecodeErrorKind, Error, Result};
use crate::pdu::Pdu;
use crate::version::Version;

/// A decoded SNMP message of any version.
#[derive(Debug)]
pub enum Message {
    Community(CommunityMessage),
    V3(V3Message),
}

impl Message {
    /// Decode a message, dispatching on the version field.
    pub fn decode(data: Bytes) -> Result<Self> {
        let mut decoder = Decoder::new(data);
        let mut seq = decoder.read_sequence()?;

        let at = seq.pos();
        let version_num = seq.read_integer()?;
        let version = Version::from_i32(version_num)
            .ok_or_else(|| Error::decode(at, DecodeErrorKind::UnknownVersion(version_num)))?;

        match version {
            Version::V1 | Version::V2c => {
                CommunityMessage::decode_body(&mut seq, version).map(Message::Community)
            }
            Version::V3 => V3Message::decode_body(&mut seq).map(Message::V3),
        }
    }

    pub fn version(&self) -> Version {
        match self {
            Message::Community(m) => m.version,
            Message::V3(_) => Version::V3,
        }
    }

    /// The PDU, if it is readable without decryption.
    pub fn pdu(&self) -> Option<&Pdu> {
        match self {
            Message::Community(m) => Some(&m.pdu),
            Message::V3(m) => m.pdu(),
        }
    }

    /// Consume the message and return the PDU, if readable without decryption.
    pub fn into_pdu(self) -> Option<Pdu> {
        match self {
            Message::Community(m) => Some(m.pdu),
            Message::V3(m) => m.into_pdu(),
        }
    }
}

impl From<CommunityMessage> for Message {
    fn from(msg: CommunityMessage) -> Self {
        Message::Community(msg)
    }
}

impl From<V3Message> for Message {
    fn from(msg: V3Message) -> Self {
        Message::V3(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;

    #[test]
    fn dispatch_on_version() {
        let pdu = Pdu::get_request(9, &[oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)]);
        let encoded = CommunityMessage::v2c(b"public".as_slice(), pdu).encode();

        let msg = Message::decode(encoded).unwrap();
        assert_eq!(msg.version(), Version::V2c);
        assert_eq!(msg.pdu().unwrap().request_id, 9);
    }

    #[test]
    fn unknown_version_rejected() {
        let mut buf = crate::ber::EncodeBuf::new();
        buf.push_sequence(|buf| {
            buf.push_integer(2);
        });
        assert!(matches!(
            Message::decode(buf.finish()).unwrap_err(),
            Error::Decode {
                kind: DecodeErrorKind::UnknownVersion(2),
                ..
            }
        ));
    }
}

//! SNMPv3 message format (RFC 3412).
//!
//! ```text
//! SEQUENCE {
//!     INTEGER version (3)
//!     SEQUENCE msgGlobalData { msgID, msgMaxSize, msgFlags, msgSecurityModel }
//!     OCTET STRING msgSecurityParameters   -- opaque, USM-encoded
//!     msgData                              -- plaintext ScopedPDU or encrypted OCTET STRING
//! }
//! ```

use bytes::Bytes;

use crate::ber::{Decoder, EncodeBuf};
use crate::error::{DecodeErrorKind, Error, Result};
use crate::pdu::Pdu;
use crate::usm::UsmSecurityParams;

/// Largest payload of a single UDP datagram, advertised as our msgMaxSize.
pub const DEFAULT_MSG_MAX_SIZE: i32 = 65507;

/// RFC 3412 lower bound on msgMaxSize.
const MSG_MAX_SIZE_MINIMUM: i32 = 484;

/// msgSecurityModel values. Only USM is implemented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum SecurityModel {
    Usm = 3,
}

impl SecurityModel {
    pub fn from_i32(value: i32) -> Option<Self> {
        (value == 3).then_some(Self::Usm)
    }

    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

/// Security level, ordered weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SecurityLevel {
    NoAuthNoPriv,
    AuthNoPriv,
    AuthPriv,
}

impl SecurityLevel {
    /// Decode from the low two bits of msgFlags.
    ///
    /// Privacy without authentication is not a valid combination
    /// (RFC 3412 Section 6.4) and yields `None`.
    pub fn from_flags(flags: u8) -> Option<Self> {
        match flags & 0x03 {
            0x00 => Some(Self::NoAuthNoPriv),
            0x01 => Some(Self::AuthNoPriv),
            0x03 => Some(Self::AuthPriv),
            _ => None,
        }
    }

    pub fn to_flags(self) -> u8 {
        match self {
            Self::NoAuthNoPriv => 0x00,
            Self::AuthNoPriv => 0x01,
            Self::AuthPriv => 0x03,
        }
    }

    pub fn requires_auth(self) -> bool {
        self >= Self::AuthNoPriv
    }

    pub fn requires_priv(self) -> bool {
        self == Self::AuthPriv
    }
}

/// The msgFlags octet: security level plus the reportable bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MsgFlags {
    pub security_level: SecurityLevel,
    pub reportable: bool,
}

impl MsgFlags {
    pub fn new(security_level: SecurityLevel, reportable: bool) -> Self {
        Self {
            security_level,
            reportable,
        }
    }

    /// Decode, returning `None` for the invalid priv-without-auth bit pattern.
    pub fn from_byte(byte: u8) -> Option<Self> {
        Some(Self {
            security_level: SecurityLevel::from_flags(byte)?,
            reportable: byte & 0x04 != 0,
        })
    }

    pub fn to_byte(self) -> u8 {
        self.security_level.to_flags() | if self.reportable { 0x04 } else { 0x00 }
    }
}

/// msgGlobalData header.
#[derive(Debug, Clone)]
pub struct MsgGlobalData {
    pub msg_id: i32,
    pub msg_max_size: i32,
    pub msg_flags: MsgFlags,
    pub msg_security_model: SecurityModel,
}

impl MsgGlobalData {
    pub fn new(msg_id: i32, msg_max_size: i32, msg_flags: MsgFlags) -> Self {
        Self {
            msg_id,
            msg_max_size,
            msg_flags,
            msg_security_model: SecurityModel::Usm,
        }
    }

    pub fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_sequence(|buf| {
            buf.push_integer(self.msg_security_model.as_i32());
            buf.push_octet_string(&[self.msg_flags.to_byte()]);
            buf.push_integer(self.msg_max_size);
            buf.push_integer(self.msg_id);
        });
    }

    /// Decode and validate against the RFC 3412 HeaderData ranges:
    /// msgID in 0..2^31-1, msgMaxSize in 484..2^31-1, known security model.
    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let mut seq = decoder.read_sequence()?;

        let at = seq.pos();
        let msg_id = seq.read_integer()?;
        if msg_id < 0 {
            return Err(Error::decode(at, DecodeErrorKind::InvalidMsgId(msg_id)));
        }

        let at = seq.pos();
        let msg_max_size = seq.read_integer()?;
        if !(MSG_MAX_SIZE_MINIMUM..).contains(&msg_max_size) {
            return Err(Error::decode(
                at,
                DecodeErrorKind::InvalidMsgMaxSize(msg_max_size),
            ));
        }

        let at = seq.pos();
        let flags_bytes = seq.read_octet_string()?;
        let msg_flags = match flags_bytes.as_ref() {
            [byte] => MsgFlags::from_byte(*byte),
            _ => None,
        }
        .ok_or_else(|| Error::decode(at, DecodeErrorKind::InvalidMsgFlags))?;

        let at = seq.pos();
        let model = seq.read_integer()?;
        let msg_security_model = SecurityModel::from_i32(model)
            .ok_or_else(|| Error::decode(at, DecodeErrorKind::UnknownSecurityModel(model)))?;

        Ok(Self {
            msg_id,
            msg_max_size,
            msg_flags,
            msg_security_model,
        })
    }
}

/// contextEngineID + contextName + PDU.
#[derive(Debug, Clone)]
pub struct ScopedPdu {
    pub context_engine_id: Bytes,
    pub context_name: Bytes,
    pub pdu: Pdu,
}

impl ScopedPdu {
    pub fn new(
        context_engine_id: impl Into<Bytes>,
        context_name: impl Into<Bytes>,
        pdu: Pdu,
    ) -> Self {
        Self {
            context_engine_id: context_engine_id.into(),
            context_name: context_name.into(),
            pdu,
        }
    }

    /// Empty context, the common case for a client.
    pub fn with_empty_context(pdu: Pdu) -> Self {
        Self::new(Bytes::new(), Bytes::new(), pdu)
    }

    pub fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_sequence(|buf| {
            self.pdu.encode(buf);
            buf.push_octet_string(&self.context_name);
            buf.push_octet_string(&self.context_engine_id);
        });
    }

    pub fn encode_to_bytes(&self) -> Bytes {
        let mut buf = EncodeBuf::new();
        self.encode(&mut buf);
        buf.finish()
    }

    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let mut seq = decoder.read_sequence()?;
        let context_engine_id = seq.read_octet_string()?;
        let context_name = seq.read_octet_string()?;
        let pdu = Pdu::decode(&mut seq)?;
        Ok(Self {
            context_engine_id,
            context_name,
            pdu,
        })
    }
}

/// An SNMPv3 message.
#[derive(Debug, Clone)]
pub struct V3Message {
    pub global_data: MsgGlobalData,
    /// Opaque USM parameters, already BER-encoded.
    pub security_params: Bytes,
    pub data: V3MessageData,
}

/// The msgData field: plaintext below authPriv, ciphertext at authPriv.
#[derive(Debug, Clone)]
pub enum V3MessageData {
    Plaintext(ScopedPdu),
    Encrypted(Bytes),
}

impl V3Message {
    pub fn new(global_data: MsgGlobalData, security_params: Bytes, scoped_pdu: ScopedPdu) -> Self {
        Self {
            global_data,
            security_params,
            data: V3MessageData::Plaintext(scoped_pdu),
        }
    }

    pub fn new_encrypted(
        global_data: MsgGlobalData,
        security_params: Bytes,
        ciphertext: Bytes,
    ) -> Self {
        Self {
            global_data,
            security_params,
            data: V3MessageData::Encrypted(ciphertext),
        }
    }

    /// Build the engine discovery probe: noAuthNoPriv, reportable, empty
    /// USM parameters, GetRequest with no varbinds.
    pub fn discovery_request(msg_id: i32) -> Self {
        let global_data = MsgGlobalData::new(
            msg_id,
            DEFAULT_MSG_MAX_SIZE,
            MsgFlags::new(SecurityLevel::NoAuthNoPriv, true),
        );
        let security_params = UsmSecurityParams::empty().encode();
        let scoped_pdu = ScopedPdu::with_empty_context(Pdu::get_request(0, &[]));
        Self::new(global_data, security_params, scoped_pdu)
    }

    pub fn scoped_pdu(&self) -> Option<&ScopedPdu> {
        match &self.data {
            V3MessageData::Plaintext(scoped) => Some(scoped),
            V3MessageData::Encrypted(_) => None,
        }
    }

    pub fn into_scoped_pdu(self) -> Option<ScopedPdu> {
        match self.data {
            V3MessageData::Plaintext(scoped) => Some(scoped),
            V3MessageData::Encrypted(_) => None,
        }
    }

    pub fn pdu(&self) -> Option<&Pdu> {
        self.scoped_pdu().map(|s| &s.pdu)
    }

    pub fn into_pdu(self) -> Option<Pdu> {
        self.into_scoped_pdu().map(|s| s.pdu)
    }

    pub fn msg_id(&self) -> i32 {
        self.global_data.msg_id
    }

    pub fn security_level(&self) -> SecurityLevel {
        self.global_data.msg_flags.security_level
    }

    /// Encode to BER wire form.
    ///
    /// For authenticated messages the security parameters must hold a
    /// zero-filled placeholder digest; the USM layer computes the HMAC over
    /// the result and patches it in place.
    pub fn encode(&self) -> Bytes {
        let mut buf = EncodeBuf::new();
        buf.push_sequence(|buf| {
            match &self.data {
                V3MessageData::Plaintext(scoped) => scoped.encode(buf),
                V3MessageData::Encrypted(ciphertext) => buf.push_octet_string(ciphertext),
            }
            buf.push_octet_string(&self.security_params);
            self.global_data.encode(buf);
            buf.push_integer(3);
        });
        buf.finish()
    }

    /// Decode a full message from wire bytes.
    ///
    /// Encrypted msgData is returned raw; the USM layer decrypts it.
    pub fn decode(data: Bytes) -> Result<Self> {
        let mut decoder = Decoder::new(data);
        let mut seq = decoder.read_sequence()?;

        let at = seq.pos();
        let version = seq.read_integer()?;
        if version != 3 {
            return Err(Error::decode(at, DecodeErrorKind::UnknownVersion(version)));
        }

        Self::decode_body(&mut seq)
    }

    /// Decode the fields after the version integer.
    pub(crate) fn decode_body(seq: &mut Decoder) -> Result<Self> {
        let global_data = MsgGlobalData::decode(seq)?;
        let security_params = seq.read_octet_string()?;

        let data = if global_data.msg_flags.security_level.requires_priv() {
            V3MessageData::Encrypted(seq.read_octet_string()?)
        } else {
            V3MessageData::Plaintext(ScopedPdu::decode(seq)?)
        };

        Ok(Self {
            global_data,
            security_params,
            data,
        })
    }
}

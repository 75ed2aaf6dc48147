//! SNMP Protocol Data Units.
//!
//! All request/response operations share one wire layout
//! (`request-id, error-status, error-index, varbind list`), so a single
//! [`Pdu`] struct covers them. GetBulkRequest reuses the two error fields
//! as non-repeaters and max-repetitions per RFC 3416 Section 3.

use crate::ber::{Decoder, EncodeBuf};
use crate::error::{DecodeErrorKind, Error, ErrorStatus, Result};
use crate::oid::Oid;
use crate::varbind::{VarBind, decode_varbind_list, encode_varbind_list};

/// PDU type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PduType {
    GetRequest = 0xA0,
    GetNextRequest = 0xA1,
    Response = 0xA2,
    SetRequest = 0xA3,
    GetBulkRequest = 0xA5,
    InformRequest = 0xA6,
    Trap2 = 0xA7,
    Report = 0xA8,
}

impl PduType {
    /// Map a wire tag to a PDU type.
    ///
    /// The obsolete SNMPv1 trap tag (0xA4) is not mapped; trap reception
    /// is outside this crate's scope.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0xA0 => Some(Self::GetRequest),
            0xA1 => Some(Self::GetNextRequest),
            0xA2 => Some(Self::Response),
            0xA3 => Some(Self::SetRequest),
            0xA5 => Some(Self::GetBulkRequest),
            0xA6 => Some(Self::InformRequest),
            0xA7 => Some(Self::Trap2),
            0xA8 => Some(Self::Report),
            _ => None,
        }
    }

    /// The wire tag.
    pub fn tag(self) -> u8 {
        self as u8
    }
}

impl std::fmt::Display for PduType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::GetRequest => "GetRequest",
            Self::GetNextRequest => "GetNextRequest",
            Self::Response => "Response",
            Self::SetRequest => "SetRequest",
            Self::GetBulkRequest => "GetBulkRequest",
            Self::InformRequest => "InformRequest",
            Self::Trap2 => "SNMPv2-Trap",
            Self::Report => "Report",
        };
        f.write_str(name)
    }
}

/// One SNMP operation PDU.
#[derive(Debug, Clone, PartialEq)]
pub struct Pdu {
    pub pdu_type: PduType,
    /// Correlates responses with requests; unique per session until wrap.
    pub request_id: i32,
    /// Error status for responses; non-repeaters for GetBulkRequest.
    pub error_status: i32,
    /// 1-based index of the failing varbind; max-repetitions for GetBulkRequest.
    pub error_index: i32,
    pub varbinds: Vec<VarBind>,
}

impl Pdu {
    fn request(pdu_type: PduType, request_id: i32, oids: &[Oid]) -> Self {
        Self {
            pdu_type,
            request_id,
            error_status: 0,
            error_index: 0,
            varbinds: oids.iter().cloned().map(VarBind::null).collect(),
        }
    }

    /// Build a GetRequest for the given OIDs.
    pub fn get_request(request_id: i32, oids: &[Oid]) -> Self {
        Self::request(PduType::GetRequest, request_id, oids)
    }

    /// Build a GetNextRequest for the given OIDs.
    pub fn get_next_request(request_id: i32, oids: &[Oid]) -> Self {
        Self::request(PduType::GetNextRequest, request_id, oids)
    }

    /// Build a SetRequest carrying the given bindings.
    pub fn set_request(request_id: i32, varbinds: Vec<VarBind>) -> Self {
        Self {
            pdu_type: PduType::SetRequest,
            request_id,
            error_status: 0,
            error_index: 0,
            varbinds,
        }
    }

    /// Build a GetBulkRequest.
    pub fn get_bulk_request(
        request_id: i32,
        non_repeaters: i32,
        max_repetitions: i32,
        oids: &[Oid],
    ) -> Self {
        Self {
            pdu_type: PduType::GetBulkRequest,
            request_id,
            error_status: non_repeaters,
            error_index: max_repetitions,
            varbinds: oids.iter().cloned().map(VarBind::null).collect(),
        }
    }

    /// Non-repeaters count of a GetBulkRequest.
    pub fn non_repeaters(&self) -> i32 {
        self.error_status
    }

    /// Max-repetitions count of a GetBulkRequest.
    pub fn max_repetitions(&self) -> i32 {
        self.error_index
    }

    /// True if this response carries a non-zero error-status.
    pub fn is_error(&self) -> bool {
        self.error_status != 0
    }

    /// Error status as the RFC 3416 enum.
    pub fn error_status_enum(&self) -> ErrorStatus {
        ErrorStatus::from_i32(self.error_status)
    }

    /// The varbind named by error-index, if the index is in range.
    pub fn error_varbind(&self) -> Option<&VarBind> {
        let index = usize::try_from(self.error_index).ok()?;
        index.checked_sub(1).and_then(|i| self.varbinds.get(i))
    }

    /// Encode to BER.
    pub fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_constructed(self.pdu_type.tag(), |buf| {
            encode_varbind_list(buf, &self.varbinds);
            buf.push_integer(self.error_index);
            buf.push_integer(self.error_status);
            buf.push_integer(self.request_id);
        });
    }

    /// Decode a PDU of any recognized type.
    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let at = decoder.pos();
        let tag = decoder.read_tag()?;
        let pdu_type = PduType::from_tag(tag)
            .ok_or_else(|| Error::decode(at, DecodeErrorKind::UnknownPduType(tag)))?;

        let len = decoder.read_length()?;
        let mut body = decoder.sub_decoder(len)?;

        let request_id = body.read_integer()?;
        let error_status = body.read_integer()?;
        let index_at = body.pos();
        let error_index = body.read_integer()?;
        if pdu_type == PduType::Response && error_index < 0 {
            return Err(Error::decode(
                index_at,
                DecodeErrorKind::NegativeErrorIndex(error_index),
            ));
        }
        let varbinds = decode_varbind_list(&mut body)?;

        Ok(Pdu {
            pdu_type,
            request_id,
            error_status,
            error_index,
            varbinds,
        })
    }
}

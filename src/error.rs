//! Error types for rsnmp.
//!
//! All errors are `#[non_exhaustive]` to allow adding new variants without breaking changes.
//!
//! The taxonomy separates failures a caller should react to differently:
//! decode errors (malformed wire data, never retried), timeouts (retryable),
//! security failures (auth/privacy/time-window, not retryable), protocol
//! errors (semantically invalid agent responses), and agent-reported error
//! status (application-level, carried as structured data).

use std::net::SocketAddr;
use std::time::Duration;

/// Result type alias using the library's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Authentication error kinds (SNMPv3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    /// No authentication key available for this security level.
    NoAuthKey,
    /// HMAC verification failed.
    HmacMismatch,
    /// Authentication parameters wrong length.
    WrongMacLength { expected: usize, actual: usize },
    /// Could not locate auth params in message.
    AuthParamsNotFound,
    /// Agent reported wrong digest (usmStatsWrongDigests).
    WrongDigestReport,
    /// Agent reported unknown user (usmStatsUnknownUserNames).
    UnknownUserReport,
    /// Agent reported unsupported security level.
    UnsupportedSecurityLevelReport,
}

impl std::fmt::Display for AuthErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoAuthKey => write!(f, "no authentication key available"),
            Self::HmacMismatch => write!(f, "HMAC verification failed"),
            Self::WrongMacLength { expected, actual } => {
                write!(f, "wrong MAC length: expected {expected}, got {actual}")
            }
            Self::AuthParamsNotFound => write!(f, "could not locate auth params in message"),
            Self::WrongDigestReport => write!(f, "agent reported wrong digest"),
            Self::UnknownUserReport => write!(f, "agent reported unknown user name"),
            Self::UnsupportedSecurityLevelReport => {
                write!(f, "agent reported unsupported security level")
            }
        }
    }
}

/// Cryptographic error kinds (encryption/decryption).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoErrorKind {
    /// No privacy key available.
    NoPrivKey,
    /// Invalid key length for cipher.
    InvalidKeyLength,
    /// Invalid IV length for cipher.
    InvalidIvLength,
    /// Cipher operation failed.
    CipherError,
    /// Invalid privParameters length.
    InvalidPrivParamsLength { expected: usize, actual: usize },
    /// Ciphertext length not a multiple of the cipher block size.
    InvalidCiphertextLength { length: usize, block_size: usize },
    /// Agent reported decryption failure (usmStatsDecryptionErrors).
    DecryptionErrorReport,
}

impl std::fmt::Display for CryptoErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoPrivKey => write!(f, "no privacy key available"),
            Self::InvalidKeyLength => write!(f, "invalid key length"),
            Self::InvalidIvLength => write!(f, "invalid IV length"),
            Self::CipherError => write!(f, "cipher operation failed"),
            Self::InvalidPrivParamsLength { expected, actual } => {
                write!(
                    f,
                    "invalid privParameters length: expected {expected}, got {actual}"
                )
            }
            Self::InvalidCiphertextLength { length, block_size } => {
                write!(
                    f,
                    "ciphertext length {length} not multiple of block size {block_size}"
                )
            }
            Self::DecryptionErrorReport => write!(f, "agent reported decryption error"),
        }
    }
}

/// BER decode error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeErrorKind {
    /// Expected different tag.
    UnexpectedTag { expected: u8, actual: u8 },
    /// Data truncated unexpectedly.
    TruncatedData,
    /// Invalid BER length encoding.
    InvalidLength,
    /// Indefinite length form not supported.
    IndefiniteLength,
    /// Length field uses too many octets.
    LengthTooLong { octets: usize },
    /// Length exceeds the decoder's sanity cap.
    LengthExceedsMax { length: usize, max: usize },
    /// TLV extends past end of data.
    TlvOverflow,
    /// Zero-length integer.
    ZeroLengthInteger,
    /// Integer value overflow.
    IntegerOverflow,
    /// Counter64 content too long.
    Integer64TooLong { length: usize },
    /// NULL with non-zero length.
    InvalidNull,
    /// Invalid IP address length.
    InvalidIpAddressLength { length: usize },
    /// Invalid OID encoding.
    InvalidOidEncoding,
    /// OID exceeds the maximum arc count.
    OidTooLong { arcs: usize },
    /// Unknown SNMP version.
    UnknownVersion(i32),
    /// Unknown PDU type tag.
    UnknownPduType(u8),
    /// Negative error-index in a response PDU.
    NegativeErrorIndex(i32),
    /// msgID outside the RFC 3412 range.
    InvalidMsgId(i32),
    /// msgMaxSize outside the RFC 3412 range (484..=2147483647).
    InvalidMsgMaxSize(i32),
    /// msgFlags octet wrong length or privacy without authentication.
    InvalidMsgFlags,
    /// Unknown security model.
    UnknownSecurityModel(i32),
    /// Negative engine boots value.
    InvalidEngineBoots(i32),
    /// Negative engine time value.
    InvalidEngineTime(i32),
    /// Empty datagram.
    EmptyMessage,
    /// Discovery response did not carry a usable engine ID.
    MissingEngineId,
}

impl std::fmt::Display for DecodeErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnexpectedTag { expected, actual } => {
                write!(f, "expected tag 0x{expected:02X}, got 0x{actual:02X}")
            }
            Self::TruncatedData => write!(f, "unexpected end of data"),
            Self::InvalidLength => write!(f, "invalid length encoding"),
            Self::IndefiniteLength => write!(f, "indefinite length encoding not supported"),
            Self::LengthTooLong { octets } => {
                write!(f, "length encoding too long ({octets} octets)")
            }
            Self::LengthExceedsMax { length, max } => {
                write!(f, "length {length} exceeds maximum {max}")
            }
            Self::TlvOverflow => write!(f, "TLV extends past end of data"),
            Self::ZeroLengthInteger => write!(f, "zero-length integer"),
            Self::IntegerOverflow => write!(f, "integer overflow"),
            Self::Integer64TooLong { length } => {
                write!(f, "Counter64 content too long: {length} bytes")
            }
            Self::InvalidNull => write!(f, "NULL with non-zero length"),
            Self::InvalidIpAddressLength { length } => {
                write!(f, "IP address must be 4 bytes, got {length}")
            }
            Self::InvalidOidEncoding => write!(f, "invalid OID encoding"),
            Self::OidTooLong { arcs } => write!(f, "OID has too many arcs: {arcs}"),
            Self::UnknownVersion(v) => write!(f, "unknown SNMP version: {v}"),
            Self::UnknownPduType(t) => write!(f, "unknown PDU type: 0x{t:02X}"),
            Self::NegativeErrorIndex(v) => write!(f, "negative error-index: {v}"),
            Self::InvalidMsgId(v) => write!(f, "invalid msgID: {v}"),
            Self::InvalidMsgMaxSize(v) => write!(f, "invalid msgMaxSize: {v}"),
            Self::InvalidMsgFlags => write!(f, "invalid msgFlags"),
            Self::UnknownSecurityModel(m) => write!(f, "unknown security model: {m}"),
            Self::InvalidEngineBoots(v) => write!(f, "invalid engine boots: {v}"),
            Self::InvalidEngineTime(v) => write!(f, "invalid engine time: {v}"),
            Self::EmptyMessage => write!(f, "empty message"),
            Self::MissingEngineId => write!(f, "discovery response carried no engine ID"),
        }
    }
}

/// BER encode error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeErrorKind {
    /// V3 security not configured for this session.
    NoSecurityConfig,
    /// Engine not discovered yet.
    EngineNotDiscovered,
    /// Auth key not available for encoding.
    MissingAuthKey,
    /// Privacy key not available.
    NoPrivKey,
    /// Could not locate auth params position in the encoded message.
    MissingAuthParams,
    /// GETBULK requested on an SNMPv1 session.
    BulkRequiresV2c,
}

impl std::fmt::Display for EncodeErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoSecurityConfig => write!(f, "V3 security config not set"),
            Self::EngineNotDiscovered => write!(f, "engine not discovered"),
            Self::MissingAuthKey => write!(f, "auth key not available for encoding"),
            Self::NoPrivKey => write!(f, "privacy key not available"),
            Self::MissingAuthParams => {
                write!(f, "could not find auth params position in encoded message")
            }
            Self::BulkRequiresV2c => write!(f, "GETBULK requires SNMPv2c or SNMPv3"),
        }
    }
}

/// OID validation error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OidErrorKind {
    /// Empty OID string.
    Empty,
    /// Arc is not a valid non-negative integer.
    InvalidArc,
    /// First arc must be 0, 1, or 2.
    InvalidFirstArc(u32),
    /// Second arc too large for first arc value.
    InvalidSecondArc { first: u32, second: u32 },
    /// OID must have at least 2 arcs.
    TooShort,
    /// OID has too many arcs.
    TooManyArcs { count: usize, max: usize },
    /// Subidentifier overflow during encoding.
    SubidentifierOverflow,
}

impl std::fmt::Display for OidErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "empty OID"),
            Self::InvalidArc => write!(f, "invalid arc value"),
            Self::InvalidFirstArc(v) => write!(f, "first arc must be 0, 1, or 2, got {v}"),
            Self::InvalidSecondArc { first, second } => {
                write!(f, "second arc {second} too large for first arc {first}")
            }
            Self::TooShort => write!(f, "OID must have at least 2 arcs"),
            Self::TooManyArcs { count, max } => {
                write!(f, "OID has {count} arcs, exceeds maximum {max}")
            }
            Self::SubidentifierOverflow => write!(f, "subidentifier overflow"),
        }
    }
}

/// Semantically invalid agent behavior in an otherwise well-formed response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolErrorKind {
    /// Response varbind count differs from the request.
    VarBindCountMismatch { expected: usize, actual: usize },
    /// Response PDU type was not Response (or Report for v3).
    UnexpectedPduType(u8),
    /// Walk exceeded the configured iteration bound.
    WalkLimitExceeded { limit: usize },
    /// Report PDU carried no recognizable usmStats varbind.
    UnrecognizedReport,
}

impl std::fmt::Display for ProtocolErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::VarBindCountMismatch { expected, actual } => {
                write!(f, "expected {expected} varbinds in response, got {actual}")
            }
            Self::UnexpectedPduType(t) => write!(f, "unexpected PDU type 0x{t:02X} in response"),
            Self::WalkLimitExceeded { limit } => {
                write!(f, "walk exceeded iteration limit of {limit}")
            }
            Self::UnrecognizedReport => write!(f, "unrecognized report PDU"),
        }
    }
}

/// SNMP error status codes (RFC 3416).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorStatus {
    NoError,
    TooBig,
    NoSuchName,
    BadValue,
    ReadOnly,
    GenErr,
    NoAccess,
    WrongType,
    WrongLength,
    WrongEncoding,
    WrongValue,
    NoCreation,
    InconsistentValue,
    ResourceUnavailable,
    CommitFailed,
    UndoFailed,
    AuthorizationError,
    NotWritable,
    InconsistentName,
    /// Unknown/future error status code.
    Unknown(i32),
}

impl ErrorStatus {
    /// Create from raw status code.
    pub fn from_i32(value: i32) -> Self {
        match value {
            0 => Self::NoError,
            1 => Self::TooBig,
            2 => Self::NoSuchName,
            3 => Self::BadValue,
            4 => Self::ReadOnly,
            5 => Self::GenErr,
            6 => Self::NoAccess,
            7 => Self::WrongType,
            8 => Self::WrongLength,
            9 => Self::WrongEncoding,
            10 => Self::WrongValue,
            11 => Self::NoCreation,
            12 => Self::InconsistentValue,
            13 => Self::ResourceUnavailable,
            14 => Self::CommitFailed,
            15 => Self::UndoFailed,
            16 => Self::AuthorizationError,
            17 => Self::NotWritable,
            18 => Self::InconsistentName,
            other => Self::Unknown(other),
        }
    }

    /// Convert to raw status code.
    pub fn as_i32(&self) -> i32 {
        match self {
            Self::NoError => 0,
            Self::TooBig => 1,
            Self::NoSuchName => 2,
            Self::BadValue => 3,
            Self::ReadOnly => 4,
            Self::GenErr => 5,
            Self::NoAccess => 6,
            Self::WrongType => 7,
            Self::WrongLength => 8,
            Self::WrongEncoding => 9,
            Self::WrongValue => 10,
            Self::NoCreation => 11,
            Self::InconsistentValue => 12,
            Self::ResourceUnavailable => 13,
            Self::CommitFailed => 14,
            Self::UndoFailed => 15,
            Self::AuthorizationError => 16,
            Self::NotWritable => 17,
            Self::InconsistentName => 18,
            Self::Unknown(code) => *code,
        }
    }
}

impl std::fmt::Display for ErrorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoError => write!(f, "noError"),
            Self::TooBig => write!(f, "tooBig"),
            Self::NoSuchName => write!(f, "noSuchName"),
            Self::BadValue => write!(f, "badValue"),
            Self::ReadOnly => write!(f, "readOnly"),
            Self::GenErr => write!(f, "genErr"),
            Self::NoAccess => write!(f, "noAccess"),
            Self::WrongType => write!(f, "wrongType"),
            Self::WrongLength => write!(f, "wrongLength"),
            Self::WrongEncoding => write!(f, "wrongEncoding"),
            Self::WrongValue => write!(f, "wrongValue"),
            Self::NoCreation => write!(f, "noCreation"),
            Self::InconsistentValue => write!(f, "inconsistentValue"),
            Self::ResourceUnavailable => write!(f, "resourceUnavailable"),
            Self::CommitFailed => write!(f, "commitFailed"),
            Self::UndoFailed => write!(f, "undoFailed"),
            Self::AuthorizationError => write!(f, "authorizationError"),
            Self::NotWritable => write!(f, "notWritable"),
            Self::InconsistentName => write!(f, "inconsistentName"),
            Self::Unknown(code) => write!(f, "unknown({code})"),
        }
    }
}

/// Library error type.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// I/O error during communication.
    #[error("I/O error{}: {source}", target.map(|t| format!(" communicating with {t}")).unwrap_or_default())]
    Io {
        target: Option<SocketAddr>,
        #[source]
        source: std::io::Error,
    },

    /// Request timed out (after retries if configured).
    #[error("timeout after {elapsed:?}{} (request_id={request_id}, retries={retries})", target.map(|t| format!(" waiting for {t}")).unwrap_or_default())]
    Timeout {
        target: Option<SocketAddr>,
        elapsed: Duration,
        request_id: i32,
        retries: u32,
    },

    /// Non-zero error-status returned by the agent.
    ///
    /// `oid` is the varbind named by error-index, when the index is valid.
    #[error("SNMP error{}: {status} at index {index}", target.map(|t| format!(" from {t}")).unwrap_or_default())]
    Snmp {
        target: Option<SocketAddr>,
        status: ErrorStatus,
        index: u32,
        oid: Option<crate::oid::Oid>,
    },

    /// Invalid OID format.
    #[error("invalid OID: {kind}")]
    InvalidOid {
        kind: OidErrorKind,
        input: Option<Box<str>>, // Only allocated when parsing string input
    },

    /// BER decoding error. Never retried.
    #[error("decode error at offset {offset}: {kind}")]
    Decode {
        offset: usize,
        kind: DecodeErrorKind,
    },

    /// BER encoding error.
    #[error("encode error: {kind}")]
    Encode { kind: EncodeErrorKind },

    /// Agent returned a semantically invalid response.
    #[error("protocol error{}: {kind}", target.map(|t| format!(" from {t}")).unwrap_or_default())]
    Protocol {
        target: Option<SocketAddr>,
        kind: ProtocolErrorKind,
    },

    /// Response version doesn't match request.
    #[error("version mismatch: expected {expected:?}, got {actual:?}")]
    VersionMismatch {
        expected: crate::version::Version,
        actual: crate::version::Version,
    },

    /// Message exceeds the negotiated maximum size.
    #[error("message too large: {size} bytes exceeds maximum {max}")]
    MessageTooLarge { size: usize, max: usize },

    /// Agent does not recognize our engine ID (SNMPv3).
    #[error("unknown engine ID")]
    UnknownEngineId { target: Option<SocketAddr> },

    /// Message outside the 150-second time window (SNMPv3). Never retried.
    #[error("message not in time window")]
    NotInTimeWindow { target: Option<SocketAddr> },

    /// Authentication failed (SNMPv3). Never retried.
    #[error("authentication failed: {kind}")]
    AuthenticationFailed {
        target: Option<SocketAddr>,
        kind: AuthErrorKind,
    },

    /// Decryption failed (SNMPv3).
    #[error("decryption failed: {kind}")]
    DecryptionFailed {
        target: Option<SocketAddr>,
        kind: CryptoErrorKind,
    },

    /// Encryption failed (SNMPv3).
    #[error("encryption failed: {kind}")]
    EncryptionFailed {
        target: Option<SocketAddr>,
        kind: CryptoErrorKind,
    },

    /// Non-increasing OID detected during a walk.
    ///
    /// Returned when a walk receives an OID that is not lexicographically
    /// greater than the previous one, which would loop forever against a
    /// non-conformant agent.
    #[error("walk detected non-increasing OID: {previous} >= {current}")]
    NonIncreasingOid {
        previous: crate::oid::Oid,
        current: crate::oid::Oid,
    },
}

impl Error {
    /// Create a decode error.
    pub fn decode(offset: usize, kind: DecodeErrorKind) -> Self {
        Self::Decode { offset, kind }
    }

    /// Create an encode error.
    pub fn encode(kind: EncodeErrorKind) -> Self {
        Self::Encode { kind }
    }

    /// Create an authentication error.
    pub fn auth(target: Option<SocketAddr>, kind: AuthErrorKind) -> Self {
        Self::AuthenticationFailed { target, kind }
    }

    /// Create a decryption error.
    pub fn decrypt(target: Option<SocketAddr>, kind: CryptoErrorKind) -> Self {
        Self::DecryptionFailed { target, kind }
    }

    /// Create an encryption error.
    pub fn encrypt(target: Option<SocketAddr>, kind: CryptoErrorKind) -> Self {
        Self::EncryptionFailed { target, kind }
    }

    /// Create a protocol error.
    pub fn protocol(target: Option<SocketAddr>, kind: ProtocolErrorKind) -> Self {
        Self::Protocol { target, kind }
    }

    /// Create an invalid OID error from a kind (no input string).
    pub fn invalid_oid(kind: OidErrorKind) -> Self {
        Self::InvalidOid { kind, input: None }
    }

    /// Create an invalid OID error carrying the input string that failed.
    pub fn invalid_oid_with_input(kind: OidErrorKind, input: impl Into<Box<str>>) -> Self {
        Self::InvalidOid {
            kind,
            input: Some(input.into()),
        }
    }

    /// True if this error may be resolved by retrying the request.
    ///
    /// Only timeouts qualify; decode, security, and protocol failures
    /// will not improve on a resend.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Get the target address if this error has one.
    pub fn target(&self) -> Option<SocketAddr> {
        match self {
            Self::Io { target, .. } => *target,
            Self::Timeout { target, .. } => *target,
            Self::Snmp { target, .. } => *target,
            Self::Protocol { target, .. } => *target,
            Self::UnknownEngineId { target } => *target,
            Self::NotInTimeWindow { target } => *target,
            Self::AuthenticationFailed { target, .. } => *target,
            Self::DecryptionFailed { target, .. } => *target,
            Self::EncryptionFailed { target, .. } => *target,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_status_round_trip() {
        for code in 0..=18 {
            assert_eq!(ErrorStatus::from_i32(code).as_i32(), code);
        }
        assert_eq!(ErrorStatus::from_i32(99), ErrorStatus::Unknown(99));
        assert_eq!(ErrorStatus::Unknown(99).as_i32(), 99);
    }

    #[test]
    fn only_timeout_is_retryable() {
        let timeout = Error::Timeout {
            target: None,
            elapsed: Duration::from_secs(1),
            request_id: 7,
            retries: 0,
        };
        assert!(timeout.is_retryable());

        assert!(!Error::decode(0, DecodeErrorKind::TruncatedData).is_retryable());
        assert!(!Error::NotInTimeWindow { target: None }.is_retryable());
        assert!(
            !Error::protocol(
                None,
                ProtocolErrorKind::VarBindCountMismatch {
                    expected: 2,
                    actual: 1
                }
            )
            .is_retryable()
        );
    }

    #[test]
    fn display_includes_kind_detail() {
        let err = Error::decode(12, DecodeErrorKind::UnexpectedTag {
            expected: 0x30,
            actual: 0x02,
        });
        let text = err.to_string();
        assert!(text.contains("offset 12"));
        assert!(text.contains("0x30"));
    }
}

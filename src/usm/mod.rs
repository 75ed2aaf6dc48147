//! User-based Security Model (RFC 3414, RFC 7860, RFC 3826).
//!
//! Covers everything SNMPv3 security needs on the client side: key
//! derivation and HMAC authentication, DES/AES privacy, USM parameter
//! encoding, and authoritative engine discovery with time-window
//! replay protection.

mod auth;
mod engine;
mod params;
mod privacy;

pub use auth::AuthKey;
pub use engine::{
    EngineCache, EngineState, MAX_ENGINE_TIME, ReportKind, TIME_WINDOW, parse_discovery_response,
};
pub use params::UsmSecurityParams;
pub use privacy::{PrivKey, SaltCounter};

/// Authentication protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthProtocol {
    /// HMAC-MD5-96 (RFC 3414)
    Md5,
    /// HMAC-SHA-96 (RFC 3414)
    Sha1,
    /// HMAC-128-SHA-224 (RFC 7860)
    Sha224,
    /// HMAC-192-SHA-256 (RFC 7860)
    Sha256,
    /// HMAC-256-SHA-384 (RFC 7860)
    Sha384,
    /// HMAC-384-SHA-512 (RFC 7860)
    Sha512,
}

impl AuthProtocol {
    /// Digest output length, which is also the localized key length.
    pub fn digest_len(self) -> usize {
        match self {
            Self::Md5 => 16,
            Self::Sha1 => 20,
            Self::Sha224 => 28,
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }

    /// Truncated MAC length carried in msgAuthenticationParameters.
    pub fn mac_len(self) -> usize {
        match self {
            Self::Md5 | Self::Sha1 => 12,
            Self::Sha224 => 16,
            Self::Sha256 => 24,
            Self::Sha384 => 32,
            Self::Sha512 => 48,
        }
    }

    /// Whether this protocol yields enough key material for `priv_protocol`.
    ///
    /// Privacy keys are cut from the localized authentication key, so the
    /// digest must be at least as long as the cipher key.
    pub fn is_compatible_with(self, priv_protocol: PrivProtocol) -> bool {
        self.digest_len() >= priv_protocol.key_len()
    }
}

impl std::fmt::Display for AuthProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Md5 => "MD5",
            Self::Sha1 => "SHA",
            Self::Sha224 => "SHA-224",
            Self::Sha256 => "SHA-256",
            Self::Sha384 => "SHA-384",
            Self::Sha512 => "SHA-512",
        })
    }
}

impl std::str::FromStr for AuthProtocol {
    type Err = ParseProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "MD5" => Ok(Self::Md5),
            "SHA" | "SHA1" | "SHA-1" => Ok(Self::Sha1),
            "SHA224" | "SHA-224" => Ok(Self::Sha224),
            "SHA256" | "SHA-256" => Ok(Self::Sha256),
            "SHA384" | "SHA-384" => Ok(Self::Sha384),
            "SHA512" | "SHA-512" => Ok(Self::Sha512),
            _ => Err(ParseProtocolError {
                input: s.into(),
                kind: "authentication",
                expected: "MD5, SHA, SHA-224, SHA-256, SHA-384, SHA-512",
            }),
        }
    }
}

/// Privacy protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivProtocol {
    /// DES-CBC (RFC 3414 Section 8)
    Des,
    /// AES-128-CFB (RFC 3826)
    Aes128,
    /// AES-192-CFB
    Aes192,
    /// AES-256-CFB
    Aes256,
}

impl PrivProtocol {
    /// Required localized key length.
    pub fn key_len(self) -> usize {
        match self {
            // 8 key bytes + 8 pre-IV bytes
            Self::Des => 16,
            Self::Aes128 => 16,
            Self::Aes192 => 24,
            Self::Aes256 => 32,
        }
    }

    /// msgPrivacyParameters length; 8 bytes for every protocol.
    pub fn salt_len(self) -> usize {
        8
    }
}

impl std::fmt::Display for PrivProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Des => "DES",
            Self::Aes128 => "AES",
            Self::Aes192 => "AES-192",
            Self::Aes256 => "AES-256",
        })
    }
}

impl std::str::FromStr for PrivProtocol {
    type Err = ParseProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DES" => Ok(Self::Des),
            "AES" | "AES128" | "AES-128" => Ok(Self::Aes128),
            "AES192" | "AES-192" => Ok(Self::Aes192),
            "AES256" | "AES-256" => Ok(Self::Aes256),
            _ => Err(ParseProtocolError {
                input: s.into(),
                kind: "privacy",
                expected: "DES, AES, AES-128, AES-192, AES-256",
            }),
        }
    }
}

/// Error parsing a protocol name from a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseProtocolError {
    input: Box<str>,
    kind: &'static str,
    expected: &'static str,
}

impl std::fmt::Display for ParseProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "unknown {} protocol '{}'; expected one of: {}",
            self.kind, self.input, self.expected
        )
    }
}

impl std::error::Error for ParseProtocolError {}

//! Key derivation and HMAC authentication (RFC 3414 Appendix A, RFC 7860).

use digest::{Digest, KeyInit, Mac};
use hmac::Hmac;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::AuthProtocol;

/// RFC 3414 A.2: the password is expanded to 1MB before hashing.
const EXPANSION_SIZE: usize = 1_048_576;

/// A localized authentication key, bound to one engine ID.
///
/// Key material is wiped from memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AuthKey {
    key: Vec<u8>,
    #[zeroize(skip)]
    protocol: AuthProtocol,
}

impl AuthKey {
    /// Derive a key from a password, localized to `engine_id`.
    ///
    /// RFC 3414 A.2: expand the password to 1MB, hash to get the master
    /// key Ku, then hash `Ku || engineID || Ku` for the localized key.
    pub fn from_password(protocol: AuthProtocol, password: &[u8], engine_id: &[u8]) -> Self {
        let master = password_to_key(protocol, password);
        let key = localize(protocol, &master, engine_id);
        Self { key, protocol }
    }

    /// Wrap an already-localized key.
    pub fn from_bytes(protocol: AuthProtocol, key: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            protocol,
        }
    }

    pub fn protocol(&self) -> AuthProtocol {
        self.protocol
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.key
    }

    pub fn mac_len(&self) -> usize {
        self.protocol.mac_len()
    }

    /// HMAC over `data`, truncated to the protocol's MAC length.
    pub fn compute_mac(&self, data: &[u8]) -> Vec<u8> {
        macro_rules! hmac_truncated {
            ($digest:ty) => {{
                let mut mac = <Hmac<$digest> as KeyInit>::new_from_slice(&self.key)
                    .expect("HMAC accepts any key length");
                Mac::update(&mut mac, data);
                mac.finalize().into_bytes()[..self.protocol.mac_len()].to_vec()
            }};
        }
        match self.protocol {
            AuthProtocol::Md5 => hmac_truncated!(md5::Md5),
            AuthProtocol::Sha1 => hmac_truncated!(sha1::Sha1),
            AuthProtocol::Sha224 => hmac_truncated!(sha2::Sha224),
            AuthProtocol::Sha256 => hmac_truncated!(sha2::Sha256),
            AuthProtocol::Sha384 => hmac_truncated!(sha2::Sha384),
            AuthProtocol::Sha512 => hmac_truncated!(sha2::Sha512),
        }
    }

    /// Constant-time MAC check.
    pub fn verify_mac(&self, data: &[u8], expected: &[u8]) -> bool {
        self.compute_mac(data).ct_eq(expected).into()
    }

    /// Sign an encoded message in place.
    ///
    /// The MAC field at `auth_offset` must already hold mac_len() zero
    /// bytes; the HMAC is computed over the whole message in that state.
    pub fn sign_message(&self, message: &mut [u8], auth_offset: usize) {
        let mac = self.compute_mac(message);
        message[auth_offset..auth_offset + mac.len()].copy_from_slice(&mac);
    }

    /// Verify a received message given the position of its MAC field.
    pub fn verify_message(&self, message: &[u8], auth_offset: usize) -> bool {
        let mac_len = self.mac_len();
        let Some(received) = message.get(auth_offset..auth_offset + mac_len) else {
            return false;
        };
        let mut zeroed = message.to_vec();
        zeroed[auth_offset..auth_offset + mac_len].fill(0);
        self.verify_mac(&zeroed, received)
    }
}

impl std::fmt::Debug for AuthKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthKey")
            .field("protocol", &self.protocol)
            .field("key", &"<redacted>")
            .finish()
    }
}

/// RFC 3414 A.2.1 password-to-key: Ku = H(password repeated to 1MB).
pub(crate) fn password_to_key(protocol: AuthProtocol, password: &[u8]) -> Vec<u8> {
    match protocol {
        AuthProtocol::Md5 => expand_and_hash::<md5::Md5>(password),
        AuthProtocol::Sha1 => expand_and_hash::<sha1::Sha1>(password),
        AuthProtocol::Sha224 => expand_and_hash::<sha2::Sha224>(password),
        AuthProtocol::Sha256 => expand_and_hash::<sha2::Sha256>(password),
        AuthProtocol::Sha384 => expand_and_hash::<sha2::Sha384>(password),
        AuthProtocol::Sha512 => expand_and_hash::<sha2::Sha512>(password),
    }
}

fn expand_and_hash<D: Digest>(password: &[u8]) -> Vec<u8> {
    if password.is_empty() {
        return vec![0; <D as Digest>::output_size()];
    }

    // Feed the 1MB expansion in 64-byte chunks, the way net-snmp does.
    let mut hasher = D::new();
    let mut chunk = [0u8; 64];
    let mut cursor = password.iter().cycle();
    let mut fed = 0;
    while fed < EXPANSION_SIZE {
        for byte in &mut chunk {
            *byte = *cursor.next().unwrap_or(&0);
        }
        hasher.update(chunk);
        fed += chunk.len();
    }
    hasher.finalize().to_vec()
}

/// RFC 3414 A.2: Kul = H(Ku || engineID || Ku).
pub(crate) fn localize(protocol: AuthProtocol, master: &[u8], engine_id: &[u8]) -> Vec<u8> {
    fn run<D: Digest>(master: &[u8], engine_id: &[u8]) -> Vec<u8> {
        let mut hasher = D::new();
        hasher.update(master);
        hasher.update(engine_id);
        hasher.update(master);
        hasher.finalize().to_vec()
    }
    match protocol {
        AuthProtocol::Md5 => run::<md5::Md5>(master, engine_id),
        AuthProtocol::Sha1 => run::<sha1::Sha1>(master, engine_id),
        AuthProtocol::Sha224 => run::<sha2::Sha224>(master, engine_id),
        AuthProtocol::Sha256 => run::<sha2::Sha256>(master, engine_id),
        AuthProtocol::Sha384 => run::<sha2::Sha384>(master, engine_id),
        AuthProtocol::Sha512 => run::<sha2::Sha512>(master, engine_id),
    }
}

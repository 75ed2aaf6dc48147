//! Privacy protocols: DES-CBC (RFC 3414 Section 8) and AES-CFB (RFC 3826).
//!
//! Salt and IV construction differ between the two families:
//!
//! - DES: privParameters = engineBoots || counter (8 bytes);
//!   IV = pre-IV XOR salt, where pre-IV is the last 8 bytes of the
//!   16-byte localized key.
//! - AES: privParameters = 64-bit counter (8 bytes);
//!   IV = engineBoots || engineTime || salt (16 bytes, concatenated).

use std::sync::atomic::{AtomicU64, Ordering};

use aes::{Aes128, Aes192, Aes256};
use bytes::Bytes;
use cbc::cipher::block_padding::NoPadding;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut};
use cfb_mode::cipher::{AsyncStreamCipher, KeyIvInit};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::{AuthProtocol, PrivProtocol, auth};
use crate::error::{CryptoErrorKind, Error, Result};

/// Monotonic salt source shared by all encryptions with one key.
///
/// Seeded from OS randomness and never yields zero, so IVs stay unique
/// even across counter wraparound.
#[derive(Debug)]
pub struct SaltCounter(AtomicU64);

impl SaltCounter {
    pub fn new() -> Self {
        Self(AtomicU64::new(random_nonzero_u64()))
    }

    /// Start from a fixed value. Test use only.
    pub fn from_value(value: u64) -> Self {
        Self(AtomicU64::new(value))
    }

    /// Next salt value; skips zero on wraparound.
    pub fn next(&self) -> u64 {
        let value = self.0.fetch_add(1, Ordering::SeqCst);
        if value == 0 {
            self.0.fetch_add(1, Ordering::SeqCst)
        } else {
            value
        }
    }
}

impl Default for SaltCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for SaltCounter {
    fn clone(&self) -> Self {
        Self(AtomicU64::new(self.0.load(Ordering::SeqCst)))
    }
}

fn random_nonzero_u64() -> u64 {
    let mut buf = [0u8; 8];
    loop {
        getrandom::fill(&mut buf).expect("OS random source unavailable");
        let value = u64::from_ne_bytes(buf);
        if value != 0 {
            return value;
        }
    }
}

/// A localized privacy key with its salt counter.
///
/// Key material is wiped from memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PrivKey {
    key: Vec<u8>,
    #[zeroize(skip)]
    protocol: PrivProtocol,
    #[zeroize(skip)]
    salt: SaltCounter,
}

impl PrivKey {
    /// Derive from a password, localized to `engine_id`.
    ///
    /// Uses the same derivation as authentication keys (RFC 3414 A.2,
    /// RFC 3826 Section 1.2); the cipher takes its key from the front of
    /// the localized bytes. The auth protocol must produce at least
    /// [`PrivProtocol::key_len`] bytes, see
    /// [`AuthProtocol::is_compatible_with`].
    pub fn from_password(
        auth_protocol: AuthProtocol,
        priv_protocol: PrivProtocol,
        password: &[u8],
        engine_id: &[u8],
    ) -> Self {
        if !auth_protocol.is_compatible_with(priv_protocol) {
            tracing::warn!(
                %auth_protocol,
                %priv_protocol,
                "auth protocol yields too little key material for privacy protocol"
            );
        }
        let master = auth::password_to_key(auth_protocol, password);
        let key = auth::localize(auth_protocol, &master, engine_id);
        Self::from_bytes(priv_protocol, key)
    }

    /// Wrap an already-localized key.
    pub fn from_bytes(protocol: PrivProtocol, key: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            protocol,
            salt: SaltCounter::new(),
        }
    }

    pub fn protocol(&self) -> PrivProtocol {
        self.protocol
    }

    /// Replace the salt counter. Test use only.
    #[cfg(test)]
    pub(crate) fn with_salt(mut self, salt: SaltCounter) -> Self {
        self.salt = salt;
        self
    }

    fn check_key_len(&self, failing: fn(Option<std::net::SocketAddr>, CryptoErrorKind) -> Error) -> Result<()> {
        if self.key.len() < self.protocol.key_len() {
            return Err(failing(None, CryptoErrorKind::InvalidKeyLength));
        }
        Ok(())
    }

    /// Encrypt a scoped PDU, returning `(ciphertext, privParameters)`.
    pub fn encrypt(
        &self,
        plaintext: &[u8],
        engine_boots: u32,
        engine_time: u32,
    ) -> Result<(Bytes, Bytes)> {
        self.check_key_len(Error::encrypt)?;
        let salt = self.salt.next();
        match self.protocol {
            PrivProtocol::Des => self.encrypt_des(plaintext, engine_boots, salt),
            PrivProtocol::Aes128 | PrivProtocol::Aes192 | PrivProtocol::Aes256 => {
                self.encrypt_aes(plaintext, engine_boots, engine_time, salt)
            }
        }
    }

    /// Decrypt a received scoped PDU using the message's privParameters.
    pub fn decrypt(
        &self,
        ciphertext: &[u8],
        engine_boots: u32,
        engine_time: u32,
        priv_params: &[u8],
    ) -> Result<Bytes> {
        self.check_key_len(Error::decrypt)?;
        if priv_params.len() != 8 {
            return Err(Error::decrypt(
                None,
                CryptoErrorKind::InvalidPrivParamsLength {
                    expected: 8,
                    actual: priv_params.len(),
                },
            ));
        }
        match self.protocol {
            PrivProtocol::Des => self.decrypt_des(ciphertext, priv_params),
            PrivProtocol::Aes128 | PrivProtocol::Aes192 | PrivProtocol::Aes256 => {
                self.decrypt_aes(ciphertext, engine_boots, engine_time, priv_params)
            }
        }
    }

    fn des_iv(&self, salt: &[u8]) -> [u8; 8] {
        let pre_iv = &self.key[8..16];
        let mut iv = [0u8; 8];
        for (i, byte) in iv.iter_mut().enumerate() {
            *byte = pre_iv[i] ^ salt[i];
        }
        iv
    }

    fn encrypt_des(&self, plaintext: &[u8], engine_boots: u32, salt: u64) -> Result<(Bytes, Bytes)> {
        let mut salt_bytes = [0u8; 8];
        salt_bytes[..4].copy_from_slice(&engine_boots.to_be_bytes());
        salt_bytes[4..].copy_from_slice(&(salt as u32).to_be_bytes());
        let iv = self.des_iv(&salt_bytes);

        // Zero-pad up to the 8-byte block size.
        let padded_len = plaintext.len().div_ceil(8) * 8;
        let mut buffer = vec![0u8; padded_len];
        buffer[..plaintext.len()].copy_from_slice(plaintext);

        let cipher = cbc::Encryptor::<des::Des>::new_from_slices(&self.key[..8], &iv)
            .map_err(|_| Error::encrypt(None, CryptoErrorKind::InvalidIvLength))?;
        let ciphertext = cipher
            .encrypt_padded_mut::<NoPadding>(&mut buffer, padded_len)
            .map_err(|_| Error::encrypt(None, CryptoErrorKind::CipherError))?;

        Ok((
            Bytes::copy_from_slice(ciphertext),
            Bytes::copy_from_slice(&salt_bytes),
        ))
    }

    fn decrypt_des(&self, ciphertext: &[u8], priv_params: &[u8]) -> Result<Bytes> {
        if ciphertext.is_empty() || !ciphertext.len().is_multiple_of(8) {
            return Err(Error::decrypt(
                None,
                CryptoErrorKind::InvalidCiphertextLength {
                    length: ciphertext.len(),
                    block_size: 8,
                },
            ));
        }
        let iv = self.des_iv(priv_params);

        let cipher = cbc::Decryptor::<des::Des>::new_from_slices(&self.key[..8], &iv)
            .map_err(|_| Error::decrypt(None, CryptoErrorKind::InvalidIvLength))?;
        let mut buffer = ciphertext.to_vec();
        let plaintext = cipher
            .decrypt_padded_mut::<NoPadding>(&mut buffer)
            .map_err(|_| Error::decrypt(None, CryptoErrorKind::CipherError))?;

        Ok(Bytes::copy_from_slice(plaintext))
    }

    fn aes_iv(engine_boots: u32, engine_time: u32, salt: &[u8]) -> [u8; 16] {
        let mut iv = [0u8; 16];
        iv[..4].copy_from_slice(&engine_boots.to_be_bytes());
        iv[4..8].copy_from_slice(&engine_time.to_be_bytes());
        iv[8..].copy_from_slice(salt);
        iv
    }

    fn encrypt_aes(
        &self,
        plaintext: &[u8],
        engine_boots: u32,
        engine_time: u32,
        salt: u64,
    ) -> Result<(Bytes, Bytes)> {
        let salt_bytes = salt.to_be_bytes();
        let iv = Self::aes_iv(engine_boots, engine_time, &salt_bytes);
        let key = &self.key[..self.protocol.key_len()];
        let mut buffer = plaintext.to_vec();

        match self.protocol {
            PrivProtocol::Aes128 => cfb_mode::Encryptor::<Aes128>::new_from_slices(key, &iv)
                .map_err(|_| Error::encrypt(None, CryptoErrorKind::InvalidIvLength))?
                .encrypt(&mut buffer),
            PrivProtocol::Aes192 => cfb_mode::Encryptor::<Aes192>::new_from_slices(key, &iv)
                .map_err(|_| Error::encrypt(None, CryptoErrorKind::InvalidIvLength))?
                .encrypt(&mut buffer),
            PrivProtocol::Aes256 => cfb_mode::Encryptor::<Aes256>::new_from_slices(key, &iv)
                .map_err(|_| Error::encrypt(None, CryptoErrorKind::InvalidIvLength))?
                .encrypt(&mut buffer),
            PrivProtocol::Des => unreachable!(),
        }

        Ok((Bytes::from(buffer), Bytes::copy_from_slice(&salt_bytes)))
    }

    fn decrypt_aes(
        &self,
        ciphertext: &[u8],
        engine_boots: u32,
        engine_time: u32,
        priv_params: &[u8],
    ) -> Result<Bytes> {
        let iv = Self::aes_iv(engine_boots, engine_time, priv_params);
        let key = &self.key[..self.protocol.key_len()];
        let mut buffer = ciphertext.to_vec();

        match self.protocol {
            PrivProtocol::Aes128 => cfb_mode::Decryptor::<Aes128>::new_from_slices(key, &iv)
                .map_err(|_| Error::decrypt(None, CryptoErrorKind::InvalidIvLength))?
                .decrypt(&mut buffer),
            PrivProtocol::Aes192 => cfb_mode::Decryptor::<Aes192>::new_from_slices(key, &iv)
                .map_err(|_| Error::decrypt(None, CryptoErrorKind::InvalidIvLength))?
                .decrypt(&mut buffer),
            PrivProtocol::Aes256 => cfb_mode::Decryptor::<Aes256>::new_from_slices(key, &iv)
                .map_err(|_| Error::decrypt(None, CryptoErrorKind::InvalidIvLength))?
                .decrypt(&mut buffer),
            PrivProtocol::Des => unreachable!(),
        }

        Ok(Bytes::from(buffer))
    }
}

impl std::fmt::Debug for PrivKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivKey")
            .field("protocol", &self.protocol)
            .field("key", &"<redacted>")
            .finish()
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! AES-256-GCM encryption of byte buffers and strings.
//!
//! ## Ciphertext Layout
//!
//! ```text
//! salt[32] || iv[12] || ciphertext || tag[16]
//! ```
//!
//! A fresh salt and IV are drawn from the OS RNG on every call, so encrypting
//! the same plaintext twice never yields the same output. The string helpers
//! wrap the layout above in standard padded base64.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64ct::{Base64, Encoding};
use rand::rngs::OsRng;
use rand::RngCore;

use super::KeyDerivation;

/// Salt length in bytes.
pub const SALT_LEN: usize = 32;

/// GCM nonce length in bytes.
pub const IV_LEN: usize = 12;

/// GCM authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

/// Errors from the cipher engine.
#[derive(Debug, thiserror::Error)]
pub enum CipherError {
    /// Wrong password or tampered ciphertext (tag check failed).
    #[error("authentication failed (wrong secret or corrupted ciphertext)")]
    Authentication,

    /// Input is shorter than salt, IV and tag combined.
    #[error("ciphertext truncated: {0} bytes")]
    Truncated(usize),

    /// Invalid base64 or non UTF-8 plaintext.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// The AEAD implementation refused to encrypt.
    #[error("encryption failed")]
    Encryption,
}

/// Authenticated symmetric cipher keyed by a password.
#[derive(Debug, Clone, Copy, Default)]
pub struct Cipher {
    derivation: KeyDerivation,
}

impl Cipher {
    /// Create a cipher using the given key derivation.
    pub fn new(derivation: KeyDerivation) -> Self {
        Self { derivation }
    }

    /// Key derivation in use.
    pub fn derivation(&self) -> KeyDerivation {
        self.derivation
    }

    /// Encrypt bytes, returning `salt || iv || ciphertext+tag`.
    pub fn encrypt(&self, plaintext: &[u8], password: &str) -> Result<Vec<u8>, CipherError> {
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        let mut iv = [0u8; IV_LEN];
        OsRng.fill_bytes(&mut iv);

        let key = self.derivation.derive(password, &salt);
        let cipher = Aes256Gcm::new_from_slice(&key).map_err(|_| CipherError::Encryption)?;
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&iv), plaintext)
            .map_err(|_| CipherError::Encryption)?;

        let mut out = Vec::with_capacity(SALT_LEN + IV_LEN + ciphertext.len());
        out.extend_from_slice(&salt);
        out.extend_from_slice(&iv);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Decrypt bytes produced by [`Cipher::encrypt`].
    pub fn decrypt(&self, data: &[u8], password: &str) -> Result<Vec<u8>, CipherError> {
        if data.len() < SALT_LEN + IV_LEN + TAG_LEN {
            return Err(CipherError::Truncated(data.len()));
        }
        let (salt, rest) = data.split_at(SALT_LEN);
        let (iv, ciphertext) = rest.split_at(IV_LEN);

        let key = self.derivation.derive(password, salt);
        let cipher =
            Aes256Gcm::new_from_slice(&key).map_err(|_| CipherError::Authentication)?;
        cipher
            .decrypt(Nonce::from_slice(iv), ciphertext)
            .map_err(|_| CipherError::Authentication)
    }

    /// Encrypt a string and return base64 text.
    pub fn encrypt_string(&self, plaintext: &str, password: &str) -> Result<String, CipherError> {
        let bytes = self.encrypt(plaintext.as_bytes(), password)?;
        Ok(Base64::encode_string(&bytes))
    }

    /// Decrypt base64 text produced by [`Cipher::encrypt_string`].
    pub fn decrypt_string(&self, encoded: &str, password: &str) -> Result<String, CipherError> {
        let bytes = Base64::decode_vec(encoded.trim())
            .map_err(|e| CipherError::Encoding(format!("invalid base64: {e}")))?;
        let plaintext = self.decrypt(&bytes, password)?;
        String::from_utf8(plaintext)
            .map_err(|e| CipherError::Encoding(format!("invalid UTF-8: {e}")))
    }
}

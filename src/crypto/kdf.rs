// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Password-based key derivation for the record cipher.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::config::KEY_DERIVATION_ENV;

/// PBKDF2 iteration count.
pub const PBKDF2_ITERATIONS: u32 = 65_536;

/// Derived key length in bytes (AES-256).
pub const KEY_LEN: usize = 32;

/// Configuration name of the SHA-256 derivation.
pub const SHA256_NAME: &str = "SHA256";

/// Configuration name of the PBKDF2 derivation.
pub const PBKDF2_NAME: &str = "PBKDF2WithHmacSHA256";

/// Strategy used to turn a password and a salt into an AES key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyDerivation {
    /// SHA-256 over `password || salt`. Fast.
    #[default]
    Sha256,
    /// PBKDF2-HMAC-SHA256 with [`PBKDF2_ITERATIONS`] rounds.
    Pbkdf2HmacSha256,
}

impl KeyDerivation {
    /// Parse a configuration value.
    ///
    /// Names are matched case-insensitively. Unknown names fall back to
    /// [`KeyDerivation::Pbkdf2HmacSha256`] with a warning.
    pub fn from_config_value(value: &str) -> Self {
        let value = value.trim();
        if value.eq_ignore_ascii_case(PBKDF2_NAME) {
            KeyDerivation::Pbkdf2HmacSha256
        } else if value.eq_ignore_ascii_case(SHA256_NAME) {
            KeyDerivation::Sha256
        } else {
            tracing::warn!(
                algorithm = %value,
                fallback = PBKDF2_NAME,
                "Unsupported key derivation algorithm, using fallback"
            );
            KeyDerivation::Pbkdf2HmacSha256
        }
    }

    /// Read the derivation from the environment, defaulting to SHA-256.
    pub fn from_env() -> Self {
        match std::env::var(KEY_DERIVATION_ENV) {
            Ok(value) => Self::from_config_value(&value),
            Err(_) => {
                tracing::debug!("No key derivation configured, defaulting to {SHA256_NAME}");
                KeyDerivation::Sha256
            }
        }
    }

    /// Configuration name of this derivation.
    pub fn name(&self) -> &'static str {
        match self {
            KeyDerivation::Sha256 => SHA256_NAME,
            KeyDerivation::Pbkdf2HmacSha256 => PBKDF2_NAME,
        }
    }

    /// Derive a 256-bit key.
    pub fn derive(&self, password: &str, salt: &[u8]) -> [u8; KEY_LEN] {
        let mut key = [0u8; KEY_LEN];
        match self {
            KeyDerivation::Sha256 => {
                let mut hasher = Sha256::new();
                hasher.update(password.as_bytes());
                hasher.update(salt);
                key.copy_from_slice(&hasher.finalize());
            }
            KeyDerivation::Pbkdf2HmacSha256 => {
                pbkdf2::pbkdf2_hmac::<Sha256>(
                    password.as_bytes(),
                    salt,
                    PBKDF2_ITERATIONS,
                    &mut key,
                );
            }
        }
        key
    }
}

impl fmt::Display for KeyDerivation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

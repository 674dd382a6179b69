// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Error types shared by the data manager and the cached repositories.

use std::io;
use std::path::PathBuf;

use crate::crypto::CipherError;

/// Error type for record storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No backing file exists for the requested record.
    #[error("record not found: {repository}/{id}")]
    NotFound { repository: String, id: String },

    /// A file's content could not be parsed into the expected shape.
    #[error("failed to deserialize {}: {source}", path.display())]
    Deserialization {
        path: PathBuf,
        #[source]
        source: serde_yml::Error,
    },

    /// Unresolved secret, authentication tag mismatch or malformed ciphertext.
    #[error("decryption failed for {context}: {reason}")]
    Decryption { context: String, reason: String },

    /// Unresolved secret or cipher failure while encrypting a field.
    #[error("encryption failed for {context}: {reason}")]
    Encryption { context: String, reason: String },

    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Filesystem error while creating directories, reading or writing files.
    #[error("I/O error on {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A record value could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    pub(crate) fn storage(path: impl Into<PathBuf>, source: io::Error) -> Self {
        StoreError::Storage {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn decryption(context: impl Into<String>, reason: impl ToString) -> Self {
        StoreError::Decryption {
            context: context.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn encryption(context: impl Into<String>, reason: impl ToString) -> Self {
        StoreError::Encryption {
            context: context.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error is a missing record.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    /// Whether this error is a decryption failure.
    pub fn is_decryption(&self) -> bool {
        matches!(self, StoreError::Decryption { .. })
    }
}

impl From<CipherError> for StoreError {
    fn from(e: CipherError) -> Self {
        StoreError::decryption("ciphertext", e)
    }
}

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

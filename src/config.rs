// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names, default values and the
//! [`StoreConfig`] used to open a [`crate::Store`].
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `GIT_DATA_STORE_DIR` | Root of the Git working tree holding the records | Required |
//! | `GIT_DATA_STORE_KEY_DERIVATION` | `SHA256` or `PBKDF2WithHmacSHA256` | `SHA256` |
//! | `GIT_DATA_STORE_PUSH_DELAY_MS` | Delay between pushes, `0` pushes after every commit | Push disabled |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info` |

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::crypto::{KeyDerivation, SecretStore};
use crate::error::{StoreError, StoreResult};

/// Environment variable name for the repository root directory.
pub const DATA_DIR_ENV: &str = "GIT_DATA_STORE_DIR";

/// Environment variable name for the key derivation algorithm.
pub const KEY_DERIVATION_ENV: &str = "GIT_DATA_STORE_KEY_DERIVATION";

/// Environment variable name for the push delay in milliseconds.
pub const PUSH_DELAY_ENV: &str = "GIT_DATA_STORE_PUSH_DELAY_MS";

/// Environment variable name for the log output format.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// When and how committed changes are propagated to the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PushPolicy {
    /// No remote configured.
    #[default]
    Disabled,
    /// Push right after every commit.
    Immediate,
    /// Push at most once per interval, only when something changed.
    Delayed(Duration),
}

impl PushPolicy {
    /// Build a policy from a delay in milliseconds (`0` means immediate).
    pub fn from_delay_millis(millis: u64) -> Self {
        if millis == 0 {
            PushPolicy::Immediate
        } else {
            PushPolicy::Delayed(Duration::from_millis(millis))
        }
    }
}

/// Configuration for a record store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    root: PathBuf,
    secrets: SecretStore,
    key_derivation: KeyDerivation,
    push_policy: PushPolicy,
}

impl StoreConfig {
    /// Create a configuration rooted at the given working tree.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            secrets: SecretStore::default(),
            key_derivation: KeyDerivation::default(),
            push_policy: PushPolicy::default(),
        }
    }

    /// Load the root, key derivation and push policy from the environment.
    pub fn from_env(secrets: SecretStore) -> StoreResult<Self> {
        let root = env::var(DATA_DIR_ENV).map_err(|_| {
            StoreError::Configuration(format!("{DATA_DIR_ENV} is not set"))
        })?;

        let push_policy = match env::var(PUSH_DELAY_ENV) {
            Ok(raw) => {
                let millis: u64 = raw.trim().parse().map_err(|_| {
                    StoreError::Configuration(format!("{PUSH_DELAY_ENV} is not a number: {raw}"))
                })?;
                PushPolicy::from_delay_millis(millis)
            }
            Err(_) => PushPolicy::Disabled,
        };

        Ok(Self::new(root)
            .with_secrets(secrets)
            .with_key_derivation(KeyDerivation::from_env())
            .with_push_policy(push_policy))
    }

    /// Set the secrets used for field and object encryption.
    pub fn with_secrets(mut self, secrets: SecretStore) -> Self {
        self.secrets = secrets;
        self
    }

    /// Set the key derivation algorithm.
    pub fn with_key_derivation(mut self, key_derivation: KeyDerivation) -> Self {
        self.key_derivation = key_derivation;
        self
    }

    /// Set the push policy.
    pub fn with_push_policy(mut self, push_policy: PushPolicy) -> Self {
        self.push_policy = push_policy;
        self
    }

    /// Repository root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Configured secrets.
    pub fn secrets(&self) -> &SecretStore {
        &self.secrets
    }

    /// Configured key derivation.
    pub fn key_derivation(&self) -> KeyDerivation {
        self.key_derivation
    }

    /// Configured push policy.
    pub fn push_policy(&self) -> PushPolicy {
        self.push_policy
    }
}

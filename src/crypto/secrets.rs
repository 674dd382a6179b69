// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Named secrets supplied by the embedding application.

use std::collections::HashMap;
use std::fmt;

/// Name → secret value lookup.
///
/// Values are never persisted and never printed; `Debug` lists names only.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SecretStore {
    secrets: HashMap<String, String>,
}

impl SecretStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a secret.
    pub fn with_secret(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets.insert(name.into(), value.into());
        self
    }

    /// Resolve a secret by name.
    pub fn resolve(&self, name: &str) -> Option<&str> {
        self.secrets.get(name).map(String::as_str)
    }

    /// Number of configured secrets.
    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    /// Whether no secrets are configured.
    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }
}

impl From<HashMap<String, String>> for SecretStore {
    fn from(secrets: HashMap<String, String>) -> Self {
        Self { secrets }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SecretStore {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            secrets: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl fmt::Debug for SecretStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.secrets.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_map()
            .entries(names.into_iter().map(|name| (name, "...")))
            .finish()
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Path constants and utilities for the record storage layout.

use std::path::{Path, PathBuf};

/// Directory under the repository root holding all record directories.
pub const DATA_DIRECTORY: &str = "serialized-data";

/// File extension of serialized envelopes.
pub const RECORD_EXTENSION: &str = "yaml";

/// Storage path utilities for a repository working tree.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl StoragePaths {
    /// Create a new StoragePaths for the given repository root.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Repository root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory containing all record directories.
    pub fn data_dir(&self) -> PathBuf {
        self.root.join(DATA_DIRECTORY)
    }

    /// Directory for one record type.
    pub fn repository_dir(&self, repository: &str) -> PathBuf {
        self.data_dir().join(repository)
    }

    /// Path to a specific record file.
    pub fn record(&self, repository: &str, id: &str) -> PathBuf {
        self.repository_dir(repository)
            .join(format!("{id}.{RECORD_EXTENSION}"))
    }

    /// Path relative to the root using `/` separators, as version control
    /// expects it.
    pub fn relative(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(parts.join("/"))
    }
}

/// Record id encoded in a record file name.
pub fn record_id(path: &Path) -> Option<&str> {
    path.file_stem().and_then(|stem| stem.to_str())
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Change notifications emitted after a record file is written or removed.

use std::path::Path;

use super::envelope::Envelope;

/// Type-erased view of a changed envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedEnvelope {
    pub id: String,
    pub repository: String,
    pub create_timestamp: i64,
    pub update_timestamp: i64,
}

impl ChangedEnvelope {
    /// Describe an envelope stored under the given repository directory.
    pub fn of<T>(repository: impl Into<String>, envelope: &Envelope<T>) -> Self {
        Self {
            id: envelope.id().to_string(),
            repository: repository.into(),
            create_timestamp: envelope.create_timestamp(),
            update_timestamp: envelope.update_timestamp(),
        }
    }
}

/// Receiver of add/update/delete events.
///
/// Called synchronously after the filesystem operation succeeded. Sinks
/// handle and log their own failures.
pub trait ChangeSink: Send + Sync {
    fn on_added(&self, file: &Path, envelope: &ChangedEnvelope);
    fn on_updated(&self, file: &Path, envelope: &ChangedEnvelope);
    fn on_deleted(&self, file: &Path, envelope: &ChangedEnvelope);
}

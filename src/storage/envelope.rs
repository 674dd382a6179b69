// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Persisted wrapper around a record: id, timestamps and payload.
//!
//! ## File Format
//!
//! ```yaml
//! id: 0b6f3c1e-...
//! createTimestamp: 1760000000000
//! updateTimestamp: 1760000000000
//! data:
//!   name: example
//! ```
//!
//! With whole-object encryption `data` is a single string starting with
//! [`OBJECT_MARKER`](super::codec::OBJECT_MARKER).

use serde::{Deserialize, Serialize};
use serde_yml::Value;

use super::codec::OBJECT_MARKER;

/// Record envelope as seen by callers and as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    id: String,
    create_timestamp: i64,
    update_timestamp: i64,
    data: T,
}

impl<T> Envelope<T> {
    /// Build an envelope from its parts.
    ///
    /// Normal callers obtain envelopes from the data manager; this exists for
    /// edge paths such as deleting a record by a known id.
    pub fn new(id: impl Into<String>, create_timestamp: i64, update_timestamp: i64, data: T) -> Self {
        Self {
            id: id.into(),
            create_timestamp,
            update_timestamp,
            data,
        }
    }

    /// Unique record identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Creation time in epoch milliseconds.
    pub fn create_timestamp(&self) -> i64 {
        self.create_timestamp
    }

    /// Last update time in epoch milliseconds.
    pub fn update_timestamp(&self) -> i64 {
        self.update_timestamp
    }

    /// The record.
    pub fn data(&self) -> &T {
        &self.data
    }

    /// Mutable access to the record, persisted by the next update.
    pub fn data_mut(&mut self) -> &mut T {
        &mut self.data
    }

    /// Consume the envelope and return the record.
    pub fn into_data(self) -> T {
        self.data
    }

    /// Replace the payload, keeping id and timestamps.
    pub fn map_data<U>(self, f: impl FnOnce(T) -> U) -> Envelope<U> {
        Envelope {
            id: self.id,
            create_timestamp: self.create_timestamp,
            update_timestamp: self.update_timestamp,
            data: f(self.data),
        }
    }

    /// Same id and timestamps with a different payload.
    pub fn with_data<U>(&self, data: U) -> Envelope<U> {
        Envelope {
            id: self.id.clone(),
            create_timestamp: self.create_timestamp,
            update_timestamp: self.update_timestamp,
            data,
        }
    }

    /// Bump the update timestamp, never moving it backwards or standing still.
    pub(crate) fn touch(&mut self, now: i64) {
        self.update_timestamp = now.max(self.update_timestamp + 1);
    }

    pub(crate) fn set_timestamps(&mut self, create_timestamp: i64, update_timestamp: i64) {
        self.create_timestamp = create_timestamp;
        self.update_timestamp = update_timestamp;
    }
}

/// Stored payload shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    /// Whole-object ciphertext including the object marker.
    Encrypted(String),
    /// Structured record, possibly with field-level ciphertext inside.
    Typed(Value),
}

/// Parse a stored envelope.
///
/// When the record type uses whole-object encryption the string shape is
/// tried first; if that fails or the marker is missing, the file is parsed
/// again as a structured record. This covers files written before object
/// encryption was turned on.
pub fn decode_stored(text: &str, object_encrypted: bool) -> Result<Envelope<Payload>, serde_yml::Error> {
    if object_encrypted {
        match serde_yml::from_str::<Envelope<String>>(text) {
            Ok(envelope) if envelope.data.starts_with(OBJECT_MARKER) => {
                return Ok(envelope.map_data(Payload::Encrypted));
            }
            Ok(envelope) => {
                tracing::debug!(
                    id = %envelope.id,
                    "String payload without object marker, parsing as plain record"
                );
            }
            Err(e) => {
                tracing::debug!(
                    error = %e,
                    "Failed to parse encrypted payload, attempting plain record"
                );
            }
        }
    }

    serde_yml::from_str::<Envelope<Value>>(text).map(|envelope| envelope.map_data(Payload::Typed))
}

/// Serialize a stored envelope.
pub fn encode_stored(envelope: &Envelope<Payload>) -> Result<String, serde_yml::Error> {
    serde_yml::to_string(envelope)
}

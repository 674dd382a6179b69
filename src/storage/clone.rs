// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Structural copies of records.
//!
//! Copies go through the serialized value tree, so the result never shares
//! state with the original, whatever the record's `Clone` impl does.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_yml::Value;

use crate::error::{StoreError, StoreResult};

/// Detach a record into an independent value tree.
pub fn detach<T: Serialize>(record: &T) -> StoreResult<Value> {
    serde_yml::to_value(record).map_err(|e| StoreError::Serialization(e.to_string()))
}

/// Deep-clone a record through its serialized form.
pub fn deep_clone<T: Serialize + DeserializeOwned>(record: &T) -> StoreResult<T> {
    let value = detach(record)?;
    serde_yml::from_value(value).map_err(|e| StoreError::Serialization(e.to_string()))
}

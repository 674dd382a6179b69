// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Repository layer providing typed, cached access to the data manager.
//!
//! Each repository serves one record type and keeps a partial in-memory
//! mirror of it (see [`redaction`] for which fields survive).

pub mod cached;
pub mod query;
pub mod redaction;

pub use cached::CachedRepository;
pub use query::CachedQuery;
pub use redaction::{merge_cached, redact};

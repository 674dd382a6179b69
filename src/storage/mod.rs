// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Record Storage Module
//!
//! This module persists records as YAML files inside a version-controlled
//! working tree. Every record type gets its own directory and every record
//! its own file, so changes stay diffable and reviewable.
//!
//! ## Storage Layout
//!
//! ```text
//! <root>/
//!   serialized-data/
//!     <repository-name>/
//!       <id>.yaml        # Envelope: id, timestamps, data
//! ```
//!
//! ## Security Model
//!
//! - Secret text fields are encrypted in place with AES-256-GCM
//! - Whole records can be encrypted into a single string
//! - Envelope ids and timestamps are never encrypted
//! - Secrets are supplied by name at construction and never written out
//!
//! ## Important Notes
//!
//! - Files are read and written in full; no handles are kept open
//! - A file that fails to load never aborts a bulk query
//! - The cached mirror is advisory; disk is the source of truth

pub mod change;
pub mod clone;
pub mod codec;
pub mod data_manager;
pub mod envelope;
pub mod file_store;
pub mod paths;
pub mod repository;

pub use change::{ChangeSink, ChangedEnvelope};
pub use codec::{RecordCodec, FIELD_MARKER, OBJECT_MARKER};
pub use data_manager::{DataManager, ErrorCallback, SkipPredicate};
pub use envelope::{Envelope, Payload};
pub use file_store::FileStorage;
pub use paths::StoragePaths;
pub use repository::{CachedQuery, CachedRepository};

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Git Data Store - File-per-record persistence for Git working trees
//!
//! This crate stores structured records as YAML files inside a Git working
//! tree, with optional AES-256-GCM encryption of single fields or whole
//! records and an in-memory mirror that keeps only selected fields.
//!
//! ## Modules
//!
//! - `config` - Environment variables and store configuration
//! - `crypto` - Cipher, key derivation and named secrets
//! - `models` - `Record` trait and static field schema
//! - `storage` - Data manager, envelopes, codec and cached repositories
//! - `vcs` - Commit-per-change propagation to a version-control backend
//! - `push_poller` - Delayed background push
//! - `state` - `Store` facade
//! - `telemetry` - Tracing subscriber setup

pub mod config;
pub mod crypto;
pub mod error;
pub mod models;
pub mod push_poller;
pub mod state;
pub mod storage;
pub mod telemetry;
pub mod vcs;

pub use config::{PushPolicy, StoreConfig};
pub use crypto::{Cipher, CipherError, KeyDerivation, SecretStore};
pub use error::{StoreError, StoreResult};
pub use models::{FieldKind, FieldSpec, Record, Schema, DEFAULT_SECRET_NAME};
pub use push_poller::PushPoller;
pub use state::Store;
pub use storage::{
    CachedQuery, CachedRepository, ChangeSink, ChangedEnvelope, DataManager, Envelope,
};
pub use telemetry::{init_tracing, LogFormat};
pub use vcs::{CommitSink, PushSignal, VcsError, VersionControl};

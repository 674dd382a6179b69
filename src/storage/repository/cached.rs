// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Write-through repository with an in-memory mirror of cached fields.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::query::CachedQuery;
use super::redaction;
use crate::error::{StoreError, StoreResult};
use crate::models::Record;
use crate::storage::clone;
use crate::storage::data_manager::{DataManager, ErrorCallback};
use crate::storage::envelope::Envelope;
use crate::storage::paths::record_id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum FillState {
    #[default]
    Empty,
    Filled,
}

/// Repository for one record type.
///
/// Mutations go to disk first, then to the mirror. The mirror is filled from
/// disk on the first cached query and holds each record with only its
/// primitive and cached fields.
pub struct CachedRepository<T: Record> {
    manager: Arc<DataManager>,
    state: Mutex<FillState>,
    mirror: RwLock<HashMap<String, Envelope<T>>>,
}

impl<T: Record> CachedRepository<T> {
    /// Create a repository backed by the given data manager.
    pub fn new(manager: Arc<DataManager>) -> Self {
        Self {
            manager,
            state: Mutex::new(FillState::Empty),
            mirror: RwLock::new(HashMap::new()),
        }
    }

    /// The backing data manager.
    pub fn manager(&self) -> &Arc<DataManager> {
        &self.manager
    }

    /// Start a query over the cached mirror.
    pub fn query_cached(&self) -> CachedQuery<'_, T> {
        CachedQuery::new(self)
    }

    /// Load every record from disk, bypassing the mirror.
    pub fn query(&self) -> StoreResult<Vec<Envelope<T>>> {
        self.query_with(None)
    }

    /// Load every record from disk, reporting files that failed to load.
    pub fn query_with(&self, on_error: Option<ErrorCallback<'_>>) -> StoreResult<Vec<Envelope<T>>> {
        let _state = self.lock_state();
        self.manager.query_with(on_error, None)
    }

    /// Load one full record from disk.
    pub fn load(&self, id: &str) -> StoreResult<Envelope<T>> {
        self.manager.load_one(id)
    }

    /// Persist a new record.
    pub fn add(&self, record: T) -> StoreResult<Envelope<T>> {
        let state = self.lock_state();

        let envelope = self.manager.add(record)?;

        if T::SCHEMA.has_cached_fields() || *state == FillState::Filled {
            tracing::debug!(id = %envelope.id(), "Adding record to cache");
            if let Err(e) = self.insert_redacted(&envelope) {
                tracing::warn!(
                    id = %envelope.id(),
                    error = %e,
                    "Failed to build cached record, not caching it"
                );
            }
        }

        Ok(envelope)
    }

    /// Persist changes to a record and refresh its cached fields.
    pub fn update(&self, envelope: &mut Envelope<T>) -> StoreResult<()> {
        let _state = self.lock_state();

        self.manager.update(envelope)?;

        let mut mirror = self.write_mirror();
        let Some(entry) = mirror.get_mut(envelope.id()) else {
            return Ok(());
        };

        match merged(entry.data(), envelope.data()).or_else(|_| redacted(envelope.data())) {
            Ok(record) => *entry = envelope.with_data(record),
            Err(e) => {
                tracing::warn!(
                    id = %envelope.id(),
                    error = %e,
                    "Failed to refresh cached record, dropping it from cache"
                );
                mirror.remove(envelope.id());
            }
        }

        Ok(())
    }

    /// Remove a record. Returns `false` if no file existed.
    pub fn delete(&self, envelope: &Envelope<T>) -> StoreResult<bool> {
        let _state = self.lock_state();

        self.write_mirror().remove(envelope.id());
        self.manager.delete(envelope)
    }

    /// Clear the mirror; the next cached query reads everything again.
    pub fn reset_data_cache(&self) {
        let mut state = self.lock_state();
        self.write_mirror().clear();
        *state = FillState::Empty;
    }

    /// Number of records held in the mirror.
    pub fn cached_len(&self) -> usize {
        self.read_mirror().len()
    }

    /// Whether the mirror holds the given record.
    pub fn is_cached(&self, id: &str) -> bool {
        self.read_mirror().contains_key(id)
    }

    /// Whether the mirror has been filled from disk.
    pub fn is_filled(&self) -> bool {
        *self.lock_state() == FillState::Filled
    }

    /// Fill the mirror if needed and return a snapshot of it, oldest first.
    pub(super) fn cached_entries(
        &self,
        on_error: Option<ErrorCallback<'_>>,
    ) -> StoreResult<Vec<Envelope<T>>> {
        let mut state = self.lock_state();

        if *state == FillState::Empty {
            self.fill(on_error)?;
            *state = FillState::Filled;
        }

        let mut entries: Vec<Envelope<T>> = self.read_mirror().values().cloned().collect();
        entries.sort_by(|a, b| {
            a.create_timestamp()
                .cmp(&b.create_timestamp())
                .then_with(|| a.id().cmp(b.id()))
        });
        Ok(entries)
    }

    fn fill(&self, mut on_error: Option<ErrorCallback<'_>>) -> StoreResult<()> {
        let known: HashSet<String> = self.read_mirror().keys().cloned().collect();
        tracing::debug!(
            already_cached = known.len(),
            "Filling cache from disk"
        );

        let skip = |path: &Path| record_id(path).is_some_and(|id| known.contains(id));
        let records = self.manager.query_with::<T>(
            on_error.as_mut().map(|cb| -> ErrorCallback<'_> { &mut **cb }),
            Some(&skip),
        )?;

        for envelope in &records {
            if let Err(e) = self.insert_redacted(envelope) {
                tracing::warn!(
                    id = %envelope.id(),
                    error = %e,
                    "Failed to build cached record, not caching it"
                );
                if let Some(callback) = on_error.as_mut() {
                    callback(&self.manager.record_path::<T>(envelope.id()), &e);
                }
            }
        }

        Ok(())
    }

    fn insert_redacted(&self, envelope: &Envelope<T>) -> StoreResult<()> {
        let record = redacted(envelope.data())?;
        self.write_mirror()
            .insert(envelope.id().to_string(), envelope.with_data(record));
        Ok(())
    }

    fn lock_state(&self) -> MutexGuard<'_, FillState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_mirror(&self) -> RwLockReadGuard<'_, HashMap<String, Envelope<T>>> {
        self.mirror.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_mirror(&self) -> RwLockWriteGuard<'_, HashMap<String, Envelope<T>>> {
        self.mirror.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn rebuild<T: Record>(value: serde_yml::Value) -> StoreResult<T> {
    serde_yml::from_value(value).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn redacted<T: Record>(record: &T) -> StoreResult<T> {
    let value = clone::detach(record)?;
    redaction::redact_record(&value, &T::SCHEMA)
        .map_err(|e| StoreError::Serialization(e.to_string()))
}

fn merged<T: Record>(cached: &T, updated: &T) -> StoreResult<T> {
    let mut target = clone::detach(cached)?;
    let source = clone::detach(updated)?;
    redaction::merge_cached(&mut target, &source, &T::SCHEMA);
    rebuild(target)
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Filtered queries over the cached mirror.

use std::path::Path;

use super::CachedRepository;
use crate::error::{StoreError, StoreResult};
use crate::models::Record;
use crate::storage::data_manager::ErrorCallback;
use crate::storage::envelope::Envelope;

type Filter<'r, T> = Box<dyn Fn(&Envelope<T>) -> bool + 'r>;

/// Query builder returned by [`CachedRepository::query_cached`].
///
/// ```rust,ignore
/// let open = repository
///     .query_cached()
///     .filter(|entry| entry.data().status == Status::Open)
///     .load_from_disk(true)
///     .run()?;
/// ```
pub struct CachedQuery<'r, T: Record> {
    repository: &'r CachedRepository<T>,
    filter: Option<Filter<'r, T>>,
    load_from_disk: bool,
}

impl<'r, T: Record> CachedQuery<'r, T> {
    pub(super) fn new(repository: &'r CachedRepository<T>) -> Self {
        Self {
            repository,
            filter: None,
            load_from_disk: false,
        }
    }

    /// Keep only entries accepted by the predicate.
    ///
    /// The predicate sees the cached (redacted) form of each record.
    pub fn filter(mut self, predicate: impl Fn(&Envelope<T>) -> bool + 'r) -> Self {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Replace every matching entry with the full record read from disk.
    pub fn load_from_disk(mut self, load: bool) -> Self {
        self.load_from_disk = load;
        self
    }

    /// Run the query. Failures are logged and the entry is left out.
    pub fn run(self) -> StoreResult<Vec<Envelope<T>>> {
        self.execute(None)
    }

    /// Run the query, reporting every file that failed to load.
    pub fn run_with_errors(
        self,
        on_error: &mut dyn FnMut(&Path, &StoreError),
    ) -> StoreResult<Vec<Envelope<T>>> {
        self.execute(Some(on_error))
    }

    fn execute(self, mut on_error: Option<ErrorCallback<'_>>) -> StoreResult<Vec<Envelope<T>>> {
        let mut entries = self
            .repository
            .cached_entries(on_error.as_mut().map(|cb| -> ErrorCallback<'_> { &mut **cb }))?;

        if let Some(filter) = &self.filter {
            tracing::debug!("Applying filter to cached entries");
            entries.retain(|entry| filter(entry));
        }

        if !self.load_from_disk {
            return Ok(entries);
        }

        tracing::debug!(count = entries.len(), "Loading full records for cached entries");

        let manager = self.repository.manager();
        let mut loaded = Vec::with_capacity(entries.len());
        for entry in entries {
            match manager.load_one::<T>(entry.id()) {
                Ok(full) => loaded.push(full),
                Err(e) => {
                    tracing::warn!(
                        id = %entry.id(),
                        error = %e,
                        "Failed to load record from disk for cached entry"
                    );
                    if let Some(callback) = on_error.as_mut() {
                        callback(&manager.record_path::<T>(entry.id()), &e);
                    }
                }
            }
        }

        Ok(loaded)
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! File-based CRUD for records with field- and object-level encryption.
//!
//! ## Storage Layout
//!
//! ```text
//! <root>/
//!   serialized-data/
//!     <repository-name>/
//!       <id>.yaml      # One envelope per record
//! ```
//!
//! All operations of one manager run behind a single lock, so a bulk query
//! never observes a half-written file from the same process.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::change::{ChangeSink, ChangedEnvelope};
use super::codec::RecordCodec;
use super::envelope::{self, Envelope, Payload};
use super::file_store::FileStorage;
use super::paths::{StoragePaths, RECORD_EXTENSION};
use crate::config::StoreConfig;
use crate::crypto::{Cipher, SecretStore};
use crate::error::{StoreError, StoreResult};
use crate::models::Record;

/// Callback receiving each file that failed to load during a bulk query.
pub type ErrorCallback<'a> = &'a mut dyn FnMut(&Path, &StoreError);

/// Predicate selecting files a bulk query should not read.
pub type SkipPredicate<'a> = &'a dyn Fn(&Path) -> bool;

/// Persists records as YAML envelopes under a repository working tree.
pub struct DataManager {
    lock: Mutex<()>,
    storage: FileStorage,
    secrets: SecretStore,
    cipher: Cipher,
    sink: Option<Arc<dyn ChangeSink>>,
}

impl DataManager {
    /// Create a manager rooted at the given paths.
    pub fn new(paths: StoragePaths, secrets: SecretStore, cipher: Cipher) -> Self {
        Self {
            lock: Mutex::new(()),
            storage: FileStorage::new(paths),
            secrets,
            cipher,
            sink: None,
        }
    }

    /// Create a manager from a store configuration.
    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(
            StoragePaths::new(config.root()),
            config.secrets().clone(),
            Cipher::new(config.key_derivation()),
        )
    }

    /// Notify the given sink after every successful add, update and delete.
    pub fn with_sink(mut self, sink: Arc<dyn ChangeSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Get the storage paths.
    pub fn paths(&self) -> &StoragePaths {
        self.storage.paths()
    }

    /// Directory holding records of type `T`.
    pub fn repository_dir<T: Record>(&self) -> PathBuf {
        self.paths().repository_dir(&T::repository_name())
    }

    /// File backing the record of type `T` with the given id.
    pub fn record_path<T: Record>(&self, id: &str) -> PathBuf {
        self.paths().record(&T::repository_name(), id)
    }

    /// Check if a record exists.
    pub fn exists<T: Record>(&self, id: &str) -> bool {
        let _guard = self.lock();
        self.storage.exists(self.record_path::<T>(id))
    }

    /// Load every record of type `T`.
    ///
    /// Files that fail to load are logged and left out.
    pub fn query<T: Record>(&self) -> StoreResult<Vec<Envelope<T>>> {
        self.query_with(None, None)
    }

    /// Load every record of type `T`, reporting failures to `on_error` and
    /// not reading files matched by `skip`.
    pub fn query_with<T: Record>(
        &self,
        mut on_error: Option<ErrorCallback<'_>>,
        skip: Option<SkipPredicate<'_>>,
    ) -> StoreResult<Vec<Envelope<T>>> {
        let _guard = self.lock();

        let dir = self.repository_dir::<T>();
        let files = self.storage.list_files(&dir, RECORD_EXTENSION)?;

        let mut records = Vec::with_capacity(files.len());
        for file in files {
            if skip.is_some_and(|skip| skip(&file)) {
                continue;
            }

            match self.read_file::<T>(&file) {
                Ok(envelope) => records.push(envelope),
                Err(e) => {
                    tracing::warn!(
                        path = %file.display(),
                        error = %e,
                        "Failed to load record, skipping"
                    );
                    if let Some(callback) = on_error.as_mut() {
                        callback(&file, &e);
                    }
                }
            }
        }

        Ok(records)
    }

    /// Load a single record by id.
    pub fn load_one<T: Record>(&self, id: &str) -> StoreResult<Envelope<T>> {
        let _guard = self.lock();

        let path = self.record_path::<T>(id);
        if !self.storage.exists(&path) {
            return Err(StoreError::NotFound {
                repository: T::repository_name().into_owned(),
                id: id.to_string(),
            });
        }

        self.read_file(&path)
    }

    /// Persist a new record under a fresh id.
    ///
    /// The returned envelope holds the record as given, never its encrypted
    /// form.
    pub fn add<T: Record>(&self, record: T) -> StoreResult<Envelope<T>> {
        let _guard = self.lock();

        let now = now_millis();
        let envelope = Envelope::new(uuid::Uuid::new_v4().to_string(), now, now, record);
        let path = self.write_envelope(&envelope)?;

        tracing::debug!(
            repository = %T::repository_name(),
            id = %envelope.id(),
            "Record added"
        );

        if let Some(sink) = &self.sink {
            sink.on_added(&path, &ChangedEnvelope::of(T::repository_name(), &envelope));
        }

        Ok(envelope)
    }

    /// Overwrite a record with the envelope's current data.
    ///
    /// The update timestamp always moves forward, even within the same
    /// millisecond.
    pub fn update<T: Record>(&self, envelope: &mut Envelope<T>) -> StoreResult<()> {
        let _guard = self.lock();

        let mut header = envelope.with_data(());
        header.touch(now_millis());

        let payload = self.codec().encode(envelope.data())?;
        let path = self.write_payload::<T>(&header.with_data(payload))?;
        envelope.set_timestamps(header.create_timestamp(), header.update_timestamp());

        tracing::debug!(
            repository = %T::repository_name(),
            id = %envelope.id(),
            "Record updated"
        );

        if let Some(sink) = &self.sink {
            sink.on_updated(&path, &ChangedEnvelope::of(T::repository_name(), envelope));
        }

        Ok(())
    }

    /// Remove a record. Returns `false` if no file existed.
    pub fn delete<T: Record>(&self, envelope: &Envelope<T>) -> StoreResult<bool> {
        let _guard = self.lock();

        let path = self.record_path::<T>(envelope.id());
        if !self.storage.delete(&path)? {
            tracing::debug!(
                path = %path.display(),
                "Record to delete does not exist"
            );
            return Ok(false);
        }

        if let Some(sink) = &self.sink {
            sink.on_deleted(&path, &ChangedEnvelope::of(T::repository_name(), envelope));
        }

        Ok(true)
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn codec(&self) -> RecordCodec<'_> {
        RecordCodec::new(&self.cipher, &self.secrets)
    }

    fn read_file<T: Record>(&self, path: &Path) -> StoreResult<Envelope<T>> {
        let text = self.storage.read_text(path)?;
        let stored = envelope::decode_stored(&text, T::SCHEMA.object_secret().is_some())
            .map_err(|source| StoreError::Deserialization {
                path: path.to_path_buf(),
                source,
            })?;

        let header = stored.with_data(());
        let record = self.codec().decode::<T>(stored.into_data(), path)?;
        Ok(header.with_data(record))
    }

    fn write_envelope<T: Record>(&self, envelope: &Envelope<T>) -> StoreResult<PathBuf> {
        let payload = self.codec().encode(envelope.data())?;
        self.write_payload::<T>(&envelope.with_data(payload))
    }

    fn write_payload<T: Record>(&self, stored: &Envelope<Payload>) -> StoreResult<PathBuf> {
        let text = envelope::encode_stored(stored)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let path = self.record_path::<T>(stored.id());
        self.storage.write_text(&path, &text)?;
        Ok(path)
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FieldSpec, Schema};
    use crate::storage::change::testing::{ChangeKind, RecordingSink};
    use crate::storage::codec::{FIELD_MARKER, OBJECT_MARKER};
    use serde::{Deserialize, Serialize};
    use std::{env, fs};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        title: String,
        body: Option<String>,
        views: u32,
    }

    impl Record for Note {
        const SCHEMA: Schema = Schema::new(&[
            FieldSpec::text("title"),
            FieldSpec::text("body"),
            FieldSpec::primitive("views"),
        ]);
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Login {
        user: String,
        password: String,
    }

    impl Record for Login {
        const SCHEMA: Schema = Schema::new(&[
            FieldSpec::text("user"),
            FieldSpec::text("password").secret("field"),
        ])
        .repository_name("logins");
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Diary {
        entry: String,
    }

    impl Record for Diary {
        const SCHEMA: Schema = Schema::new(&[FieldSpec::text("entry")]).encrypted_with("object");
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Vault {
        label: String,
        pin: String,
    }

    impl Record for Vault {
        const SCHEMA: Schema = Schema::new(&[
            FieldSpec::text("label"),
            FieldSpec::text("pin").secret("field"),
        ])
        .encrypted_with("object");
    }

    fn test_root() -> PathBuf {
        env::temp_dir().join(format!("test-data-manager-{}", uuid::Uuid::new_v4()))
    }

    fn secrets() -> SecretStore {
        SecretStore::new()
            .with_secret("field", "field-secret")
            .with_secret("object", "object-secret")
    }

    fn test_manager(root: &Path) -> DataManager {
        DataManager::new(StoragePaths::new(root), secrets(), Cipher::default())
    }

    fn cleanup(root: &Path) {
        let _ = fs::remove_dir_all(root);
    }

    fn note(title: &str) -> Note {
        Note {
            title: title.to_string(),
            body: Some("body".to_string()),
            views: 1,
        }
    }

    #[test]
    fn roundtrip_without_encryption() {
        let root = test_root();
        let manager = test_manager(&root);

        let added = manager.add(note("first")).unwrap();
        assert_eq!(added.create_timestamp(), added.update_timestamp());

        let path = manager.record_path::<Note>(added.id());
        assert!(path.starts_with(root.join("serialized-data").join("Note")));
        assert!(manager.exists::<Note>(added.id()));

        let loaded = manager.load_one::<Note>(added.id()).unwrap();
        assert_eq!(loaded, added);

        cleanup(&root);
    }

    #[test]
    fn field_encryption_hides_secret_on_disk() {
        let root = test_root();
        let manager = test_manager(&root);

        let added = manager
            .add(Login {
                user: "alice".to_string(),
                password: "hunter2".to_string(),
            })
            .unwrap();
        assert_eq!(added.data().password, "hunter2");

        let text = fs::read_to_string(manager.record_path::<Login>(added.id())).unwrap();
        assert!(text.contains(FIELD_MARKER));
        assert!(text.contains("alice"));
        assert!(!text.contains("hunter2"));

        let loaded = manager.load_one::<Login>(added.id()).unwrap();
        assert_eq!(loaded.data(), added.data());

        cleanup(&root);
    }

    #[test]
    fn object_encryption_hides_record_on_disk() {
        let root = test_root();
        let manager = test_manager(&root);

        let added = manager
            .add(Diary {
                entry: "dear diary".to_string(),
            })
            .unwrap();

        let text = fs::read_to_string(manager.record_path::<Diary>(added.id())).unwrap();
        assert!(text.contains(OBJECT_MARKER));
        assert!(text.contains(added.id()));
        assert!(!text.contains("dear diary"));

        let loaded = manager.load_one::<Diary>(added.id()).unwrap();
        assert_eq!(loaded, added);

        cleanup(&root);
    }

    #[test]
    fn combined_encryption_needs_both_secrets() {
        let root = test_root();
        let manager = test_manager(&root);

        let added = manager
            .add(Vault {
                label: "bank".to_string(),
                pin: "0000".to_string(),
            })
            .unwrap();
        let loaded = manager.load_one::<Vault>(added.id()).unwrap();
        assert_eq!(loaded.data(), added.data());

        let object_only = DataManager::new(
            StoragePaths::new(&root),
            SecretStore::new().with_secret("object", "object-secret"),
            Cipher::default(),
        );
        let err = object_only.load_one::<Vault>(added.id()).unwrap_err();
        assert!(err.is_decryption());

        cleanup(&root);
    }

    #[test]
    fn missing_field_secret_writes_nothing() {
        let root = test_root();
        let manager = DataManager::new(StoragePaths::new(&root), SecretStore::new(), Cipher::default());

        let result = manager.add(Login {
            user: "bob".to_string(),
            password: "pw".to_string(),
        });
        assert!(matches!(result, Err(StoreError::Encryption { .. })));
        assert!(manager.query::<Login>().unwrap().is_empty());

        cleanup(&root);
    }

    #[test]
    fn cleartext_file_is_readable_once_object_secret_exists() {
        let root = test_root();
        let without_secret =
            DataManager::new(StoragePaths::new(&root), SecretStore::new(), Cipher::default());

        let added = without_secret
            .add(Diary {
                entry: "plain".to_string(),
            })
            .unwrap();
        let text = fs::read_to_string(without_secret.record_path::<Diary>(added.id())).unwrap();
        assert!(text.contains("plain"));

        let loaded = test_manager(&root).load_one::<Diary>(added.id()).unwrap();
        assert_eq!(loaded.data().entry, "plain");

        cleanup(&root);
    }

    #[test]
    fn update_persists_and_advances_timestamp() {
        let root = test_root();
        let manager = test_manager(&root);

        let mut envelope = manager.add(note("draft")).unwrap();
        let created = envelope.create_timestamp();
        let previous = envelope.update_timestamp();

        envelope.data_mut().title = "final".to_string();
        envelope.data_mut().views = 7;
        manager.update(&mut envelope).unwrap();

        assert!(envelope.update_timestamp() > previous);
        assert_eq!(envelope.create_timestamp(), created);

        let loaded = manager.load_one::<Note>(envelope.id()).unwrap();
        assert_eq!(loaded.data().title, "final");
        assert_eq!(loaded.data().views, 7);
        assert_eq!(loaded.update_timestamp(), envelope.update_timestamp());
        assert_eq!(loaded.create_timestamp(), created);

        cleanup(&root);
    }

    #[test]
    fn delete_reports_existence() {
        let root = test_root();
        let manager = test_manager(&root);

        let envelope = manager.add(note("doomed")).unwrap();
        assert!(manager.delete(&envelope).unwrap());
        assert!(!manager.exists::<Note>(envelope.id()));
        assert!(!manager.delete(&envelope).unwrap());

        let fabricated = Envelope::new("does-not-exist", 0, 0, note("ghost"));
        assert!(!manager.delete(&fabricated).unwrap());

        let err = manager.load_one::<Note>(envelope.id()).unwrap_err();
        assert!(err.is_not_found());

        cleanup(&root);
    }

    #[test]
    fn bulk_query_skips_corrupt_files() {
        let root = test_root();
        let manager = test_manager(&root);

        let valid = manager.add(note("valid")).unwrap();
        let corrupt = manager.repository_dir::<Note>().join("corrupt.yaml");
        fs::write(&corrupt, "id: [this is not an envelope").unwrap();

        let mut failures = Vec::new();
        let mut on_error = |path: &Path, _: &StoreError| failures.push(path.to_path_buf());
        let records = manager.query_with::<Note>(Some(&mut on_error), None).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id(), valid.id());
        assert_eq!(failures, vec![corrupt]);

        cleanup(&root);
    }

    #[test]
    fn bulk_query_honours_skip_predicate() {
        let root = test_root();
        let manager = test_manager(&root);

        let skipped = manager.add(note("skipped")).unwrap();
        let kept = manager.add(note("kept")).unwrap();

        let skip_id = skipped.id().to_string();
        let skip = move |path: &Path| crate::storage::paths::record_id(path) == Some(skip_id.as_str());
        let records = manager.query_with::<Note>(None, Some(&skip)).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id(), kept.id());

        cleanup(&root);
    }

    #[test]
    fn empty_query_is_idempotent() {
        let root = test_root();
        let manager = test_manager(&root);

        assert!(manager.query::<Note>().unwrap().is_empty());
        assert!(manager.query::<Note>().unwrap().is_empty());
        assert!(!root.join("serialized-data").exists());

        cleanup(&root);
    }

    #[test]
    fn sink_sees_every_change() {
        let root = test_root();
        let sink = Arc::new(RecordingSink::default());
        let manager = test_manager(&root).with_sink(sink.clone());

        let mut envelope = manager.add(note("tracked")).unwrap();
        manager.update(&mut envelope).unwrap();
        manager.delete(&envelope).unwrap();
        manager
            .delete(&Envelope::new("missing", 0, 0, note("x")))
            .unwrap();

        assert_eq!(
            sink.kinds(),
            vec![ChangeKind::Added, ChangeKind::Updated, ChangeKind::Deleted]
        );
        let events = sink.events.lock().unwrap();
        assert_eq!(events[0].1, manager.record_path::<Note>(envelope.id()));
        assert_eq!(events[1].2.update_timestamp, envelope.update_timestamp());
        assert_eq!(events[2].2.repository, "Note");

        drop(events);
        cleanup(&root);
    }
}

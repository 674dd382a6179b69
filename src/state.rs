// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Store facade: one data manager per root and one repository per type.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fs;
use std::sync::{Arc, Mutex, PoisonError};

use crate::config::{PushPolicy, StoreConfig};
use crate::error::{StoreError, StoreResult};
use crate::models::Record;
use crate::push_poller::PushPoller;
use crate::storage::{CachedRepository, DataManager, StoragePaths};
use crate::vcs::{CommitSink, VersionControl};

type RepositoryRegistry = HashMap<TypeId, Arc<dyn Any + Send + Sync>>;

/// Entry point for applications.
///
/// ```rust,ignore
/// let store = Store::open(StoreConfig::new("/srv/records").with_secrets(secrets))?;
/// let accounts = store.repository::<Account>();
/// let created = accounts.add(account)?;
/// ```
pub struct Store {
    config: StoreConfig,
    manager: Arc<DataManager>,
    repositories: Mutex<RepositoryRegistry>,
}

impl Store {
    /// Open a store without version-control propagation.
    pub fn open(config: StoreConfig) -> StoreResult<Self> {
        ensure_root(&config)?;
        let manager = DataManager::from_config(&config);
        Ok(Self::with_manager(config, manager))
    }

    /// Open a store that commits every change through `vcs`.
    ///
    /// Under [`PushPolicy::Delayed`] the returned poller must be spawned for
    /// changes to reach the remote.
    pub fn open_with_vcs<V: VersionControl + 'static>(
        config: StoreConfig,
        vcs: Arc<V>,
    ) -> StoreResult<(Self, Option<PushPoller<V>>)> {
        ensure_root(&config)?;

        let policy = config.push_policy();
        let sink = CommitSink::new(Arc::clone(&vcs), StoragePaths::new(config.root()), policy);
        let poller = match policy {
            PushPolicy::Delayed(delay) => Some(PushPoller::new(vcs, sink.signal(), delay)),
            PushPolicy::Disabled | PushPolicy::Immediate => None,
        };

        let manager = DataManager::from_config(&config).with_sink(Arc::new(sink));
        Ok((Self::with_manager(config, manager), poller))
    }

    fn with_manager(config: StoreConfig, manager: DataManager) -> Self {
        tracing::info!(
            root = %config.root().display(),
            key_derivation = %config.key_derivation(),
            secrets = config.secrets().len(),
            "Record store opened"
        );

        Self {
            config,
            manager: Arc::new(manager),
            repositories: Mutex::new(HashMap::new()),
        }
    }

    /// The configuration the store was opened with.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The shared data manager.
    pub fn manager(&self) -> &Arc<DataManager> {
        &self.manager
    }

    /// Repository for record type `T`. Repeated calls return the same
    /// instance, so all callers share one mirror.
    pub fn repository<T: Record>(&self) -> Arc<CachedRepository<T>> {
        let mut repositories = self
            .repositories
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let existing = repositories
            .get(&TypeId::of::<T>())
            .and_then(|entry| Arc::clone(entry).downcast::<CachedRepository<T>>().ok());
        if let Some(repository) = existing {
            return repository;
        }

        tracing::debug!(repository = %T::repository_name(), "Creating repository");
        let repository = Arc::new(CachedRepository::<T>::new(Arc::clone(&self.manager)));
        repositories.insert(TypeId::of::<T>(), repository.clone());
        repository
    }
}

fn ensure_root(config: &StoreConfig) -> StoreResult<()> {
    fs::create_dir_all(config.root()).map_err(|e| StoreError::storage(config.root(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::SecretStore;
    use crate::models::{FieldSpec, Schema};
    use crate::vcs::testing::FakeVcs;
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Task {
        title: String,
        done: bool,
    }

    impl Record for Task {
        const SCHEMA: Schema =
            Schema::new(&[FieldSpec::text("title").cached(), FieldSpec::primitive("done")]);
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Secret {
        value: String,
    }

    impl Record for Secret {
        const SCHEMA: Schema =
            Schema::new(&[FieldSpec::text("value").secret("vault")]).repository_name("secrets");
    }

    fn task(title: &str) -> Task {
        Task {
            title: title.to_string(),
            done: false,
        }
    }

    #[test]
    fn open_creates_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("nested").join("repo");

        let store = Store::open(StoreConfig::new(&root)).unwrap();
        assert!(root.is_dir());
        assert_eq!(store.config().root(), root.as_path());
    }

    #[test]
    fn repositories_are_shared_per_type() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(StoreConfig::new(dir.path())).unwrap();

        let first = store.repository::<Task>();
        let second = store.repository::<Task>();
        assert!(Arc::ptr_eq(&first, &second));

        first.add(task("shared")).unwrap();
        assert_eq!(second.cached_len(), 1);
    }

    #[test]
    fn configured_secrets_reach_the_codec() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::new(dir.path())
            .with_secrets(SecretStore::new().with_secret("vault", "s3cret"));
        let store = Store::open(config).unwrap();

        let secrets = store.repository::<Secret>();
        let added = secrets
            .add(Secret {
                value: "classified".to_string(),
            })
            .unwrap();

        let text =
            std::fs::read_to_string(store.manager().record_path::<Secret>(added.id())).unwrap();
        assert!(!text.contains("classified"));
        assert_eq!(secrets.load(added.id()).unwrap().data().value, "classified");
    }

    #[test]
    fn changes_are_committed_through_vcs() {
        let dir = tempfile::tempdir().unwrap();
        let vcs = Arc::new(FakeVcs::with_remote());
        let config = StoreConfig::new(dir.path()).with_push_policy(PushPolicy::Immediate);

        let (store, poller) = Store::open_with_vcs(config, vcs.clone()).unwrap();
        assert!(poller.is_none());

        let tasks = store.repository::<Task>();
        let mut envelope = tasks.add(task("commit me")).unwrap();
        envelope.data_mut().done = true;
        tasks.update(&mut envelope).unwrap();
        tasks.delete(&envelope).unwrap();

        let commits: Vec<String> = vcs
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("commit "))
            .collect();
        assert_eq!(commits.len(), 3);
        assert!(commits[0].ends_with(&format!("(type: Task id: {})", envelope.id())));
        assert_eq!(vcs.pushes(), 3);
    }

    #[test]
    fn delayed_policy_yields_poller() {
        let dir = tempfile::tempdir().unwrap();
        let vcs = Arc::new(FakeVcs::with_remote());
        let config = StoreConfig::new(dir.path())
            .with_push_policy(PushPolicy::Delayed(Duration::from_secs(5)));

        let (store, poller) = Store::open_with_vcs(config, vcs.clone()).unwrap();
        assert!(poller.is_some());

        store.repository::<Task>().add(task("later")).unwrap();
        assert_eq!(vcs.pushes(), 0);
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Version-Control Propagation
//!
//! Turns record changes into commits on the working tree and decides when
//! they reach the remote.
//!
//! ## Strategy
//!
//! For every add, update or delete the [`CommitSink`]:
//! 1. Stages the file (or records its removal) using a root-relative path.
//! 2. Commits with a `chore: <action> data-object (...)` message.
//! 3. Marks the [`PushSignal`] dirty.
//! 4. Pushes right away under [`PushPolicy::Immediate`].
//!
//! Under [`PushPolicy::Delayed`] a [`crate::push_poller::PushPoller`] picks up
//! the dirty flag instead.
//!
//! The backend itself (clone, transports, credentials) lives outside this
//! crate behind [`VersionControl`].

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

use crate::config::PushPolicy;
use crate::storage::{ChangeSink, ChangedEnvelope, StoragePaths};

/// Errors reported by a version-control backend.
#[derive(Debug, thiserror::Error)]
pub enum VcsError {
    /// The path is outside the working tree.
    #[error("path is outside the repository: {0}")]
    OutsideRepository(String),

    /// No remote is configured or reachable.
    #[error("remote not available")]
    RemoteUnavailable,

    /// The backend rejected or failed an operation.
    #[error("version control operation failed: {0}")]
    Operation(String),
}

/// Narrow interface to the version-control backend.
///
/// Paths are relative to the repository root with `/` separators.
pub trait VersionControl: Send + Sync {
    /// Add a new or modified file to the index.
    fn stage(&self, relative_path: &str) -> Result<(), VcsError>;

    /// Record the removal of an already deleted file in the index.
    fn unstage_removed(&self, relative_path: &str) -> Result<(), VcsError>;

    /// Commit the index.
    fn commit(&self, message: &str) -> Result<(), VcsError>;

    /// Push committed changes to the remote.
    fn push(&self) -> Result<(), VcsError>;

    /// Whether a remote can currently be pushed to.
    fn is_remote_available(&self) -> bool;
}

/// Dirty flag shared between the commit sink and the push poller.
#[derive(Debug, Default)]
pub struct PushSignal {
    dirty: AtomicBool,
    notify: Notify,
}

impl PushSignal {
    /// Create a clean signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that unpushed commits exist and wake the poller.
    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    /// Whether unpushed commits exist.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    /// Clear the flag, returning whether it was set.
    pub fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::SeqCst)
    }

    /// Wait until the signal is marked dirty.
    pub async fn notified(&self) {
        self.notify.notified().await;
    }
}

/// Push if a remote is available, logging any failure.
pub(crate) fn push_if_available<V: VersionControl + ?Sized>(vcs: &V) {
    if !vcs.is_remote_available() {
        tracing::debug!("Remote not available, skipping push");
        return;
    }

    match vcs.push() {
        Ok(()) => tracing::debug!("Pushed changes to remote"),
        Err(e) => tracing::error!(error = %e, "Failed to push changes to remote"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Add,
    Update,
    Delete,
}

impl Action {
    fn verb(self) -> &'static str {
        match self {
            Action::Add => "add",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

/// Commit message for a record change.
pub fn commit_message(action: &str, envelope: &ChangedEnvelope) -> String {
    format!(
        "chore: {action} data-object (type: {} id: {})",
        envelope.repository, envelope.id
    )
}

/// Change sink committing every record change.
pub struct CommitSink<V: VersionControl> {
    vcs: Arc<V>,
    paths: StoragePaths,
    policy: PushPolicy,
    signal: Arc<PushSignal>,
}

impl<V: VersionControl> CommitSink<V> {
    /// Create a sink for the working tree at `paths`.
    pub fn new(vcs: Arc<V>, paths: StoragePaths, policy: PushPolicy) -> Self {
        match policy {
            PushPolicy::Disabled => tracing::info!("No remote configured, push disabled"),
            PushPolicy::Immediate => tracing::info!("Pushing changes immediately after commit"),
            PushPolicy::Delayed(delay) => tracing::info!(
                delay_ms = delay.as_millis() as u64,
                "Pushing changes with a delay"
            ),
        }

        Self {
            vcs,
            paths,
            policy,
            signal: Arc::new(PushSignal::new()),
        }
    }

    /// Signal to hand to a push poller.
    pub fn signal(&self) -> Arc<PushSignal> {
        Arc::clone(&self.signal)
    }

    /// The backend.
    pub fn vcs(&self) -> &Arc<V> {
        &self.vcs
    }

    fn commit_change(&self, action: Action, file: &Path, envelope: &ChangedEnvelope) {
        if let Err(e) = self.try_commit(action, file, envelope) {
            tracing::error!(
                action = action.verb(),
                id = %envelope.id,
                repository = %envelope.repository,
                error = %e,
                "Unable to commit record change"
            );
        }
    }

    fn try_commit(
        &self,
        action: Action,
        file: &Path,
        envelope: &ChangedEnvelope,
    ) -> Result<(), VcsError> {
        let relative = self
            .paths
            .relative(file)
            .ok_or_else(|| VcsError::OutsideRepository(file.display().to_string()))?;

        match action {
            Action::Delete => self.vcs.unstage_removed(&relative)?,
            Action::Add | Action::Update => self.vcs.stage(&relative)?,
        }

        self.vcs.commit(&commit_message(action.verb(), envelope))?;
        self.signal.mark_dirty();

        if self.policy == PushPolicy::Immediate {
            tracing::debug!("Performing immediate push");
            self.signal.take_dirty();
            push_if_available(self.vcs.as_ref());
        }

        Ok(())
    }
}

impl<V: VersionControl> ChangeSink for CommitSink<V> {
    fn on_added(&self, file: &Path, envelope: &ChangedEnvelope) {
        self.commit_change(Action::Add, file, envelope);
    }

    fn on_updated(&self, file: &Path, envelope: &ChangedEnvelope) {
        self.commit_change(Action::Update, file, envelope);
    }

    fn on_deleted(&self, file: &Path, envelope: &ChangedEnvelope) {
        self.commit_change(Action::Delete, file, envelope);
    }
}

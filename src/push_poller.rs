// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Delayed Push Poller
//!
//! Background task that pushes committed record changes to the remote at
//! most once per delay interval.
//!
//! ## Strategy
//!
//! The poller sleeps until the [`PushSignal`] is marked dirty, then waits for
//! the configured delay so that bursts of commits are pushed together, then
//! pushes if the flag is still set. Pushing runs on the blocking pool since
//! backends are synchronous.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken` for graceful shutdown. Pending
//! changes are pushed once more before the task exits.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::vcs::{self, PushSignal, VersionControl};

/// Background poller pushing changes marked on a [`PushSignal`].
pub struct PushPoller<V: VersionControl> {
    vcs: Arc<V>,
    signal: Arc<PushSignal>,
    delay: Duration,
}

impl<V: VersionControl + 'static> PushPoller<V> {
    /// Create a new poller.
    pub fn new(vcs: Arc<V>, signal: Arc<PushSignal>, delay: Duration) -> Self {
        Self { vcs, signal, delay }
    }

    /// Run the poller loop until the cancellation token is triggered.
    ///
    /// Should be spawned as a background task:
    /// ```rust,ignore
    /// tokio::spawn(poller.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            delay_ms = self.delay.as_millis() as u64,
            "Push poller starting"
        );

        loop {
            tokio::select! {
                _ = self.signal.notified() => {},
                _ = shutdown.cancelled() => break,
            }

            tokio::select! {
                _ = tokio::time::sleep(self.delay) => {},
                _ = shutdown.cancelled() => break,
            }

            self.push_step().await;
        }

        info!("Push poller shutting down");
        self.push_step().await;
    }

    /// Push once if changes are pending.
    async fn push_step(&self) {
        if !self.signal.take_dirty() {
            return;
        }

        info!("Push poller: pushing pending changes");

        let vcs = Arc::clone(&self.vcs);
        if let Err(e) = tokio::task::spawn_blocking(move || vcs::push_if_available(vcs.as_ref())).await {
            warn!(error = %e, "Push poller: push task failed");
        }
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Async fetch coordinator (C2). Two concurrent maps keyed by resource
//! identity (`namespace/name`): in-flight fetch handles and latched
//! terminal results. At most one in-flight entry exists per resource; a
//! reconcile pass drains `results` before ever starting a new fetch.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use arena_core::Artifact;
use arena_drivers::{DriverError, Fetcher};

pub type ResourceKey = String;

pub fn key(namespace: &str, name: &str) -> ResourceKey {
    format!("{namespace}/{name}")
}

struct InFlight {
    cancel: CancellationToken,
    started_at: Instant,
    #[allow(dead_code)]
    handle: JoinHandle<()>,
}

#[derive(Debug)]
pub enum FetchOutcome {
    Fetched(Artifact),
    UpToDate { revision: String },
    Failed(String),
}

#[derive(Default)]
pub struct Coordinator {
    in_progress: Mutex<HashMap<ResourceKey, InFlight>>,
    results: Mutex<HashMap<ResourceKey, FetchOutcome>>,
}

impl Coordinator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn is_in_progress(&self, key: &str) -> bool {
        self.in_progress.lock().contains_key(key)
    }

    pub fn take_result(&self, key: &str) -> Option<FetchOutcome> {
        self.results.lock().remove(key)
    }

    /// Cancels any in-flight fetch and drops any latched result for `key`.
    /// Called on resource deletion and on suspension.
    pub fn drain(&self, key: &str) {
        if let Some(flight) = self.in_progress.lock().remove(key) {
            flight.cancel.cancel();
        }
        self.results.lock().remove(key);
    }

    /// Starts an async fetch task if one isn't already in flight for `key`.
    /// The task always deposits a terminal `FetchOutcome`, even on panic or
    /// timeout — a drop guard stores a generic failure if nothing else did.
    pub fn start_fetch(
        self: &Arc<Self>,
        key: ResourceKey,
        fetcher: Arc<dyn Fetcher>,
        current_revision: Option<String>,
        fetch_timeout: Duration,
        dest: std::path::PathBuf,
    ) {
        if self.in_progress.lock().contains_key(&key) {
            return;
        }
        let cancel = CancellationToken::new();
        let this = self.clone();
        let task_key = key.clone();
        let task_cancel = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut guard = ResultGuard { coordinator: &this, key: &task_key, armed: true };
            let outcome = tokio::select! {
                _ = task_cancel.cancelled() => FetchOutcome::Failed("cancelled".into()),
                result = timeout(fetch_timeout, run_fetch(fetcher, current_revision, dest)) => {
                    match result {
                        Ok(outcome) => outcome,
                        Err(_) => FetchOutcome::Failed("fetch timed out".into()),
                    }
                }
            };
            guard.disarm(outcome);
            this.in_progress.lock().remove(&task_key);
        });

        self.in_progress.lock().insert(key, InFlight { cancel, started_at: Instant::now(), handle });
    }

    pub fn in_progress_since(&self, key: &str) -> Option<Instant> {
        self.in_progress.lock().get(key).map(|f| f.started_at)
    }
}

async fn run_fetch(fetcher: Arc<dyn Fetcher>, current_revision: Option<String>, dest: std::path::PathBuf) -> FetchOutcome {
    let latest = match fetcher.latest_revision().await {
        Ok(revision) => revision,
        Err(error) => return FetchOutcome::Failed(error.to_string()),
    };
    if current_revision.as_deref() == Some(latest.as_str()) {
        return FetchOutcome::UpToDate { revision: latest };
    }
    match fetcher.fetch(&latest, &dest).await {
        Ok(fetched) => FetchOutcome::Fetched(Artifact {
            revision: fetched.revision,
            content_path: dest.to_string_lossy().into_owned(),
            version: String::new(),
            checksum: fetched.checksum,
            size: fetched.size,
            last_update_time: chrono::Utc::now(),
        }),
        Err(error) => FetchOutcome::Failed(error.to_string()),
    }
}

/// Guards a fetch task's terminal result: if the task exits (including via
/// panic unwinding through `spawn`) without an explicit outcome, deposits a
/// generic "terminated unexpectedly" failure so a reconcile pass never waits
/// on a slot nothing will ever fill.
struct ResultGuard<'a> {
    coordinator: &'a Coordinator,
    key: &'a str,
    armed: bool,
}

impl<'a> ResultGuard<'a> {
    fn disarm(&mut self, outcome: FetchOutcome) {
        self.armed = false;
        self.coordinator.results.lock().insert(self.key.to_string(), outcome);
    }
}

impl<'a> Drop for ResultGuard<'a> {
    fn drop(&mut self) {
        if self.armed {
            self.coordinator.results.lock().insert(self.key.to_string(), FetchOutcome::Failed("terminated unexpectedly".into()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use async_trait::async_trait;

    struct AlwaysFresh;

    #[async_trait]
    impl Fetcher for AlwaysFresh {
        async fn latest_revision(&self) -> Result<String, DriverError> {
            Ok("rev-1".to_string())
        }

        async fn fetch(&self, revision: &str, _dest: &std::path::Path) -> Result<arena_drivers::FetchedArtifact, DriverError> {
            Ok(arena_drivers::FetchedArtifact { revision: revision.to_string(), checksum: "c".into(), size: 1 })
        }
    }

    #[tokio::test]
    async fn start_fetch_then_drain_removes_in_progress_and_result() {
        let coordinator = Coordinator::new();
        let key = key("ns", "name");
        coordinator.start_fetch(key.clone(), Arc::new(AlwaysFresh), None, Duration::from_secs(5), PathBuf::from("/tmp/arena-test"));
        assert!(coordinator.is_in_progress(&key));

        tokio::time::sleep(Duration::from_millis(50)).await;
        coordinator.drain(&key);
        assert!(!coordinator.is_in_progress(&key));
        assert!(coordinator.take_result(&key).is_none());
    }

    #[tokio::test]
    async fn second_start_while_in_progress_is_a_no_op() {
        let coordinator = Coordinator::new();
        let key = key("ns", "name");
        coordinator.start_fetch(key.clone(), Arc::new(AlwaysFresh), None, Duration::from_secs(5), PathBuf::from("/tmp/arena-test"));
        let before = coordinator.in_progress_since(&key);
        coordinator.start_fetch(key.clone(), Arc::new(AlwaysFresh), None, Duration::from_secs(5), PathBuf::from("/tmp/arena-test"));
        assert_eq!(coordinator.in_progress_since(&key), before);
    }

    #[tokio::test]
    async fn up_to_date_probe_deposits_empty_content_path() {
        let coordinator = Coordinator::new();
        let key = key("ns", "name");
        coordinator.start_fetch(key.clone(), Arc::new(AlwaysFresh), Some("rev-1".into()), Duration::from_secs(5), PathBuf::from("/tmp/arena-test"));
        tokio::time::sleep(Duration::from_millis(50)).await;
        match coordinator.take_result(&key) {
            Some(FetchOutcome::UpToDate { revision }) => assert_eq!(revision, "rev-1"),
            other => panic!("expected UpToDate, got {other:?}"),
        }
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error at {path}: {source}")]
    Io { path: String, #[source] source: std::io::Error },

    #[error("HEAD file at {path} is missing or unreadable")]
    HeadMissing { path: String },

    #[error("queue {job_id} is empty")]
    QueueEmpty { job_id: String },

    #[error("no queue backend configured")]
    NoBackendConfigured,

    #[error("remote queue dial failed: {0}")]
    RemoteDialFailed(String),
}

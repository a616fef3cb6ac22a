// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("kubernetes api error: {0}")]
    Kube(#[from] kube::Error),

    #[error("driver error: {0}")]
    Driver(#[from] arena_drivers::DriverError),

    #[error("storage error: {0}")]
    Storage(#[from] arena_storage::StorageError),

    #[error("core error: {0}")]
    Core(#[from] arena_core::CoreError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid cron schedule: {0}")]
    InvalidSchedule(String),

    #[error("resource {kind} {namespace}/{name} is missing a required namespace")]
    MissingNamespace { kind: &'static str, namespace: String, name: String },

    #[error("prerequisite not satisfied: {0}")]
    PrerequisiteUnmet(String),
}

pub type Result<T> = std::result::Result<T, ReconcileError>;

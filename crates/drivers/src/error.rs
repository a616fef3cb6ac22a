// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("git operation failed: {0}")]
    Git(#[from] git2::Error),

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("kubernetes api error: {0}")]
    Kube(#[from] kube::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("blocking task panicked: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("credential secret {name:?} is missing required key {key:?}")]
    MissingCredentialKey { name: String, key: &'static str },

    #[error("unsupported origin: {0}")]
    UnsupportedOrigin(String),

    #[error("license server rejected request: {0}")]
    LicenseRejected(String),

    #[error("kms provider error: {0}")]
    Kms(String),
}

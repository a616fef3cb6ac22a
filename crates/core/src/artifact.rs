// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `Artifact` value published by a content-sync reconciler (C4) and
//! consumed by job/session reconcilers once a source reaches `ready`.
//!
//! This type only models the data; fetching and versioning it (hashing a
//! directory tree, promoting `HEAD`) live in `arena-drivers`/`arena-storage`,
//! which are allowed to touch the filesystem and network.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of hex characters of the content checksum used as the on-disk
/// version directory name.
pub const VERSION_LEN: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Origin-defined identity: a git commit SHA, an OCI digest, a ConfigMap
    /// resourceVersion.
    pub revision: String,
    /// Path to the synced content, relative to the workspace content root.
    pub content_path: String,
    /// First [`VERSION_LEN`] hex characters of `checksum`.
    pub version: String,
    /// Full SHA-256 checksum of the synced content tree.
    pub checksum: String,
    pub size: u64,
    pub last_update_time: DateTime<Utc>,
}

impl Artifact {
    /// An up-to-date short-circuit result: the origin's latest revision
    /// already matches what's stored, so no new content was fetched.
    /// `content_path` is left empty so the publisher knows to leave on-disk
    /// content and the prior `contentPath`/`version` untouched.
    pub fn unchanged(revision: impl Into<String>, version: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            revision: revision.into(),
            content_path: String::new(),
            version: version.into(),
            checksum: String::new(),
            size: 0,
            last_update_time: now,
        }
    }

    pub fn is_unchanged(&self) -> bool {
        self.content_path.is_empty()
    }
}

#[cfg(test)]
#[path = "artifact_tests.rs"]
mod tests;

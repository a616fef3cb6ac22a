// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Owner-reference bookkeeping shared by every controller reconciler.
//!
//! Every child object (a `batch/v1 Job`, a published ConfigMap) carries a
//! `metadata.ownerReferences` entry pointing back at the resource that
//! created it, with `controller: true` so the garbage collector deletes it
//! when the owner goes away. This module only holds the pure comparison
//! logic; the actual `OwnerReference` struct construction lives in
//! `arena-reconcile`, which has the `k8s-openapi` dependency.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerRef {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub uid: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("owner mismatch: expected {expected:?}, found {found:?}")]
pub struct OwnerMismatch {
    pub expected: OwnerRef,
    pub found: Option<OwnerRef>,
}

impl OwnerRef {
    pub fn new(api_version: impl Into<String>, kind: impl Into<String>, name: impl Into<String>, uid: impl Into<String>) -> Self {
        Self {
            api_version: api_version.into(),
            kind: kind.into(),
            name: name.into(),
            uid: uid.into(),
        }
    }

    /// Returns `Ok(())` when `candidate` is `Some` and matches this owner by
    /// UID. A watch event for a child whose owner UID doesn't match the
    /// expected owner is a stale or adopted object, never the owner's own
    /// child — reconcilers must reject it rather than act on it.
    pub fn verify(&self, candidate: Option<&OwnerRef>) -> Result<(), OwnerMismatch> {
        match candidate {
            Some(found) if found.uid == self.uid => Ok(()),
            Some(found) => Err(OwnerMismatch { expected: self.clone(), found: Some(found.clone()) }),
            None => Err(OwnerMismatch { expected: self.clone(), found: None }),
        }
    }
}

#[cfg(test)]
#[path = "owner_tests.rs"]
mod tests;

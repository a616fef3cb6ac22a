// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pure-domain error type shared by every `arena-core` module.
//!
//! Crates further up the stack (`arena-reconcile`, `arena-drivers`) define
//! their own error enums for IO/cluster failures and wrap [`CoreError`] as a
//! source where a pure-algorithm step can fail.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid glob pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("owner mismatch: resource is owned by {expected}, touched by {actual}")]
    OwnerMismatch { expected: String, actual: String },

    #[error("policy level order violated: {0}")]
    PolicyOrder(String),

    #[error("resource name {name:?} could not be derived within 63 characters")]
    NameTooLong { name: String },
}

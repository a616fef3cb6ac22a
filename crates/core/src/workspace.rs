// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace-label resolution (C14).
//!
//! The label lookup itself (`Api::<Namespace>::get`) requires a cluster client
//! and lives in `arena-reconcile`; this is the pure tail of that operation —
//! given whatever label value (if any) was read off the namespace, decide the
//! resolved workspace name.

/// Resolves the workspace a namespace belongs to.
///
/// `label` is the namespace's `workspace` label, already looked up by the
/// caller (`None` covers both "namespace has no such label" and "no client
/// was available to look it up", e.g. in pure unit tests). An empty or
/// missing label falls back to the namespace name itself.
pub fn resolve_workspace(namespace: &str, label: Option<&str>) -> String {
    match label {
        Some(value) if !value.is_empty() => value.to_string(),
        _ => namespace.to_string(),
    }
}

#[cfg(test)]
#[path = "workspace_tests.rs"]
mod tests;

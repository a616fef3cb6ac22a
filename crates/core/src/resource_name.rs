// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Child resource name derivation (C12/C14).
//!
//! Kubernetes label values and most object names are capped at 63 characters.
//! When `prefix + name` fits, it's used verbatim; otherwise `name` is
//! truncated to make room for an 8-hex-character SHA-256 suffix, keeping
//! derived names both deterministic and collision-resistant.

use sha2::{Digest, Sha256};

pub const MAX_LEN: usize = 63;
const SUFFIX_HEX_LEN: usize = 8;

/// Derives a child resource name from `prefix` and `name`, respecting the
/// Kubernetes 63-character limit.
pub fn derive_child_name(prefix: &str, name: &str) -> String {
    let full = format!("{prefix}{name}");
    if full.len() <= MAX_LEN {
        return full;
    }

    let hash = hex::encode(Sha256::digest(name.as_bytes()));
    let suffix = &hash[..SUFFIX_HEX_LEN];
    // reserve prefix + truncated name + '-' + suffix
    let budget = MAX_LEN.saturating_sub(prefix.len() + 1 + SUFFIX_HEX_LEN);
    let truncated = truncate_chars(name, budget);
    format!("{prefix}{truncated}-{suffix}")
}

fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
#[path = "resource_name_tests.rs"]
mod tests;

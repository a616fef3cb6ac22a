// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Privacy-policy merger (C9): the global → workspace → agent "stricter wins"
//! lattice merge.
//!
//! Building the chain requires looking up sibling/parent policy resources
//! (`arena-reconcile`'s job); once the chain is assembled this module folds
//! it pairwise into one effective policy with no Kubernetes dependency.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyLevel {
    Global,
    Workspace,
    Agent,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RecordingSpec {
    pub enabled: bool,
    pub facade_data: bool,
    pub rich_data: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PiiSpec {
    pub redact: bool,
    pub encrypt: bool,
    pub patterns: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetentionTier {
    pub warm_days: Option<u32>,
    pub cold_days: Option<u32>,
    pub delete_within_days: Option<u32>,
    pub retention_days: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetentionSpec {
    pub facade: RetentionTier,
    pub rich_data: RetentionTier,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EncryptionSpec {
    pub enabled: bool,
    pub kms_provider: String,
    pub key_id: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserOptOutSpec {
    pub enabled: bool,
    pub honor_delete_requests: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PrivacyPolicySpec {
    pub level: Option<PolicyLevel>,
    pub recording: RecordingSpec,
    pub pii: PiiSpec,
    pub user_opt_out: UserOptOutSpec,
    pub retention: RetentionSpec,
    pub encryption: EncryptionSpec,
    pub audit_log_enabled: bool,
}

/// Merges `override_` on top of `base` under the "stricter wins" rule.
///
/// - Enable flags AND (false wins).
/// - Strictness flags OR (true wins).
/// - `pii.patterns` unions, preserving `base`'s order then `override_`'s new entries.
/// - Retention tiers take the element-wise minimum of the values both sides set.
/// - KMS fields: `override_` wins when non-empty, else `base`.
pub fn merge_pair(base: &PrivacyPolicySpec, override_: &PrivacyPolicySpec) -> PrivacyPolicySpec {
    PrivacyPolicySpec {
        level: override_.level.or(base.level),
        recording: RecordingSpec {
            enabled: base.recording.enabled && override_.recording.enabled,
            facade_data: base.recording.facade_data && override_.recording.facade_data,
            rich_data: base.recording.rich_data && override_.recording.rich_data,
        },
        pii: PiiSpec {
            redact: base.pii.redact || override_.pii.redact,
            encrypt: base.pii.encrypt || override_.pii.encrypt,
            patterns: union_dedup(&base.pii.patterns, &override_.pii.patterns),
        },
        user_opt_out: UserOptOutSpec {
            enabled: base.user_opt_out.enabled || override_.user_opt_out.enabled,
            honor_delete_requests: base.user_opt_out.honor_delete_requests || override_.user_opt_out.honor_delete_requests,
        },
        retention: RetentionSpec {
            facade: merge_tier(base.retention.facade, override_.retention.facade),
            rich_data: merge_tier(base.retention.rich_data, override_.retention.rich_data),
        },
        encryption: EncryptionSpec {
            enabled: base.encryption.enabled || override_.encryption.enabled,
            kms_provider: pick_non_empty(&base.encryption.kms_provider, &override_.encryption.kms_provider),
            key_id: pick_non_empty(&base.encryption.key_id, &override_.encryption.key_id),
        },
        audit_log_enabled: base.audit_log_enabled || override_.audit_log_enabled,
    }
}

/// Folds an ordered `[root, …, leaf]` chain with [`merge_pair`], left to right.
/// Returns `None` for an empty chain; the caller treats that as "no parent
/// found", a publisher-level error.
pub fn merge_chain(chain: &[PrivacyPolicySpec]) -> Option<PrivacyPolicySpec> {
    let mut iter = chain.iter();
    let first = iter.next()?.clone();
    Some(iter.fold(first, |acc, next| merge_pair(&acc, next)))
}

fn merge_tier(base: RetentionTier, override_: RetentionTier) -> RetentionTier {
    RetentionTier {
        warm_days: min_some(base.warm_days, override_.warm_days),
        cold_days: min_some(base.cold_days, override_.cold_days),
        delete_within_days: min_some(base.delete_within_days, override_.delete_within_days),
        retention_days: min_some(base.retention_days, override_.retention_days),
    }
}

fn min_some(a: Option<u32>, b: Option<u32>) -> Option<u32> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    }
}

fn pick_non_empty(base: &str, override_: &str) -> String {
    if !override_.is_empty() {
        override_.to_string()
    } else {
        base.to_string()
    }
}

fn union_dedup(base: &[String], override_: &[String]) -> Vec<String> {
    let mut out = base.to_vec();
    for pattern in override_ {
        if !out.contains(pattern) {
            out.push(pattern.clone());
        }
    }
    out
}

#[cfg(test)]
#[path = "policy_tests.rs"]
mod tests;

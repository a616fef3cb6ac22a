// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `SessionPrivacyPolicy`: one level of the global/workspace/agent privacy
//! lattice (C9/C10). Field shapes mirror `arena_core::policy` but carry a
//! [`schemars::JsonSchema`] derive for the CRD's generated schema;
//! `arena-reconcile` converts to/from the core types around the merge call.

use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::condition::Condition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum PolicyLevel {
    Global,
    Workspace,
    Agent,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct RecordingSpec {
    pub enabled: bool,
    pub facade_data: bool,
    pub rich_data: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct PiiSpec {
    pub redact: bool,
    pub encrypt: bool,
    pub patterns: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct RetentionTier {
    pub warm_days: Option<u32>,
    pub cold_days: Option<u32>,
    pub delete_within_days: Option<u32>,
    pub retention_days: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct RetentionSpec {
    pub facade: RetentionTier,
    pub rich_data: RetentionTier,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct KmsSpec {
    pub rotation_schedule: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct EncryptionSpec {
    pub enabled: bool,
    pub kms_provider: String,
    pub key_id: String,
    #[serde(default)]
    pub kms: KmsSpec,
    pub re_encryption_batch_size: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct UserOptOutSpec {
    pub enabled: bool,
    pub honor_delete_requests: bool,
}

#[derive(CustomResource, Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "arena.dev",
    version = "v1",
    kind = "SessionPrivacyPolicy",
    plural = "sessionprivacypolicies",
    namespaced,
    status = "SessionPrivacyPolicyStatus",
    shortname = "spp"
)]
#[serde(rename_all = "camelCase")]
pub struct SessionPrivacyPolicySpec {
    pub level: PolicyLevel,
    pub workspace_ref: Option<String>,
    pub agent_ref: Option<String>,
    #[serde(default)]
    pub recording: RecordingSpec,
    #[serde(default)]
    pub pii: PiiSpec,
    #[serde(default)]
    pub user_opt_out: UserOptOutSpec,
    #[serde(default)]
    pub retention: RetentionSpec,
    #[serde(default)]
    pub encryption: EncryptionSpec,
    #[serde(default)]
    pub audit_log_enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum PolicyStatusPhase {
    Active,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum ReEncryptionStatus {
    InProgress,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReEncryptionProgress {
    pub status: Option<ReEncryptionStatus>,
    #[serde(default)]
    pub messages_processed: u64,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct KeyRotationStatus {
    pub previous_key_version: Option<String>,
    pub new_key_version: Option<String>,
    pub last_rotated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub re_encryption_progress: ReEncryptionProgress,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionPrivacyPolicyStatus {
    pub phase: Option<PolicyStatusPhase>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    pub parent_policy: Option<String>,
    #[serde(default)]
    pub key_rotation: KeyRotationStatus,
    #[serde(default)]
    pub observed_generation: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_level_has_no_parent_refs_by_convention() {
        let json = serde_json::json!({ "level": "global" });
        let spec: SessionPrivacyPolicySpec = serde_json::from_value(json).unwrap();
        assert_eq!(spec.level, PolicyLevel::Global);
        assert!(spec.workspace_ref.is_none());
    }

    #[test]
    fn workspace_level_with_ref_round_trips() {
        let spec = SessionPrivacyPolicySpec {
            level: PolicyLevel::Workspace,
            workspace_ref: Some("team-a".into()),
            agent_ref: None,
            recording: RecordingSpec::default(),
            pii: PiiSpec::default(),
            user_opt_out: UserOptOutSpec::default(),
            retention: RetentionSpec::default(),
            encryption: EncryptionSpec::default(),
            audit_log_enabled: false,
        };
        let json = serde_json::to_string(&spec).unwrap();
        let back: SessionPrivacyPolicySpec = serde_json::from_str(&json).unwrap();
        assert_eq!(back, spec);
    }
}

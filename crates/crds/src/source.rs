// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ArenaSource` and `ArenaTemplateSource`: content-sync inputs (C4).

use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::condition::Condition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum SourcePhase {
    Pending,
    Fetching,
    Ready,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum OriginConfig {
    Git { url: String, reference: String, #[serde(default)] sub_path: Option<String> },
    Oci { image: String, #[serde(default)] insecure: bool },
    Configmap { name: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ArtifactStatus {
    pub revision: String,
    pub content_path: String,
    pub version: String,
    pub checksum: String,
    pub size: u64,
    pub last_update_time: DateTime<Utc>,
}

#[derive(CustomResource, Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "arena.dev",
    version = "v1",
    kind = "ArenaSource",
    plural = "arenasources",
    namespaced,
    status = "ArenaSourceStatus",
    shortname = "asrc"
)]
#[serde(rename_all = "camelCase")]
pub struct ArenaSourceSpec {
    #[serde(flatten)]
    pub origin: OriginConfig,
    /// Poll interval, e.g. `"5m"`, parsed with `humantime`.
    pub interval: String,
    pub timeout: Option<String>,
    #[serde(default)]
    pub suspend: bool,
    #[serde(default)]
    pub credentials_ref: Option<String>,
    pub target_path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ArenaSourceStatus {
    pub phase: Option<SourcePhase>,
    pub artifact: Option<ArtifactStatus>,
    pub last_fetch_time: Option<DateTime<Utc>>,
    pub next_fetch_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub version_count: u32,
    pub head_version: Option<String>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub observed_generation: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TemplateMetadata {
    pub name: String,
    pub path: String,
}

#[derive(CustomResource, Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "arena.dev",
    version = "v1",
    kind = "ArenaTemplateSource",
    plural = "arenatemplatesources",
    namespaced,
    status = "ArenaTemplateSourceStatus",
    shortname = "atsrc"
)]
#[serde(rename_all = "camelCase")]
pub struct ArenaTemplateSourceSpec {
    #[serde(flatten)]
    pub origin: OriginConfig,
    pub sync_interval: String,
    #[serde(default)]
    pub suspend: bool,
    #[serde(default)]
    pub credentials_ref: Option<String>,
    pub target_path: Option<String>,
    #[serde(default = "default_templates_path")]
    pub templates_path: String,
}

fn default_templates_path() -> String {
    "templates/".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ArenaTemplateSourceStatus {
    pub phase: Option<SourcePhase>,
    pub artifact: Option<ArtifactStatus>,
    pub last_fetch_time: Option<DateTime<Utc>>,
    pub next_fetch_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub version_count: u32,
    pub head_version: Option<String>,
    #[serde(default)]
    pub template_count: u32,
    #[serde(default)]
    pub templates: Vec<TemplateMetadata>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub observed_generation: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_config_git_round_trips_with_tag() {
        let spec = ArenaSourceSpec {
            origin: OriginConfig::Git { url: "https://example.test/repo.git".into(), reference: "main".into(), sub_path: None },
            interval: "5m".into(),
            timeout: None,
            suspend: false,
            credentials_ref: None,
            target_path: None,
        };
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["type"], "Git");
        let back: ArenaSourceSpec = serde_json::from_value(json).unwrap();
        assert_eq!(back, spec);
    }

    #[test]
    fn source_crd_has_expected_group_and_kind() {
        assert_eq!(ArenaSource::crd().spec.group, "arena.dev");
        assert_eq!(ArenaSource::crd().spec.names.kind, "ArenaSource");
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ArenaDevSession`: an interactive, idle-swept development session (C12).

use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::condition::Condition;

pub const CLEANUP_FINALIZER: &str = "arena.dev/devsession-cleanup";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum DevSessionPhase {
    Pending,
    Starting,
    Ready,
    Stopping,
    Stopped,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRequests {
    pub cpu: Option<String>,
    pub memory: Option<String>,
}

#[derive(CustomResource, Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "arena.dev",
    version = "v1",
    kind = "ArenaDevSession",
    plural = "arenadevsessions",
    namespaced,
    status = "ArenaDevSessionStatus",
    shortname = "ads"
)]
#[serde(rename_all = "camelCase")]
pub struct ArenaDevSessionSpec {
    pub image: Option<String>,
    /// Idle timeout, e.g. `"30m"`, parsed with `humantime`; unparseable falls back to the default.
    pub idle_timeout: Option<String>,
    #[serde(default)]
    pub resources: ResourceRequests,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ArenaDevSessionStatus {
    pub phase: Option<DevSessionPhase>,
    pub endpoint: Option<String>,
    pub service_name: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub last_activity_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub observed_generation: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finalizer_string_is_fixed() {
        assert_eq!(CLEANUP_FINALIZER, "arena.dev/devsession-cleanup");
    }

    #[test]
    fn status_defaults_have_no_phase() {
        let status = ArenaDevSessionStatus::default();
        assert!(status.phase.is_none());
        assert!(status.conditions.is_empty());
    }
}

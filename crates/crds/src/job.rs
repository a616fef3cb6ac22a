// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ArenaJob`: a scenario-matrix run against resolved providers (C5/C6/C8).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::condition::Condition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum JobPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobPhase {
    /// Terminal phases are sticky: once reached, a reconciler never moves
    /// the job back to `pending`/`running`.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobPhase::Succeeded | JobPhase::Failed | JobPhase::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum ExecutionMode {
    Direct,
    Fleet,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionTarget {
    pub agent_runtime_ref: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSpec {
    #[serde(default = "default_execution_mode")]
    pub mode: ExecutionMode,
    #[serde(default)]
    pub target: ExecutionTarget,
}

impl Default for ExecutionSpec {
    fn default() -> Self {
        Self { mode: ExecutionMode::Direct, target: ExecutionTarget::default() }
    }
}

fn default_execution_mode() -> ExecutionMode {
    ExecutionMode::Direct
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioSpec {
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SelectorRef {
    pub selector: BTreeMap<String, String>,
}

#[derive(CustomResource, Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "arena.dev",
    version = "v1",
    kind = "ArenaJob",
    plural = "arenajobs",
    namespaced,
    status = "ArenaJobStatus",
    shortname = "ajob"
)]
#[serde(rename_all = "camelCase")]
pub struct ArenaJobSpec {
    pub source_ref: String,
    #[serde(rename = "type")]
    pub job_type: String,
    #[serde(default = "default_workers")]
    pub workers: u32,
    #[serde(default)]
    pub scenarios: ScenarioSpec,
    #[serde(default)]
    pub provider_overrides: BTreeMap<String, SelectorRef>,
    pub tool_registry_override: Option<SelectorRef>,
    #[serde(default)]
    pub execution: ExecutionSpec,
    pub ttl: Option<String>,
}

fn default_workers() -> u32 {
    1
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobProgress {
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub completed: u32,
    #[serde(default)]
    pub failed: u32,
    #[serde(default)]
    pub pending: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobResultSummary {
    pub pass_rate: f64,
    pub total_runs: u32,
    pub total_tokens: u64,
    pub total_cost_usd: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    pub summary: JobResultSummary,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ArenaJobStatus {
    pub phase: Option<JobPhase>,
    pub start_time: Option<DateTime<Utc>>,
    pub completion_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub active_workers: u32,
    #[serde(default)]
    pub progress: JobProgress,
    pub result: Option<JobResult>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub observed_generation: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_phases() {
        assert!(JobPhase::Succeeded.is_terminal());
        assert!(JobPhase::Failed.is_terminal());
        assert!(JobPhase::Cancelled.is_terminal());
        assert!(!JobPhase::Running.is_terminal());
        assert!(!JobPhase::Pending.is_terminal());
    }

    #[test]
    fn execution_spec_defaults_to_direct() {
        let spec: ExecutionSpec = serde_json::from_str("{}").unwrap();
        assert_eq!(spec.mode, ExecutionMode::Direct);
    }

    #[test]
    fn spec_defaults_one_worker() {
        let json = serde_json::json!({
            "sourceRef": "src-a",
            "type": "benchmark",
        });
        let spec: ArenaJobSpec = serde_json::from_value(json).unwrap();
        assert_eq!(spec.workers, 1);
        assert!(spec.scenarios.include.is_empty());
    }
}

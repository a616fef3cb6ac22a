// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Work-item matrix builder (C6).
//!
//! [`build_work_items`] is the pure scenario × provider expansion at the
//! heart of job fan-out. Resolving providers, fetching the scenario list off
//! disk, and materialising the dispatcher are all IO and live in
//! `arena-reconcile`; this module only expands an already-resolved scenario
//! and provider list into the items to run.

use glob::Pattern;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::CoreError;

const ID_HEX_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExecutionMode {
    Direct,
    Fleet,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkItemId(pub String);

impl WorkItemId {
    /// Deterministic id: first 16 hex chars of SHA-256(`job_name/scenario_id/provider_id`).
    pub fn derive(job_name: &str, scenario_id: &str, provider_id: &str) -> Self {
        let input = format!("{job_name}/{scenario_id}/{provider_id}");
        let hash = hex::encode(Sha256::digest(input.as_bytes()));
        Self(hash[..ID_HEX_LEN].to_string())
    }
}

impl std::fmt::Display for WorkItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: WorkItemId,
    pub job_id: String,
    pub scenario_id: String,
    pub provider_id: String,
    pub max_attempts: u32,
}

/// `spec.scenarios` include/exclude glob filter. Exclude wins on conflict.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioFilter {
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl ScenarioFilter {
    pub fn apply<'a>(&self, scenario_ids: &'a [String]) -> Result<Vec<&'a str>, CoreError> {
        let include_patterns = compile(&self.include)?;
        let exclude_patterns = compile(&self.exclude)?;

        Ok(scenario_ids
            .iter()
            .filter(|id| {
                let included = include_patterns.is_empty() || include_patterns.iter().any(|p| p.matches(id));
                let excluded = exclude_patterns.iter().any(|p| p.matches(id));
                included && !excluded
            })
            .map(String::as_str)
            .collect())
    }
}

fn compile(patterns: &[String]) -> Result<Vec<Pattern>, CoreError> {
    patterns
        .iter()
        .map(|p| {
            Pattern::new(p).map_err(|e| CoreError::InvalidPattern {
                pattern: p.clone(),
                reason: e.to_string(),
            })
        })
        .collect()
}

const DEFAULT_SCENARIO: &str = "default";
const MAX_ATTEMPTS: u32 = 3;

/// Expands a job's scenarios and resolved providers into the work items to run.
///
/// `scenarios` is the already-filtered (`ScenarioFilter::apply`) scenario id
/// list; pass an empty slice when no content tree was reachable (the
/// "no scenarios known" fallback).
pub fn build_work_items(job_name: &str, scenarios: &[String], providers: &[String], mode: ExecutionMode) -> Vec<WorkItem> {
    if mode == ExecutionMode::Fleet {
        let scenario_ids = if scenarios.is_empty() { vec![DEFAULT_SCENARIO.to_string()] } else { scenarios.to_vec() };
        return scenario_ids
            .into_iter()
            .map(|scenario_id| item(job_name, &scenario_id, ""))
            .collect();
    }

    match (scenarios.is_empty(), providers.is_empty()) {
        (true, true) => vec![item(job_name, DEFAULT_SCENARIO, "")],
        (true, false) => providers.iter().map(|p| item(job_name, DEFAULT_SCENARIO, p)).collect(),
        (false, true) => scenarios.iter().map(|s| item(job_name, s, "")).collect(),
        (false, false) => scenarios
            .iter()
            .flat_map(|s| providers.iter().map(move |p| item(job_name, s, p)))
            .collect(),
    }
}

fn item(job_name: &str, scenario_id: &str, provider_id: &str) -> WorkItem {
    WorkItem {
        id: WorkItemId::derive(job_name, scenario_id, provider_id),
        job_id: job_name.to_string(),
        scenario_id: scenario_id.to_string(),
        provider_id: provider_id.to_string(),
        max_attempts: MAX_ATTEMPTS,
    }
}

#[cfg(test)]
#[path = "matrix_tests.rs"]
mod tests;

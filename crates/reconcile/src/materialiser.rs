// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker-pool materialiser (C8): derives a `batch/v1 Job` dispatcher from an
//! `ArenaJob` and re-applies it idempotently via server-side apply.

use std::collections::BTreeMap;

use k8s_openapi::api::batch::v1::{Job as K8sJob, JobSpec, JobStatus};
use k8s_openapi::api::core::v1::{Container, EnvVar, PodSpec, PodTemplateSpec, ResourceRequirements};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, ResourceExt};

use arena_crds::job::ArenaJob;

use crate::error::Result;

pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
pub const MANAGED_BY_VALUE: &str = "arena-operator";
pub const JOB_LABEL: &str = "job";

pub struct DispatcherConfig {
    pub default_image: String,
    pub default_image_pull_policy: String,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self { default_image: "arena-worker:latest".to_string(), default_image_pull_policy: "IfNotPresent".to_string() }
    }
}

pub fn dispatcher_name(job_name: &str) -> String {
    format!("{job_name}-worker")
}

fn env_for_provider_type(provider_type: &str) -> Option<EnvVar> {
    let name = match provider_type {
        "openai" => "OPENAI_API_KEY",
        "claude" | "anthropic" => "ANTHROPIC_API_KEY",
        _ => return None,
    };
    Some(EnvVar { name: name.to_string(), ..Default::default() })
}

/// Builds the desired `batch/v1 Job`. `provider_types` drives env-var
/// derivation (4.5 step 2); `workload_identity_service_account` binds the
/// pod spec to a dedicated `ServiceAccount` when any resolved provider uses
/// workload identity.
pub fn desired_dispatcher(job: &ArenaJob, config: &DispatcherConfig, provider_types: &[String], workload_identity_service_account: Option<&str>) -> K8sJob {
    let name = dispatcher_name(&job.name_any());
    let replicas = job.spec.workers as i32;

    let mut labels = BTreeMap::new();
    labels.insert(JOB_LABEL.to_string(), job.name_any());
    labels.insert(MANAGED_BY_LABEL.to_string(), MANAGED_BY_VALUE.to_string());

    let env: Vec<EnvVar> = provider_types.iter().filter_map(|t| env_for_provider_type(t)).collect();

    let container = Container {
        name: "worker".to_string(),
        image: Some(config.default_image.clone()),
        image_pull_policy: Some(config.default_image_pull_policy.clone()),
        env: if env.is_empty() { None } else { Some(env) },
        resources: Some(ResourceRequirements::default()),
        ..Default::default()
    };

    let pod_spec = PodSpec {
        containers: vec![container],
        restart_policy: Some("Never".to_string()),
        service_account_name: workload_identity_service_account.map(str::to_string),
        ..Default::default()
    };

    let ttl_seconds_after_finished = job.spec.ttl.as_deref().and_then(|ttl| humantime::parse_duration(ttl).ok()).map(|d| d.as_secs() as i32);

    K8sJob {
        metadata: ObjectMeta {
            name: Some(name),
            namespace: job.namespace(),
            labels: Some(labels.clone()),
            owner_references: job.controller_owner_ref(&()).map(|owner| vec![owner]),
            ..Default::default()
        },
        spec: Some(JobSpec {
            parallelism: Some(replicas),
            completions: Some(replicas),
            ttl_seconds_after_finished,
            template: PodTemplateSpec { metadata: Some(ObjectMeta { labels: Some(labels), ..Default::default() }), spec: Some(pod_spec) },
            ..Default::default()
        }),
        status: None,
    }
}

/// Re-materialises the dispatcher. If it already exists, its observed status
/// is returned instead of recreating it; a desired-state diff drives a
/// server-side apply patch rather than delete+recreate.
pub async fn apply_dispatcher(client: &Client, namespace: &str, desired: &K8sJob) -> Result<Option<JobStatus>> {
    let api: Api<K8sJob> = Api::namespaced(client.clone(), namespace);
    let name = desired.metadata.name.clone().unwrap_or_default();

    let existing = api.get_opt(&name).await?;
    let patch = serde_json::to_value(desired)?;
    api.patch(&name, &PatchParams::apply(MANAGED_BY_VALUE).force(), &Patch::Apply(&patch)).await?;

    Ok(existing.and_then(|j| j.status))
}

pub fn is_complete(status: &JobStatus) -> bool {
    status.conditions.as_ref().map(|cs| cs.iter().any(|c| c.type_ == "Complete" && c.status == "True")).unwrap_or(false)
}

pub fn is_failed(status: &JobStatus) -> bool {
    status.conditions.as_ref().map(|cs| cs.iter().any(|c| c.type_ == "Failed" && c.status == "True")).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatcher_name_suffixes_worker() {
        assert_eq!(dispatcher_name("eval-run"), "eval-run-worker");
    }

    #[test]
    fn env_for_known_provider_types() {
        assert_eq!(env_for_provider_type("openai").unwrap().name, "OPENAI_API_KEY");
        assert_eq!(env_for_provider_type("claude").unwrap().name, "ANTHROPIC_API_KEY");
        assert!(env_for_provider_type("unknown").is_none());
    }

    #[test]
    fn is_complete_reads_condition() {
        let status = JobStatus {
            conditions: Some(vec![k8s_openapi::api::batch::v1::JobCondition { type_: "Complete".into(), status: "True".into(), ..Default::default() }]),
            ..Default::default()
        };
        assert!(is_complete(&status));
        assert!(!is_failed(&status));
    }
}

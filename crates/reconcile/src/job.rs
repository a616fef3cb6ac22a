// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job state machine (C5), scenario discovery feeding the matrix builder
//! (C6), and the queue+aggregator wiring (C7) that runs on terminal success.
//!
//! Providers and tool registries aren't their own CRD kind in this system;
//! `providerOverrides`/`toolRegistryOverride` resolve against labelled
//! `core/v1 ConfigMap`s (`data.type` carries the provider's type for env-var
//! derivation). This mirrors how `ArenaSource`/policy objects already use
//! plain Kubernetes primitives as the storage shape instead of inventing
//! bespoke kinds for every concept.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::{ListParams, Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::runtime::events::EventType;
use kube::{Api, Client, ResourceExt};

use arena_core::{build_work_items, ExecutionMode as CoreExecutionMode, ScenarioFilter};
use arena_crds::job::{ArenaJob, ArenaJobStatus, ExecutionMode, JobPhase, JobResult, JobResultSummary, SelectorRef};
use arena_crds::source::{ArenaSource, SourcePhase};
use arena_crds::{Condition, ConditionStatus};
use arena_storage::Queue;

use crate::error::{ReconcileError, Result};
use crate::materialiser::{self, DispatcherConfig};
use crate::util;

pub struct JobContext {
    pub client: Client,
    pub queue: Option<Arc<dyn Queue>>,
    pub content_root: PathBuf,
    pub dispatcher: DispatcherConfig,
    pub events: util::EventRecorder,
}

pub async fn reconcile_arena_job(job: Arc<ArenaJob>, ctx: Arc<JobContext>) -> Result<Action> {
    let Some(namespace) = job.namespace() else {
        return Err(ReconcileError::MissingNamespace { kind: "ArenaJob", namespace: String::new(), name: job.name_any() });
    };
    let api: Api<ArenaJob> = Api::namespaced(ctx.client.clone(), &namespace);
    let events = ctx.events.for_resource(&*job);

    let mut status = job.status.clone().unwrap_or_default();
    status.observed_generation = job.meta().generation.unwrap_or_default();

    if status.phase.map(JobPhase::is_terminal).unwrap_or(false) {
        return Ok(Action::await_change());
    }

    match status.phase {
        None | Some(JobPhase::Pending) => start_job(&job, &namespace, &api, &mut status, &ctx, &events).await,
        Some(JobPhase::Running) => advance_running(&job, &namespace, &api, &mut status, &ctx, &events).await,
        Some(_) => Ok(Action::await_change()),
    }
}

pub fn on_error_arena_job(job: Arc<ArenaJob>, error: &ReconcileError, _ctx: Arc<JobContext>) -> Action {
    tracing::error!(name = %job.name_any(), namespace = ?job.namespace(), error = %error, "ArenaJob reconcile failed");
    Action::requeue(Duration::from_secs(5))
}

async fn start_job(job: &ArenaJob, namespace: &str, api: &Api<ArenaJob>, status: &mut ArenaJobStatus, ctx: &JobContext, events: &util::ScopedEventRecorder) -> Result<Action> {
    let source_api: Api<ArenaSource> = Api::namespaced(ctx.client.clone(), namespace);
    let source = source_api.get_opt(&job.spec.source_ref).await?;
    let ready_artifact = source.as_ref().and_then(|s| s.status.as_ref()).filter(|s| s.phase == Some(SourcePhase::Ready)).and_then(|s| s.artifact.as_ref());

    let Some(artifact) = ready_artifact else {
        util::set_condition(&mut status.conditions, not_ready("SourceValid", "source not ready or has no artifact"));
        status.phase = Some(JobPhase::Failed);
        patch_status(api, job, status.clone()).await?;
        events.emit(EventType::Warning, "SourceNotReady", "referenced ArenaSource is not ready", "Reconcile").await;
        return Ok(Action::await_change());
    };

    if job.spec.execution.mode == ExecutionMode::Fleet && job.spec.execution.target.agent_runtime_ref.is_none() {
        util::set_condition(&mut status.conditions, not_ready("Ready", "fleet execution requires execution.target.agentRuntimeRef"));
        status.phase = Some(JobPhase::Failed);
        patch_status(api, job, status.clone()).await?;
        return Ok(Action::await_change());
    }

    let providers = resolve_providers(&ctx.client, namespace, &job.spec.provider_overrides).await?;
    let provider_names: Vec<String> = providers.iter().map(|p| p.name.clone()).collect();
    let provider_types: Vec<String> = providers.iter().map(|p| p.provider_type.clone()).collect();

    let content_tree = ctx.content_root.join(&artifact.content_path);
    let scenarios = discover_scenarios(&content_tree);
    let filter = ScenarioFilter { include: job.spec.scenarios.include.clone(), exclude: job.spec.scenarios.exclude.clone() };
    let filtered: Vec<String> = filter.apply(&scenarios)?.into_iter().map(str::to_string).collect();

    let mode = match job.spec.execution.mode {
        ExecutionMode::Direct => CoreExecutionMode::Direct,
        ExecutionMode::Fleet => CoreExecutionMode::Fleet,
    };
    let items = build_work_items(&job.name_any(), &filtered, &provider_names, mode);

    if let Some(queue) = &ctx.queue {
        queue.push(&job.name_any(), items.clone()).await?;
    }

    let workload_identity_sa = providers.iter().find(|p| p.workload_identity).map(|_| format!("{}-workload-identity", job.name_any()));
    let desired = materialiser::desired_dispatcher(job, &ctx.dispatcher, &provider_types, workload_identity_sa.as_deref());
    materialiser::apply_dispatcher(&ctx.client, namespace, &desired).await?;

    status.phase = Some(JobPhase::Running);
    status.start_time = Some(Utc::now());
    status.progress.total = items.len() as u32;
    status.progress.pending = items.len() as u32;
    status.active_workers = job.spec.workers;
    util::set_condition(&mut status.conditions, ready("JobCreated", "work items enqueued and dispatcher materialised"));
    patch_status(api, job, status.clone()).await?;
    events.emit(EventType::Normal, "JobCreated", "job dispatcher created", "Reconcile").await;

    Ok(Action::requeue(Duration::from_secs(5)))
}

async fn advance_running(job: &ArenaJob, namespace: &str, api: &Api<ArenaJob>, status: &mut ArenaJobStatus, ctx: &JobContext, events: &util::ScopedEventRecorder) -> Result<Action> {
    let dispatcher_api: Api<k8s_openapi::api::batch::v1::Job> = Api::namespaced(ctx.client.clone(), namespace);
    let name = materialiser::dispatcher_name(&job.name_any());
    let Some(dispatcher) = dispatcher_api.get_opt(&name).await? else {
        return Ok(Action::requeue(Duration::from_secs(5)));
    };
    let Some(dispatcher_status) = dispatcher.status else {
        return Ok(Action::requeue(Duration::from_secs(5)));
    };

    status.active_workers = dispatcher_status.active.unwrap_or(0) as u32;
    if let Some(queue) = &ctx.queue {
        if let Ok(progress) = queue.progress(&job.name_any()).await {
            status.progress.completed = progress.completed as u32;
            status.progress.failed = progress.failed as u32;
            status.progress.pending = progress.pending as u32;
        }
    }

    if materialiser::is_failed(&dispatcher_status) {
        status.phase = Some(JobPhase::Failed);
        status.completion_time = Some(Utc::now());
        util::set_condition(&mut status.conditions, not_ready("Ready", "worker dispatcher reported Failed"));
        patch_status(api, job, status.clone()).await?;
        return Ok(Action::await_change());
    }

    if materialiser::is_complete(&dispatcher_status) {
        status.phase = Some(JobPhase::Succeeded);
        status.completion_time = Some(Utc::now());
        if let Some(queue) = &ctx.queue {
            match aggregate(queue.as_ref(), &job.name_any()).await {
                Ok(summary) => status.result = Some(JobResult { summary }),
                Err(error) => tracing::warn!(job = %job.name_any(), error = %error, "aggregator failed; job still succeeds"),
            }
        }
        util::set_condition(&mut status.conditions, ready("Ready", "job completed"));
        patch_status(api, job, status.clone()).await?;
        return Ok(Action::await_change());
    }

    patch_status(api, job, status.clone()).await?;
    Ok(Action::requeue(Duration::from_secs(5)))
}

struct ResolvedProvider {
    name: String,
    provider_type: String,
    workload_identity: bool,
}

/// Resolves `providerOverrides` via label-selector lookups, one list per
/// group; dedup is per-group only (the same provider may legitimately
/// appear under more than one group).
async fn resolve_providers(client: &Client, namespace: &str, overrides: &BTreeMap<String, SelectorRef>) -> Result<Vec<ResolvedProvider>> {
    let api: Api<ConfigMap> = Api::namespaced(client.clone(), namespace);
    let mut resolved = Vec::new();
    for selector in overrides.values() {
        let label_selector = selector.selector.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join(",");
        let configmaps = api.list(&ListParams::default().labels(&label_selector)).await?;
        let mut seen = std::collections::HashSet::new();
        for cm in configmaps.items {
            let name = cm.name_any();
            if !seen.insert(name.clone()) {
                continue;
            }
            let data = cm.data.unwrap_or_default();
            resolved.push(ResolvedProvider {
                name,
                provider_type: data.get("type").cloned().unwrap_or_default(),
                workload_identity: data.get("workloadIdentity").map(|v| v == "true").unwrap_or(false),
            });
        }
    }
    Ok(resolved)
}

/// Scenario ids are the file stems of `scenarios/*.toml` under the source's
/// synced content tree. An unreachable content root is the "no scenarios
/// known" fallback, not an error.
fn discover_scenarios(content_root: &Path) -> Vec<String> {
    let scenarios_dir = content_root.join("scenarios");
    let Ok(entries) = std::fs::read_dir(&scenarios_dir) else { return Vec::new() };
    let mut ids: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().map(|ext| ext == "toml").unwrap_or(false))
        .filter_map(|e| e.path().file_stem().map(|s| s.to_string_lossy().into_owned()))
        .collect();
    ids.sort();
    ids
}

async fn aggregate(queue: &dyn Queue, job_id: &str) -> Result<JobResultSummary> {
    let progress = queue.progress(job_id).await?;
    let total_runs = (progress.completed + progress.failed) as u32;
    let pass_rate = if total_runs == 0 { 0.0 } else { (progress.completed as f64 / total_runs as f64 * 1000.0).round() / 10.0 };
    Ok(JobResultSummary { pass_rate, total_runs, total_tokens: 0, total_cost_usd: 0.0 })
}

async fn patch_status(api: &Api<ArenaJob>, job: &ArenaJob, status: ArenaJobStatus) -> Result<()> {
    let patch = serde_json::json!({ "status": status });
    match api.patch_status(&job.name_any(), &PatchParams::apply("arena-operator"), &Patch::Merge(&patch)).await {
        Ok(_) => Ok(()),
        Err(error) => util::conflict_to_requeue(error).map(|_| ()).or(Ok(())),
    }
}

fn ready(reason: &str, message: &str) -> Condition {
    Condition { type_: "Ready".into(), status: ConditionStatus::True, reason: reason.into(), message: message.into(), observed_generation: 0, last_transition_time: Utc::now() }
}

fn not_ready(reason: &str, message: &str) -> Condition {
    Condition { type_: "Ready".into(), status: ConditionStatus::False, reason: reason.into(), message: message.into(), observed_generation: 0, last_transition_time: Utc::now() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discover_scenarios_reads_toml_stems_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("scenarios")).unwrap();
        std::fs::write(dir.path().join("scenarios/billing.toml"), "").unwrap();
        std::fs::write(dir.path().join("scenarios/auth.toml"), "").unwrap();
        std::fs::write(dir.path().join("scenarios/notes.txt"), "").unwrap();
        assert_eq!(discover_scenarios(dir.path()), vec!["auth".to_string(), "billing".to_string()]);
    }

    #[test]
    fn discover_scenarios_missing_dir_is_empty() {
        assert!(discover_scenarios(Path::new("/nonexistent/tree")).is_empty());
    }

    #[tokio::test]
    async fn aggregate_computes_one_decimal_pass_rate() {
        let queue = arena_storage::InMemoryQueue::new();
        queue.push("job-1", vec![]).await.unwrap();
        queue.ack("job-1", "a", b"ok".to_vec()).await.unwrap();
        queue.ack("job-1", "b", b"ok".to_vec()).await.unwrap();
        queue.ack("job-1", "c", Vec::new()).await.unwrap();
        let summary = aggregate(&queue, "job-1").await.unwrap();
        assert_eq!(summary.total_runs, 3);
        assert!((summary.pass_rate - 66.7).abs() < 0.01);
    }
}

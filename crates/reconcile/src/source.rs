// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Content-sync reconciler (C4): drives `ArenaSource` and `ArenaTemplateSource`
//! through `pending → fetching → {ready, error}`, coordinating with the async
//! fetch coordinator (C2) and the filesystem versioner (C1).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use kube::api::{Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::runtime::events::EventType;
use kube::{Api, Client, ResourceExt};

use arena_core::Artifact;
use arena_crds::source::{ArenaSource, ArenaSourceStatus, ArenaTemplateSource, ArenaTemplateSourceStatus, OriginConfig, SourcePhase, TemplateMetadata};
use arena_crds::{Condition, ConditionStatus};
use arena_drivers::fetcher::{ConfigMapFetcher, Fetcher, GitFetcher, OciFetcher};
use arena_drivers::{load_credentials, Credentials};

use crate::coordinator::{self, Coordinator, FetchOutcome};
use crate::error::{ReconcileError, Result};
use crate::util;

const REQUEUE_WHILE_FETCHING: Duration = Duration::from_secs(2);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

pub struct SourceContext {
    pub client: Client,
    pub coordinator: Arc<Coordinator>,
    pub content_root: PathBuf,
    pub events: util::EventRecorder,
}

/// `{content_root}/{workspace}/{namespace}/{target_path}`, the directory
/// `sync` promotes fetched content into (see §6 on-disk layout).
fn workspace_path(content_root: &std::path::Path, workspace: &str, namespace: &str, target_path: Option<&str>) -> PathBuf {
    let mut path = content_root.join(workspace).join(namespace);
    if let Some(target) = target_path {
        path = path.join(target);
    }
    path
}

fn count_versions(versions_dir: &std::path::Path) -> u32 {
    std::fs::read_dir(versions_dir)
        .map(|entries| entries.filter_map(|e| e.ok()).filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false)).count() as u32)
        .unwrap_or(0)
}

pub async fn build_fetcher(client: &Client, namespace: &str, origin: &OriginConfig, credentials_ref: Option<&str>) -> Result<Arc<dyn Fetcher>> {
    let credentials = match credentials_ref {
        Some(name) => load_credentials(client, namespace, name).await?,
        None => Credentials::None,
    };
    Ok(match origin {
        OriginConfig::Git { url, reference, sub_path } => {
            Arc::new(GitFetcher { url: url.clone(), reference: reference.clone(), sub_path: sub_path.clone(), credentials })
        }
        OriginConfig::Oci { image, insecure } => {
            let (registry, repository, reference) = split_image_ref(image);
            Arc::new(OciFetcher { registry, repository, reference, insecure: *insecure, credentials })
        }
        OriginConfig::Configmap { name } => Arc::new(ConfigMapFetcher { client: client.clone(), namespace: namespace.to_string(), name: name.clone() }),
    })
}

fn split_image_ref(image: &str) -> (String, String, String) {
    let (path, reference) = image.split_once(':').unwrap_or((image, "latest"));
    let (registry, repository) = path.split_once('/').unwrap_or(("docker.io", path));
    (registry.to_string(), repository.to_string(), reference.to_string())
}

pub async fn reconcile_arena_source(source: Arc<ArenaSource>, ctx: Arc<SourceContext>) -> Result<Action> {
    let Some(namespace) = source.namespace() else {
        return Err(ReconcileError::MissingNamespace { kind: "ArenaSource", namespace: String::new(), name: source.name_any() });
    };
    let resource_key = coordinator::key(&namespace, &source.name_any());
    let api: Api<ArenaSource> = Api::namespaced(ctx.client.clone(), &namespace);
    let events = ctx.events.for_resource(&*source);

    let mut status = source.status.clone().unwrap_or_default();
    status.observed_generation = source.meta().generation.unwrap_or_default();

    if source.spec.suspend {
        ctx.coordinator.drain(&resource_key);
        util::set_condition(&mut status.conditions, not_ready("Suspended", "source is suspended"));
        status.phase = Some(SourcePhase::Pending);
        patch_status(&api, &source, status).await?;
        return Ok(Action::await_change());
    }

    let Some(interval) = parse_duration(&source.spec.interval) else {
        util::set_condition(&mut status.conditions, not_ready("InvalidInterval", "spec.interval failed to parse"));
        status.phase = Some(SourcePhase::Error);
        patch_status(&api, &source, status).await?;
        return Ok(Action::await_change());
    };
    let timeout = source.spec.timeout.as_deref().and_then(parse_duration).unwrap_or(DEFAULT_TIMEOUT);

    if let Some(outcome) = ctx.coordinator.take_result(&resource_key) {
        let workspace = util::resolve_workspace(Some(&ctx.client), &namespace).await;
        let target = workspace_path(&ctx.content_root, &workspace, &namespace, source.spec.target_path.as_deref());
        let failed = matches!(outcome, FetchOutcome::Failed(_));
        apply_outcome(&api, &source, &mut status, outcome, interval, &target).await?;
        if failed {
            events.emit(EventType::Warning, "FetchFailed", "source content fetch failed", "Reconcile").await;
        } else {
            events.emit(EventType::Normal, "FetchSucceeded", "source content synced", "Reconcile").await;
        }
        return Ok(Action::requeue(interval));
    }

    if ctx.coordinator.is_in_progress(&resource_key) {
        return Ok(Action::requeue(REQUEUE_WHILE_FETCHING));
    }

    if needs_fetch(&status, Utc::now()) {
        status.phase = Some(SourcePhase::Fetching);
        util::set_condition(&mut status.conditions, not_ready("Fetching", "fetch in progress"));
        patch_status(&api, &source, status).await?;
        events.emit(EventType::Normal, "FetchStarted", "starting source content fetch", "Reconcile").await;

        let fetcher = build_fetcher(&ctx.client, &namespace, &source.spec.origin, source.spec.credentials_ref.as_deref()).await?;
        let current_revision = source.status.as_ref().and_then(|s| s.artifact.as_ref()).map(|a| a.revision.clone());
        let dest = ctx.content_root.join(&namespace).join(&source.name_any());
        ctx.coordinator.start_fetch(resource_key, fetcher, current_revision, timeout, dest);
        return Ok(Action::requeue(REQUEUE_WHILE_FETCHING));
    }

    let next_fetch = status.next_fetch_time.unwrap_or_else(Utc::now);
    Ok(Action::requeue(positive_duration_until(next_fetch)))
}

pub fn on_error_arena_source(source: Arc<ArenaSource>, error: &ReconcileError, _ctx: Arc<SourceContext>) -> Action {
    tracing::error!(name = %source.name_any(), namespace = ?source.namespace(), error = %error, "ArenaSource reconcile failed");
    Action::requeue(Duration::from_secs(5))
}

fn needs_fetch(status: &ArenaSourceStatus, now: DateTime<Utc>) -> bool {
    match &status.artifact {
        None => true,
        Some(_) => status.next_fetch_time.map(|next| now >= next).unwrap_or(true),
    }
}

async fn apply_outcome(
    api: &Api<ArenaSource>,
    source: &ArenaSource,
    status: &mut ArenaSourceStatus,
    outcome: FetchOutcome,
    interval: Duration,
    workspace_target: &std::path::Path,
) -> Result<()> {
    match outcome {
        FetchOutcome::Failed(reason) => {
            status.phase = Some(SourcePhase::Error);
            util::set_condition(&mut status.conditions, not_ready("FetchFailed", &reason));
        }
        FetchOutcome::UpToDate { revision } => {
            if let Some(artifact) = &mut status.artifact {
                artifact.revision = revision;
                artifact.last_update_time = Utc::now();
            }
            status.phase = Some(SourcePhase::Ready);
            status.last_fetch_time = Some(Utc::now());
            status.next_fetch_time = Some(Utc::now() + chrono::Duration::from_std(interval).unwrap_or_default());
            util::set_condition(&mut status.conditions, ready("FetchSucceeded", "source content unchanged"));
        }
        FetchOutcome::Fetched(artifact) => {
            publish_artifact(status, artifact, interval, workspace_target)?;
            util::set_condition(&mut status.conditions, ready("FetchSucceeded", "source content synced"));
        }
    }
    patch_status(api, source, status.clone()).await
}

fn publish_artifact(status: &mut ArenaSourceStatus, artifact: Artifact, interval: Duration, workspace_target: &std::path::Path) -> Result<()> {
    let fetched_tree = std::path::PathBuf::from(&artifact.content_path);
    let (content_path, version) = arena_storage::sync(&fetched_tree, workspace_target, &artifact.checksum, arena_storage::DEFAULT_MAX_VERSIONS)?;
    let version_count = count_versions(&workspace_target.join(".arena").join("versions"));

    status.artifact = Some(arena_crds::source::ArtifactStatus {
        revision: artifact.revision,
        content_path,
        version: version.clone(),
        checksum: artifact.checksum,
        size: artifact.size,
        last_update_time: Utc::now(),
    });
    status.phase = Some(SourcePhase::Ready);
    status.head_version = Some(version);
    status.version_count = version_count;
    status.last_fetch_time = Some(Utc::now());
    status.next_fetch_time = Some(Utc::now() + chrono::Duration::from_std(interval).unwrap_or_default());
    Ok(())
}

async fn patch_status(api: &Api<ArenaSource>, source: &ArenaSource, status: ArenaSourceStatus) -> Result<()> {
    let patch = serde_json::json!({ "status": status });
    match api.patch_status(&source.name_any(), &PatchParams::apply("arena-operator"), &Patch::Merge(&patch)).await {
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

fn parse_duration(value: &str) -> Option<Duration> {
    let duration = humantime::parse_duration(value).ok()?;
    if duration.is_zero() {
        None
    } else {
        Some(duration)
    }
}

fn positive_duration_until(target: DateTime<Utc>) -> Duration {
    let delta = target - Utc::now();
    delta.to_std().unwrap_or(Duration::from_secs(1))
}

/// Discovers templates under `templates_path` in a fetched content tree,
/// used by the `ArenaTemplateSource` variant of this reconciler.
pub fn discover_templates(content_root: &std::path::Path, templates_path: &str) -> Result<Vec<TemplateMetadata>> {
    let root = content_root.join(templates_path);
    if !root.exists() {
        return Ok(Vec::new());
    }
    let mut out = Vec::new();
    for entry in std::fs::read_dir(&root)? {
        let entry = entry?;
        if entry.path().is_file() {
            let name = entry.file_name().to_string_lossy().into_owned();
            let path = entry.path().strip_prefix(content_root).unwrap_or(&entry.path()).to_string_lossy().into_owned();
            out.push(TemplateMetadata { name, path });
        }
    }
    out.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(out)
}

pub async fn reconcile_arena_template_source(source: Arc<ArenaTemplateSource>, ctx: Arc<SourceContext>) -> Result<Action> {
    let Some(namespace) = source.namespace() else {
        return Err(ReconcileError::MissingNamespace { kind: "ArenaTemplateSource", namespace: String::new(), name: source.name_any() });
    };
    let resource_key = coordinator::key(&namespace, &source.name_any());
    let api: Api<ArenaTemplateSource> = Api::namespaced(ctx.client.clone(), &namespace);

    let mut status = source.status.clone().unwrap_or_default();
    status.observed_generation = source.meta().generation.unwrap_or_default();

    if source.spec.suspend {
        ctx.coordinator.drain(&resource_key);
        util::set_condition(&mut status.conditions, not_ready("Suspended", "source is suspended"));
        status.phase = Some(SourcePhase::Pending);
        patch_template_status(&api, &source, status).await?;
        return Ok(Action::await_change());
    }

    let Some(interval) = parse_duration(&source.spec.sync_interval) else {
        util::set_condition(&mut status.conditions, not_ready("InvalidInterval", "spec.syncInterval failed to parse"));
        status.phase = Some(SourcePhase::Error);
        patch_template_status(&api, &source, status).await?;
        return Ok(Action::await_change());
    };

    if let Some(outcome) = ctx.coordinator.take_result(&resource_key) {
        let workspace = util::resolve_workspace(Some(&ctx.client), &namespace).await;
        let target = workspace_path(&ctx.content_root, &workspace, &namespace, source.spec.target_path.as_deref());
        apply_template_outcome(&api, &source, &mut status, outcome, interval, &target).await?;
        return Ok(Action::requeue(interval));
    }

    if ctx.coordinator.is_in_progress(&resource_key) {
        return Ok(Action::requeue(REQUEUE_WHILE_FETCHING));
    }

    if status.artifact.is_none() || status.next_fetch_time.map(|next| Utc::now() >= next).unwrap_or(true) {
        status.phase = Some(SourcePhase::Fetching);
        util::set_condition(&mut status.conditions, not_ready("Fetching", "fetch in progress"));
        patch_template_status(&api, &source, status).await?;

        let fetcher = build_fetcher(&ctx.client, &namespace, &source.spec.origin, source.spec.credentials_ref.as_deref()).await?;
        let current_revision = source.status.as_ref().and_then(|s| s.artifact.as_ref()).map(|a| a.revision.clone());
        let dest = ctx.content_root.join(&namespace).join(source.name_any());
        ctx.coordinator.start_fetch(resource_key, fetcher, current_revision, DEFAULT_TIMEOUT, dest);
        return Ok(Action::requeue(REQUEUE_WHILE_FETCHING));
    }

    Ok(Action::requeue(positive_duration_until(status.next_fetch_time.unwrap_or_else(Utc::now))))
}

pub fn on_error_arena_template_source(source: Arc<ArenaTemplateSource>, error: &ReconcileError, _ctx: Arc<SourceContext>) -> Action {
    tracing::error!(name = %source.name_any(), namespace = ?source.namespace(), error = %error, "ArenaTemplateSource reconcile failed");
    Action::requeue(Duration::from_secs(5))
}

async fn apply_template_outcome(
    api: &Api<ArenaTemplateSource>,
    source: &ArenaTemplateSource,
    status: &mut ArenaTemplateSourceStatus,
    outcome: FetchOutcome,
    interval: Duration,
    workspace_target: &std::path::Path,
) -> Result<()> {
    match outcome {
        FetchOutcome::Failed(reason) => {
            status.phase = Some(SourcePhase::Error);
            util::set_condition(&mut status.conditions, not_ready("FetchFailed", &reason));
        }
        FetchOutcome::UpToDate { revision } => {
            if let Some(artifact) = &mut status.artifact {
                artifact.revision = revision;
            }
            status.phase = Some(SourcePhase::Ready);
            status.next_fetch_time = Some(Utc::now() + chrono::Duration::from_std(interval).unwrap_or_default());
            util::set_condition(&mut status.conditions, ready("FetchSucceeded", "template source content unchanged"));
        }
        FetchOutcome::Fetched(artifact) => {
            let fetched_tree = std::path::PathBuf::from(&artifact.content_path);
            let sync_result = arena_storage::sync(&fetched_tree, workspace_target, &artifact.checksum, arena_storage::DEFAULT_MAX_VERSIONS);
            match sync_result {
                Ok((content_path, version)) => {
                    match discover_templates(workspace_target, &source.spec.templates_path) {
                        Ok(templates) => {
                            status.templates = templates.clone();
                            status.template_count = templates.len() as u32;
                            write_template_index(workspace_target, &source.name_any(), &templates)?;
                            status.artifact = Some(arena_crds::source::ArtifactStatus {
                                revision: artifact.revision,
                                content_path,
                                version: version.clone(),
                                checksum: artifact.checksum,
                                size: artifact.size,
                                last_update_time: Utc::now(),
                            });
                            status.phase = Some(SourcePhase::Ready);
                            status.head_version = Some(version);
                            status.version_count = count_versions(&workspace_target.join(".arena").join("versions"));
                            status.next_fetch_time = Some(Utc::now() + chrono::Duration::from_std(interval).unwrap_or_default());
                            util::set_condition(&mut status.conditions, ready("FetchSucceeded", "template source content synced"));
                        }
                        Err(error) => {
                            // Fetched artifact is kept; only discovery failed.
                            status.phase = Some(SourcePhase::Error);
                            util::set_condition(&mut status.conditions, not_ready("TemplateDiscoveryFailed", &error.to_string()));
                        }
                    }
                }
                Err(error) => {
                    status.phase = Some(SourcePhase::Error);
                    util::set_condition(&mut status.conditions, not_ready("FetchFailed", &error.to_string()));
                }
            }
        }
    }
    patch_template_status(api, source, status.clone()).await
}

/// Writes the per-source template index atomically (temp-file rename) to
/// `{workspace}/arena/template-indexes/{sourceName}.json`.
fn write_template_index(workspace_root: &std::path::Path, source_name: &str, templates: &[TemplateMetadata]) -> Result<()> {
    let indexes_dir = workspace_root.join("arena").join("template-indexes");
    std::fs::create_dir_all(&indexes_dir)?;
    let index_path = indexes_dir.join(format!("{source_name}.json"));
    let tmp_path = indexes_dir.join(format!("{source_name}.json.tmp"));
    std::fs::write(&tmp_path, serde_json::to_vec(templates)?)?;
    std::fs::rename(&tmp_path, &index_path)?;
    Ok(())
}

async fn patch_template_status(api: &Api<ArenaTemplateSource>, source: &ArenaTemplateSource, status: ArenaTemplateSourceStatus) -> Result<()> {
    let patch = serde_json::json!({ "status": status });
    match api.patch_status(&source.name_any(), &PatchParams::apply("arena-operator"), &Patch::Merge(&patch)).await {
        Ok(_) => Ok(()),
        Err(error) => util::conflict_to_requeue(error).map(|_| ()).or(Ok(())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn needs_fetch_is_true_with_no_artifact() {
        let status = ArenaSourceStatus::default();
        assert!(needs_fetch(&status, Utc::now()));
    }

    #[test]
    fn needs_fetch_is_false_before_next_fetch_time() {
        let mut status = ArenaSourceStatus::default();
        status.artifact = Some(arena_crds::source::ArtifactStatus {
            revision: "r".into(),
            content_path: "p".into(),
            version: "v".into(),
            checksum: "c".into(),
            size: 1,
            last_update_time: Utc::now(),
        });
        status.next_fetch_time = Some(Utc::now() + chrono::Duration::hours(1));
        assert!(!needs_fetch(&status, Utc::now()));
    }

    #[test]
    fn invalid_interval_is_rejected() {
        assert!(parse_duration("").is_none());
        assert!(parse_duration("0s").is_none());
        assert!(parse_duration("5m").is_some());
    }

    #[test]
    fn split_image_ref_handles_registry_and_tag() {
        assert_eq!(split_image_ref("ghcr.io/arena/pack:v2"), ("ghcr.io".into(), "arena/pack".into(), "v2".into()));
        assert_eq!(split_image_ref("pack"), ("docker.io".into(), "pack".into(), "latest".into()));
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! arena-operator: the binary entrypoint. Builds a `kube::Client`, wires one
//! `Controller` per reconciled kind, spawns the license-activation loop
//! (C13, not a `Controller`), and drives everything to completion
//! concurrently until a shutdown signal arrives.

mod env;

use std::sync::Arc;

use futures::StreamExt;
use kube::runtime::events::Reporter;
use kube::runtime::{watcher, Controller};
use kube::{Api, Client};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use arena_crds::devsession::ArenaDevSession;
use arena_crds::job::ArenaJob;
use arena_crds::policy::SessionPrivacyPolicy;
use arena_crds::source::{ArenaSource, ArenaTemplateSource};
use arena_drivers::kms::MockKms;
use arena_drivers::license::LicenseClient;
use arena_reconcile::coordinator::Coordinator;
use arena_reconcile::devsession::{on_error_dev_session, reconcile_dev_session, DevSessionContext};
use arena_reconcile::job::{on_error_arena_job, reconcile_arena_job, JobContext};
use arena_reconcile::keyrotation::{on_error_key_rotation, reconcile_key_rotation, InMemoryReEncryptionStore, KeyRotationContext};
use arena_reconcile::license::{run_license_loop, LicenseContext};
use arena_reconcile::materialiser::DispatcherConfig;
use arena_reconcile::policy::{on_error_policy, reconcile_policy, PolicyContext};
use arena_reconcile::source::{on_error_arena_source, on_error_arena_template_source, reconcile_arena_source, reconcile_arena_template_source, SourceContext};
use arena_reconcile::util::EventRecorder;
use arena_storage::{InMemoryQueue, Queue, RemoteQueueClient};

const CONTROLLER_NAME: &str = "arena-operator";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    setup_logging();

    let client = Client::try_default().await?;
    let events = EventRecorder::new(Some(client.clone()), Reporter { controller: CONTROLLER_NAME.to_string(), instance: None });

    let queue = build_queue().await?;
    let content_root = env::content_root();
    std::fs::create_dir_all(&content_root)?;

    let source_ctx = Arc::new(SourceContext {
        client: client.clone(),
        coordinator: Coordinator::new(),
        content_root: content_root.clone(),
        events: events.clone(),
    });
    let job_ctx = Arc::new(JobContext {
        client: client.clone(),
        queue: Some(queue),
        content_root: content_root.clone(),
        dispatcher: DispatcherConfig { default_image: env::worker_image(), default_image_pull_policy: env::worker_image_pull_policy() },
        events: events.clone(),
    });
    let devsession_ctx = Arc::new(DevSessionContext { client: client.clone(), events: events.clone() });
    let policy_ctx = Arc::new(PolicyContext { client: client.clone(), shared_namespace: env::shared_namespace(), events: events.clone() });
    let keyrotation_ctx = Arc::new(KeyRotationContext {
        client: client.clone(),
        kms: Arc::new(MockKms::new()),
        store: Arc::new(InMemoryReEncryptionStore::new()),
        events: events.clone(),
    });
    let license_ctx = LicenseContext {
        client: client.clone(),
        license_client: LicenseClient::new(env::license_server_url())?,
        secret_name: env::license_secret_name(),
        secret_namespace: env::license_secret_namespace(),
        cluster_name: env::cluster_name(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        events,
    };

    info!("arena-operator starting, content root {}", content_root.display());

    tokio::spawn(run_license_loop(license_ctx));

    let sources = Api::<ArenaSource>::all(client.clone());
    let template_sources = Api::<ArenaTemplateSource>::all(client.clone());
    let jobs = Api::<ArenaJob>::all(client.clone());
    let dispatcher_jobs = Api::<k8s_openapi::api::batch::v1::Job>::all(client.clone());
    let dev_sessions = Api::<ArenaDevSession>::all(client.clone());
    let policies = Api::<SessionPrivacyPolicy>::all(client.clone());

    tokio::spawn(
        Controller::new(sources, watcher::Config::default())
            .run(reconcile_arena_source, on_error_arena_source, source_ctx.clone())
            .for_each(|res| async move { log_result("ArenaSource", res) }),
    );
    tokio::spawn(
        Controller::new(template_sources, watcher::Config::default())
            .run(reconcile_arena_template_source, on_error_arena_template_source, source_ctx)
            .for_each(|res| async move { log_result("ArenaTemplateSource", res) }),
    );
    tokio::spawn(
        Controller::new(jobs, watcher::Config::default())
            .owns(dispatcher_jobs, watcher::Config::default())
            .run(reconcile_arena_job, on_error_arena_job, job_ctx)
            .for_each(|res| async move { log_result("ArenaJob", res) }),
    );
    tokio::spawn(
        Controller::new(dev_sessions, watcher::Config::default())
            .run(reconcile_dev_session, on_error_dev_session, devsession_ctx)
            .for_each(|res| async move { log_result("ArenaDevSession", res) }),
    );
    tokio::spawn(
        Controller::new(policies.clone(), watcher::Config::default())
            .run(reconcile_policy, on_error_policy, policy_ctx)
            .for_each(|res| async move { log_result("SessionPrivacyPolicy/policy", res) }),
    );
    tokio::spawn(
        Controller::new(policies, watcher::Config::default())
            .run(reconcile_key_rotation, on_error_key_rotation, keyrotation_ctx)
            .for_each(|res| async move { log_result("SessionPrivacyPolicy/key-rotation", res) }),
    );

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        _ = sigint.recv() => info!("received SIGINT, shutting down"),
    }

    Ok(())
}

fn log_result<T, E: std::fmt::Display>(kind: &str, res: Result<T, E>) {
    match res {
        Ok(_) => tracing::debug!(kind, "reconciled"),
        Err(error) => error!(kind, %error, "reconcile failed"),
    }
}

async fn build_queue() -> Result<Arc<dyn Queue>, Box<dyn std::error::Error>> {
    Ok(match env::remote_queue_addr() {
        Some(address) => {
            info!(address, "dialing remote queue backend");
            Arc::new(RemoteQueueClient::dial(&address).await?)
        }
        None => Arc::new(InMemoryQueue::new()),
    })
}

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if env::log_format_human() {
        registry.with(fmt::layer()).init();
    } else {
        registry.with(fmt::layer().json()).init();
    }
}

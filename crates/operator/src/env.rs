// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the operator binary.

use std::path::PathBuf;

/// Content root all synced artifacts are promoted under (A2).
pub fn content_root() -> PathBuf {
    std::env::var("ARENA_CONTENT_ROOT").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("/var/lib/arena/content"))
}

/// Default worker dispatcher image when a job doesn't override it.
pub fn worker_image() -> String {
    std::env::var("ARENA_WORKER_IMAGE").unwrap_or_else(|_| "arena-worker:latest".to_string())
}

pub fn worker_image_pull_policy() -> String {
    std::env::var("ARENA_WORKER_IMAGE_PULL_POLICY").unwrap_or_else(|_| "IfNotPresent".to_string())
}

/// Namespace the effective-policy publisher and license state ConfigMap live in.
pub fn shared_namespace() -> String {
    std::env::var("ARENA_SHARED_NAMESPACE").unwrap_or_else(|_| "arena-system".to_string())
}

/// `host:port` of the remote queue backend. Unset means the in-memory fallback.
pub fn remote_queue_addr() -> Option<String> {
    std::env::var("ARENA_REMOTE_QUEUE_ADDR").ok().filter(|s| !s.is_empty())
}

pub fn license_server_url() -> String {
    std::env::var("ARENA_LICENSE_SERVER_URL").unwrap_or_else(|_| "https://license.arena.dev".to_string())
}

pub fn license_secret_name() -> String {
    std::env::var("ARENA_LICENSE_SECRET_NAME").unwrap_or_else(|_| arena_reconcile::license::DEFAULT_LICENSE_SECRET.to_string())
}

pub fn license_secret_namespace() -> String {
    std::env::var("ARENA_LICENSE_SECRET_NAMESPACE").unwrap_or_else(|_| arena_reconcile::license::DEFAULT_LICENSE_NAMESPACE.to_string())
}

pub fn cluster_name() -> String {
    std::env::var("ARENA_CLUSTER_NAME").unwrap_or_else(|_| "default".to_string())
}

/// Human-readable (compact) logs instead of JSON, for local development.
pub fn log_format_human() -> bool {
    std::env::var("ARENA_LOG_HUMAN").map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false)
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! `kube::CustomResource` definitions for the Arena operator's CRDs.
//!
//! Every type here is plain data plus derive macros — no reconciliation
//! logic. `arena-reconcile` is the only consumer that talks to the API
//! server; this crate just owns the wire shape and its generated schema.

pub mod condition;
pub mod devsession;
pub mod job;
pub mod policy;
pub mod source;

pub use condition::{Condition, ConditionStatus};
pub use devsession::{ArenaDevSession, ArenaDevSessionSpec, ArenaDevSessionStatus, DevSessionPhase};
pub use job::{ArenaJob, ArenaJobSpec, ArenaJobStatus, ExecutionSpec, JobPhase, JobProgress, JobResult, ScenarioSpec};
pub use policy::{SessionPrivacyPolicy, SessionPrivacyPolicySpec, SessionPrivacyPolicyStatus};
pub use source::{ArenaSource, ArenaSourceSpec, ArenaSourceStatus, ArenaTemplateSource, ArenaTemplateSourceSpec, ArenaTemplateSourceStatus, ArtifactStatus, OriginConfig, SourcePhase};

/// Shared owner-reference convention: group used by every CRD in this crate.
pub const GROUP: &str = "arena.dev";
pub const VERSION: &str = "v1";

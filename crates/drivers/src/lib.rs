// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Origin-specific IO: fetchers (C3), credential loading, the KMS provider
//! abstraction for key rotation (C11), and the license-activation client
//! (C13). Nothing in this crate reconciles anything; `arena-reconcile` owns
//! the control loops that call into it.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod credentials;
pub mod error;
pub mod fetcher;
pub mod kms;
pub mod license;

pub use credentials::{load_credentials, Credentials};
pub use error::DriverError;
pub use fetcher::{ConfigMapFetcher, FetchedArtifact, Fetcher, GitFetcher, OciFetcher};
pub use kms::{EncryptedPayload, KmsProvider, MockKms};
pub use license::{cluster_fingerprint, ActivationResponse, HeartbeatResponse, LicenseClient};

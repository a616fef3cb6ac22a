// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue + aggregator interfaces (C7).
//!
//! `Queue` is the capability set every job-execution path pushes work items
//! through and pulls results from. [`InMemoryQueue`] is the default
//! fallback (a per-job ring backed by [`dashmap::DashMap`]); [`RemoteQueueClient`]
//! dials an external cache service speaking a Redis-compatible wire protocol.
//! Selection between the two happens once, at startup, in `arena-reconcile`.

use std::collections::VecDeque;
use std::sync::Arc;

use arena_core::WorkItem;
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::error::StorageError;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueProgress {
    pub total: usize,
    pub pending: usize,
    pub completed: usize,
    pub failed: usize,
}

#[async_trait]
pub trait Queue: Send + Sync {
    async fn push(&self, job_id: &str, items: Vec<WorkItem>) -> Result<(), StorageError>;
    async fn pop(&self, job_id: &str) -> Result<Option<WorkItem>, StorageError>;
    async fn ack(&self, job_id: &str, item_id: &str, result: Vec<u8>) -> Result<(), StorageError>;
    async fn progress(&self, job_id: &str) -> Result<QueueProgress, StorageError>;
}

#[derive(Default)]
struct JobRing {
    pending: VecDeque<WorkItem>,
    total: usize,
    completed: usize,
    failed: usize,
    results: Vec<(String, Vec<u8>)>,
}

/// Default in-memory fallback: one FIFO ring per job, guarded by a
/// `parking_lot::Mutex` inside a `DashMap` entry so different jobs never
/// contend on the same lock.
#[derive(Default)]
pub struct InMemoryQueue {
    jobs: DashMap<String, Mutex<JobRing>>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Queue for InMemoryQueue {
    async fn push(&self, job_id: &str, items: Vec<WorkItem>) -> Result<(), StorageError> {
        let mut ring = self.jobs.entry(job_id.to_string()).or_default().lock();
        ring.total += items.len();
        ring.pending.extend(items);
        Ok(())
    }

    async fn pop(&self, job_id: &str) -> Result<Option<WorkItem>, StorageError> {
        let Some(entry) = self.jobs.get(job_id) else { return Ok(None) };
        let mut ring = entry.lock();
        Ok(ring.pending.pop_front())
    }

    async fn ack(&self, job_id: &str, item_id: &str, result: Vec<u8>) -> Result<(), StorageError> {
        let entry = self.jobs.get(job_id).ok_or_else(|| StorageError::QueueEmpty { job_id: job_id.to_string() })?;
        let mut ring = entry.lock();
        // An ack with a non-empty payload marking success vs failure is
        // `arena-reconcile`'s concern; here we just track the terminal count.
        if result.is_empty() {
            ring.failed += 1;
        } else {
            ring.completed += 1;
        }
        ring.results.push((item_id.to_string(), result));
        Ok(())
    }

    async fn progress(&self, job_id: &str) -> Result<QueueProgress, StorageError> {
        let Some(entry) = self.jobs.get(job_id) else {
            return Ok(QueueProgress::default());
        };
        let ring = entry.lock();
        Ok(QueueProgress {
            total: ring.total,
            pending: ring.pending.len(),
            completed: ring.completed,
            failed: ring.failed,
        })
    }
}

/// Thin client against a remote cache service speaking a Redis-compatible
/// wire protocol. Dialing happens once at construction; a dial failure is
/// propagated rather than silently falling back to [`InMemoryQueue`].
pub struct RemoteQueueClient {
    connection: Arc<tokio::sync::Mutex<TcpStream>>,
}

impl RemoteQueueClient {
    pub async fn dial(address: &str) -> Result<Self, StorageError> {
        let stream = TcpStream::connect(address).await.map_err(|e| StorageError::RemoteDialFailed(e.to_string()))?;
        Ok(Self { connection: Arc::new(tokio::sync::Mutex::new(stream)) })
    }

    /// Sends a single-line RESP-style command and reads back one line of reply.
    async fn roundtrip(&self, command: String) -> Result<String, StorageError> {
        let mut stream = self.connection.lock().await;
        stream.write_all(command.as_bytes()).await.map_err(|e| StorageError::RemoteDialFailed(e.to_string()))?;
        stream.write_all(b"\r\n").await.map_err(|e| StorageError::RemoteDialFailed(e.to_string()))?;

        let mut reply = String::new();
        let mut reader = BufReader::new(&mut *stream);
        reader.read_line(&mut reply).await.map_err(|e| StorageError::RemoteDialFailed(e.to_string()))?;
        Ok(reply.trim_end().to_string())
    }
}

#[async_trait]
impl Queue for RemoteQueueClient {
    async fn push(&self, job_id: &str, items: Vec<WorkItem>) -> Result<(), StorageError> {
        for item in items {
            let payload = serde_json::to_string(&item).map_err(|e| StorageError::RemoteDialFailed(e.to_string()))?;
            self.roundtrip(format!("RPUSH arena:queue:{job_id} {payload}")).await?;
        }
        Ok(())
    }

    async fn pop(&self, job_id: &str) -> Result<Option<WorkItem>, StorageError> {
        let reply = self.roundtrip(format!("LPOP arena:queue:{job_id}")).await?;
        if reply.is_empty() || reply == "$-1" {
            return Ok(None);
        }
        let item = serde_json::from_str(&reply).map_err(|e| StorageError::RemoteDialFailed(e.to_string()))?;
        Ok(Some(item))
    }

    async fn ack(&self, job_id: &str, item_id: &str, result: Vec<u8>) -> Result<(), StorageError> {
        let encoded = hex::encode(&result);
        self.roundtrip(format!("HSET arena:queue:{job_id}:results {item_id} {encoded}")).await?;
        Ok(())
    }

    async fn progress(&self, job_id: &str) -> Result<QueueProgress, StorageError> {
        let reply = self.roundtrip(format!("LLEN arena:queue:{job_id}")).await?;
        let pending = reply.parse().unwrap_or(0);
        Ok(QueueProgress { pending, ..Default::default() })
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;

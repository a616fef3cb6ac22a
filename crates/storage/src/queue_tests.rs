// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use arena_core::WorkItemId;
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;

fn item(id: &str) -> WorkItem {
    WorkItem { id: WorkItemId(id.to_string()), job_id: "job-a".into(), scenario_id: "smoke".into(), provider_id: "openai".into(), max_attempts: 3 }
}

#[tokio::test]
async fn push_then_pop_returns_items_fifo() {
    let queue = InMemoryQueue::new();
    queue.push("job-a", vec![item("1"), item("2")]).await.unwrap();

    let first = queue.pop("job-a").await.unwrap().unwrap();
    assert_eq!(first.id.0, "1");
    let second = queue.pop("job-a").await.unwrap().unwrap();
    assert_eq!(second.id.0, "2");
    assert!(queue.pop("job-a").await.unwrap().is_none());
}

#[tokio::test]
async fn pop_on_unknown_job_returns_none() {
    let queue = InMemoryQueue::new();
    assert!(queue.pop("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn ack_tracks_completed_and_failed_counts() {
    let queue = InMemoryQueue::new();
    queue.push("job-a", vec![item("1"), item("2")]).await.unwrap();
    queue.ack("job-a", "1", b"ok".to_vec()).await.unwrap();
    queue.ack("job-a", "2", Vec::new()).await.unwrap();

    let progress = queue.progress("job-a").await.unwrap();
    assert_eq!(progress.total, 2);
    assert_eq!(progress.completed, 1);
    assert_eq!(progress.failed, 1);
    assert_eq!(progress.pending, 0);
}

#[tokio::test]
async fn ack_on_unknown_job_errors() {
    let queue = InMemoryQueue::new();
    let err = queue.ack("missing", "x", vec![]).await.unwrap_err();
    assert!(matches!(err, StorageError::QueueEmpty { .. }));
}

#[tokio::test]
async fn progress_on_unknown_job_is_zeroed() {
    let queue = InMemoryQueue::new();
    assert_eq!(queue.progress("missing").await.unwrap(), QueueProgress::default());
}

#[tokio::test]
async fn remote_dial_to_unreachable_address_errors_without_silent_fallback() {
    let err = RemoteQueueClient::dial("127.0.0.1:1").await.unwrap_err();
    assert!(matches!(err, StorageError::RemoteDialFailed(_)));
}

#[tokio::test]
async fn remote_client_sends_rpush_command_for_push() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = vec![0u8; 256];
        let n = socket.read(&mut buf).await.unwrap();
        let received = String::from_utf8_lossy(&buf[..n]).to_string();
        socket.write_all(b"+OK\r\n").await.unwrap();
        received
    });

    let client = RemoteQueueClient::dial(&addr.to_string()).await.unwrap();
    client.push("job-a", vec![item("1")]).await.unwrap();

    let received = server.await.unwrap();
    assert!(received.starts_with("RPUSH arena:queue:job-a"));
}

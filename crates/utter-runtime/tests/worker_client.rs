//! Integration tests for [`WorkerClient`] against fake worker processes.
//!
//! Each test spawns a small `sh` script standing in for the real synthesis
//! worker: it emits the `ready` notification, then answers JSON-RPC lines
//! read from stdin. No model files or audio hardware are required.
//!
//! # What is tested
//!
//! - Calls queue behind the ready gate and resolve once `ready` arrives
//! - A worker that never reports ready fails calls with `StartupTimeout`
//! - Responses are matched by id even when they arrive out of request order
//! - A call whose deadline fires rejects with `RequestTimeout`, and the
//!   late response for that id is a silent no-op
//! - A worker exit rejects every outstanding call with `ProcessExited` and
//!   leaves the client respawnable
//! - `shutdown` is safe and a later call starts a fresh worker

#![cfg(unix)]

use std::path::PathBuf;
use std::time::Duration;

use serde_json::json;
use tempfile::TempDir;

use utter_core::{SpeechError, WorkerConfig};
use utter_runtime::WorkerClient;

// ── Fake worker scripts ────────────────────────────────────────────

/// Write an executable `sh` script into `dir` and return its path.
fn fake_worker(dir: &TempDir, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.path().join("worker.sh");
    std::fs::write(&path, format!("#!/bin/sh\n{body}")).expect("write script");
    let mut perms = std::fs::metadata(&path).expect("stat script").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).expect("chmod script");
    path
}

/// Script fragment: extract the numeric id and the method of `$line`.
const EXTRACT: &str = r#"id=$(printf '%s\n' "$line" | sed -n 's/.*"id":\([0-9][0-9]*\).*/\1/p')
meth=$(printf '%s\n' "$line" | sed -n 's/.*"method":"\([a-z_]*\)".*/\1/p')"#;

const READY: &str = r#"printf '{"jsonrpc":"2.0","id":null,"method":"ready"}\n'"#;

/// A well-behaved worker: ready immediately, echoes each call's method
/// back in the result, exits cleanly on `shutdown`.
fn echo_worker(dir: &TempDir) -> PathBuf {
    fake_worker(
        dir,
        &format!(
            r#"{READY}
while IFS= read -r line; do
  {EXTRACT}
  if [ "$meth" = "shutdown" ]; then
    printf '{{"jsonrpc":"2.0","id":%s,"result":{{}}}}\n' "$id"
    exit 0
  fi
  printf '{{"jsonrpc":"2.0","id":%s,"result":{{"method":"%s"}}}}\n' "$id" "$meth"
done
"#
        ),
    )
}

fn client_for(path: PathBuf) -> WorkerClient {
    WorkerClient::new(WorkerConfig {
        executable: path,
        lib_dir: None,
        startup_timeout: Duration::from_secs(10),
        call_timeout: Duration::from_secs(10),
    })
}

// ── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn call_waits_for_delayed_ready() {
    let dir = TempDir::new().unwrap();
    let path = fake_worker(
        &dir,
        &format!(
            r#"sleep 1
{READY}
while IFS= read -r line; do
  {EXTRACT}
  printf '{{"jsonrpc":"2.0","id":%s,"result":{{"method":"%s"}}}}\n' "$id" "$meth"
done
"#
        ),
    );
    let client = client_for(path);

    let result = client.call("ping", json!({})).await.unwrap();
    assert_eq!(result["method"], "ping");
    client.shutdown().await;
}

#[tokio::test]
async fn never_ready_fails_with_startup_timeout() {
    let dir = TempDir::new().unwrap();
    let path = fake_worker(&dir, "exec sleep 30\n");
    let client = WorkerClient::new(WorkerConfig {
        executable: path,
        lib_dir: None,
        startup_timeout: Duration::from_millis(300),
        call_timeout: Duration::from_secs(10),
    });

    let err = client.call("ping", json!({})).await.unwrap_err();
    assert!(matches!(err, SpeechError::StartupTimeout(_)));
    client.shutdown().await;
}

#[tokio::test]
async fn out_of_order_responses_resolve_matching_calls() {
    let dir = TempDir::new().unwrap();
    // Read two requests, answer them in reverse order, then echo normally.
    let path = fake_worker(
        &dir,
        &format!(
            r#"{READY}
IFS= read -r line
{EXTRACT}
id_a=$id; meth_a=$meth
IFS= read -r line
{EXTRACT}
printf '{{"jsonrpc":"2.0","id":%s,"result":{{"method":"%s"}}}}\n' "$id" "$meth"
printf '{{"jsonrpc":"2.0","id":%s,"result":{{"method":"%s"}}}}\n' "$id_a" "$meth_a"
while IFS= read -r line; do :; done
"#
        ),
    );
    let client = client_for(path);

    let (alpha, beta) = tokio::join!(
        client.call("alpha", json!({})),
        client.call("beta", json!({})),
    );
    assert_eq!(alpha.unwrap()["method"], "alpha");
    assert_eq!(beta.unwrap()["method"], "beta");
    client.shutdown().await;
}

#[tokio::test]
async fn deadline_rejects_and_late_response_is_discarded() {
    let dir = TempDir::new().unwrap();
    // First request is answered after a full second; later ones instantly.
    let path = fake_worker(
        &dir,
        &format!(
            r#"{READY}
IFS= read -r line
{EXTRACT}
( sleep 1; printf '{{"jsonrpc":"2.0","id":%s,"result":{{"method":"%s"}}}}\n' "$id" "$meth" ) &
while IFS= read -r line; do
  {EXTRACT}
  printf '{{"jsonrpc":"2.0","id":%s,"result":{{"method":"%s"}}}}\n' "$id" "$meth"
done
"#
        ),
    );
    let client = WorkerClient::new(WorkerConfig {
        executable: path,
        lib_dir: None,
        startup_timeout: Duration::from_secs(10),
        call_timeout: Duration::from_millis(200),
    });

    let err = client.call("slow", json!({})).await.unwrap_err();
    assert!(matches!(
        err,
        SpeechError::RequestTimeout { ref method, .. } if method == "slow"
    ));

    // Let the stale response land; it must settle nothing.
    tokio::time::sleep(Duration::from_millis(1200)).await;

    let result = client.call("after", json!({})).await.unwrap();
    assert_eq!(result["method"], "after");
    client.shutdown().await;
}

#[tokio::test]
async fn worker_exit_rejects_outstanding_calls_then_respawns() {
    let dir = TempDir::new().unwrap();
    let marker = dir.path().join("spawned.once");
    // First incarnation dies on the first request without answering;
    // the respawned incarnation behaves.
    let path = fake_worker(
        &dir,
        &format!(
            r#"if [ ! -f "{marker}" ]; then
  : > "{marker}"
  {READY}
  IFS= read -r line
  exit 7
fi
{READY}
while IFS= read -r line; do
  {EXTRACT}
  printf '{{"jsonrpc":"2.0","id":%s,"result":{{"method":"%s"}}}}\n' "$id" "$meth"
done
"#,
            marker = marker.display(),
        ),
    );
    let client = client_for(path);

    let (a, b, c) = tokio::join!(
        client.call("one", json!({})),
        client.call("two", json!({})),
        client.call("three", json!({})),
    );
    for outcome in [a, b, c] {
        assert!(matches!(outcome.unwrap_err(), SpeechError::ProcessExited));
    }

    // A fresh call transparently respawns the worker.
    let result = client.call("again", json!({})).await.unwrap();
    assert_eq!(result["method"], "again");
    client.shutdown().await;
}

#[tokio::test]
async fn shutdown_then_call_starts_fresh_worker() {
    let dir = TempDir::new().unwrap();
    let client = client_for(echo_worker(&dir));

    let result = client.call("first", json!({})).await.unwrap();
    assert_eq!(result["method"], "first");

    client.shutdown().await;
    assert!(!client.is_running().await);

    let result = client.call("second", json!({})).await.unwrap();
    assert_eq!(result["method"], "second");
    client.shutdown().await;
}

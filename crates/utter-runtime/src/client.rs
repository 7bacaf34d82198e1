//! Persistent worker process client.
//!
//! [`WorkerClient`] owns exactly one out-of-process synthesis worker and
//! exposes its operations as awaitable calls. The worker is spawned lazily
//! on the first call, stays up across calls, and is respawned transparently
//! after an unexpected exit.
//!
//! # Lifecycle
//!
//! `NotStarted → Starting → Ready → (calls) → Stopped`, where `Ready` is
//! only entered when the worker emits its unsolicited `ready` notification
//! on stdout (model loading is slow, so startup has its own, longer
//! deadline than individual calls). An unexpected process exit rejects
//! every outstanding call with [`SpeechError::ProcessExited`] and returns
//! the client to `NotStarted`, so the next call respawns.
//!
//! # Locking discipline
//!
//! The pending-call map uses a std `Mutex` and is never held across an
//! `.await` point. The stdin handle uses a tokio `Mutex` because a write is
//! itself a suspension point.

use std::collections::HashMap;
use std::env;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{Mutex, oneshot, watch};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use utter_core::config::WorkerConfig;
use utter_core::error::{SpeechError, SpeechResult};
use utter_core::types::{AudioFormat, SynthesisRequest, SynthesisResult, VoiceInfo};
use utter_core::wav::WavInfo;

use crate::codec::{Inbound, LineDecoder, RequestEnvelope};

/// Outstanding calls keyed by request id. An entry is removed exactly
/// once: by the matching response, by the call's deadline, or by the exit
/// watcher; whichever fires first wins and the others are no-ops.
type Pending = std::sync::Mutex<HashMap<u64, oneshot::Sender<SpeechResult<Value>>>>;

fn lock_unpoisoned<T>(mutex: &std::sync::Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Shared references into one spawned worker. Cheap to clone; the process
/// itself is owned by its exit-watcher task.
#[derive(Clone)]
struct WorkerHandle {
    stdin: Arc<Mutex<ChildStdin>>,
    pending: Arc<Pending>,
    ready: watch::Receiver<bool>,
    alive: Arc<AtomicBool>,
    kill: Arc<std::sync::Mutex<Option<oneshot::Sender<()>>>>,
    pid: u32,
}

/// Client for the persistent synthesis worker.
///
/// Multiple calls may be in flight concurrently; the protocol correlates
/// them by id, so the client never serializes beyond the stdin write
/// itself.
pub struct WorkerClient {
    config: WorkerConfig,
    next_id: AtomicU64,
    handle: Mutex<Option<WorkerHandle>>,
}

impl WorkerClient {
    #[must_use]
    pub fn new(config: WorkerConfig) -> Self {
        Self {
            config,
            next_id: AtomicU64::new(1),
            handle: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Whether a live worker process is currently attached.
    pub async fn is_running(&self) -> bool {
        self.handle
            .lock()
            .await
            .as_ref()
            .is_some_and(|h| h.alive.load(Ordering::SeqCst))
    }

    /// Synthesize text through the worker. The result buffer is a WAV the
    /// worker encodes; duration comes from the result payload or, failing
    /// that, from the WAV header.
    pub async fn synthesize(&self, request: &SynthesisRequest) -> SpeechResult<SynthesisResult> {
        let started = Instant::now();

        let mut params = json!({ "text": request.text });
        if let Some(voice) = &request.voice {
            params["voice"] = json!(voice);
        }
        if let Some(language) = &request.language {
            params["language"] = json!(language);
        }
        if let Some(speed) = request.speed {
            params["speed"] = json!(speed);
        }

        #[derive(serde::Deserialize)]
        struct Payload {
            audio: String,
            #[serde(rename = "durationMs", default)]
            duration_ms: Option<u64>,
        }

        let result = self.call("synthesize", params).await?;
        let payload: Payload = serde_json::from_value(result)
            .map_err(|e| SpeechError::Transport(format!("bad synthesize result: {e}")))?;
        let audio = BASE64
            .decode(payload.audio.as_bytes())
            .map_err(|e| SpeechError::Transport(format!("bad audio encoding: {e}")))?;

        let duration = payload
            .duration_ms
            .map(Duration::from_millis)
            .or_else(|| WavInfo::parse(&audio).map(|info| info.duration()))
            .unwrap_or(Duration::ZERO);

        Ok(SynthesisResult {
            audio,
            format: AudioFormat::Wav,
            duration,
            processing_time: started.elapsed(),
            char_count: request.char_count(),
        })
    }

    /// List the voices the worker's loaded model offers.
    pub async fn list_voices(&self) -> SpeechResult<Vec<VoiceInfo>> {
        #[derive(serde::Deserialize)]
        struct Payload {
            voices: Vec<VoiceInfo>,
        }

        let result = self.call("list_voices", json!({})).await?;
        let payload: Payload = serde_json::from_value(result)
            .map_err(|e| SpeechError::Transport(format!("bad list_voices result: {e}")))?;
        Ok(payload.voices)
    }

    /// Register a cloned voice from an audio sample; returns the new voice
    /// id. Catalog management lives with the worker.
    pub async fn clone_voice(&self, name: &str, sample_path: &Path) -> SpeechResult<String> {
        #[derive(serde::Deserialize)]
        struct Payload {
            #[serde(rename = "voiceId")]
            voice_id: String,
        }

        let params = json!({
            "name": name,
            "samplePath": sample_path.display().to_string(),
        });
        let result = self.call("clone_voice", params).await?;
        let payload: Payload = serde_json::from_value(result)
            .map_err(|e| SpeechError::Transport(format!("bad clone_voice result: {e}")))?;
        Ok(payload.voice_id)
    }

    /// Issue one correlated call, spawning the worker and waiting for its
    /// ready gate as needed.
    pub async fn call(&self, method: &str, params: Value) -> SpeechResult<Value> {
        let handle = self.ensure_started().await?;
        self.await_ready(&handle).await?;
        self.call_on(&handle, method, params, self.config.call_timeout)
            .await
    }

    /// Best-effort `shutdown` RPC (errors ignored), then SIGTERM with a
    /// SIGKILL escalation. Safe to call from any state; clears all client
    /// state so a later call starts fresh.
    pub async fn shutdown(&self) {
        let handle = self.handle.lock().await.take();
        let Some(handle) = handle else {
            return;
        };

        if handle.alive.load(Ordering::SeqCst) && *handle.ready.borrow() {
            if let Err(err) = self
                .call_on(&handle, "shutdown", json!({}), Duration::from_secs(2))
                .await
            {
                debug!(error = %err, "shutdown call failed, terminating anyway");
            }
        }

        let kill = lock_unpoisoned(&handle.kill).take();
        if let Some(tx) = kill {
            let _ = tx.send(());
        }
    }

    async fn ensure_started(&self) -> SpeechResult<WorkerHandle> {
        let mut slot = self.handle.lock().await;
        if let Some(handle) = slot.as_ref()
            && handle.alive.load(Ordering::SeqCst)
        {
            return Ok(handle.clone());
        }
        let handle = self.spawn_worker()?;
        *slot = Some(handle.clone());
        Ok(handle)
    }

    fn spawn_worker(&self) -> SpeechResult<WorkerHandle> {
        let mut cmd = Command::new(&self.config.executable);
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.config.lib_dir {
            extend_linker_path(&mut cmd, dir);
        }

        let mut child = cmd.spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SpeechError::Config("worker stdin not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SpeechError::Config("worker stdout not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| SpeechError::Config("worker stderr not captured".to_string()))?;
        let pid = child.id().unwrap_or_default();

        let (ready_tx, ready_rx) = watch::channel(false);
        let pending: Arc<Pending> = Arc::new(std::sync::Mutex::new(HashMap::new()));
        let alive = Arc::new(AtomicBool::new(true));
        let (kill_tx, kill_rx) = oneshot::channel();

        tokio::spawn(read_protocol(stdout, ready_tx, Arc::clone(&pending)));

        // stderr is diagnostic-only; it is never parsed as protocol.
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(pid, line = %line, "worker stderr");
            }
        });

        tokio::spawn(watch_exit(
            child,
            kill_rx,
            Arc::clone(&pending),
            Arc::clone(&alive),
            pid,
        ));

        info!(pid, executable = %self.config.executable.display(), "worker spawned");

        Ok(WorkerHandle {
            stdin: Arc::new(Mutex::new(stdin)),
            pending,
            ready: ready_rx,
            alive,
            kill: Arc::new(std::sync::Mutex::new(Some(kill_tx))),
            pid,
        })
    }

    /// Block until the worker's ready notification, bounded by the startup
    /// timeout. A call issued before ready queues here; it never resolves
    /// against a worker that has not finished loading.
    async fn await_ready(&self, handle: &WorkerHandle) -> SpeechResult<()> {
        let mut ready = handle.ready.clone();
        if *ready.borrow() {
            return Ok(());
        }

        let wait = async {
            loop {
                if *ready.borrow_and_update() {
                    return Ok(());
                }
                ready
                    .changed()
                    .await
                    .map_err(|_| SpeechError::ProcessExited)?;
            }
        };

        timeout(self.config.startup_timeout, wait)
            .await
            .map_err(|_| SpeechError::StartupTimeout(self.config.startup_timeout))?
    }

    async fn call_on(
        &self,
        handle: &WorkerHandle,
        method: &str,
        params: Value,
        deadline: Duration,
    ) -> SpeechResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        lock_unpoisoned(&handle.pending).insert(id, tx);

        let line = RequestEnvelope::new(id, method, params).to_line();
        let write = async {
            let mut stdin = handle.stdin.lock().await;
            stdin.write_all(&line).await?;
            stdin.flush().await
        };
        if let Err(err) = write.await {
            lock_unpoisoned(&handle.pending).remove(&id);
            debug!(id, pid = handle.pid, error = %err, "worker stdin write failed");
            return Err(SpeechError::ProcessExited);
        }

        match timeout(deadline, rx).await {
            Ok(Ok(outcome)) => outcome,
            // Sender dropped without answering: the exit watcher drained us.
            Ok(Err(_)) => Err(SpeechError::ProcessExited),
            Err(_) => {
                // Deadline wins: remove the entry so a late response for
                // this id is discarded as stale.
                lock_unpoisoned(&handle.pending).remove(&id);
                Err(SpeechError::RequestTimeout {
                    method: method.to_string(),
                    timeout: deadline,
                })
            }
        }
    }
}

/// stdout reader: feeds the incremental decoder and settles pending calls.
async fn read_protocol(
    mut stdout: ChildStdout,
    ready_tx: watch::Sender<bool>,
    pending: Arc<Pending>,
) {
    let mut decoder = LineDecoder::new();
    let mut buf = vec![0u8; 8192];
    loop {
        let n = match stdout.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) => {
                debug!(error = %err, "worker stdout read failed");
                break;
            }
        };
        for inbound in decoder.feed(&buf[..n]) {
            match inbound {
                Inbound::Notification { method } if method == "ready" => {
                    info!("worker reported ready");
                    let _ = ready_tx.send(true);
                }
                Inbound::Notification { method } => {
                    debug!(method, "ignoring worker notification");
                }
                Inbound::Response { id, outcome } => {
                    let sender = lock_unpoisoned(&pending).remove(&id);
                    match sender {
                        Some(tx) => {
                            let settled = outcome.map_err(|e| SpeechError::Worker {
                                code: e.code,
                                message: e.message,
                            });
                            let _ = tx.send(settled);
                        }
                        None => debug!(id, "discarding stale response"),
                    }
                }
            }
        }
    }
    debug!("worker stdout closed");
}

/// Owns the child until it exits or is told to die. Either way, every
/// still-outstanding call is rejected and the alive flag drops so the next
/// call respawns.
async fn watch_exit(
    mut child: Child,
    kill_rx: oneshot::Receiver<()>,
    pending: Arc<Pending>,
    alive: Arc<AtomicBool>,
    pid: u32,
) {
    tokio::select! {
        status = child.wait() => match status {
            Ok(status) => warn!(pid, %status, "worker exited"),
            Err(err) => warn!(pid, error = %err, "failed waiting on worker"),
        },
        _ = kill_rx => terminate(&mut child, pid).await,
    }

    alive.store(false, Ordering::SeqCst);
    let mut map = lock_unpoisoned(&pending);
    if !map.is_empty() {
        warn!(pid, outstanding = map.len(), "rejecting outstanding calls");
    }
    for (_, tx) in map.drain() {
        let _ = tx.send(Err(SpeechError::ProcessExited));
    }
}

/// SIGTERM with a grace period, then SIGKILL, then reap.
#[cfg(unix)]
async fn terminate(child: &mut Child, pid: u32) {
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    if let Some(raw) = child.id() {
        if signal::kill(Pid::from_raw(raw as i32), Signal::SIGTERM).is_ok()
            && timeout(Duration::from_secs(5), child.wait()).await.is_ok()
        {
            debug!(pid, "worker exited after SIGTERM");
            return;
        }
    }
    let _ = child.kill().await;
    let _ = child.wait().await;
    debug!(pid, "worker killed");
}

/// Windows has no SIGTERM equivalent; terminate immediately.
#[cfg(not(unix))]
async fn terminate(child: &mut Child, pid: u32) {
    let _ = child.kill().await;
    let _ = child.wait().await;
    debug!(pid, "worker killed");
}

/// Prepend `dir` to the dynamic linker search path of the spawned worker.
/// Hardware-acceleration libraries commonly live outside the default path.
fn extend_linker_path(cmd: &mut Command, dir: &Path) {
    let var = if cfg!(target_os = "macos") {
        "DYLD_LIBRARY_PATH"
    } else {
        "LD_LIBRARY_PATH"
    };

    let mut paths = vec![dir.to_path_buf()];
    if let Some(existing) = env::var_os(var) {
        paths.extend(env::split_paths(&existing));
    }
    match env::join_paths(paths) {
        Ok(joined) => {
            cmd.env(var, joined);
        }
        Err(err) => warn!(error = %err, "could not extend linker search path"),
    }
}

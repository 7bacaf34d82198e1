//! Cross-process playback lock.
//!
//! A single host-visible artifact records who is currently playing audio.
//! Format: two-line text file
//! ```text
//! <owner-pid>
//! <acquired-at-epoch-ms>
//! ```
//! Absence means unlocked. Writes go through temp file + rename so no
//! observer can ever read a torn, valid-looking artifact. A lock older
//! than the staleness threshold is treated as abandoned (the owner crashed
//! without releasing); a younger one means audio is genuinely playing and
//! gets preempted: newest request wins, nothing queues.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{debug, info};

use utter_core::error::SpeechResult;

/// Parsed contents of the lock artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockData {
    pub pid: u32,
    pub acquired_at_ms: u64,
}

/// Guard over the host-wide playback lock. Releasing deletes the artifact;
/// release happens on `Drop`, so no exit path (including panics) can leak
/// a fresh lock past the staleness threshold.
#[derive(Debug)]
pub struct PlaybackLock {
    path: PathBuf,
    released: bool,
}

impl PlaybackLock {
    /// Acquire the lock at `path`.
    ///
    /// - no artifact: create one and proceed;
    /// - fresh artifact (younger than `stale_after`): another process is
    ///   audibly playing; stop its players via `preempt_patterns`, then
    ///   replace the artifact;
    /// - stale artifact: abandoned; replace it without stopping anything.
    pub async fn acquire(
        path: &Path,
        stale_after: Duration,
        preempt_patterns: &[String],
    ) -> SpeechResult<Self> {
        match read_lock(path) {
            Some(existing) => {
                let age_ms = now_ms().saturating_sub(existing.acquired_at_ms);
                if u128::from(age_ms) < stale_after.as_millis() {
                    info!(
                        owner = existing.pid,
                        age_ms, "preempting active playback from another process"
                    );
                    stop_player_processes(preempt_patterns).await;
                } else {
                    debug!(owner = existing.pid, age_ms, "replacing stale playback lock");
                }
            }
            None => debug!(path = %path.display(), "playback lock is free"),
        }

        write_lock(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            released: false,
        })
    }

    /// Explicit release. Equivalent to dropping the guard, but surfaces IO
    /// errors.
    pub fn release(mut self) -> io::Result<()> {
        self.release_inner()
    }

    fn release_inner(&mut self) -> io::Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl Drop for PlaybackLock {
    fn drop(&mut self) {
        let _ = self.release_inner();
    }
}

/// Read and parse the artifact. Unreadable or unparseable contents are
/// reported as absent: a torn artifact cannot name a live owner, so there
/// is nothing to stop.
#[must_use]
pub fn read_lock(path: &Path) -> Option<LockData> {
    let content = fs::read_to_string(path).ok()?;
    let mut lines = content.lines();
    let pid = lines.next()?.trim().parse().ok()?;
    let acquired_at_ms = lines.next()?.trim().parse().ok()?;
    Some(LockData {
        pid,
        acquired_at_ms,
    })
}

/// Stamp the artifact with this process's identity, atomically.
fn write_lock(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let temp_path = path.with_extension("lock.tmp");
    let content = format!("{}\n{}\n", std::process::id(), now_ms());
    fs::write(&temp_path, content)?;
    fs::rename(&temp_path, path)
}

/// Send a stop signal to known player-process patterns. Failures are
/// ignored; a pattern matching nothing is the common case.
#[cfg(unix)]
async fn stop_player_processes(patterns: &[String]) {
    for pattern in patterns {
        let result = tokio::process::Command::new("pkill")
            .arg("-f")
            .arg(pattern)
            .output()
            .await;
        match result {
            Ok(output) => debug!(pattern = %pattern, status = %output.status, "pkill"),
            Err(err) => debug!(pattern = %pattern, error = %err, "pkill failed"),
        }
    }
}

#[cfg(not(unix))]
async fn stop_player_processes(patterns: &[String]) {
    debug!(count = patterns.len(), "player preemption is unix-only");
}

fn now_ms() -> u64 {
    u64::try_from(
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis(),
    )
    .unwrap_or(u64::MAX)
}

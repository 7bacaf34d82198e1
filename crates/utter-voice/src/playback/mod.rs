//! Audio playback coordinator.
//!
//! Renders one finished audio buffer to the host's speakers, choosing
//! between a low-latency streaming path (persistent output device, small
//! pre-buffer) and a robust legacy path (temp file + external player
//! subprocess). The legacy path is guarded by the cross-process
//! [`PlaybackLock`], so at most one playback is audibly active per host;
//! a newer request preempts an older one rather than queuing behind it.

mod lock;
mod stream;

use std::io::Write;
use std::process::Stdio;
use std::sync::Arc;

use tracing::{debug, info, warn};

use utter_core::config::{PlaybackConfig, PlaybackMode};
use utter_core::error::{SpeechError, SpeechResult};
use utter_core::types::SynthesisResult;

pub use lock::{LockData, PlaybackLock, read_lock};

use stream::OutputManager;

/// Coordinates exclusive playback of synthesized audio.
pub struct PlaybackCoordinator {
    config: PlaybackConfig,
    /// Lazily-initialized process-wide audio output manager. Only a
    /// successful init is cached; a host without an output device retries
    /// (and falls back) per play.
    output: std::sync::Mutex<Option<Arc<OutputManager>>>,
}

impl PlaybackCoordinator {
    #[must_use]
    pub fn new(config: PlaybackConfig) -> Self {
        Self {
            config,
            output: std::sync::Mutex::new(None),
        }
    }

    #[must_use]
    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    /// Play a synthesized buffer to completion.
    ///
    /// In `auto` mode a streaming-path failure falls through to the legacy
    /// path; in `stream` mode it is terminal; `legacy` skips streaming
    /// entirely.
    pub async fn play(&self, result: &SynthesisResult) -> SpeechResult<()> {
        match self.config.mode {
            PlaybackMode::Stream => self.play_streaming(result).await,
            PlaybackMode::Legacy => self.play_legacy(result).await,
            PlaybackMode::Auto => match self.play_streaming(result).await {
                Ok(()) => Ok(()),
                Err(err) => {
                    debug!(error = %err, "streaming path failed, falling back to legacy");
                    self.play_legacy(result).await
                }
            },
        }
    }

    /// Stop any in-process streaming playback immediately. Idempotent.
    pub fn stop(&self) {
        let slot = self
            .output
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(manager) = slot.as_ref() {
            manager.stop();
        }
    }

    async fn play_streaming(&self, result: &SynthesisResult) -> SpeechResult<()> {
        let manager = self.output_manager()?;
        let (started, drained) = manager.play(result.audio.clone())?;

        started
            .await
            .map_err(|_| SpeechError::Playback("audio thread died".to_string()))??;
        debug!(duration_ms = result.duration_ms(), "streaming playback started");

        // Suspend until the device has consumed the buffer. A newer play
        // request stops this sink, which also completes the drain.
        drained
            .await
            .map_err(|_| SpeechError::Playback("audio thread died".to_string()))?;
        Ok(())
    }

    fn output_manager(&self) -> SpeechResult<Arc<OutputManager>> {
        let mut slot = self
            .output
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(manager) = slot.as_ref() {
            return Ok(Arc::clone(manager));
        }
        let manager = Arc::new(OutputManager::spawn()?);
        *slot = Some(Arc::clone(&manager));
        info!("audio output manager initialized");
        Ok(manager)
    }

    /// Legacy path: lock, spill to a temp file, try external players in
    /// order. The lock guard and the temp file release themselves on every
    /// exit path, errors and panics included.
    async fn play_legacy(&self, result: &SynthesisResult) -> SpeechResult<()> {
        let _lock = PlaybackLock::acquire(
            &self.config.lock_path,
            self.config.lock_stale_after,
            &self.config.preempt_patterns,
        )
        .await?;

        let mut file = tempfile::Builder::new()
            .prefix("utter-")
            .suffix(&format!(".{}", result.format.extension()))
            .tempfile()?;
        file.write_all(&result.audio)?;
        file.flush()?;

        for player in &self.config.players {
            let mut child = match tokio::process::Command::new(&player.program)
                .args(&player.args)
                .arg(file.path())
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn()
            {
                Ok(child) => child,
                Err(err) => {
                    debug!(player = %player.program, error = %err, "player spawn failed, trying next");
                    continue;
                }
            };

            match child.wait().await {
                Ok(status) if status.success() => {
                    debug!(player = %player.program, "legacy playback finished");
                    return Ok(());
                }
                Ok(status) => {
                    warn!(player = %player.program, %status, "player exited with failure, trying next");
                }
                Err(err) => {
                    warn!(player = %player.program, error = %err, "player wait failed, trying next");
                }
            }
        }

        warn!(
            tried = self.config.players.len(),
            "all configured players failed"
        );
        Err(SpeechError::NoAudioPlayerAvailable)
    }
}

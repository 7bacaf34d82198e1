//! Speech synthesis and playback error types.

use std::time::Duration;

/// Result type alias for speech operations.
pub type SpeechResult<T> = Result<T, SpeechError>;

/// Errors that can occur during backend selection, synthesis, or playback.
#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    /// A backend name that is not in the registry was requested.
    #[error("Unknown backend '{0}'")]
    UnknownBackend(String),

    /// Every registered backend failed its availability probe.
    #[error("No synthesis backend is available")]
    NoBackendAvailable,

    /// A specific backend was reachable but refused or failed the request.
    #[error("Backend '{backend}' unavailable: {reason}")]
    BackendUnavailable { backend: String, reason: String },

    /// Empty or over-length input text.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The worker process did not report ready within the startup window.
    #[error("Worker did not become ready within {0:?}")]
    StartupTimeout(Duration),

    /// A worker call ran past its deadline.
    #[error("Worker call '{method}' timed out after {timeout:?}")]
    RequestTimeout { method: String, timeout: Duration },

    /// The worker process exited while calls were outstanding.
    #[error("Worker process exited before responding")]
    ProcessExited,

    /// The worker answered with a protocol-level error object.
    #[error("Worker error {code}: {message}")]
    Worker { code: i64, message: String },

    /// Every configured external audio player failed to play the buffer.
    #[error("No audio player available")]
    NoAudioPlayerAvailable,

    /// HTTP or wire-level failure talking to a backend.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Audio output failure (device, decode, or stream).
    #[error("Audio playback failed: {0}")]
    Playback(String),

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error (temp files, lock artifact, process pipes).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SpeechError {
    /// True for the failures that reject one call but leave the worker
    /// client in a respawnable state.
    #[must_use]
    pub fn is_call_scoped(&self) -> bool {
        matches!(
            self,
            Self::RequestTimeout { .. } | Self::ProcessExited | Self::Worker { .. }
        )
    }
}

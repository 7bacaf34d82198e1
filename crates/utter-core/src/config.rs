//! Runtime configuration for synthesis and playback.
//!
//! Each sub-config has sensible defaults and an env-driven constructor so
//! the library works unconfigured; the full CLI/agent surface lives outside
//! this workspace.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::SpeechError;

/// How synthesized audio reaches the speakers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackMode {
    /// Try the streaming path, fall back to the legacy path on failure.
    Auto,
    /// Streaming path only; its failure is terminal.
    Stream,
    /// Legacy path only (temp file + external player).
    Legacy,
}

impl FromStr for PlaybackMode {
    type Err = SpeechError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "stream" => Ok(Self::Stream),
            "legacy" => Ok(Self::Legacy),
            other => Err(SpeechError::Config(format!(
                "invalid playback mode '{other}' (expected auto, stream, or legacy)"
            ))),
        }
    }
}

/// One external player invocation: `program [args...] <audio-file>`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PlayerSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl PlayerSpec {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

/// Configuration for the persistent synthesis worker process.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct WorkerConfig {
    /// Path to the worker executable.
    pub executable: PathBuf,

    /// Directory appended to the dynamic linker search path of the spawned
    /// worker (hardware-acceleration libraries live outside the default
    /// search path on some hosts).
    pub lib_dir: Option<PathBuf>,

    /// How long to wait for the worker's `ready` notification. Model
    /// loading is slow, so this is much longer than the per-call timeout.
    pub startup_timeout: Duration,

    /// Deadline for each individual call once the worker is ready.
    pub call_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("utter-worker"),
            lib_dir: None,
            startup_timeout: Duration::from_secs(45),
            call_timeout: Duration::from_secs(30),
        }
    }
}

impl WorkerConfig {
    /// Build from environment: `UTTER_WORKER_PATH`, `UTTER_WORKER_LIB_DIR`,
    /// `UTTER_STARTUP_TIMEOUT_SECS`, `UTTER_CALL_TIMEOUT_SECS`.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(path) = env::var("UTTER_WORKER_PATH") {
            config.executable = PathBuf::from(path);
        }
        if let Ok(dir) = env::var("UTTER_WORKER_LIB_DIR") {
            config.lib_dir = Some(PathBuf::from(dir));
        }
        if let Some(secs) = env_secs("UTTER_STARTUP_TIMEOUT_SECS") {
            config.startup_timeout = secs;
        }
        if let Some(secs) = env_secs("UTTER_CALL_TIMEOUT_SECS") {
            config.call_timeout = secs;
        }
        config
    }
}

/// Configuration for the cloud (OpenAI-compatible) backend.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CloudConfig {
    /// Base URL without trailing slash (e.g. `https://api.openai.com/v1`).
    pub base_url: String,

    /// Bearer API key. `None` means the backend probes unavailable.
    pub api_key: Option<String>,

    /// TTS model identifier.
    pub model: String,

    /// Default voice when a request does not name one.
    pub voice: String,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "tts-1".to_string(),
            voice: "alloy".to_string(),
        }
    }
}

impl CloudConfig {
    /// Build from environment: `UTTER_TTS_API_URL`, `UTTER_TTS_API_KEY`
    /// (falling back to `OPENAI_API_KEY`), `UTTER_TTS_MODEL`,
    /// `UTTER_TTS_VOICE`.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = env::var("UTTER_TTS_API_URL") {
            config.base_url = url;
        }
        config.api_key = env::var("UTTER_TTS_API_KEY")
            .or_else(|_| env::var("OPENAI_API_KEY"))
            .ok()
            .filter(|k| !k.trim().is_empty());
        if let Ok(model) = env::var("UTTER_TTS_MODEL") {
            config.model = model;
        }
        if let Ok(voice) = env::var("UTTER_TTS_VOICE") {
            config.voice = voice;
        }
        config
    }
}

/// Configuration for the playback coordinator and cross-process lock.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PlaybackConfig {
    /// Path selection between the streaming and legacy pipelines.
    pub mode: PlaybackMode,

    /// Host-visible lock artifact path, shared by all cooperating
    /// processes.
    pub lock_path: PathBuf,

    /// Age past which a lock artifact is assumed abandoned.
    pub lock_stale_after: Duration,

    /// External players for the legacy path, tried in order.
    pub players: Vec<PlayerSpec>,

    /// `pkill -f` patterns used to stop another process's active playback
    /// when preempting a fresh lock.
    pub preempt_patterns: Vec<String>,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        let players = default_players();
        let preempt_patterns = players.iter().map(|p| p.program.clone()).collect();
        Self {
            mode: PlaybackMode::Auto,
            lock_path: env::temp_dir().join("utter-playback.lock"),
            lock_stale_after: Duration::from_secs(60),
            players,
            preempt_patterns,
        }
    }
}

impl PlaybackConfig {
    /// Build from environment: `UTTER_PLAYBACK_MODE`, `UTTER_LOCK_PATH`,
    /// `UTTER_LOCK_STALE_SECS`.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(mode) = env::var("UTTER_PLAYBACK_MODE")
            && let Ok(parsed) = mode.parse()
        {
            config.mode = parsed;
        }
        if let Ok(path) = env::var("UTTER_LOCK_PATH") {
            config.lock_path = PathBuf::from(path);
        }
        if let Some(secs) = env_secs("UTTER_LOCK_STALE_SECS") {
            config.lock_stale_after = secs;
        }
        config
    }
}

/// Platform-ordered external player list for the legacy path.
fn default_players() -> Vec<PlayerSpec> {
    if cfg!(target_os = "macos") {
        vec![
            PlayerSpec::new("afplay", &[]),
            PlayerSpec::new("ffplay", &["-autoexit", "-nodisp", "-loglevel", "error"]),
        ]
    } else {
        vec![
            PlayerSpec::new("paplay", &[]),
            PlayerSpec::new("aplay", &["-q"]),
            PlayerSpec::new("mpg123", &["-q"]),
            PlayerSpec::new("ffplay", &["-autoexit", "-nodisp", "-loglevel", "error"]),
        ]
    }
}

/// Top-level configuration bundle.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct SpeechConfig {
    pub worker: WorkerConfig,
    pub cloud: CloudConfig,
    pub playback: PlaybackConfig,
}

impl SpeechConfig {
    /// Build the whole bundle from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            worker: WorkerConfig::from_env(),
            cloud: CloudConfig::from_env(),
            playback: PlaybackConfig::from_env(),
        }
    }
}

fn env_secs(var: &str) -> Option<Duration> {
    env::var(var).ok()?.trim().parse().ok().map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn playback_mode_parses_case_insensitively() {
        assert_eq!("AUTO".parse::<PlaybackMode>().unwrap(), PlaybackMode::Auto);
        assert_eq!(
            "stream".parse::<PlaybackMode>().unwrap(),
            PlaybackMode::Stream
        );
        assert_eq!(
            " legacy ".parse::<PlaybackMode>().unwrap(),
            PlaybackMode::Legacy
        );
        assert!("loud".parse::<PlaybackMode>().is_err());
    }

    #[test]
    fn startup_timeout_exceeds_call_timeout() {
        let config = WorkerConfig::default();
        assert!(config.startup_timeout > config.call_timeout);
    }

    #[test]
    fn default_preempt_patterns_cover_players() {
        let config = PlaybackConfig::default();
        assert_eq!(config.players.len(), config.preempt_patterns.len());
        for (player, pattern) in config.players.iter().zip(&config.preempt_patterns) {
            assert_eq!(&player.program, pattern);
        }
    }

    #[test]
    fn lock_path_is_in_temp_dir() {
        let config = PlaybackConfig::default();
        assert!(config.lock_path.starts_with(env::temp_dir()));
    }
}

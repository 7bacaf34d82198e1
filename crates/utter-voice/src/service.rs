//! `SpeechService`: the single entry point tying selection, synthesis,
//! and playback together.
//!
//! Input validation happens here, before backend resolution, so an empty
//! request never touches a backend. Playback is intentionally not
//! serialized: a second `speak` preempts the first through the coordinator's
//! lock protocol (newest request wins) instead of queuing behind it.

use tracing::info;

use utter_core::config::SpeechConfig;
use utter_core::error::{SpeechError, SpeechResult};
use utter_core::types::{SynthesisRequest, SynthesisResult, VoiceInfo};

use crate::playback::PlaybackCoordinator;
use crate::registry::BackendRegistry;

/// Per-call options for [`SpeechService::speak`] / `synthesize`.
#[derive(Debug, Clone, Default)]
pub struct SpeakOptions {
    /// Preferred backend name; falls back to the best available one when
    /// unset or unavailable.
    pub backend: Option<String>,

    /// Voice id; the backend's default voice when unset.
    pub voice: Option<String>,

    /// Language hint.
    pub language: Option<String>,

    /// Speed multiplier.
    pub speed: Option<f32>,
}

/// Facade over the backend registry and the playback coordinator.
pub struct SpeechService {
    registry: BackendRegistry,
    coordinator: PlaybackCoordinator,
}

impl SpeechService {
    #[must_use]
    pub fn new(config: SpeechConfig) -> Self {
        let playback = config.playback.clone();
        Self {
            registry: BackendRegistry::new(config),
            coordinator: PlaybackCoordinator::new(playback),
        }
    }

    /// Build from `UTTER_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(SpeechConfig::from_env())
    }

    /// Assemble from pre-built parts (tests, embedders with custom backend
    /// tables).
    #[must_use]
    pub fn with_parts(registry: BackendRegistry, coordinator: PlaybackCoordinator) -> Self {
        Self {
            registry,
            coordinator,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    #[must_use]
    pub fn coordinator(&self) -> &PlaybackCoordinator {
        &self.coordinator
    }

    /// Synthesize `text` without playing it.
    pub async fn synthesize(
        &self,
        text: &str,
        options: &SpeakOptions,
    ) -> SpeechResult<SynthesisResult> {
        // Validate before touching any backend.
        if text.trim().is_empty() {
            return Err(SpeechError::InvalidInput("text is empty".to_string()));
        }

        let backend = self
            .registry
            .get_with_fallback(options.backend.as_deref())
            .await?;

        let mut request = SynthesisRequest::new(text);
        request.voice = options.voice.clone();
        request.language = options.language.clone();
        request.speed = options.speed;
        request.validate(&backend.capabilities())?;

        info!(
            backend = backend.name(),
            chars = request.char_count(),
            "synthesizing"
        );
        backend.synthesize(&request).await
    }

    /// Synthesize `text` and play it to completion.
    pub async fn speak(
        &self,
        text: &str,
        options: &SpeakOptions,
    ) -> SpeechResult<SynthesisResult> {
        let result = self.synthesize(text, options).await?;
        self.coordinator.play(&result).await?;
        Ok(result)
    }

    /// Backend names by descending priority.
    #[must_use]
    pub fn list_backends(&self) -> Vec<&'static str> {
        self.registry.list()
    }

    /// Voices of `backend`, or of the best available backend when `None`.
    pub async fn list_voices(&self, backend: Option<&str>) -> SpeechResult<Vec<VoiceInfo>> {
        let backend = self.registry.get_with_fallback(backend).await?;
        backend.list_voices().await
    }
}

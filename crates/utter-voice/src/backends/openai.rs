//! Cloud backend: OpenAI-compatible `/audio/speech` endpoint.
//!
//! Works against api.openai.com and compatible gateways. WAV is requested
//! so the result duration can be read from the RIFF header instead of
//! trusting (absent) response metadata.

use std::time::{Duration, Instant};

use tracing::debug;

use utter_core::backend::SynthesisBackend;
use utter_core::config::CloudConfig;
use utter_core::error::{SpeechError, SpeechResult};
use utter_core::types::{
    AudioFormat, Capabilities, SynthesisRequest, SynthesisResult, VoiceGender, VoiceInfo,
    voice_info,
};
use utter_core::wav::WavInfo;

/// OpenAI-compatible cloud synthesis backend.
pub struct OpenAiBackend {
    config: CloudConfig,
    client: reqwest::Client,
}

impl OpenAiBackend {
    pub fn new(config: &CloudConfig) -> SpeechResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| SpeechError::Transport(e.to_string()))?;
        Ok(Self {
            config: config.clone(),
            client,
        })
    }

    fn api_key(&self) -> SpeechResult<&str> {
        self.config
            .api_key
            .as_deref()
            .ok_or_else(|| SpeechError::BackendUnavailable {
                backend: "openai".to_string(),
                reason: "no API key configured".to_string(),
            })
    }
}

#[async_trait::async_trait]
impl SynthesisBackend for OpenAiBackend {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            formats: vec![AudioFormat::Wav, AudioFormat::Mp3],
            streaming: false,
            local: false,
            max_text_length: 4096,
            voice_cloning: false,
            // tts-1 pricing: $15 per 1M characters.
            cost_per_char: 0.000_015,
        }
    }

    async fn is_available(&self) -> bool {
        self.config.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }

    async fn synthesize(&self, request: &SynthesisRequest) -> SpeechResult<SynthesisResult> {
        request.validate(&self.capabilities())?;
        let key = self.api_key()?;
        let started = Instant::now();

        let voice = request.voice.as_deref().unwrap_or(&self.config.voice);
        let mut body = serde_json::json!({
            "model": self.config.model,
            "input": request.text,
            "voice": voice,
            "response_format": "wav",
        });
        if let Some(speed) = request.speed {
            body["speed"] = serde_json::json!(speed);
        }

        let url = format!(
            "{}/audio/speech",
            self.config.base_url.trim_end_matches('/')
        );
        debug!(url = %url, voice, chars = request.char_count(), "cloud synthesis request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(key)
            .json(&body)
            .send()
            .await
            .map_err(|e| SpeechError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(SpeechError::BackendUnavailable {
                backend: "openai".to_string(),
                reason: format!("API error {status}: {detail}"),
            });
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| SpeechError::Transport(e.to_string()))?
            .to_vec();
        let duration = WavInfo::parse(&audio)
            .map(|info| info.duration())
            .unwrap_or(Duration::ZERO);

        Ok(SynthesisResult {
            audio,
            format: AudioFormat::Wav,
            duration,
            processing_time: started.elapsed(),
            char_count: request.char_count(),
        })
    }

    async fn list_voices(&self) -> SpeechResult<Vec<VoiceInfo>> {
        Ok(vec![
            voice_info("alloy", "Alloy", "en", VoiceGender::Neutral),
            voice_info("echo", "Echo", "en", VoiceGender::Male),
            voice_info("fable", "Fable", "en", VoiceGender::Neutral),
            voice_info("onyx", "Onyx", "en", VoiceGender::Male),
            voice_info("nova", "Nova", "en", VoiceGender::Female),
            voice_info("shimmer", "Shimmer", "en", VoiceGender::Female),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unavailable_without_api_key() {
        let backend = OpenAiBackend::new(&CloudConfig::default()).unwrap();
        assert!(!backend.is_available().await);
    }

    #[tokio::test]
    async fn available_with_api_key() {
        let config = CloudConfig {
            api_key: Some("sk-test".to_string()),
            ..CloudConfig::default()
        };
        let backend = OpenAiBackend::new(&config).unwrap();
        assert!(backend.is_available().await);
    }

    #[tokio::test]
    async fn synthesize_without_key_fails_before_network() {
        let backend = OpenAiBackend::new(&CloudConfig::default()).unwrap();
        let err = backend
            .synthesize(&SynthesisRequest::new("hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, SpeechError::BackendUnavailable { .. }));
    }
}

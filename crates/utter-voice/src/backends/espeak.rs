//! Local CLI backend: espeak-ng with `--stdout` WAV capture.
//!
//! The lowest-priority fallback. Quality is robotic but the engine is
//! packaged everywhere and needs no model files, no network, and no
//! long-lived process.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tracing::debug;

use utter_core::backend::SynthesisBackend;
use utter_core::error::{SpeechError, SpeechResult};
use utter_core::types::{
    AudioFormat, Capabilities, SynthesisRequest, SynthesisResult, VoiceGender, VoiceInfo,
    voice_info,
};
use utter_core::wav::WavInfo;

use super::executable_exists;

/// Base speaking rate in words per minute; request speed multiplies this.
const BASE_RATE_WPM: f32 = 175.0;

/// espeak-ng CLI synthesis backend.
pub struct EspeakBackend {
    candidates: Vec<PathBuf>,
}

impl EspeakBackend {
    #[must_use]
    pub fn new() -> Self {
        Self {
            candidates: vec![PathBuf::from("espeak-ng"), PathBuf::from("espeak")],
        }
    }

    fn installed(&self) -> Option<&PathBuf> {
        self.candidates.iter().find(|p| executable_exists(p))
    }
}

impl Default for EspeakBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SynthesisBackend for EspeakBackend {
    fn name(&self) -> &'static str {
        "espeak"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            formats: vec![AudioFormat::Wav],
            streaming: false,
            local: true,
            max_text_length: 5000,
            voice_cloning: false,
            cost_per_char: 0.0,
        }
    }

    async fn is_available(&self) -> bool {
        self.installed().is_some()
    }

    async fn synthesize(&self, request: &SynthesisRequest) -> SpeechResult<SynthesisResult> {
        request.validate(&self.capabilities())?;
        let program = self
            .installed()
            .ok_or_else(|| SpeechError::BackendUnavailable {
                backend: "espeak".to_string(),
                reason: "espeak-ng not installed".to_string(),
            })?;
        let started = Instant::now();

        let voice = request
            .voice
            .as_deref()
            .or(request.language.as_deref())
            .unwrap_or("en");
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let rate = (BASE_RATE_WPM * request.speed.unwrap_or(1.0)).round() as u32;

        debug!(program = %program.display(), voice, rate, "espeak synthesis");

        let output = tokio::process::Command::new(program)
            .arg("--stdout")
            .arg("-v")
            .arg(voice)
            .arg("-s")
            .arg(rate.to_string())
            .arg(&request.text)
            .stdin(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            return Err(SpeechError::BackendUnavailable {
                backend: "espeak".to_string(),
                reason: format!(
                    "exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        let audio = output.stdout;
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
            voice_info("en", "English", "en", VoiceGender::Neutral),
            voice_info("en-us", "English (American)", "en-US", VoiceGender::Neutral),
            voice_info("de", "German", "de", VoiceGender::Neutral),
            voice_info("fr", "French", "fr", VoiceGender::Neutral),
            voice_info("es", "Spanish", "es", VoiceGender::Neutral),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_text_is_rejected_before_spawning() {
        let backend = EspeakBackend::new();
        let err = backend
            .synthesize(&SynthesisRequest::new(""))
            .await
            .unwrap_err();
        assert!(matches!(err, SpeechError::InvalidInput(_)));
    }
}

//! Request, result, and capability types shared by all backends.

use std::time::Duration;

use crate::error::{SpeechError, SpeechResult};

/// Encoding of a synthesized audio buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Wav,
    Mp3,
    /// Raw PCM without a container header.
    Pcm,
}

impl AudioFormat {
    /// File extension used when the buffer is spilled to disk for playback.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Mp3 => "mp3",
            Self::Pcm => "pcm",
        }
    }
}

/// One synthesis request. Immutable once issued to a backend.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SynthesisRequest {
    /// Text to synthesize.
    pub text: String,

    /// Voice identifier (backend-specific). `None` selects the backend's
    /// declared default voice.
    pub voice: Option<String>,

    /// Language hint (e.g. `"en"`).
    pub language: Option<String>,

    /// Speed multiplier (1.0 = normal).
    pub speed: Option<f32>,
}

impl SynthesisRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice: None,
            language: None,
            speed: None,
        }
    }

    #[must_use]
    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = Some(voice.into());
        self
    }

    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    #[must_use]
    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = Some(speed);
        self
    }

    /// Number of characters the request will be billed/bounded by.
    #[must_use]
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    /// Reject empty or over-length text before any backend is contacted.
    pub fn validate(&self, caps: &Capabilities) -> SpeechResult<()> {
        if self.text.trim().is_empty() {
            return Err(SpeechError::InvalidInput("text is empty".to_string()));
        }
        let count = self.char_count();
        if count > caps.max_text_length {
            return Err(SpeechError::InvalidInput(format!(
                "text is {count} chars, backend limit is {}",
                caps.max_text_length
            )));
        }
        Ok(())
    }
}

/// A finished synthesis. The buffer is owned by the caller; backends keep
/// no aliases into it.
#[derive(Debug, Clone)]
pub struct SynthesisResult {
    /// Encoded audio bytes.
    pub audio: Vec<u8>,

    /// Encoding of `audio`.
    pub format: AudioFormat,

    /// Playable length of the buffer.
    pub duration: Duration,

    /// Wall-clock time the backend spent producing the buffer.
    pub processing_time: Duration,

    /// Characters synthesized.
    pub char_count: usize,
}

impl SynthesisResult {
    #[must_use]
    pub fn duration_ms(&self) -> u64 {
        u64::try_from(self.duration.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Static description of what a backend can do. Used by the registry for
/// selection and by callers for input validation.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    /// Formats the backend can emit.
    pub formats: Vec<AudioFormat>,

    /// Whether audio can be emitted incrementally.
    pub streaming: bool,

    /// True when synthesis happens on this host (no network).
    pub local: bool,

    /// Maximum accepted text length in characters.
    pub max_text_length: usize,

    /// Whether the backend supports voice cloning.
    pub voice_cloning: bool,

    /// Approximate cost per character in USD (0.0 for local engines).
    pub cost_per_char: f64,
}

/// Information about an available voice.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceInfo {
    /// Voice identifier (used in requests).
    pub id: String,

    /// Human-readable display name.
    pub name: String,

    /// Language/accent category.
    pub language: String,

    /// Gender.
    pub gender: VoiceGender,
}

/// Voice gender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VoiceGender {
    Female,
    Male,
    Neutral,
}

/// Convenience constructor for [`VoiceInfo`].
#[must_use]
pub fn voice_info(id: &str, name: &str, language: &str, gender: VoiceGender) -> VoiceInfo {
    VoiceInfo {
        id: id.to_string(),
        name: name.to_string(),
        language: language.to_string(),
        gender,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(max: usize) -> Capabilities {
        Capabilities {
            formats: vec![AudioFormat::Wav],
            streaming: false,
            local: true,
            max_text_length: max,
            voice_cloning: false,
            cost_per_char: 0.0,
        }
    }

    #[test]
    fn empty_text_is_rejected() {
        let req = SynthesisRequest::new("   ");
        assert!(matches!(
            req.validate(&caps(100)),
            Err(SpeechError::InvalidInput(_))
        ));
    }

    #[test]
    fn over_length_text_is_rejected() {
        let req = SynthesisRequest::new("hello world");
        assert!(matches!(
            req.validate(&caps(5)),
            Err(SpeechError::InvalidInput(_))
        ));
        assert!(req.validate(&caps(11)).is_ok());
    }

    #[test]
    fn char_count_is_chars_not_bytes() {
        let req = SynthesisRequest::new("héllo");
        assert_eq!(req.char_count(), 5);
    }

    #[test]
    fn format_serializes_lowercase() {
        let json = serde_json::to_string(&AudioFormat::Wav).unwrap();
        assert_eq!(json, "\"wav\"");
    }
}

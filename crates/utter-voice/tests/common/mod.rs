//! Shared test doubles for the utter-voice integration tests.
//!
//! `MockBackend` implements [`SynthesisBackend`] without touching audio
//! hardware, model files, or the network, and counts how often it is
//! probed and called so tests can assert "never contacted".

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use utter_core::wav::{WavInfo, encode_pcm16};
use utter_core::{
    AudioFormat, Capabilities, SpeechResult, SynthesisBackend, SynthesisRequest, SynthesisResult,
    VoiceGender, VoiceInfo,
};
use utter_voice::registry::{BackendDescriptor, Constructor};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// A synthesis backend that returns a short burst of silence as WAV.
pub struct MockBackend {
    name: &'static str,
    available: bool,
    probe_delay: Duration,
    probes: AtomicUsize,
    synths: AtomicUsize,
    last_voice: std::sync::Mutex<Option<String>>,
}

impl MockBackend {
    pub fn new(name: &'static str, available: bool) -> Self {
        Self {
            name,
            available,
            probe_delay: Duration::ZERO,
            probes: AtomicUsize::new(0),
            synths: AtomicUsize::new(0),
            last_voice: std::sync::Mutex::new(None),
        }
    }

    /// Make the availability probe take a while, to prove selection is
    /// priority-ordered rather than latency-ordered.
    pub fn with_probe_delay(mut self, delay: Duration) -> Self {
        self.probe_delay = delay;
        self
    }

    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    pub fn synth_count(&self) -> usize {
        self.synths.load(Ordering::SeqCst)
    }

    /// The voice the last synthesize call resolved to.
    pub fn last_voice(&self) -> Option<String> {
        self.last_voice
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl SynthesisBackend for MockBackend {
    fn name(&self) -> &'static str {
        self.name
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            formats: vec![AudioFormat::Wav],
            streaming: false,
            local: true,
            max_text_length: 1000,
            voice_cloning: false,
            cost_per_char: 0.0,
        }
    }

    async fn is_available(&self) -> bool {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if !self.probe_delay.is_zero() {
            tokio::time::sleep(self.probe_delay).await;
        }
        self.available
    }

    async fn synthesize(&self, request: &SynthesisRequest) -> SpeechResult<SynthesisResult> {
        request.validate(&self.capabilities())?;
        self.synths.fetch_add(1, Ordering::SeqCst);

        let voice = request
            .voice
            .clone()
            .unwrap_or_else(|| "mock_default".to_string());
        *self
            .last_voice
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(voice);

        // 100 ms of silence at 16 kHz.
        let audio = encode_pcm16(&vec![0.0; 1600], 16_000);
        let duration = WavInfo::parse(&audio)
            .map(|info| info.duration())
            .unwrap_or(Duration::ZERO);

        Ok(SynthesisResult {
            audio,
            format: AudioFormat::Wav,
            duration,
            processing_time: Duration::from_millis(1),
            char_count: request.char_count(),
        })
    }

    async fn list_voices(&self) -> SpeechResult<Vec<VoiceInfo>> {
        Ok(vec![utter_core::types::voice_info(
            "mock_default",
            "Mock Default",
            "en",
            VoiceGender::Neutral,
        )])
    }
}

/// Registry entry over a pre-built shared backend instance.
pub fn entry(
    name: &'static str,
    priority: u8,
    backend: Arc<MockBackend>,
) -> (BackendDescriptor, Constructor) {
    (
        BackendDescriptor { name, priority },
        Box::new(move |_| Ok(Arc::clone(&backend) as Arc<dyn SynthesisBackend>)),
    )
}

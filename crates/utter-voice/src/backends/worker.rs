//! Worker-backed backend: Kokoro running in a persistent local process.
//!
//! The heavy lifting lives in [`utter_runtime::WorkerClient`]; this adapter
//! maps the [`SynthesisBackend`] contract onto its calls. The availability
//! probe only checks that the worker executable exists; the process itself
//! is spawned lazily by the client on the first real call, never by a
//! probe.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use utter_core::backend::SynthesisBackend;
use utter_core::config::WorkerConfig;
use utter_core::error::SpeechResult;
use utter_core::types::{
    AudioFormat, Capabilities, SynthesisRequest, SynthesisResult, VoiceInfo,
};
use utter_runtime::WorkerClient;

use super::executable_exists;

/// Persistent-worker synthesis backend.
pub struct WorkerBackend {
    client: Arc<WorkerClient>,
    executable: PathBuf,
}

impl WorkerBackend {
    #[must_use]
    pub fn new(config: &WorkerConfig) -> Self {
        Self {
            client: Arc::new(WorkerClient::new(config.clone())),
            executable: config.executable.clone(),
        }
    }

    /// Shared handle to the underlying client, for callers that need the
    /// worker-only operations (voice cloning, explicit shutdown).
    #[must_use]
    pub fn client(&self) -> Arc<WorkerClient> {
        Arc::clone(&self.client)
    }

    /// Register a cloned voice from an audio sample; returns the voice id.
    pub async fn clone_voice(&self, name: &str, sample_path: &Path) -> SpeechResult<String> {
        self.client.clone_voice(name, sample_path).await
    }

    /// Stop the worker process if it is running.
    pub async fn shutdown(&self) {
        self.client.shutdown().await;
    }
}

#[async_trait::async_trait]
impl SynthesisBackend for WorkerBackend {
    fn name(&self) -> &'static str {
        "kokoro"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            formats: vec![AudioFormat::Wav],
            streaming: false,
            local: true,
            max_text_length: 4000,
            voice_cloning: true,
            cost_per_char: 0.0,
        }
    }

    async fn is_available(&self) -> bool {
        executable_exists(&self.executable)
    }

    async fn synthesize(&self, request: &SynthesisRequest) -> SpeechResult<SynthesisResult> {
        request.validate(&self.capabilities())?;
        self.client.synthesize(request).await
    }

    async fn list_voices(&self) -> SpeechResult<Vec<VoiceInfo>> {
        self.client.list_voices().await
    }
}

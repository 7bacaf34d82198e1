//! The engine-agnostic synthesis backend trait.
//!
//! Every speech engine (cloud API, local CLI tool, persistent worker) is
//! exposed through [`SynthesisBackend`]. The registry and service operate on
//! trait objects (`Arc<dyn SynthesisBackend>`) so engines can be swapped
//! without touching selection or playback logic.

use crate::error::SpeechResult;
use crate::types::{Capabilities, SynthesisRequest, SynthesisResult, VoiceInfo};

/// Backend-agnostic text-to-speech engine.
///
/// Implementations must be `Send + Sync` so the registry can hand out
/// shared handles across `.await` points.
#[async_trait::async_trait]
pub trait SynthesisBackend: Send + Sync {
    /// Stable registry name of this backend.
    fn name(&self) -> &'static str;

    /// Static description of what this backend can do.
    fn capabilities(&self) -> Capabilities;

    /// Cheap, side-effect-light availability probe.
    ///
    /// May check for a credential or an executable on disk; must never
    /// spawn the worker or open a network connection. Probe failures are
    /// reported as `false`, never as errors, so the registry can keep
    /// trying lower-priority backends.
    async fn is_available(&self) -> bool;

    /// Synthesize text to an audio buffer.
    async fn synthesize(&self, request: &SynthesisRequest) -> SpeechResult<SynthesisResult>;

    /// List the voices this backend offers.
    async fn list_voices(&self) -> SpeechResult<Vec<VoiceInfo>>;
}

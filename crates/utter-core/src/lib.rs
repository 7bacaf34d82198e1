//! Core domain types and contracts for utter.
//!
//! This crate holds everything the other workspace members share: the
//! [`SynthesisBackend`] trait that every speech engine implements, the
//! request/result types that cross it, the error taxonomy, configuration,
//! and small WAV helpers. No adapter-specific dependencies live here.

#![deny(unsafe_code)]

pub mod backend;
pub mod config;
pub mod error;
pub mod types;
pub mod wav;

// Re-export commonly used types for convenience
pub use backend::SynthesisBackend;
pub use config::{
    CloudConfig, PlaybackConfig, PlaybackMode, PlayerSpec, SpeechConfig, WorkerConfig,
};
pub use error::{SpeechError, SpeechResult};
pub use types::{
    AudioFormat, Capabilities, SynthesisRequest, SynthesisResult, VoiceGender, VoiceInfo,
};

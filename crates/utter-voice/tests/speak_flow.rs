//! End-to-end `SpeechService` scenarios with mock backends and stand-in
//! players.
//!
//! # What is tested
//!
//! - "Hello world" through a local backend with no voice set uses the
//!   backend's default voice and yields a non-empty buffer with a positive
//!   duration
//! - an empty request fails with `InvalidInput` before any backend is
//!   probed or called
//! - over-length input is rejected by the selected backend's capabilities
//! - voice listing goes through backend selection

#![cfg(unix)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{MockBackend, entry};
use tempfile::TempDir;

use utter_core::config::{PlaybackConfig, PlaybackMode, PlayerSpec, SpeechConfig};
use utter_core::SpeechError;
use utter_voice::registry::BackendRegistry;
use utter_voice::{PlaybackCoordinator, SpeakOptions, SpeechService};

fn service_with(backend: Arc<MockBackend>, dir: &TempDir) -> SpeechService {
    let registry = BackendRegistry::with_entries(
        SpeechConfig::default(),
        vec![entry("mock", 100, backend)],
    );
    let coordinator = PlaybackCoordinator::new(PlaybackConfig {
        mode: PlaybackMode::Legacy,
        lock_path: dir.path().join("playback.lock"),
        lock_stale_after: Duration::from_secs(60),
        players: vec![PlayerSpec::new("true", &[])],
        preempt_patterns: vec!["utter-player-that-cannot-exist".to_string()],
    });
    SpeechService::with_parts(registry, coordinator)
}

#[tokio::test]
async fn hello_world_uses_the_default_voice() {
    common::init_tracing();
    let dir = TempDir::new().unwrap();
    let backend = Arc::new(MockBackend::new("mock", true));
    let service = service_with(Arc::clone(&backend), &dir);

    let result = service
        .speak("Hello world", &SpeakOptions::default())
        .await
        .unwrap();

    assert!(!result.audio.is_empty());
    assert!(result.duration_ms() > 0);
    assert_eq!(result.char_count, 11);
    assert_eq!(
        backend.last_voice().as_deref(),
        Some("mock_default"),
        "unset voiceId must resolve to the backend's default voice"
    );
    assert!(!dir.path().join("playback.lock").exists());
}

#[tokio::test]
async fn empty_text_fails_without_contacting_any_backend() {
    let dir = TempDir::new().unwrap();
    let backend = Arc::new(MockBackend::new("mock", true));
    let service = service_with(Arc::clone(&backend), &dir);

    let err = service
        .speak("", &SpeakOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SpeechError::InvalidInput(_)));
    assert_eq!(backend.probe_count(), 0, "no availability probe");
    assert_eq!(backend.synth_count(), 0, "no synthesis call");
}

#[tokio::test]
async fn over_length_text_is_rejected_by_capabilities() {
    let dir = TempDir::new().unwrap();
    let backend = Arc::new(MockBackend::new("mock", true));
    let service = service_with(Arc::clone(&backend), &dir);

    let long = "a".repeat(1001);
    let err = service
        .synthesize(&long, &SpeakOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SpeechError::InvalidInput(_)));
    assert_eq!(backend.synth_count(), 0);
}

#[tokio::test]
async fn explicit_voice_is_passed_through() {
    let dir = TempDir::new().unwrap();
    let backend = Arc::new(MockBackend::new("mock", true));
    let service = service_with(Arc::clone(&backend), &dir);

    let options = SpeakOptions {
        voice: Some("narrator".to_string()),
        ..SpeakOptions::default()
    };
    service.synthesize("Hi there", &options).await.unwrap();
    assert_eq!(backend.last_voice().as_deref(), Some("narrator"));
}

#[tokio::test]
async fn list_voices_resolves_through_the_registry() {
    let dir = TempDir::new().unwrap();
    let backend = Arc::new(MockBackend::new("mock", true));
    let service = service_with(backend, &dir);

    assert_eq!(service.list_backends(), vec!["mock"]);
    let voices = service.list_voices(None).await.unwrap();
    assert_eq!(voices.len(), 1);
    assert_eq!(voices[0].id, "mock_default");
}

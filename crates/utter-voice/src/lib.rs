//! Backend selection and audio playback for utter.
//!
//! Three pieces live here:
//!
//! - the [`BackendRegistry`], which maps backend names to cached instances,
//!   orders them by static priority, and resolves "best available" queries;
//! - the concrete [`backends`] (persistent worker, cloud API, local CLI);
//! - the [`PlaybackCoordinator`], which renders a finished buffer to the
//!   speakers through either a streaming or a legacy path while enforcing
//!   host-wide mutual exclusion via the [`playback::PlaybackLock`].
//!
//! [`SpeechService`] ties them together behind one `speak`/`synthesize`
//! surface.

#![deny(unsafe_code)]

pub mod backends;
pub mod playback;
pub mod registry;
pub mod service;

// Re-export key types for convenience
pub use playback::PlaybackCoordinator;
pub use registry::{BackendDescriptor, BackendRegistry};
pub use service::{SpeakOptions, SpeechService};

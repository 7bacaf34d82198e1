//! Backend registry: name → cached instance, ordered availability probing.
//!
//! Backends register with a static priority; selection walks them from
//! highest to lowest, probing availability sequentially so a higher-priority
//! backend is never skipped merely because a lower-priority probe returned
//! faster. Probing is cheap by contract (see
//! [`SynthesisBackend::is_available`]), so trying several in a row costs
//! little.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use utter_core::backend::SynthesisBackend;
use utter_core::config::SpeechConfig;
use utter_core::error::{SpeechError, SpeechResult};

/// Static registration facts for one backend. Names are unique; a higher
/// priority wins when several backends are simultaneously available.
#[derive(Debug, Clone, Copy)]
pub struct BackendDescriptor {
    pub name: &'static str,
    pub priority: u8,
}

/// Constructs a backend instance on first use. Must not perform I/O; cheap
/// existence checks belong in the availability probe.
pub type Constructor =
    Box<dyn Fn(&SpeechConfig) -> SpeechResult<Arc<dyn SynthesisBackend>> + Send + Sync>;

struct RegistryEntry {
    descriptor: BackendDescriptor,
    construct: Constructor,
}

/// Registry of synthesis backends with priority-ordered fallback.
pub struct BackendRegistry {
    config: SpeechConfig,
    /// Sorted by descending priority; ties keep registration order.
    entries: Vec<RegistryEntry>,
    cache: std::sync::Mutex<HashMap<&'static str, Arc<dyn SynthesisBackend>>>,
}

impl BackendRegistry {
    /// Registry over the built-in backend table.
    #[must_use]
    pub fn new(config: SpeechConfig) -> Self {
        Self::with_entries(config, crate::backends::default_entries())
    }

    /// Registry over an arbitrary table (used by tests and embedders).
    #[must_use]
    pub fn with_entries(
        config: SpeechConfig,
        entries: Vec<(BackendDescriptor, Constructor)>,
    ) -> Self {
        let mut entries: Vec<RegistryEntry> = entries
            .into_iter()
            .map(|(descriptor, construct)| RegistryEntry {
                descriptor,
                construct,
            })
            .collect();
        // Stable sort: equal priorities keep their registration order.
        entries.sort_by_key(|e| std::cmp::Reverse(e.descriptor.priority));
        Self {
            config,
            entries,
            cache: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Return the cached instance for `name`, constructing it on first use.
    pub fn create(&self, name: &str) -> SpeechResult<Arc<dyn SynthesisBackend>> {
        let entry = self
            .entries
            .iter()
            .find(|e| e.descriptor.name == name)
            .ok_or_else(|| SpeechError::UnknownBackend(name.to_string()))?;

        let mut cache = self
            .cache
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(backend) = cache.get(entry.descriptor.name) {
            return Ok(Arc::clone(backend));
        }
        let backend = (entry.construct)(&self.config)?;
        cache.insert(entry.descriptor.name, Arc::clone(&backend));
        Ok(backend)
    }

    /// Backend names by descending priority. Deterministic across calls.
    #[must_use]
    pub fn list(&self) -> Vec<&'static str> {
        self.entries.iter().map(|e| e.descriptor.name).collect()
    }

    /// Probe backends in priority order and return the first available one.
    ///
    /// Probes run sequentially: determinism over probe latency. A backend
    /// whose construction or probe fails counts as unavailable.
    pub async fn get_available(&self) -> Option<Arc<dyn SynthesisBackend>> {
        for name in self.list() {
            match self.create(name) {
                Ok(backend) => {
                    if backend.is_available().await {
                        info!(backend = name, "selected backend");
                        return Some(backend);
                    }
                    debug!(backend = name, "probe reported unavailable");
                }
                Err(err) => debug!(backend = name, error = %err, "constructor failed"),
            }
        }
        None
    }

    /// Probe `preferred` first if given; otherwise (or if it is
    /// unavailable) fall back to [`get_available`](Self::get_available).
    ///
    /// `NoBackendAvailable` is the only hard failure mode here besides an
    /// unknown preferred name.
    pub async fn get_with_fallback(
        &self,
        preferred: Option<&str>,
    ) -> SpeechResult<Arc<dyn SynthesisBackend>> {
        if let Some(name) = preferred {
            match self.create(name) {
                Ok(backend) if backend.is_available().await => {
                    info!(backend = name, "using preferred backend");
                    return Ok(backend);
                }
                Ok(_) => debug!(backend = name, "preferred backend unavailable, falling back"),
                Err(err @ SpeechError::UnknownBackend(_)) => return Err(err),
                Err(err) => debug!(backend = name, error = %err, "preferred constructor failed"),
            }
        }
        self.get_available()
            .await
            .ok_or(SpeechError::NoBackendAvailable)
    }
}

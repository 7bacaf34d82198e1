//! Concrete synthesis backends.
//!
//! | Name     | Engine                               | Priority |
//! |----------|--------------------------------------|----------|
//! | `kokoro` | persistent local worker process      | 100      |
//! | `openai` | OpenAI-compatible `/audio/speech`    | 50       |
//! | `espeak` | espeak-ng CLI                        | 10       |
//!
//! The worker wins when its executable is installed (free, local); the
//! cloud backend needs a key; espeak is the last resort that is almost
//! always installable.

pub mod espeak;
pub mod openai;
pub mod worker;

use std::env;
use std::path::Path;
use std::sync::Arc;

use utter_core::backend::SynthesisBackend;

use crate::registry::{BackendDescriptor, Constructor};

pub use espeak::EspeakBackend;
pub use openai::OpenAiBackend;
pub use worker::WorkerBackend;

pub const KOKORO: BackendDescriptor = BackendDescriptor {
    name: "kokoro",
    priority: 100,
};
pub const OPENAI: BackendDescriptor = BackendDescriptor {
    name: "openai",
    priority: 50,
};
pub const ESPEAK: BackendDescriptor = BackendDescriptor {
    name: "espeak",
    priority: 10,
};

/// The built-in name → constructor table.
#[must_use]
pub fn default_entries() -> Vec<(BackendDescriptor, Constructor)> {
    vec![
        (
            KOKORO,
            Box::new(|config| {
                Ok(Arc::new(WorkerBackend::new(&config.worker)) as Arc<dyn SynthesisBackend>)
            }),
        ),
        (
            OPENAI,
            Box::new(|config| {
                let backend = OpenAiBackend::new(&config.cloud)?;
                Ok(Arc::new(backend) as Arc<dyn SynthesisBackend>)
            }),
        ),
        (
            ESPEAK,
            Box::new(|_| Ok(Arc::new(EspeakBackend::new()) as Arc<dyn SynthesisBackend>)),
        ),
    ]
}

/// True when `program` resolves to an existing file: either directly (it
/// contains a path separator) or through `PATH`. Never executes anything.
#[must_use]
pub(crate) fn executable_exists(program: &Path) -> bool {
    if program.components().count() > 1 {
        return program.is_file();
    }
    let Some(paths) = env::var_os("PATH") else {
        return false;
    };
    env::split_paths(&paths).any(|dir| dir.join(program).is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    #[cfg(unix)]
    fn path_lookup_finds_sh() {
        assert!(executable_exists(&PathBuf::from("sh")));
        assert!(!executable_exists(&PathBuf::from("utter-no-such-binary")));
    }

    #[test]
    fn explicit_path_is_checked_directly() {
        assert!(!executable_exists(&PathBuf::from("/nonexistent/dir/worker")));
    }

    #[test]
    fn default_table_covers_all_names() {
        let names: Vec<_> = default_entries()
            .iter()
            .map(|(d, _)| d.name)
            .collect();
        assert_eq!(names, vec!["kokoro", "openai", "espeak"]);
    }
}

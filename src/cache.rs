//! Artifact cache keyed by a hash of the diagram description
//!
//! The same description always compiles to the same markup, so re-submitting
//! an unchanged description (common when hosts re-analyze a project) can skip
//! the external compiler entirely. Keys are sha256 of the description text.

use std::collections::HashMap;

use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use crate::compiler::VisualArtifact;

/// In-memory, process-lifetime cache of compiled artifacts.
#[derive(Default)]
pub struct ArtifactCache {
    entries: Mutex<HashMap<String, VisualArtifact>>,
}

/// Deterministic cache key for a description.
pub fn cache_key(description: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(description.as_bytes());
    let hash = hasher.finalize();
    hash.iter().map(|b| format!("{b:02x}")).collect()
}

impl ArtifactCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, description: &str) -> Option<VisualArtifact> {
        let key = cache_key(description);
        let hit = self.entries.lock().get(&key).cloned();
        if hit.is_some() {
            log::debug!("artifact cache hit ({}...)", &key[..12]);
        }
        hit
    }

    pub fn insert(&self, description: &str, artifact: VisualArtifact) {
        let key = cache_key(description);
        log::debug!("artifact cached ({}...)", &key[..12]);
        self.entries.lock().insert(key, artifact);
    }

    pub fn clear(&self) {
        let mut entries = self.entries.lock();
        log::info!("cleared {} cached artifact(s)", entries.len());
        entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

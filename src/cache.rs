//! Optional PDF cache keyed by a content hash of the inputs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use log::debug;
use sha2::{Digest, Sha256};

use crate::pipeline::PdfArtifact;
use crate::style_config::StyleConfig;

/// Deterministic SHA-256 hex key of `(markdown, css, styles)`.
///
/// Fields are length-prefixed so that moving text between them changes the
/// key.
pub fn content_key(markdown: &str, css: &str, styles: &StyleConfig) -> String {
    let styles_json = styles.to_json();
    let mut hasher = Sha256::new();
    for part in [markdown, css, styles_json.as_str()] {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Storage for finished PDFs.
pub trait PdfCache: Send + Sync {
    fn get(&self, key: &str) -> Option<PdfArtifact>;
    fn set(&self, key: &str, entry: PdfArtifact);
}

/// In-process cache with an optional time-to-live.
#[derive(Clone, Default)]
pub struct MemoryCache {
    entries: Arc<Mutex<HashMap<String, (Instant, PdfArtifact)>>>,
    ttl: Option<Duration>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries older than `ttl` are treated as absent.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: Arc::default(),
            ttl: Some(ttl),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PdfCache for MemoryCache {
    fn get(&self, key: &str) -> Option<PdfArtifact> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let (stored, artifact) = entries.get(key)?;
        if self.ttl.is_some_and(|ttl| stored.elapsed() > ttl) {
            debug!("cache entry {} expired", &key[..key.len().min(12)]);
            entries.remove(key);
            return None;
        }
        Some(artifact.clone())
    }

    fn set(&self, key: &str, entry: PdfArtifact) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), (Instant::now(), entry));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact() -> PdfArtifact {
        PdfArtifact {
            pdf_base64: "JVBERi0=".into(),
            page_count: 1,
        }
    }

    #[test]
    fn key_is_stable_and_sensitive() {
        let s = StyleConfig::default();
        let k = content_key("# A", "p{}", &s);
        assert_eq!(k.len(), 64);
        assert_eq!(k, content_key("# A", "p{}", &s));
        assert_ne!(k, content_key("# A", "p{ }", &s));
        assert_ne!(k, content_key("# Ap{}", "", &s));
        assert_ne!(k, content_key("# A", "p{}", &StyleConfig::letter()));
    }

    #[test]
    fn memory_cache_round_trip() {
        let cache = MemoryCache::new();
        assert!(cache.get("k").is_none());
        cache.set("k", artifact());
        assert_eq!(cache.get("k"), Some(artifact()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn expired_entries_are_dropped() {
        let cache = MemoryCache::with_ttl(Duration::ZERO);
        cache.set("k", artifact());
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("k").is_none());
        assert!(cache.is_empty());
    }
}

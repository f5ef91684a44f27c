//! Published discovery state.
//!
//! # Responsibilities
//! - Hold the current (config, provider, documents) triple
//! - Give HTTP readers a consistent snapshot without blocking on refreshes
//! - Serialize writers so read-modify-write updates never interleave
//!
//! # Design Decisions
//! - The triple lives in one `Arc<Snapshot>` swapped with arc-swap; a reader
//!   sees the whole previous or the whole next snapshot, never a mix
//! - Snapshots are never mutated after publication, only replaced

use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;

use crate::config::Config;
use crate::discovery::document::{DocumentSet, SdConfig};
use crate::provider::DnsProvider;

/// One published generation of discovery state.
#[derive(Clone, Default)]
pub struct Snapshot {
    pub config: Option<Arc<Config>>,
    pub provider: Option<Arc<dyn DnsProvider>>,
    pub documents: Arc<DocumentSet>,
}

impl std::fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snapshot")
            .field("config", &self.config)
            .field("provider", &self.provider.as_ref().map(|p| p.kind()))
            .field("paths", &self.documents.len())
            .finish()
    }
}

/// Shared store read by the HTTP surface and written by the refresh engine.
pub struct DocumentStore {
    current: ArcSwap<Snapshot>,
    writer: Mutex<()>,
}

impl DocumentStore {
    /// Create an empty store: no config, no provider, no documents.
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(Snapshot::default()),
            writer: Mutex::new(()),
        }
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    /// Owned copy of the target groups published under `path`.
    pub fn get(&self, path: &str) -> Option<Vec<SdConfig>> {
        self.with_document(path, <[SdConfig]>::to_vec)
    }

    /// Run `f` on the target groups under `path` without copying them.
    pub fn with_document<F, R>(&self, path: &str, f: F) -> Option<R>
    where
        F: FnOnce(&[SdConfig]) -> R,
    {
        self.current.load().documents.get(path).map(|groups| f(groups))
    }

    /// Published paths, sorted.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.current.load().documents.keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Replace the whole triple.
    pub fn publish(
        &self,
        config: Option<Arc<Config>>,
        provider: Option<Arc<dyn DnsProvider>>,
        documents: DocumentSet,
    ) {
        self.update(|_| Snapshot {
            config,
            provider,
            documents: Arc::new(documents),
        });
    }

    /// Derive the next snapshot from the current one under the writer lock.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&Snapshot) -> Snapshot,
    {
        // A poisoned lock only means a previous writer panicked; the snapshot
        // itself is still consistent.
        let _guard = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        let current = self.current.load_full();
        self.current.store(Arc::new(f(&current)));
    }
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::thread;

    fn documents(generation: usize, groups: usize) -> DocumentSet {
        let group = SdConfig {
            targets: vec![format!("gen-{}:80", generation)],
            labels: BTreeMap::new(),
        };
        [("/a".to_string(), vec![group.clone(); groups]), ("/b".to_string(), vec![group; groups])]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_empty_store() {
        let store = DocumentStore::new();
        assert!(store.get("/a").is_none());
        assert!(store.snapshot().config.is_none());
        assert!(store.paths().is_empty());
    }

    #[test]
    fn test_publish_replaces_everything() {
        let store = DocumentStore::new();
        store.publish(None, None, documents(1, 1));
        assert_eq!(store.paths(), vec!["/a".to_string(), "/b".to_string()]);

        store.publish(None, None, DocumentSet::new());
        assert!(store.get("/a").is_none());
    }

    #[test]
    fn test_with_document_borrows_published_groups() {
        let store = DocumentStore::new();
        store.publish(None, None, documents(3, 2));

        let snapshot = store.snapshot();
        let published = snapshot.documents["/a"].as_ptr();
        assert_eq!(store.with_document("/a", |groups| groups.as_ptr()), Some(published));
        assert_eq!(store.with_document("/a", |groups| groups[0].targets.clone()), Some(vec!["gen-3:80".to_string()]));
        assert_eq!(store.with_document("/missing", |groups| groups.len()), None);
    }

    #[test]
    fn test_update_keeps_untouched_fields() {
        let store = DocumentStore::new();
        store.publish(None, None, documents(1, 2));
        store.update(|current| Snapshot {
            config: Some(Arc::new(
                serde_yaml::from_str("provider: {type: static}").unwrap(),
            )),
            ..current.clone()
        });

        let snapshot = store.snapshot();
        assert!(snapshot.config.is_some());
        assert_eq!(snapshot.documents.get("/a").map(Vec::len), Some(2));
    }

    #[test]
    fn test_concurrent_readers_never_see_mixed_generations() {
        let store = Arc::new(DocumentStore::new());
        store.publish(None, None, documents(0, 8));

        let writer = {
            let store = store.clone();
            thread::spawn(move || {
                for generation in 1..500 {
                    store.publish(None, None, documents(generation, 8));
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                thread::spawn(move || {
                    for _ in 0..2000 {
                        let snapshot = store.snapshot();
                        let a = &snapshot.documents["/a"];
                        let b = &snapshot.documents["/b"];
                        assert_eq!(a.len(), 8);
                        assert!(a.iter().chain(b.iter()).all(|g| g.targets == a[0].targets));
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
    }
}

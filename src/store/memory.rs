use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::store::{apply_merge, Document, DocumentStore, StoreError};

/// Process-local document store. Also counts calls so callers can assert
/// how much remote traffic an operation would have caused.
#[derive(Default)]
pub struct MemoryDocumentStore {
    /// path → document
    documents: DashMap<String, Document>,
    reads: AtomicU64,
    merges: AtomicU64,
}

impl MemoryDocumentStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    #[cfg(test)]
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    #[cfg(test)]
    pub fn merge_count(&self) -> u64 {
        self.merges.load(Ordering::Relaxed)
    }

    #[cfg(test)]
    pub fn document_count(&self) -> usize {
        self.documents.len()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, path: &str) -> Result<Option<Document>, StoreError> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(self.documents.get(path).map(|d| d.value().clone()))
    }

    async fn merge(&self, path: &str, patch: &Document) -> Result<(), StoreError> {
        self.merges.fetch_add(1, Ordering::Relaxed);
        // The entry guard holds the shard lock, so concurrent merges to one path serialize.
        let mut entry = self.documents.entry(path.to_string()).or_default();
        apply_merge(path, entry.value_mut(), patch)
    }

    async fn put(&self, path: &str, document: Document) -> Result<(), StoreError> {
        self.documents.insert(path.to_string(), document);
        Ok(())
    }
}

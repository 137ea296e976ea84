//! In-memory [`KnowledgeStore`] implementation for testing.
//!
//! Documents are kept in their serialized NDJSON form so the codec is
//! exercised exactly as with the real backends. Every call to
//! [`store`](KnowledgeStore::store) is counted.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::knowledge::KnowledgeSet;

use super::KnowledgeStore;

/// In-memory store keyed by logical path.
pub struct InMemoryStore {
    documents: RwLock<HashMap<String, String>>,
    writes: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
            writes: AtomicUsize::new(0),
        }
    }

    /// Number of completed `store` calls.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Raw serialized document at `path`, if any.
    pub fn document(&self, path: &str) -> Option<String> {
        self.documents.read().ok()?.get(path).cloned()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KnowledgeStore for InMemoryStore {
    fn backend(&self) -> &str {
        "memory"
    }

    fn location(&self, path: &str) -> String {
        format!("memory://{}", path)
    }

    async fn load(&self, path: &str) -> Result<KnowledgeSet> {
        match self.document(path) {
            Some(text) => Ok(KnowledgeSet::from_json_lines(&text)?),
            None => Ok(KnowledgeSet::new()),
        }
    }

    async fn store(&self, path: &str, knowledge: &KnowledgeSet) -> Result<()> {
        let text = knowledge.to_json_lines()?;
        self.documents
            .write()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))?
            .insert(path.to_string(), text);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PullRequestRecord;

    #[tokio::test]
    async fn load_missing_is_empty() {
        let store = InMemoryStore::new();
        let set = store.load("org/repo/PullRequest.json").await.unwrap();
        assert!(set.is_empty());
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn store_then_load() {
        let store = InMemoryStore::new();
        let record = PullRequestRecord::new("bob".into(), 10, vec![], 1, None).to_record();
        let set: KnowledgeSet = std::iter::once((5, record)).collect();

        store.store("a/b/PullRequest.json", &set).await.unwrap();
        let loaded = store.load("a/b/PullRequest.json").await.unwrap();

        assert_eq!(loaded, set);
        assert_eq!(store.writes(), 1);
        assert!(store
            .document("a/b/PullRequest.json")
            .unwrap()
            .contains("\"id\":5"));
    }
}

//! Storage abstraction for repository knowledge.
//!
//! The [`KnowledgeStore`] trait is the only way knowledge is read or written.
//! Backends (local filesystem, S3-compatible object storage, in-memory) are
//! chosen once at startup and handed to the sync engine as a trait object.
//!
//! Paths are **logical**: `{repository_full_name}/{EntityType}.json`, see
//! [`knowledge_path`]. Each backend maps them onto its own medium.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::knowledge::KnowledgeSet;

/// Abstract storage backend for knowledge sets.
///
/// # Contract
///
/// | Method | Behavior |
/// |--------|----------|
/// | [`load`](KnowledgeStore::load) | Returns an empty set when nothing is stored at `path`. |
/// | [`store`](KnowledgeStore::store) | Replaces whatever is stored at `path` with the full set. |
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Short backend identifier (`"local"`, `"s3"`, `"memory"`).
    fn backend(&self) -> &str;

    /// Human-readable location of `path` for log output.
    fn location(&self, path: &str) -> String;

    /// Load the knowledge set stored at `path`.
    async fn load(&self, path: &str) -> Result<KnowledgeSet>;

    /// Persist `knowledge` at `path`, overwriting previous content.
    async fn store(&self, path: &str, knowledge: &KnowledgeSet) -> Result<()>;
}

/// Logical path of a repository's knowledge file for one entity type.
///
/// ```
/// use knowledge_core::store::knowledge_path;
/// assert_eq!(knowledge_path("thoth-station/amun-api", "PullRequest"),
///            "thoth-station/amun-api/PullRequest.json");
/// ```
pub fn knowledge_path(repository_full_name: &str, entity: &str) -> String {
    format!("{}/{}.json", repository_full_name.trim_matches('/'), entity)
}

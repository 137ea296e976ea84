//! The entity harvester extension point.
//!
//! Every entity type that can be harvested (pull requests today) implements
//! [`EntityHarvester`]. The sync engine is written once against this trait
//! and never against a concrete harvester.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────┐
//! │            HarvesterRegistry              │
//! │  ┌─────────────┐   ┌──────────────────┐   │
//! │  │ PullRequest │   │ Custom (Rust)    │   │
//! │  └─────────────┘   └──────────────────┘   │
//! └──────────────┬────────────────────────────┘
//!                ▼
//!        SyncEngine::sync_entity() → KnowledgeStore
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use repo_knowledge::traits::HarvesterRegistry;
//! # fn client() -> Arc<dyn repo_knowledge::github::PlatformClient> { unimplemented!() }
//!
//! let registry = HarvesterRegistry::for_entities(&["PullRequest".to_string()], client()).unwrap();
//! assert_eq!(registry.len(), 1);
//! ```

use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;

use knowledge_core::{EntityHandle, EntityId, EntitySchema, KnowledgeSet, Record};

use crate::config::KNOWN_ENTITIES;
use crate::github::PlatformClient;
use crate::pull_request::PullRequestHarvester;

// ═══════════════════════════════════════════════════════════════════════
// EntityHarvester Trait
// ═══════════════════════════════════════════════════════════════════════

/// Harvests one entity type from the remote platform.
///
/// # Lifecycle
///
/// 1. [`list_raw`](EntityHarvester::list_raw) lists every candidate entity.
/// 2. The engine drops those already present in previous knowledge.
/// 3. [`analyse`](EntityHarvester::analyse) runs once per remaining entity.
/// 4. [`store`](EntityHarvester::store) puts each result into the pass's
///    new-knowledge set.
/// 5. The merged set is checked against [`schema`](EntityHarvester::schema)
///    and persisted.
///
/// # Example
///
/// ```rust
/// use anyhow::Result;
/// use async_trait::async_trait;
/// use knowledge_core::{EntityHandle, EntitySchema, Record, PULL_REQUEST_SCHEMA};
/// use repo_knowledge::traits::EntityHarvester;
///
/// pub struct FixedHarvester;
///
/// #[async_trait]
/// impl EntityHarvester for FixedHarvester {
///     fn name(&self) -> &str { "PullRequest" }
///     fn description(&self) -> &str { "Always sees pull request #1" }
///     fn schema(&self) -> &EntitySchema { &PULL_REQUEST_SCHEMA }
///
///     async fn list_raw(&self, _repository: &str) -> Result<Vec<EntityHandle>> {
///         Ok(vec![EntityHandle::new(1)])
///     }
///
///     async fn analyse(&self, _repository: &str, _handle: &EntityHandle) -> Result<Record> {
///         Ok(Record::new())
///     }
/// }
/// ```
#[async_trait]
pub trait EntityHarvester: Send + Sync {
    /// Entity type name (e.g. `"PullRequest"`). Also the knowledge file stem.
    fn name(&self) -> &str;

    /// One-line description for `harvest repos` output.
    fn description(&self) -> &str;

    /// Declared shape of every record this harvester produces.
    fn schema(&self) -> &EntitySchema;

    /// List every remote entity of this type for `repository`.
    ///
    /// Connectivity and authentication failures are returned as errors and
    /// end the pass.
    async fn list_raw(&self, repository: &str) -> Result<Vec<EntityHandle>>;

    /// Fetch an entity's detail and extract its record.
    async fn analyse(&self, repository: &str, handle: &EntityHandle) -> Result<Record>;

    /// Add an analysed record to the new-knowledge set under its ID.
    fn store(&self, new_knowledge: &mut KnowledgeSet, id: EntityId, record: Record) {
        new_knowledge.insert(id, record);
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Registry
// ═══════════════════════════════════════════════════════════════════════

/// Registry of harvesters (built-in and custom).
pub struct HarvesterRegistry {
    harvesters: Vec<Box<dyn EntityHarvester>>,
}

impl HarvesterRegistry {
    /// Create an empty harvester registry.
    pub fn new() -> Self {
        Self {
            harvesters: Vec::new(),
        }
    }

    /// Create a registry with the built-in harvester for each named entity type.
    pub fn for_entities(entities: &[String], client: Arc<dyn PlatformClient>) -> Result<Self> {
        let mut registry = Self::new();

        for entity in entities {
            match entity.as_str() {
                "PullRequest" => {
                    registry.register(Box::new(PullRequestHarvester::new(client.clone())))
                }
                other => bail!(
                    "Unknown entity type: '{}'. Available: {}",
                    other,
                    KNOWN_ENTITIES.join(", ")
                ),
            }
        }

        Ok(registry)
    }

    /// Register a harvester.
    pub fn register(&mut self, harvester: Box<dyn EntityHarvester>) {
        self.harvesters.push(harvester);
    }

    /// Get all registered harvesters.
    pub fn harvesters(&self) -> &[Box<dyn EntityHarvester>] {
        &self.harvesters
    }

    pub fn is_empty(&self) -> bool {
        self.harvesters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.harvesters.len()
    }
}

impl Default for HarvesterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

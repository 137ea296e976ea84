//! # Knowledge Core
//!
//! Shared, I/O-free logic for Repo Knowledge: harvested record models,
//! ordered knowledge sets with diff and disjoint merge, the NDJSON codec,
//! declarative schema checks, and the storage trait.
//!
//! This crate contains no tokio, HTTP, or filesystem code. Concrete storage
//! backends and the platform client live in the `repo-knowledge` crate.

pub mod knowledge;
pub mod models;
pub mod schema;
pub mod store;

pub use knowledge::{only_new, KnowledgeError, KnowledgeSet};
pub use models::{EntityHandle, EntityId, HasEntityId, PullRequestRecord, Record};
pub use schema::{EntitySchema, SchemaViolation, PULL_REQUEST_SCHEMA};
pub use store::{knowledge_path, KnowledgeStore};

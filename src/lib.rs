//! # Repo Knowledge
//!
//! Incremental harvesting of pull request metadata from GitHub into
//! append-only, per-repository knowledge files.
//!
//! Each run loads what is already known about a repository, lists the
//! remote entities, analyses only the ones never seen before, and writes
//! the merged set back. Stored records are never re-fetched or rewritten.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌───────────────────┐
//! │ GitHub API   │──▶│  Harvesters  │──▶│   SyncEngine      │
//! │ (reqwest)    │   │ PullRequest  │   │ diff/merge/verify │
//! └──────────────┘   └──────────────┘   └─────────┬─────────┘
//!                                                 ▼
//!                                      ┌─────────────────────┐
//!                                      │   KnowledgeStore    │
//!                                      │  local fs │ S3      │
//!                                      └─────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export GITHUB_ACCESS_TOKEN=...
//! harvest repos                          # what would be harvested, and where
//! harvest sync                           # harvest every configured repository
//! harvest show thoth-station/amun-api    # summary of stored knowledge
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment overrides |
//! | [`github`] | GitHub REST client behind the [`github::PlatformClient`] trait |
//! | [`traits`] | [`traits::EntityHarvester`] trait and registry |
//! | [`pull_request`] | Pull request harvester |
//! | [`storage`] | Backend selection |
//! | [`storage_fs`] | Local filesystem backend |
//! | [`storage_s3`] | S3-compatible backend |
//! | [`sync`] | Sync engine and `harvest sync` |
//! | [`legacy`] | Legacy single-file knowledge |
//! | [`show`] | Stored knowledge summary |
//! | [`repos`] | Configured repository listing |
//! | [`progress`] | Progress reporting on stderr |
//!
//! Record models, knowledge sets, schema checks and the storage trait live
//! in the `knowledge_core` crate.

pub mod config;
pub mod github;
pub mod legacy;
pub mod progress;
pub mod pull_request;
pub mod repos;
pub mod show;
pub mod storage;
pub mod storage_fs;
pub mod storage_s3;
pub mod sync;
pub mod traits;

//! Storage backend selection.
//!
//! The backend is picked once from configuration (after the
//! `KNOWLEDGE_STORAGE` / `KNOWLEDGE_PATH` overrides) and shared as a trait
//! object for the whole run.

use std::sync::Arc;

use anyhow::{Context, Result};

use knowledge_core::KnowledgeStore;

use crate::config::{Config, StorageKind};
use crate::storage_fs::LocalStore;
use crate::storage_s3::S3Store;

/// Build the configured [`KnowledgeStore`].
pub fn from_config(config: &Config) -> Result<Arc<dyn KnowledgeStore>> {
    match config.storage.backend {
        StorageKind::Local => Ok(Arc::new(LocalStore::new(config.storage.root.clone()))),
        StorageKind::S3 => {
            let s3 = config
                .storage
                .s3
                .clone()
                .context("storage.s3 must be configured when storage.backend is 's3'")?;
            let root = config.storage.root.to_string_lossy();
            Ok(Arc::new(S3Store::from_env(s3, &root)?))
        }
    }
}

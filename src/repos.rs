//! `harvest repos`: configured repositories and their storage targets.
//!
//! Nothing is fetched or written; the listing only shows where each
//! repository's knowledge would be stored.

use anyhow::Result;

use knowledge_core::knowledge_path;

use crate::config::{Config, StorageKind};
use crate::storage_s3::object_key;

/// Backend name and root location, e.g. `s3 s3://bucket/bots/knowledge`.
///
/// S3 targets use the same key normalization as the store itself.
pub fn storage_target(config: &Config) -> String {
    match config.storage.backend {
        StorageKind::Local => format!("local {}", config.storage.root.display()),
        StorageKind::S3 => match &config.storage.s3 {
            Some(s3) => {
                let root = config.storage.root.to_string_lossy();
                format!("s3 s3://{}/{}", s3.bucket, object_key(&s3.prefix, &root, ""))
            }
            None => "s3 (NOT CONFIGURED)".to_string(),
        },
    }
}

/// `harvest repos`: list configured repositories and where their knowledge goes.
pub fn list_repositories(config: &Config) -> Result<()> {
    println!("storage: {}", storage_target(config));
    println!("entities: {}", config.harvest.entities.join(", "));
    println!();

    if config.repositories.is_empty() {
        println!("no repositories configured");
        return Ok(());
    }

    println!("{:<40} {:<10} KNOWLEDGE", "REPOSITORY", "STATUS");
    for repo in &config.repositories {
        let complete = !repo.organization.trim().is_empty() && !repo.name.trim().is_empty();
        let status = if complete { "OK" } else { "SKIPPED" };
        let files = config
            .harvest
            .entities
            .iter()
            .map(|entity| knowledge_path(&repo.full_name(), entity))
            .collect::<Vec<_>>()
            .join(", ");
        println!("{:<40} {:<10} {}", repo.full_name(), status, files);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    #[test]
    fn s3_target_uses_normalized_key() {
        let cfg = parse_config(
            "[storage]\nbackend = \"s3\"\nroot = \"./knowledge\"\n\n[storage.s3]\nbucket = \"bucket\"\nprefix = \"bots/\"\n",
        )
        .unwrap();
        assert_eq!(storage_target(&cfg), "s3 s3://bucket/bots/knowledge");
    }

    #[test]
    fn s3_target_without_prefix() {
        let cfg = parse_config(
            "[storage]\nbackend = \"s3\"\nroot = \"/knowledge/\"\n\n[storage.s3]\nbucket = \"bucket\"\n",
        )
        .unwrap();
        assert_eq!(storage_target(&cfg), "s3 s3://bucket/knowledge");
    }

    #[test]
    fn local_target_shows_root() {
        let cfg = parse_config("[storage]\nroot = \"/data/k\"\n").unwrap();
        assert_eq!(storage_target(&cfg), "local /data/k");
    }

    #[test]
    fn s3_without_settings_is_flagged() {
        let mut cfg = parse_config("").unwrap();
        cfg.storage.backend = StorageKind::S3;
        assert_eq!(storage_target(&cfg), "s3 (NOT CONFIGURED)");
    }
}

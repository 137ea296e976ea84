//! Configuration parsing and validation.
//!
//! Settings come from a TOML file (default `./config/harvest.toml`) with two
//! environment overrides for the storage target:
//!
//! | Variable | Overrides |
//! |----------|-----------|
//! | `KNOWLEDGE_STORAGE` | `storage.backend` (`local` or `s3`) |
//! | `KNOWLEDGE_PATH` | `storage.root` |
//!
//! The platform credential (`GITHUB_ACCESS_TOKEN`) and S3 credentials are read
//! by the modules that use them, never stored in the config.
//!
//! ```toml
//! [storage]
//! backend = "local"
//! root = "./knowledge"
//!
//! [[repositories]]
//! organization = "thoth-station"
//! name = "amun-api"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const STORAGE_ENV: &str = "KNOWLEDGE_STORAGE";
pub const STORAGE_PATH_ENV: &str = "KNOWLEDGE_PATH";

/// Entity types this build knows how to harvest.
pub const KNOWN_ENTITIES: &[&str] = &["PullRequest"];

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub github: GitHubConfig,
    #[serde(default)]
    pub repositories: Vec<RepositoryConfig>,
    #[serde(default)]
    pub harvest: HarvestConfig,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Local,
    S3,
}

impl FromStr for StorageKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(StorageKind::Local),
            "s3" => Ok(StorageKind::S3),
            other => bail!("Unknown storage backend: '{}'. Must be local or s3.", other),
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageKind::Local => f.write_str("local"),
            StorageKind::S3 => f.write_str("s3"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageKind,
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
    #[serde(default)]
    pub s3: Option<S3StorageConfig>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageKind::Local,
            root: default_storage_root(),
            s3: None,
        }
    }
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("./knowledge")
}

#[derive(Debug, Deserialize, Clone)]
pub struct S3StorageConfig {
    pub bucket: String,
    #[serde(default)]
    pub prefix: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub endpoint_url: Option<String>,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct GitHubConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            per_page: default_per_page(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}
fn default_per_page() -> u32 {
    100
}
fn default_timeout_secs() -> u64 {
    30
}

/// One `(organization, repository)` pair to harvest.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct RepositoryConfig {
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub name: String,
}

impl RepositoryConfig {
    /// `organization/name`, as used in platform URLs and knowledge paths.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.organization, self.name)
    }
}

impl FromStr for RepositoryConfig {
    type Err = anyhow::Error;

    fn from_str(slug: &str) -> Result<Self> {
        match slug.trim().split_once('/') {
            Some((org, name))
                if !org.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(Self {
                    organization: org.to_string(),
                    name: name.to_string(),
                })
            }
            _ => bail!("Invalid repository '{}': expected organization/name", slug),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HarvestConfig {
    #[serde(default = "default_entities")]
    pub entities: Vec<String>,
    #[serde(default = "default_legacy_dir")]
    pub legacy_dir: PathBuf,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            entities: default_entities(),
            legacy_dir: default_legacy_dir(),
        }
    }
}

fn default_entities() -> Vec<String> {
    vec!["PullRequest".to_string()]
}
fn default_legacy_dir() -> PathBuf {
    PathBuf::from("./Bot_Knowledge")
}

impl Config {
    /// Apply storage overrides (normally taken from the environment).
    pub fn apply_overrides(&mut self, backend: Option<&str>, root: Option<&str>) -> Result<()> {
        if let Some(backend) = backend.filter(|b| !b.trim().is_empty()) {
            self.storage.backend = backend
                .parse()
                .with_context(|| format!("Invalid {} value", STORAGE_ENV))?;
        }
        if let Some(root) = root.filter(|r| !r.trim().is_empty()) {
            self.storage.root = PathBuf::from(root);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.github.per_page == 0 || self.github.per_page > 100 {
            bail!("github.per_page must be in 1..=100");
        }
        if self.github.api_url.trim().is_empty() {
            bail!("github.api_url must not be empty");
        }

        if self.storage.backend == StorageKind::S3 {
            match &self.storage.s3 {
                None => bail!("storage.s3 must be configured when storage.backend is 's3'"),
                Some(s3) if s3.bucket.trim().is_empty() => {
                    bail!("storage.s3.bucket must not be empty")
                }
                Some(s3) if s3.region.trim().is_empty() => {
                    bail!("storage.s3.region must not be empty")
                }
                Some(_) => {}
            }
        }

        if self.harvest.entities.is_empty() {
            bail!("harvest.entities must list at least one entity type");
        }
        for entity in &self.harvest.entities {
            if !KNOWN_ENTITIES.contains(&entity.as_str()) {
                bail!(
                    "Unknown entity type: '{}'. Available: {}",
                    entity,
                    KNOWN_ENTITIES.join(", ")
                );
            }
        }

        Ok(())
    }

    /// Configured repositories, or just the one named on the command line.
    pub fn select_repositories(&self, only: Option<&str>) -> Result<Vec<RepositoryConfig>> {
        match only {
            Some(slug) => Ok(vec![slug.parse()?]),
            None => Ok(self.repositories.clone()),
        }
    }
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config = parse_config(&content)?;
    config.apply_overrides(
        std::env::var(STORAGE_ENV).ok().as_deref(),
        std::env::var(STORAGE_PATH_ENV).ok().as_deref(),
    )?;
    config.validate()?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let cfg = parse_config("").unwrap();
        assert_eq!(cfg.storage.backend, StorageKind::Local);
        assert_eq!(cfg.storage.root, PathBuf::from("./knowledge"));
        assert_eq!(cfg.github.api_url, "https://api.github.com");
        assert_eq!(cfg.github.per_page, 100);
        assert_eq!(cfg.harvest.entities, vec!["PullRequest".to_string()]);
        assert!(cfg.repositories.is_empty());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn repositories_and_s3() {
        let cfg = parse_config(
            r#"
[storage]
backend = "s3"
root = "bot_knowledge"

[storage.s3]
bucket = "team"
prefix = "data/"

[[repositories]]
organization = "thoth-station"
name = "amun-api"

[[repositories]]
organization = "aicoe"
name = "log-anomaly-detector"
"#,
        )
        .unwrap();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.storage.backend, StorageKind::S3);
        let s3 = cfg.storage.s3.as_ref().unwrap();
        assert_eq!(s3.region, "us-east-1");
        assert_eq!(cfg.repositories.len(), 2);
        assert_eq!(cfg.repositories[0].full_name(), "thoth-station/amun-api");
    }

    #[test]
    fn s3_backend_requires_bucket() {
        let cfg = parse_config("[storage]\nbackend = \"s3\"\n").unwrap();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn per_page_bounds() {
        let cfg = parse_config("[github]\nper_page = 0\n").unwrap();
        assert!(cfg.validate().is_err());
        let cfg = parse_config("[github]\nper_page = 101\n").unwrap();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn unknown_entity_rejected() {
        let cfg = parse_config("[harvest]\nentities = [\"Commit\"]\n").unwrap();
        let err = cfg.validate().unwrap_err().to_string();
        assert!(err.contains("Commit"));
    }

    #[test]
    fn overrides_replace_storage_settings() {
        let mut cfg = parse_config("").unwrap();
        cfg.apply_overrides(Some("S3"), Some("/data/knowledge")).unwrap();
        assert_eq!(cfg.storage.backend, StorageKind::S3);
        assert_eq!(cfg.storage.root, PathBuf::from("/data/knowledge"));

        let mut cfg = parse_config("").unwrap();
        cfg.apply_overrides(Some(""), None).unwrap();
        assert_eq!(cfg.storage.backend, StorageKind::Local);

        assert!(cfg.apply_overrides(Some("ceph"), None).is_err());
    }

    #[test]
    fn example_config_is_valid() {
        let cfg = parse_config(include_str!("../config/harvest.example.toml")).unwrap();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.repositories.len(), 2);
    }

    #[test]
    fn incomplete_repository_entry_still_parses() {
        let cfg = parse_config("[[repositories]]\nname = \"orphan\"\n").unwrap();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.repositories[0].organization, "");
    }

    #[test]
    fn repository_slug_parsing() {
        let repo: RepositoryConfig = "org/name".parse().unwrap();
        assert_eq!(repo.organization, "org");
        assert_eq!(repo.name, "name");
        assert!("org".parse::<RepositoryConfig>().is_err());
        assert!("/name".parse::<RepositoryConfig>().is_err());
        assert!("a/b/c".parse::<RepositoryConfig>().is_err());
    }

    #[test]
    fn select_repositories_prefers_cli_slug() {
        let cfg = parse_config("[[repositories]]\norganization = \"a\"\nname = \"b\"\n").unwrap();
        assert_eq!(cfg.select_repositories(None).unwrap().len(), 1);
        let only = cfg.select_repositories(Some("x/y")).unwrap();
        assert_eq!(only[0].full_name(), "x/y");
    }
}

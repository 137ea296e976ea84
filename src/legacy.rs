//! Legacy single-file pull request knowledge.
//!
//! Older consumers read one JSON document per repository at
//! `{legacy_dir}/{org}-{repo}.json`:
//!
//! ```json
//! {"name": "org/repo", "results": {"42": {"PR_labels": [], "PR_created": 1574012623.0, ...}}}
//! ```
//!
//! `harvest legacy` keeps that document up to date with the same
//! append-only rules as the main sync: only pull requests missing from
//! `results` are analysed, and existing entries are never touched.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use knowledge_core::models::{LegacyKnowledgeFile, LegacyPullRecord};
use knowledge_core::only_new;

use crate::config::{Config, RepositoryConfig};
use crate::github::{GitHubClient, PlatformClient};
use crate::pull_request::PullRequestHarvester;
use crate::storage_fs::{check_directory, write_atomic};
use crate::traits::EntityHarvester;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyReport {
    pub path: PathBuf,
    pub previous: usize,
    pub new: usize,
    pub total: usize,
    pub persisted: bool,
}

/// `{dir}/{org}-{repo}.json`
pub fn legacy_path(dir: &Path, repo: &RepositoryConfig) -> PathBuf {
    dir.join(format!("{}-{}.json", repo.organization, repo.name))
}

/// Load a legacy document, or start an empty one named `full_name`.
pub async fn load_legacy(path: &Path, full_name: &str) -> Result<LegacyKnowledgeFile> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(LegacyKnowledgeFile::new(full_name))
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read {}", path.display()))
        }
    };
    serde_json::from_str(&content)
        .with_context(|| format!("Corrupt legacy knowledge file: {}", path.display()))
}

/// Bring the legacy document of `repo` up to date.
pub async fn sync_legacy(
    harvester: &PullRequestHarvester,
    dir: &Path,
    repo: &RepositoryConfig,
) -> Result<LegacyReport> {
    let full_name = repo.full_name();
    check_directory(dir).await?;

    let path = legacy_path(dir, repo);
    let mut knowledge = load_legacy(&path, &full_name).await?;
    let previous = knowledge.results.len();
    if previous > 0 {
        tracing::info!("Found previous knowledge for {} with {} records", full_name, previous);
    }

    let raw = harvester.list_raw(&full_name).await?;
    let new_handles = only_new(raw, knowledge.results.keys().copied());

    let mut report = LegacyReport {
        path: path.clone(),
        previous,
        new: new_handles.len(),
        total: previous,
        persisted: false,
    };

    if new_handles.is_empty() {
        tracing::info!("No new knowledge found for update");
        return Ok(report);
    }

    for handle in &new_handles {
        let record = harvester
            .analyse_pull(&full_name, handle.id)
            .await
            .with_context(|| format!("Failed to analyse pull request #{}", handle.id))?;
        knowledge
            .results
            .insert(handle.id, LegacyPullRecord::from(record));
    }

    let body = serde_json::to_string_pretty(&knowledge)?;
    write_atomic(&path, body.as_bytes()).await?;
    tracing::info!(
        "Saved {} new pull requests ({} overall) at {}",
        new_handles.len(),
        knowledge.results.len(),
        path.display()
    );

    report.total = knowledge.results.len();
    report.persisted = true;
    Ok(report)
}

/// `harvest legacy`
pub async fn run_legacy(config: &Config, repo: Option<&str>) -> Result<()> {
    let repositories = config.select_repositories(repo)?;
    if repositories.is_empty() {
        tracing::warn!("No repositories configured; nothing to harvest");
        println!("legacy: no repositories configured");
        println!("ok");
        return Ok(());
    }

    let client: Arc<dyn PlatformClient> = Arc::new(GitHubClient::from_env(&config.github)?);
    let harvester = PullRequestHarvester::new(client);

    let mut failed = 0usize;
    for repo in &repositories {
        if repo.organization.trim().is_empty() || repo.name.trim().is_empty() {
            tracing::warn!("Skipping repository '{}': incomplete entry", repo.full_name());
            continue;
        }
        match sync_legacy(&harvester, &config.harvest.legacy_dir, repo).await {
            Ok(report) => {
                println!("legacy {}", repo.full_name());
                println!("  file: {}", report.path.display());
                println!("  new: {}", report.new);
                println!("  overall: {}", report.total);
            }
            Err(e) => {
                failed += 1;
                tracing::error!("Legacy harvest of {} failed: {:#}", repo.full_name(), e);
                println!("legacy {}", repo.full_name());
                println!("  failed: {:#}", e);
            }
        }
    }

    if failed > 0 {
        bail!("{} legacy harvest(s) failed", failed);
    }
    println!("ok");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn path_joins_org_and_name() {
        let repo: RepositoryConfig = "thoth-station/amun-api".parse().unwrap();
        assert_eq!(
            legacy_path(Path::new("Bot_Knowledge"), &repo),
            PathBuf::from("Bot_Knowledge/thoth-station-amun-api.json")
        );
    }

    #[tokio::test]
    async fn missing_file_starts_named_document() {
        let tmp = TempDir::new().unwrap();
        let doc = load_legacy(&tmp.path().join("o-r.json"), "o/r").await.unwrap();
        assert_eq!(doc.name, "o/r");
        assert!(doc.results.is_empty());
    }

    #[tokio::test]
    async fn existing_file_is_parsed() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("o-r.json");
        std::fs::write(
            &path,
            r#"{"name": "o/r", "results": {"5": {"PR_labels": ["bug"], "PR_created": 10,
               "PR_approved": null, "PR_approved_by": null, "PR_TTR": null,
               "PR_author": "a", "PR_commits_number": 1}}}"#,
        )
        .unwrap();

        let doc = load_legacy(&path, "o/r").await.unwrap();
        assert_eq!(doc.results.len(), 1);
        assert_eq!(doc.results[&5].author, "a");
    }

    #[tokio::test]
    async fn float_timestamps_are_parsed() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("o-r.json");
        std::fs::write(
            &path,
            r#"{"name": "o/r", "results": {"7": {"PR_labels": [], "PR_created": 1574012623.0,
               "PR_approved": 1574013623.0, "PR_approved_by": "alice", "PR_TTR": 1000.0,
               "PR_author": "bob", "PR_commits_number": 3}}}"#,
        )
        .unwrap();

        let doc = load_legacy(&path, "o/r").await.unwrap();
        assert_eq!(doc.results[&7].created, 1574012623.0);
        assert_eq!(doc.results[&7].ttr, Some(1000.0));
    }

    #[tokio::test]
    async fn unreadable_path_is_an_error_not_an_empty_document() {
        let tmp = TempDir::new().unwrap();
        let not_a_dir = tmp.path().join("plain");
        std::fs::write(&not_a_dir, "x").unwrap();

        let err = load_legacy(&not_a_dir.join("o-r.json"), "o/r")
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to read"));
    }
}

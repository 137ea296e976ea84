//! Local filesystem backend.
//!
//! Logical paths are resolved under the configured storage root, so
//! `org/repo/PullRequest.json` lands at `{root}/org/repo/PullRequest.json`.
//! Missing parent directories are created on write. Documents are written to
//! a sibling `.tmp` file and renamed into place, so a crash mid-write never
//! leaves a truncated knowledge file behind.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;

use knowledge_core::{KnowledgeSet, KnowledgeStore};

/// [`KnowledgeStore`] on the local filesystem.
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Absolute-or-relative file path of a logical knowledge path.
    pub fn file_path(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

#[async_trait]
impl KnowledgeStore for LocalStore {
    fn backend(&self) -> &str {
        "local"
    }

    fn location(&self, path: &str) -> String {
        self.file_path(path).display().to_string()
    }

    async fn load(&self, path: &str) -> Result<KnowledgeSet> {
        let file = self.file_path(path);
        let content = match tokio::fs::read_to_string(&file).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(KnowledgeSet::new()),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read knowledge file: {}", file.display()))
            }
        };
        KnowledgeSet::from_json_lines(&content)
            .with_context(|| format!("Corrupt knowledge file: {}", file.display()))
    }

    async fn store(&self, path: &str, knowledge: &KnowledgeSet) -> Result<()> {
        let file = self.file_path(path);
        let body = knowledge.to_json_lines()?;
        write_atomic(&file, body.as_bytes()).await
    }
}

/// Create `dir` (and its parents) if needed. Returns `true` when it was created.
pub async fn check_directory(dir: &Path) -> Result<bool> {
    let exists = tokio::fs::try_exists(dir)
        .await
        .with_context(|| format!("Failed to inspect directory: {}", dir.display()))?;
    if exists {
        return Ok(false);
    }
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    tracing::debug!(dir = %dir.display(), "Created directory");
    Ok(true)
}

/// Write `bytes` to `file` through a temporary sibling and a rename.
pub async fn write_atomic(file: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = file.parent().filter(|p| !p.as_os_str().is_empty()) {
        check_directory(parent).await?;
    }

    let mut tmp = file.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, bytes)
        .await
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    tokio::fs::rename(&tmp, file)
        .await
        .with_context(|| format!("Failed to move {} into place", file.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use knowledge_core::Record;
    use serde_json::json;
    use tempfile::TempDir;

    fn record(author: &str) -> Record {
        match json!({ "author": author }) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn missing_file_loads_empty() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());
        let set = store.load("o/r/PullRequest.json").await.unwrap();
        assert!(set.is_empty());
    }

    #[tokio::test]
    async fn store_creates_parents_and_round_trips() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path().join("knowledge"));

        let mut set = KnowledgeSet::new();
        set.insert(7, record("alice"));
        set.insert(3, record("bob"));
        store.store("o/r/PullRequest.json", &set).await.unwrap();

        let file = tmp.path().join("knowledge/o/r/PullRequest.json");
        assert!(file.exists());
        assert!(!tmp.path().join("knowledge/o/r/PullRequest.json.tmp").exists());

        let loaded = store.load("o/r/PullRequest.json").await.unwrap();
        assert_eq!(loaded, set);
    }

    #[tokio::test]
    async fn store_replaces_previous_content() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());

        let first: KnowledgeSet = [(1, record("a"))].into_iter().collect();
        store.store("o/r/PullRequest.json", &first).await.unwrap();
        let second: KnowledgeSet = [(1, record("a")), (2, record("b"))].into_iter().collect();
        store.store("o/r/PullRequest.json", &second).await.unwrap();

        let loaded = store.load("o/r/PullRequest.json").await.unwrap();
        assert_eq!(loaded.len(), 2);
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("o/r")).unwrap();
        std::fs::write(tmp.path().join("o/r/PullRequest.json"), "not json\n").unwrap();

        let store = LocalStore::new(tmp.path());
        let err = store.load("o/r/PullRequest.json").await.unwrap_err();
        assert!(err.to_string().contains("Corrupt knowledge file"));
    }

    #[tokio::test]
    async fn check_directory_reports_creation() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("a/b");
        assert!(check_directory(&dir).await.unwrap());
        assert!(!check_directory(&dir).await.unwrap());
    }

    #[tokio::test]
    async fn unreadable_file_is_an_error_not_an_empty_set() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("o"), "a file where a directory belongs").unwrap();

        let store = LocalStore::new(tmp.path());
        let err = store.load("o/r/PullRequest.json").await.unwrap_err();
        assert!(err.to_string().contains("Failed to read knowledge file"));
    }

    #[tokio::test]
    async fn check_directory_propagates_stat_errors() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("plain");
        std::fs::write(&file, "x").unwrap();

        let err = check_directory(&file.join("sub")).await.unwrap_err();
        assert!(err.to_string().contains("Failed to inspect directory"));
    }
}

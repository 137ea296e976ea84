//! Sync engine.
//!
//! One **pass** harvests one entity type for one repository:
//!
//! ```text
//! load previous ─▶ list remote ─▶ diff ─┬─ nothing new ─▶ done (no write)
//!                                       └─ analyse × N ─▶ validate ─▶ merge ─▶ persist
//! ```
//!
//! Knowledge is append-only: records already stored are never re-fetched and
//! never overwritten. The destination is read once when a pass starts and
//! written once when it ends, so a pass that fails midway leaves the stored
//! knowledge exactly as it was.
//!
//! Passes run one after another. A failed pass is reported and the run moves
//! on to the next one.

use std::sync::Arc;

use anyhow::{bail, Context, Result};

use knowledge_core::{knowledge_path, only_new, KnowledgeSet, KnowledgeStore};

use crate::config::{Config, RepositoryConfig};
use crate::github::{GitHubClient, PlatformClient};
use crate::progress::{NoProgress, ProgressMode, SyncProgressEvent, SyncProgressReporter};
use crate::storage;
use crate::traits::{EntityHarvester, HarvesterRegistry};

/// What a single pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassReport {
    pub repository: String,
    pub entity: String,
    /// Records found in stored knowledge when the pass started.
    pub previous: usize,
    /// Entities returned by the remote listing.
    pub listed: usize,
    /// Entities absent from previous knowledge (analysed unless dry run).
    pub new: usize,
    /// Records in the knowledge set after the merge.
    pub total: usize,
    /// Whether the merged set was written.
    pub persisted: bool,
    pub schema_violations: usize,
}

/// Result of one (repository, entity type) pass.
pub struct PassOutcome {
    pub repository: String,
    pub entity: String,
    pub result: Result<PassReport>,
}

pub struct SyncEngine {
    store: Arc<dyn KnowledgeStore>,
    progress: Box<dyn SyncProgressReporter>,
    dry_run: bool,
}

impl SyncEngine {
    pub fn new(store: Arc<dyn KnowledgeStore>) -> Self {
        Self {
            store,
            progress: Box::new(NoProgress),
            dry_run: false,
        }
    }

    pub fn with_progress(mut self, progress: Box<dyn SyncProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// In dry-run mode passes stop after the diff: no detail fetches, no writes.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn store(&self) -> &dyn KnowledgeStore {
        self.store.as_ref()
    }

    /// Load stored knowledge of `entity` for `repository`. Empty if none.
    pub async fn load_previous(&self, repository: &str, entity: &str) -> Result<KnowledgeSet> {
        let path = knowledge_path(repository, entity);
        let previous = self
            .store
            .load(&path)
            .await
            .with_context(|| format!("Failed to load {}", self.store.location(&path)))?;

        if previous.is_empty() {
            tracing::info!("No previous knowledge of type {} found", entity);
        } else {
            tracing::info!(
                "Found previous {} knowledge for {} with {} records",
                entity,
                repository,
                previous.len()
            );
        }
        Ok(previous)
    }

    /// Run one pass of `harvester` over `repository`.
    pub async fn sync_entity(
        &self,
        repository: &str,
        harvester: &dyn EntityHarvester,
    ) -> Result<PassReport> {
        let entity = harvester.name();
        let path = knowledge_path(repository, entity);

        let previous = self.load_previous(repository, entity).await?;

        self.progress.report(SyncProgressEvent::Listing {
            repository: repository.to_string(),
            entity: entity.to_string(),
        });
        let raw = harvester.list_raw(repository).await?;
        let listed = raw.len();
        tracing::info!(repository, entity, listed, "Listed remote entities");
        tracing::debug!("Currently known ids: {:?}", previous.ids().collect::<Vec<_>>());

        let new_handles = only_new(raw, previous.ids());

        let mut report = PassReport {
            repository: repository.to_string(),
            entity: entity.to_string(),
            previous: previous.len(),
            listed,
            new: new_handles.len(),
            total: previous.len(),
            persisted: false,
            schema_violations: 0,
        };

        if new_handles.is_empty() {
            tracing::info!("No new knowledge found for update");
            return Ok(report);
        }
        tracing::debug!(
            "New ids to be examined are: {:?}",
            new_handles.iter().map(|h| h.id).collect::<Vec<_>>()
        );

        if self.dry_run {
            tracing::info!(
                repository,
                entity,
                new = new_handles.len(),
                "Dry run: skipping analysis and persistence"
            );
            return Ok(report);
        }

        let total = new_handles.len() as u64;
        let mut new_knowledge = KnowledgeSet::new();
        for (i, handle) in new_handles.iter().enumerate() {
            let record = harvester
                .analyse(repository, handle)
                .await
                .with_context(|| format!("Failed to analyse {} #{}", entity, handle.id))?;
            harvester.store(&mut new_knowledge, handle.id, record);

            self.progress.report(SyncProgressEvent::Analysing {
                repository: repository.to_string(),
                entity: entity.to_string(),
                n: i as u64 + 1,
                total,
            });
        }

        let new_count = new_knowledge.len();
        let merged = previous.merge_disjoint(new_knowledge)?;

        if let Err(violation) = harvester.schema().validate(&merged) {
            for field in &violation.violations {
                tracing::warn!(repository, entity, "{}", field);
            }
            tracing::warn!(
                repository,
                entity,
                count = violation.violations.len(),
                "Knowledge does not match the {} schema; storing it anyway",
                violation.entity
            );
            report.schema_violations = violation.violations.len();
        }

        report.new = new_count;
        report.total = merged.len();
        report.persisted = self.save_knowledge(&path, &merged, new_count).await?;
        Ok(report)
    }

    /// Persist the merged set. Nothing is written when there is nothing new.
    async fn save_knowledge(
        &self,
        path: &str,
        knowledge: &KnowledgeSet,
        new_count: usize,
    ) -> Result<bool> {
        if new_count == 0 {
            tracing::info!("Nothing to store");
            return Ok(false);
        }

        tracing::info!("Knowledge file {}", path);
        tracing::info!("new {} entities", new_count);
        tracing::info!("(overall {} entities)", knowledge.len());

        let location = self.store.location(path);
        self.store
            .store(path, knowledge)
            .await
            .with_context(|| format!("Failed to store {}", location))?;

        match self.store.backend() {
            "local" => tracing::info!("Saved locally at {}", location),
            "s3" => tracing::info!("Saved on S3 at {}", location),
            other => tracing::info!("Saved on {} at {}", other, location),
        }
        Ok(true)
    }

    /// Run every registered harvester over one repository.
    pub async fn sync_repository(
        &self,
        repository: &str,
        registry: &HarvesterRegistry,
    ) -> Vec<PassOutcome> {
        let mut outcomes = Vec::with_capacity(registry.len());
        for harvester in registry.harvesters() {
            let result = self.sync_entity(repository, harvester.as_ref()).await;
            if let Err(ref e) = result {
                tracing::error!(
                    repository,
                    entity = harvester.name(),
                    "Sync pass failed: {:#}",
                    e
                );
            }
            outcomes.push(PassOutcome {
                repository: repository.to_string(),
                entity: harvester.name().to_string(),
                result,
            });
        }
        outcomes
    }
}

/// Run all passes for every repository. Incomplete entries are skipped.
pub async fn sync_repositories(
    engine: &SyncEngine,
    repositories: &[RepositoryConfig],
    registry: &HarvesterRegistry,
) -> Vec<PassOutcome> {
    let mut outcomes = Vec::new();
    for repo in repositories {
        if repo.organization.trim().is_empty() || repo.name.trim().is_empty() {
            tracing::warn!(
                "Skipping repository '{}': organization and name are both required",
                repo.full_name()
            );
            continue;
        }
        let full_name = repo.full_name();
        tracing::info!("Considering repository {}", full_name);
        outcomes.extend(engine.sync_repository(&full_name, registry).await);
    }
    outcomes
}

/// `harvest sync`: run the configured passes and print a summary on stdout.
///
/// Fails after all passes have run if any of them failed.
pub async fn run_sync(
    config: &Config,
    repo: Option<&str>,
    entity: Option<&str>,
    dry_run: bool,
    progress: ProgressMode,
) -> Result<()> {
    let repositories = config.select_repositories(repo)?;
    if repositories.is_empty() {
        tracing::warn!("No repositories configured; nothing to harvest");
        println!("sync: no repositories configured");
        println!("ok");
        return Ok(());
    }

    let entities = match entity {
        Some(e) => vec![e.to_string()],
        None => config.harvest.entities.clone(),
    };

    let client: Arc<dyn PlatformClient> = Arc::new(GitHubClient::from_env(&config.github)?);
    let registry = HarvesterRegistry::for_entities(&entities, client)?;
    let store = storage::from_config(config)?;
    let engine = SyncEngine::new(store)
        .with_progress(progress.reporter())
        .dry_run(dry_run);

    let outcomes = sync_repositories(&engine, &repositories, &registry).await;

    let mut failed = 0usize;
    for outcome in &outcomes {
        match &outcome.result {
            Ok(report) => print_report(report, dry_run),
            Err(e) => {
                failed += 1;
                println!("sync {} {}", outcome.repository, outcome.entity);
                println!("  failed: {:#}", e);
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} sync passes failed", failed, outcomes.len());
    }
    println!("ok");
    Ok(())
}

fn print_report(report: &PassReport, dry_run: bool) {
    if dry_run {
        println!("sync {} {} (dry-run)", report.repository, report.entity);
    } else {
        println!("sync {} {}", report.repository, report.entity);
    }
    println!("  previous: {}", report.previous);
    println!("  listed: {}", report.listed);
    println!("  new: {}", report.new);
    println!("  overall: {}", report.total);
    if report.schema_violations > 0 {
        println!("  schema violations: {}", report.schema_violations);
    }
    println!("  persisted: {}", if report.persisted { "yes" } else { "no" });
}

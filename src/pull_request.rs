//! Pull request harvester.
//!
//! Lists closed pull requests and extracts a [`PullRequestRecord`] from each:
//! labels, author, creation time, commit count, and the first approval.
//!
//! # Approval policy
//!
//! The approval is the first review in state `APPROVED`, in the order the
//! platform returns reviews (chronological), regardless of who submitted
//! it. Reviews without a submission time (pending drafts) are ignored.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;

use knowledge_core::models::Approval;
use knowledge_core::{EntityHandle, EntitySchema, PullRequestRecord, Record, PULL_REQUEST_SCHEMA};

use crate::github::{PlatformClient, Review};
use crate::traits::EntityHarvester;

/// Login recorded when the author's account no longer exists.
const GHOST_LOGIN: &str = "ghost";

/// [`EntityHarvester`] for pull requests.
pub struct PullRequestHarvester {
    client: Arc<dyn PlatformClient>,
}

impl PullRequestHarvester {
    pub fn new(client: Arc<dyn PlatformClient>) -> Self {
        Self { client }
    }

    /// Fetch detail, reviews, and labels for one pull request and build its record.
    pub async fn analyse_pull(&self, repository: &str, number: u64) -> Result<PullRequestRecord> {
        let pull = self
            .client
            .get_pull_request(repository, number)
            .await
            .with_context(|| format!("Failed to fetch pull request #{} of {}", number, repository))?;
        let reviews = self
            .client
            .list_reviews(repository, number)
            .await
            .with_context(|| format!("Failed to list reviews of #{} in {}", number, repository))?;
        let labels = self
            .client
            .list_labels(repository, number)
            .await
            .with_context(|| format!("Failed to list labels of #{} in {}", number, repository))?;

        let author = pull
            .user
            .map(|u| u.login)
            .unwrap_or_else(|| GHOST_LOGIN.to_string());

        tracing::debug!(
            repository,
            number,
            commits = pull.commits,
            reviews = reviews.len(),
            "Analysing pull request"
        );

        Ok(PullRequestRecord::new(
            author,
            pull.created_at.timestamp(),
            labels.into_iter().map(|l| l.name).collect(),
            pull.commits,
            first_approval(&reviews),
        ))
    }
}

/// The first submitted review in state `APPROVED`, if any.
pub fn first_approval(reviews: &[Review]) -> Option<Approval> {
    reviews
        .iter()
        .filter(|r| r.state.eq_ignore_ascii_case("APPROVED"))
        .find_map(|r| {
            r.submitted_at.map(|at| Approval {
                submitted_at: at.timestamp(),
                approver: r.user.as_ref().map(|u| u.login.clone()),
            })
        })
}

#[async_trait]
impl EntityHarvester for PullRequestHarvester {
    fn name(&self) -> &str {
        "PullRequest"
    }

    fn description(&self) -> &str {
        "Closed pull requests: labels, author, commits, first approval and time to review"
    }

    fn schema(&self) -> &EntitySchema {
        &PULL_REQUEST_SCHEMA
    }

    async fn list_raw(&self, repository: &str) -> Result<Vec<EntityHandle>> {
        let pulls = self
            .client
            .list_closed_pull_requests(repository)
            .await
            .with_context(|| format!("Failed to list closed pull requests of {}", repository))?;
        Ok(pulls.into_iter().map(EntityHandle::from).collect())
    }

    async fn analyse(&self, repository: &str, handle: &EntityHandle) -> Result<Record> {
        Ok(self.analyse_pull(repository, handle.id).await?.to_record())
    }
}

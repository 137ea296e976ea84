//! GitHub platform client.
//!
//! Defines the [`PlatformClient`] trait (the operations the harvesters need
//! from a code-collaboration platform) and [`GitHubClient`], its
//! implementation on top of the GitHub REST API v3.
//!
//! # Authentication
//!
//! The token is read from `GITHUB_ACCESS_TOKEN` and sent as a bearer token.
//!
//! # Pagination
//!
//! List endpoints are walked with `per_page`/`page` query parameters. The
//! `Link` response header decides whether another page exists; without one
//! a short page ends the walk.
//!
//! # Errors
//!
//! Every failure surfaces as a [`PlatformError`]. Nothing is retried here.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, LINK};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

use knowledge_core::EntityHandle;

use crate::config::GitHubConfig;

pub const TOKEN_ENV: &str = "GITHUB_ACCESS_TOKEN";

/// Errors that can occur when talking to the platform.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("GITHUB_ACCESS_TOKEN environment variable not set")]
    MissingToken,

    #[error("Invalid request header: {0}")]
    InvalidHeader(String),

    #[error("GitHub request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("GitHub authentication failed (HTTP {status}) for {url}; check GITHUB_ACCESS_TOKEN")]
    Unauthorized { status: u16, url: String },

    #[error("GitHub API returned HTTP {status} for {url}: {body}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },

    #[error("Failed to decode GitHub response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

// ═══════════════════════════════════════════════════════════════════════
// Wire types
// ═══════════════════════════════════════════════════════════════════════

/// A GitHub account reference.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Actor {
    pub login: String,
}

/// An issue/pull request label.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Label {
    pub name: String,
}

/// An entry of the pull request listing.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestSummary {
    pub number: u64,
}

impl From<PullRequestSummary> for EntityHandle {
    fn from(pr: PullRequestSummary) -> Self {
        EntityHandle::new(pr.number)
    }
}

/// Full pull request detail (`GET /repos/{repo}/pulls/{number}`).
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestDetail {
    pub number: u64,
    /// `None` when the author's account was deleted.
    pub user: Option<Actor>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub commits: u64,
}

/// A pull request review.
#[derive(Debug, Clone, Deserialize)]
pub struct Review {
    pub state: String,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user: Option<Actor>,
}

// ═══════════════════════════════════════════════════════════════════════
// PlatformClient trait
// ═══════════════════════════════════════════════════════════════════════

/// Operations the harvesters consume from the remote platform.
///
/// `repository` is always the `organization/name` full name.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// List every closed pull request of the repository.
    async fn list_closed_pull_requests(
        &self,
        repository: &str,
    ) -> Result<Vec<PullRequestSummary>, PlatformError>;

    /// Fetch one pull request's detail.
    async fn get_pull_request(
        &self,
        repository: &str,
        number: u64,
    ) -> Result<PullRequestDetail, PlatformError>;

    /// List reviews in the order the platform returns them (chronological).
    async fn list_reviews(&self, repository: &str, number: u64)
        -> Result<Vec<Review>, PlatformError>;

    /// List labels currently attached to the pull request.
    async fn list_labels(&self, repository: &str, number: u64) -> Result<Vec<Label>, PlatformError>;
}

// ═══════════════════════════════════════════════════════════════════════
// GitHubClient
// ═══════════════════════════════════════════════════════════════════════

/// [`PlatformClient`] backed by the GitHub REST API.
pub struct GitHubClient {
    http: reqwest::Client,
    api_url: String,
    per_page: u32,
}

impl GitHubClient {
    pub fn new(config: &GitHubConfig, token: &str) -> Result<Self, PlatformError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            HeaderValue::from_static("2022-11-28"),
        );
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|e| PlatformError::InvalidHeader(e.to_string()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(concat!("repo-knowledge/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|source| PlatformError::Transport {
                url: config.api_url.clone(),
                source,
            })?;

        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            per_page: config.per_page,
        })
    }

    /// Build a client with the token from `GITHUB_ACCESS_TOKEN`.
    pub fn from_env(config: &GitHubConfig) -> Result<Self, PlatformError> {
        let token = std::env::var(TOKEN_ENV)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or(PlatformError::MissingToken)?;
        Self::new(config, token.trim())
    }

    /// GET one page. The flag is the `Link` header's verdict on a next page,
    /// `None` when the response has no `Link` header.
    async fn get_page<T: DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<(T, Option<bool>), PlatformError> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|source| PlatformError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(PlatformError::Unauthorized {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PlatformError::Status {
                status: status.as_u16(),
                url: url.to_string(),
                body: body.chars().take(500).collect(),
            });
        }

        let has_next = resp
            .headers()
            .get(LINK)
            .and_then(|v| v.to_str().ok())
            .map(has_next_page);

        let value = resp.json::<T>().await.map_err(|source| PlatformError::Decode {
            url: url.to_string(),
            source,
        })?;

        Ok((value, has_next))
    }

    async fn get_all_pages<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &str,
    ) -> Result<Vec<T>, PlatformError> {
        let mut items = Vec::new();
        let mut page = 1u32;

        loop {
            let sep = if query.is_empty() { "" } else { "&" };
            let url = format!(
                "{}{}?{}{}per_page={}&page={}",
                self.api_url, path, query, sep, self.per_page, page
            );
            let (batch, has_next): (Vec<T>, Option<bool>) = self.get_page(&url).await?;
            let batch_len = batch.len();
            let more = has_next.unwrap_or(batch_len == self.per_page as usize);
            items.extend(batch);

            tracing::debug!(url = %url, count = batch_len, "Fetched page");

            if !more || batch_len == 0 {
                break;
            }
            page += 1;
        }

        Ok(items)
    }
}

#[async_trait]
impl PlatformClient for GitHubClient {
    async fn list_closed_pull_requests(
        &self,
        repository: &str,
    ) -> Result<Vec<PullRequestSummary>, PlatformError> {
        self.get_all_pages(&format!("/repos/{}/pulls", repository), "state=closed")
            .await
    }

    async fn get_pull_request(
        &self,
        repository: &str,
        number: u64,
    ) -> Result<PullRequestDetail, PlatformError> {
        let url = format!("{}/repos/{}/pulls/{}", self.api_url, repository, number);
        let (detail, _) = self.get_page(&url).await?;
        Ok(detail)
    }

    async fn list_reviews(
        &self,
        repository: &str,
        number: u64,
    ) -> Result<Vec<Review>, PlatformError> {
        self.get_all_pages(
            &format!("/repos/{}/pulls/{}/reviews", repository, number),
            "",
        )
        .await
    }

    async fn list_labels(&self, repository: &str, number: u64) -> Result<Vec<Label>, PlatformError> {
        self.get_all_pages(
            &format!("/repos/{}/issues/{}/labels", repository, number),
            "",
        )
        .await
    }
}

/// Whether a `Link` header advertises a `rel="next"` page.
fn has_next_page(link: &str) -> bool {
    link.split(',')
        .any(|part| part.split(';').skip(1).any(|p| p.trim() == "rel=\"next\""))
}

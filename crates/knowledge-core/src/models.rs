//! Core data models for harvested repository knowledge.
//!
//! Records travel through the sync pipeline in two shapes:
//!
//! - **typed** ([`PullRequestRecord`]) while a harvester extracts them, so the
//!   time-to-review invariant is enforced by construction;
//! - **tabular** ([`Record`], a JSON object) once they enter a
//!   [`KnowledgeSet`](crate::knowledge::KnowledgeSet), which is what gets
//!   validated, merged, and persisted.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Platform-assigned entity ID (pull request or issue number).
pub type EntityId = u64;

/// A single harvested record in tabular form (field name → value).
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Anything that carries a platform entity ID.
pub trait HasEntityId {
    fn entity_id(&self) -> EntityId;
}

/// Minimal handle for an entity returned by a remote listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityHandle {
    pub id: EntityId,
}

impl EntityHandle {
    pub fn new(id: EntityId) -> Self {
        Self { id }
    }
}

impl HasEntityId for EntityHandle {
    fn entity_id(&self) -> EntityId {
        self.id
    }
}

/// The first approval event found on a pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Approval {
    /// Review submission time (epoch seconds).
    pub submitted_at: i64,
    /// Login of the approving reviewer; `None` for deleted accounts.
    pub approver: Option<String>,
}

/// Knowledge extracted from one pull request.
///
/// `time_to_review` is present exactly when `approved_at` is present and is
/// always `approved_at - created_at`. Use [`PullRequestRecord::new`] to keep
/// that true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestRecord {
    pub labels: Vec<String>,
    pub created_at: i64,
    pub approved_at: Option<i64>,
    pub approved_by: Option<String>,
    pub time_to_review: Option<i64>,
    pub author: String,
    pub commit_count: u64,
}

impl PullRequestRecord {
    pub fn new(
        author: String,
        created_at: i64,
        labels: Vec<String>,
        commit_count: u64,
        approval: Option<Approval>,
    ) -> Self {
        let (approved_at, approved_by, time_to_review) = match approval {
            Some(a) => (
                Some(a.submitted_at),
                a.approver,
                Some(a.submitted_at - created_at),
            ),
            None => (None, None, None),
        };

        Self {
            labels,
            created_at,
            approved_at,
            approved_by,
            time_to_review,
            author,
            commit_count,
        }
    }

    /// Convert into the tabular form stored in a knowledge set.
    pub fn to_record(&self) -> Record {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => Record::new(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Legacy single-file knowledge
// ═══════════════════════════════════════════════════════════════════════

/// One pull request in the legacy `{org}-{repo}.json` knowledge file.
///
/// Timestamps and time to review are stored as floating point epoch
/// seconds (`1574012623.0`), the form existing legacy files already use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyPullRecord {
    #[serde(rename = "PR_labels")]
    pub labels: Vec<String>,
    #[serde(rename = "PR_created")]
    pub created: f64,
    #[serde(rename = "PR_approved")]
    pub approved: Option<f64>,
    #[serde(rename = "PR_approved_by")]
    pub approved_by: Option<String>,
    #[serde(rename = "PR_TTR")]
    pub ttr: Option<f64>,
    #[serde(rename = "PR_author")]
    pub author: String,
    #[serde(rename = "PR_commits_number")]
    pub commits_number: u64,
}

impl From<PullRequestRecord> for LegacyPullRecord {
    fn from(record: PullRequestRecord) -> Self {
        Self {
            labels: record.labels,
            created: record.created_at as f64,
            approved: record.approved_at.map(|t| t as f64),
            approved_by: record.approved_by,
            ttr: record.time_to_review.map(|t| t as f64),
            author: record.author,
            commits_number: record.commit_count,
        }
    }
}

/// The legacy per-repository document: `{"name": "org/repo", "results": {...}}`.
///
/// Keys of `results` are serialized as strings by `serde_json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegacyKnowledgeFile {
    pub name: String,
    #[serde(default)]
    pub results: BTreeMap<EntityId, LegacyPullRecord>,
}

impl LegacyKnowledgeFile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            results: BTreeMap::new(),
        }
    }
}

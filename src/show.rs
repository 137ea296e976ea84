//! Stored knowledge overview.
//!
//! `harvest show org/name` loads a repository's knowledge through the
//! configured backend and prints a short summary: how many records are
//! stored, how many were approved, and the mean time to review.

use anyhow::Result;
use serde_json::Value;

use knowledge_core::{knowledge_path, KnowledgeSet};

use crate::config::{Config, RepositoryConfig};
use crate::storage;

#[derive(Debug, Clone, PartialEq)]
pub struct KnowledgeSummary {
    pub records: usize,
    pub approved: usize,
    /// Mean `time_to_review` in seconds over approved records.
    pub mean_time_to_review: Option<f64>,
    pub first_id: Option<u64>,
    pub last_id: Option<u64>,
}

/// Summarize a loaded knowledge set.
pub fn summarize(knowledge: &KnowledgeSet) -> KnowledgeSummary {
    let ttrs: Vec<i64> = knowledge
        .iter()
        .filter_map(|(_, record)| record.get("time_to_review").and_then(Value::as_i64))
        .collect();
    let approved = knowledge
        .iter()
        .filter(|(_, record)| record.get("approved_at").is_some_and(|v| !v.is_null()))
        .count();

    let mean_time_to_review = if ttrs.is_empty() {
        None
    } else {
        Some(ttrs.iter().sum::<i64>() as f64 / ttrs.len() as f64)
    };

    KnowledgeSummary {
        records: knowledge.len(),
        approved,
        mean_time_to_review,
        first_id: knowledge.ids().next(),
        last_id: knowledge.ids().last(),
    }
}

/// Render seconds as `1d 2h 3m`, dropping leading zero units.
pub fn format_duration(seconds: f64) -> String {
    let total = seconds.max(0.0).round() as u64;
    let (days, rest) = (total / 86_400, total % 86_400);
    let (hours, rest) = (rest / 3_600, rest % 3_600);
    let minutes = rest / 60;

    if days > 0 {
        format!("{}d {}h {}m", days, hours, minutes)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}

/// `harvest show`
pub async fn run_show(config: &Config, repository: &str, entity: &str) -> Result<()> {
    let repo: RepositoryConfig = repository.parse()?;
    let store = storage::from_config(config)?;
    let path = knowledge_path(&repo.full_name(), entity);
    let knowledge = store.load(&path).await?;
    let summary = summarize(&knowledge);

    println!("{} {}", repo.full_name(), entity);
    println!("  location: {}", store.location(&path));
    println!("  records: {}", summary.records);
    if let (Some(first), Some(last)) = (summary.first_id, summary.last_id) {
        println!("  ids: {} .. {}", first, last);
    }
    println!("  approved: {}", summary.approved);
    match summary.mean_time_to_review {
        Some(mean) => println!("  mean time to review: {}", format_duration(mean)),
        None => println!("  mean time to review: n/a"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use knowledge_core::models::Approval;
    use knowledge_core::PullRequestRecord;

    #[test]
    fn summary_counts_approvals_and_mean() {
        let mut set = KnowledgeSet::new();
        set.insert(
            1,
            PullRequestRecord::new("a".into(), 0, vec![], 1, None).to_record(),
        );
        set.insert(
            2,
            PullRequestRecord::new(
                "a".into(),
                100,
                vec![],
                1,
                Some(Approval { submitted_at: 400, approver: Some("b".into()) }),
            )
            .to_record(),
        );
        set.insert(
            9,
            PullRequestRecord::new(
                "c".into(),
                0,
                vec![],
                2,
                Some(Approval { submitted_at: 100, approver: None }),
            )
            .to_record(),
        );

        let summary = summarize(&set);
        assert_eq!(summary.records, 3);
        assert_eq!(summary.approved, 2);
        assert_eq!(summary.mean_time_to_review, Some(200.0));
        assert_eq!(summary.first_id, Some(1));
        assert_eq!(summary.last_id, Some(9));
    }

    #[test]
    fn empty_summary() {
        let summary = summarize(&KnowledgeSet::new());
        assert_eq!(summary.records, 0);
        assert_eq!(summary.mean_time_to_review, None);
        assert_eq!(summary.first_id, None);
    }

    #[test]
    fn durations() {
        assert_eq!(format_duration(59.0), "0m");
        assert_eq!(format_duration(3_660.0), "1h 1m");
        assert_eq!(format_duration(90_000.0), "1d 1h 0m");
    }
}

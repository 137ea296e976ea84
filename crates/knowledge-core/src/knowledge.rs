//! Knowledge sets: ordered `id → record` maps with diff, merge, and codec.
//!
//! A [`KnowledgeSet`] is the in-memory view of one repository's knowledge for
//! one entity type. It is keyed by [`EntityId`] in ascending order, so two
//! sets with the same contents always serialize to the same bytes.
//!
//! # Persisted form
//!
//! One JSON object per line. Each object carries the record's fields plus an
//! `id` field equal to its key:
//!
//! ```text
//! {"approved_at":null,"approved_by":null,"author":"bob","commit_count":2,"created_at":1000,"id":1,"labels":[],"time_to_review":null}
//! {"approved_at":1500,"approved_by":"alice","author":"bob","commit_count":1,"created_at":1000,"id":2,"labels":["bug"],"time_to_review":500}
//! ```

use std::collections::{BTreeMap, HashSet};

use serde_json::Value;
use thiserror::Error;

use crate::models::{EntityId, HasEntityId, Record};

/// Errors raised while decoding or merging knowledge.
#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("line {line}: invalid JSON: {source}")]
    InvalidLine {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("line {line}: expected a JSON object")]
    NotAnObject { line: usize },

    #[error("line {line}: missing or invalid `id` field")]
    MissingId { line: usize },

    #[error("line {line}: duplicate id {id}")]
    DuplicateId { line: usize, id: EntityId },

    #[error("entity {0} is present in both previous and new knowledge")]
    Collision(EntityId),
}

/// Ordered mapping from entity ID to record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KnowledgeSet {
    records: BTreeMap<EntityId, Record>,
}

impl KnowledgeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.records.contains_key(&id)
    }

    pub fn get(&self, id: EntityId) -> Option<&Record> {
        self.records.get(&id)
    }

    /// IDs in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.records.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &Record)> {
        self.records.iter().map(|(id, r)| (*id, r))
    }

    /// Insert a record, returning the one it replaced, if any.
    pub fn insert(&mut self, id: EntityId, record: Record) -> Option<Record> {
        self.records.insert(id, record)
    }

    /// Disjoint union of two sets.
    ///
    /// Fails with [`KnowledgeError::Collision`] if any ID appears in both;
    /// existing records are never overwritten.
    pub fn merge_disjoint(mut self, other: KnowledgeSet) -> Result<Self, KnowledgeError> {
        if let Some(id) = other.ids().find(|id| self.contains(*id)) {
            return Err(KnowledgeError::Collision(id));
        }
        self.records.extend(other.records);
        Ok(self)
    }

    /// Encode as newline-delimited JSON with a duplicated `id` field.
    pub fn to_json_lines(&self) -> Result<String, serde_json::Error> {
        let mut out = String::new();
        for (id, record) in &self.records {
            let mut entry = record.clone();
            entry.insert("id".to_string(), Value::from(*id));
            out.push_str(&serde_json::to_string(&Value::Object(entry))?);
            out.push('\n');
        }
        Ok(out)
    }

    /// Decode newline-delimited JSON produced by [`to_json_lines`](Self::to_json_lines).
    ///
    /// Blank lines are ignored. The `id` field may be a number or a numeric
    /// string; it is removed from the stored record.
    pub fn from_json_lines(input: &str) -> Result<Self, KnowledgeError> {
        let mut set = KnowledgeSet::new();

        for (idx, raw) in input.lines().enumerate() {
            let line = idx + 1;
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }

            let value: Value = serde_json::from_str(raw)
                .map_err(|source| KnowledgeError::InvalidLine { line, source })?;
            let Value::Object(mut record) = value else {
                return Err(KnowledgeError::NotAnObject { line });
            };

            let id = record
                .remove("id")
                .as_ref()
                .and_then(parse_id)
                .ok_or(KnowledgeError::MissingId { line })?;

            if set.insert(id, record).is_some() {
                return Err(KnowledgeError::DuplicateId { line, id });
            }
        }

        Ok(set)
    }
}

impl FromIterator<(EntityId, Record)> for KnowledgeSet {
    fn from_iter<I: IntoIterator<Item = (EntityId, Record)>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

fn parse_id(value: &Value) -> Option<EntityId> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Keep only the raw entities whose ID is not already known.
///
/// Computes `set(raw ids) − set(known ids)` and returns the matching raw
/// entities in their original order. If the listing repeats an ID, only its
/// first occurrence is kept.
pub fn only_new<T, I>(raw: Vec<T>, known_ids: I) -> Vec<T>
where
    T: HasEntityId,
    I: IntoIterator<Item = EntityId>,
{
    let mut seen: HashSet<EntityId> = known_ids.into_iter().collect();
    raw.into_iter()
        .filter(|item| seen.insert(item.entity_id()))
        .collect()
}

//! Declarative field-shape checks for knowledge sets.
//!
//! Each entity type declares an [`EntitySchema`]: a list of fields and the
//! [`FieldKind`] each must have. [`EntitySchema::validate`] walks every
//! record in a [`KnowledgeSet`] and collects all mismatches into a single
//! [`SchemaViolation`].
//!
//! Violations are advisory. Callers log them and persist anyway.

use std::fmt;

use serde_json::Value;
use thiserror::Error;

use crate::knowledge::KnowledgeSet;
use crate::models::EntityId;

/// Expected shape of a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Number,
    OptionalNumber,
    OptionalString,
    StringList,
}

impl FieldKind {
    fn accepts(self, value: Option<&Value>) -> bool {
        match (self, value) {
            (FieldKind::String, Some(Value::String(_))) => true,
            (FieldKind::Number, Some(Value::Number(_))) => true,
            (FieldKind::OptionalNumber, None | Some(Value::Null | Value::Number(_))) => true,
            (FieldKind::OptionalString, None | Some(Value::Null | Value::String(_))) => true,
            (FieldKind::StringList, Some(Value::Array(items))) => {
                items.iter().all(|v| v.is_string())
            }
            _ => false,
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Number => "number",
            FieldKind::OptionalNumber => "number or null",
            FieldKind::OptionalString => "string or null",
            FieldKind::StringList => "list of strings",
        }
    }
}

/// One declared field.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
}

/// Declared shape of every record of one entity type.
#[derive(Debug, Clone, Copy)]
pub struct EntitySchema {
    pub entity: &'static str,
    pub fields: &'static [FieldSpec],
}

/// Shape of a harvested pull request record.
pub const PULL_REQUEST_SCHEMA: EntitySchema = EntitySchema {
    entity: "PullRequest",
    fields: &[
        FieldSpec { name: "labels", kind: FieldKind::StringList },
        FieldSpec { name: "created_at", kind: FieldKind::Number },
        FieldSpec { name: "approved_at", kind: FieldKind::OptionalNumber },
        FieldSpec { name: "approved_by", kind: FieldKind::OptionalString },
        FieldSpec { name: "time_to_review", kind: FieldKind::OptionalNumber },
        FieldSpec { name: "author", kind: FieldKind::String },
        FieldSpec { name: "commit_count", kind: FieldKind::Number },
    ],
};

/// A single failing field in a single record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub id: EntityId,
    pub field: String,
    pub expected: &'static str,
    pub found: &'static str,
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "record {}: field `{}` expected {}, found {}",
            self.id, self.field, self.expected, self.found
        )
    }
}

/// All field violations found in one knowledge set.
#[derive(Debug, Clone, Error)]
#[error("{entity} knowledge has {} schema violation(s): {}", .violations.len(), join(.violations))]
pub struct SchemaViolation {
    pub entity: &'static str,
    pub violations: Vec<FieldViolation>,
}

fn join(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

fn json_kind(value: Option<&Value>) -> &'static str {
    match value {
        None => "missing",
        Some(Value::Null) => "null",
        Some(Value::Bool(_)) => "boolean",
        Some(Value::Number(_)) => "number",
        Some(Value::String(_)) => "string",
        Some(Value::Array(_)) => "list",
        Some(Value::Object(_)) => "object",
    }
}

impl EntitySchema {
    /// Check every record against the declared fields.
    ///
    /// Fields not declared in the schema are reported too.
    pub fn validate(&self, knowledge: &KnowledgeSet) -> Result<(), SchemaViolation> {
        let mut violations = Vec::new();

        for (id, record) in knowledge.iter() {
            for spec in self.fields {
                let value = record.get(spec.name);
                if !spec.kind.accepts(value) {
                    violations.push(FieldViolation {
                        id,
                        field: spec.name.to_string(),
                        expected: spec.kind.describe(),
                        found: json_kind(value),
                    });
                }
            }

            for key in record.keys() {
                if !self.fields.iter().any(|spec| spec.name == key) {
                    violations.push(FieldViolation {
                        id,
                        field: key.clone(),
                        expected: "no such field",
                        found: json_kind(record.get(key)),
                    });
                }
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(SchemaViolation {
                entity: self.entity,
                violations,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Approval, PullRequestRecord, Record};
    use serde_json::json;

    fn single(id: EntityId, record: Record) -> KnowledgeSet {
        std::iter::once((id, record)).collect()
    }

    #[test]
    fn harvested_records_conform() {
        let approved = PullRequestRecord::new(
            "bob".into(),
            1000,
            vec!["bug".into()],
            2,
            Some(Approval {
                submitted_at: 1500,
                approver: Some("alice".into()),
            }),
        );
        let open = PullRequestRecord::new("bob".into(), 1000, vec![], 0, None);
        let set: KnowledgeSet = vec![(1, approved.to_record()), (2, open.to_record())]
            .into_iter()
            .collect();
        assert!(PULL_REQUEST_SCHEMA.validate(&set).is_ok());
    }

    #[test]
    fn non_numeric_commit_count_is_reported() {
        let mut record = PullRequestRecord::new("bob".into(), 1000, vec![], 0, None).to_record();
        record.insert("commit_count".into(), json!("many"));

        let err = PULL_REQUEST_SCHEMA.validate(&single(4, record)).unwrap_err();
        assert_eq!(err.violations.len(), 1);
        assert_eq!(err.violations[0].field, "commit_count");
        let msg = err.to_string();
        assert!(msg.contains("record 4"), "{msg}");
        assert!(msg.contains("`commit_count` expected number, found string"), "{msg}");
    }

    #[test]
    fn missing_required_and_extra_fields() {
        let record = match json!({ "author": "bob", "labels": ["x", 1], "bogus": true }) {
            Value::Object(m) => m,
            _ => unreachable!(),
        };
        let err = PULL_REQUEST_SCHEMA.validate(&single(1, record)).unwrap_err();
        let fields: Vec<&str> = err.violations.iter().map(|v| v.field.as_str()).collect();
        assert!(fields.contains(&"labels"));
        assert!(fields.contains(&"created_at"));
        assert!(fields.contains(&"commit_count"));
        assert!(fields.contains(&"bogus"));
        // optional fields may be absent
        assert!(!fields.contains(&"approved_at"));
        assert!(!fields.contains(&"approved_by"));
    }

    #[test]
    fn empty_set_is_valid() {
        assert!(PULL_REQUEST_SCHEMA.validate(&KnowledgeSet::new()).is_ok());
    }
}

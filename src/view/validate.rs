//! Structural validation applied before any configuration is persisted

use std::collections::HashSet;

use super::index::KeyIndex;
use super::model::{DataField, DataView, SourceKind, SummaryDirection, SummaryType};
use crate::catalog::MatchExpression;
use crate::data::TimeParseError;

/// Check every structural invariant of a view
pub fn validate_view(view: &DataView) -> Result<(), ValidationError> {
    if view.id.trim().is_empty() {
        return Err(ValidationError::EmptyViewId);
    }

    let mut query_ids = HashSet::new();
    for query in &view.queries {
        if query.id.trim().is_empty() {
            return Err(ValidationError::EmptyQueryId);
        }
        if !query_ids.insert(query.id.as_str()) {
            return Err(ValidationError::DuplicateQueryId(query.id.clone()));
        }
        MatchExpression::parse(&query.value).map_err(|e| ValidationError::InvalidMatchExpression {
            query_id: query.id.clone(),
            reason: e.to_string(),
        })?;
    }

    let mut set_ids = HashSet::new();
    for set in &view.data_field_sets {
        if !query_ids.contains(set.query_id.as_str()) {
            return Err(ValidationError::UnknownQuery(set.query_id.clone()));
        }
        if !set_ids.insert(set.query_id.as_str()) {
            return Err(ValidationError::DuplicateFieldSet(set.query_id.clone()));
        }

        for field in &set.data_fields {
            validate_field(field)?;
        }
        if let Some(identifying) = &set.identifying_field {
            validate_field(identifying)?;
            if identifying.is_summary() {
                return Err(ValidationError::SummaryNotAllowed(identifying.label.clone()));
            }
        }
        KeyIndex::build(set)?;
    }

    for grouping in &view.grouping_fields {
        validate_grouping_field(grouping)?;
    }

    if let Some(start) = &view.default_start_index {
        crate::data::parse_time(start)?;
    }
    if let Some(end) = &view.default_end_index {
        crate::data::parse_time(end)?;
    }
    if let Some(interval) = &view.default_interval {
        crate::data::parse_interval(interval)?;
    }

    Ok(())
}

/// Field-level invariants shared by data, identifying and grouping fields
pub fn validate_field(field: &DataField) -> Result<(), ValidationError> {
    let has_direction = field.summary_direction != SummaryDirection::Unspecified;
    let has_type = field.summary_type != SummaryType::Unspecified;
    if has_direction != has_type {
        return Err(ValidationError::SummaryPairing {
            label: field.label.clone(),
            direction: field.summary_direction.as_str().to_string(),
            summary_type: field.summary_type.as_str().to_string(),
        });
    }

    if field.source == SourceKind::MemberValue && field.keys.is_empty() {
        return Err(ValidationError::MissingKeys(field.label.clone()));
    }

    if field.is_summary() && field.source != SourceKind::MemberValue {
        return Err(ValidationError::SummaryNotAllowed(field.label.clone()));
    }

    Ok(())
}

/// Grouping fields identify items or key members; they never summarize
pub fn validate_grouping_field(field: &DataField) -> Result<(), ValidationError> {
    validate_field(field)?;
    if field.is_summary() {
        return Err(ValidationError::SummaryNotAllowed(field.label.clone()));
    }
    match field.source {
        SourceKind::Id | SourceKind::MemberValue => Ok(()),
        other => Err(ValidationError::InvalidGroupingSource(other.as_str().to_string())),
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Data view id must not be empty")]
    EmptyViewId,

    #[error("Query id must not be empty")]
    EmptyQueryId,

    #[error("Query id '{0}' is used more than once")]
    DuplicateQueryId(String),

    #[error("Query '{query_id}' has an invalid match expression: {reason}")]
    InvalidMatchExpression { query_id: String, reason: String },

    #[error("Field set references unknown query '{0}'")]
    UnknownQuery(String),

    #[error("Query '{0}' has more than one field set")]
    DuplicateFieldSet(String),

    #[error("Field '{label}' pairs summary direction {direction} with summary type {summary_type}")]
    SummaryPairing {
        label: String,
        direction: String,
        summary_type: String,
    },

    #[error("Member field '{0}' has no keys")]
    MissingKeys(String),

    #[error("Key '{key}' appears twice in one field of query '{query_id}'")]
    DuplicateKeyInField { query_id: String, key: String },

    #[error("Key '{key}' is claimed by more than one field of query '{query_id}'")]
    KeyClaimedTwice { query_id: String, key: String },

    #[error("Query '{query_id}' already has a {summary_type} summary of '{key}' in that direction")]
    DuplicateSummary {
        query_id: String,
        key: String,
        summary_type: String,
    },

    #[error("Field '{0}' cannot carry summary settings")]
    SummaryNotAllowed(String),

    #[error("Grouping fields cannot use source {0}")]
    InvalidGroupingSource(String),

    #[error("Grouping key '{0}' is not a key member")]
    GroupingKeyNotKeyMember(String),

    #[error("Field with key '{0}' already exists")]
    FieldExists(String),

    #[error(transparent)]
    Time(#[from] TimeParseError),

    #[error("Missing {0}; the request and the data view both omit it")]
    MissingParameter(&'static str),

    #[error("End index precedes start index")]
    ReversedRange,

    #[error("Interval must be positive")]
    NonPositiveInterval,

    #[error("Request spans {requested} time slots; the limit is {limit}")]
    TooManySlots { requested: u64, limit: u64 },

    #[error("Invalid continuation token '{0}'")]
    InvalidPageToken(String),
}

/// A referenced view, query or field does not exist
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NotFound {
    #[error("Data view '{0}' not found")]
    View(String),

    #[error("Query '{0}' not found")]
    Query(String),

    #[error("No field of query '{query_id}' draws from key '{key}'")]
    Field { query_id: String, key: String },
}

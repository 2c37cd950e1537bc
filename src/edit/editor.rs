//! Field Set Editor.
//!
//! Works on a private copy of a view. Every mutation is validated against
//! the whole view before it is kept, and the key index of the touched field
//! set is rebuilt afterwards. Nothing here reads a clock or a random source,
//! so replaying the same edits on the same view gives the same document.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::EditError;
use crate::catalog::Item;
use crate::resolve::{build_available_field_sets, check_grouping_keys, resolve_view, SchemaSummary};
use crate::view::{
    validate_field, validate_grouping_field, validate_view, DataField, DataFieldSet, DataView,
    KeyIndex, NotFound, Query, SourceKind, SummaryDirection, SummaryType, ValidationError,
};

/// Identifies one field of a field set by a key it draws from.
///
/// With no summary settings it names the plain field claiming the key;
/// otherwise the summary of that key with the given direction and type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FieldLocator {
    pub key: String,
    #[serde(default)]
    pub summary_direction: SummaryDirection,
    #[serde(default)]
    pub summary_type: SummaryType,
}

impl FieldLocator {
    pub fn key(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            summary_direction: SummaryDirection::Unspecified,
            summary_type: SummaryType::Unspecified,
        }
    }

    pub fn summary(key: impl Into<String>, direction: SummaryDirection, summary_type: SummaryType) -> Self {
        Self {
            key: key.into(),
            summary_direction: direction,
            summary_type,
        }
    }

    fn is_summary(&self) -> bool {
        self.summary_direction != SummaryDirection::Unspecified
            || self.summary_type != SummaryType::Unspecified
    }
}

pub struct FieldSetEditor {
    view: DataView,
    items: Vec<Arc<Item>>,
    indexes: HashMap<String, KeyIndex>,
}

impl FieldSetEditor {
    /// Start editing a copy of `view`. `items` is the catalog snapshot used
    /// to resolve queries for schema-dependent edits.
    pub fn new(view: DataView, items: Vec<Arc<Item>>) -> Result<Self, EditError> {
        validate_view(&view)?;
        let mut indexes = HashMap::new();
        for set in &view.data_field_sets {
            indexes.insert(set.query_id.clone(), KeyIndex::build(set)?);
        }
        Ok(Self { view, items, indexes })
    }

    pub fn view(&self) -> &DataView {
        &self.view
    }

    pub fn into_view(self) -> DataView {
        self.view
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn add_query(&mut self, query: Query) -> Result<(), EditError> {
        if self.view.query(&query.id) == Some(&query) {
            return Ok(());
        }
        let mut next = self.view.clone();
        next.queries.push(query);
        self.commit(next)
    }

    /// Remove a query and its field set. Removing an unknown query is a no-op.
    pub fn remove_query(&mut self, query_id: &str) -> Result<(), EditError> {
        if self.view.query(query_id).is_none() {
            return Ok(());
        }
        let mut next = self.view.clone();
        next.queries.retain(|q| q.id != query_id);
        next.data_field_sets.retain(|s| s.query_id != query_id);
        self.commit(next)
    }

    // ========================================================================
    // Fields
    // ========================================================================

    /// Merge the currently available field sets into the view's own
    pub fn add_field_sets(&mut self) -> Result<(), EditError> {
        let resolved = resolve_view(&self.view, &self.items)?;
        let available = build_available_field_sets(&self.view, &resolved);

        let mut next = self.view.clone();
        for set in available {
            match next.field_set_mut(&set.query_id) {
                Some(existing) => existing.data_fields.extend(set.data_fields),
                None => next.data_field_sets.push(set),
            }
        }
        self.commit(next)
    }

    pub fn add_field(&mut self, query_id: &str, field: DataField) -> Result<(), EditError> {
        validate_field(&field)?;
        let mut next = self.view.clone();
        let set = Self::set_or_create(&mut next, query_id)?;
        if set.data_fields.contains(&field) {
            return Ok(());
        }
        if let Some(key) = field
            .keys
            .iter()
            .find(|k| !field.is_summary() && set.data_fields.iter().any(|f| !f.is_summary() && f.has_key(k)))
        {
            return Err(ValidationError::FieldExists(key.clone()).into());
        }
        set.data_fields.push(field);
        self.commit(next)
    }

    /// Remove the located field. A field that is already gone is a no-op.
    pub fn remove_field(&mut self, query_id: &str, locator: &FieldLocator) -> Result<(), EditError> {
        let Some(pos) = self.position(query_id, locator) else {
            return Ok(());
        };
        let mut next = self.view.clone();
        if let Some(set) = next.field_set_mut(query_id) {
            set.data_fields.remove(pos);
        }
        self.commit(next)
    }

    pub fn set_identifying_field(&mut self, query_id: &str, field: Option<DataField>) -> Result<(), EditError> {
        let mut next = self.view.clone();
        let set = Self::set_or_create(&mut next, query_id)?;
        set.identifying_field = field;
        self.commit(next)
    }

    /// Append the keys of the field located by `merge` to the field located
    /// by `target`, then drop the merged field
    pub fn consolidate(&mut self, query_id: &str, target: &str, merge: &str) -> Result<(), EditError> {
        let target_pos = self.locate(query_id, &FieldLocator::key(target))?;
        let merge_pos = self.locate(query_id, &FieldLocator::key(merge))?;
        if target_pos == merge_pos {
            return Ok(());
        }

        let mut next = self.view.clone();
        let Some(set) = next.field_set_mut(query_id) else {
            return Err(NotFound::Query(query_id.to_string()).into());
        };
        let merged = set.data_fields.remove(merge_pos);
        let target_pos = if merge_pos < target_pos { target_pos - 1 } else { target_pos };
        let target_field = &mut set.data_fields[target_pos];
        for key in merged.keys {
            if !target_field.has_key(&key) {
                target_field.keys.push(key);
            }
        }
        self.commit(next)
    }

    /// Toggle the unit column of a field. Has no effect when none of the
    /// field's members declares a unit.
    pub fn set_include_uom(&mut self, query_id: &str, locator: &FieldLocator, include: bool) -> Result<(), EditError> {
        let pos = self.locate(query_id, locator)?;
        let keys = self
            .view
            .field_set(query_id)
            .map(|s| s.data_fields[pos].keys.clone())
            .unwrap_or_default();

        let resolved = resolve_view(&self.view, &self.items)?;
        let schema = SchemaSummary::from_resolved(&resolved);
        if include && !schema.has_uom(query_id, &keys) {
            tracing::debug!(query_id, key = %locator.key, "No declared unit; leaving field unchanged");
            return Ok(());
        }

        let mut next = self.view.clone();
        if let Some(set) = next.field_set_mut(query_id) {
            set.data_fields[pos].include_uom = include;
        }
        self.commit(next)
    }

    /// Add an independent summary copy of the plain field claiming `key`
    pub fn add_summary_field(
        &mut self,
        query_id: &str,
        key: &str,
        direction: SummaryDirection,
        summary_type: SummaryType,
    ) -> Result<(), EditError> {
        if direction == SummaryDirection::Unspecified || summary_type == SummaryType::Unspecified {
            return Err(ValidationError::SummaryPairing {
                label: key.to_string(),
                direction: direction.as_str().to_string(),
                summary_type: summary_type.as_str().to_string(),
            }
            .into());
        }
        if self
            .position(query_id, &FieldLocator::summary(key, direction, summary_type))
            .is_some()
        {
            return Ok(());
        }

        let pos = self.locate(query_id, &FieldLocator::key(key))?;
        let mut next = self.view.clone();
        if let Some(set) = next.field_set_mut(query_id) {
            let summary = set.data_fields[pos].to_summary(direction, summary_type);
            set.data_fields.push(summary);
        }
        self.commit(next)
    }

    // ========================================================================
    // Grouping
    // ========================================================================

    pub fn add_grouping_field(&mut self, field: DataField) -> Result<(), EditError> {
        validate_grouping_field(&field)?;
        if self.view.grouping_fields.contains(&field) {
            return Ok(());
        }

        if field.source == SourceKind::MemberValue {
            let resolved = resolve_view(&self.view, &self.items)?;
            check_grouping_keys(std::slice::from_ref(&field), &resolved)?;
        }

        let mut next = self.view.clone();
        next.grouping_fields.push(field);
        self.commit(next)
    }

    /// Remove grouping fields with the same source and keys. Unknown fields
    /// are a no-op.
    pub fn remove_grouping_field(&mut self, field: &DataField) -> Result<(), EditError> {
        let mut next = self.view.clone();
        next.grouping_fields
            .retain(|g| !(g.source == field.source && g.keys == field.keys));
        if next.grouping_fields.len() == self.view.grouping_fields.len() {
            return Ok(());
        }
        self.commit(next)
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn set_or_create<'v>(view: &'v mut DataView, query_id: &str) -> Result<&'v mut DataFieldSet, EditError> {
        if view.query(query_id).is_none() {
            return Err(NotFound::Query(query_id.to_string()).into());
        }
        if view.field_set(query_id).is_none() {
            view.data_field_sets.push(DataFieldSet::new(query_id));
        }
        view.field_set_mut(query_id)
            .ok_or_else(|| NotFound::Query(query_id.to_string()).into())
    }

    fn position(&self, query_id: &str, locator: &FieldLocator) -> Option<usize> {
        let index = self.indexes.get(query_id)?;
        if locator.is_summary() {
            index.summary_for(&locator.key, locator.summary_direction, locator.summary_type)
        } else {
            index.field_for(&locator.key)
        }
    }

    fn locate(&self, query_id: &str, locator: &FieldLocator) -> Result<usize, EditError> {
        if self.view.query(query_id).is_none() {
            return Err(NotFound::Query(query_id.to_string()).into());
        }
        self.position(query_id, locator).ok_or_else(|| {
            NotFound::Field {
                query_id: query_id.to_string(),
                key: locator.key.clone(),
            }
            .into()
        })
    }

    fn commit(&mut self, next: DataView) -> Result<(), EditError> {
        validate_view(&next)?;
        let mut indexes = HashMap::with_capacity(next.data_field_sets.len());
        for set in &next.data_field_sets {
            indexes.insert(set.query_id.clone(), KeyIndex::build(set)?);
        }
        self.indexes = indexes;
        self.view = next;
        Ok(())
    }
}

//! Data View configuration documents.
//!
//! Serialized with PascalCase names; list order is column and resolution
//! order and is preserved through a JSON round trip.

use serde::{Deserialize, Serialize};

use crate::catalog::{InterpolationMode, ResourceKind};

/// Where a field's value comes from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    /// Value of a member named by one of the field's keys
    #[default]
    #[serde(rename = "PropertyId")]
    MemberValue,
    /// The item's identifier
    Id,
    /// The item's display name
    Name,
    /// The item's description
    Description,
    /// The identifier of the item's type
    TypeId,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::MemberValue => "PropertyId",
            SourceKind::Id => "Id",
            SourceKind::Name => "Name",
            SourceKind::Description => "Description",
            SourceKind::TypeId => "TypeId",
        }
    }
}

/// Which window a summary aggregates over
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SummaryDirection {
    #[default]
    #[serde(rename = "None")]
    Unspecified,
    /// `[slot, slot + interval)`
    Forward,
    /// `(slot - interval, slot]`
    Backward,
}

impl SummaryDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryDirection::Unspecified => "None",
            SummaryDirection::Forward => "Forward",
            SummaryDirection::Backward => "Backward",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SummaryType {
    #[default]
    #[serde(rename = "None")]
    Unspecified,
    Count,
    Minimum,
    Maximum,
    Range,
    Mean,
    Total,
    StandardDeviation,
    PopulationStandardDeviation,
}

impl SummaryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryType::Unspecified => "None",
            SummaryType::Count => "Count",
            SummaryType::Minimum => "Minimum",
            SummaryType::Maximum => "Maximum",
            SummaryType::Range => "Range",
            SummaryType::Mean => "Mean",
            SummaryType::Total => "Total",
            SummaryType::StandardDeviation => "StandardDeviation",
            SummaryType::PopulationStandardDeviation => "PopulationStandardDeviation",
        }
    }
}

/// One output column definition
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DataField {
    pub source: SourceKind,
    /// Member keys, in insertion order. Non-empty for member values.
    #[serde(default)]
    pub keys: Vec<String>,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub include_uom: bool,
    #[serde(default)]
    pub summary_direction: SummaryDirection,
    #[serde(default)]
    pub summary_type: SummaryType,
}

impl DataField {
    /// A member-value field drawing from a single key, labelled by it
    pub fn member(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            source: SourceKind::MemberValue,
            label: key.clone(),
            keys: vec![key],
            ..Default::default()
        }
    }

    /// A metadata field (identifier, name, ...) with the given label template
    pub fn metadata(source: SourceKind, label: impl Into<String>) -> Self {
        Self {
            source,
            label: label.into(),
            ..Default::default()
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.keys.push(key.into());
        self
    }

    pub fn with_uom(mut self, include: bool) -> Self {
        self.include_uom = include;
        self
    }

    pub fn is_summary(&self) -> bool {
        self.summary_type != SummaryType::Unspecified
            || self.summary_direction != SummaryDirection::Unspecified
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
    }

    pub fn first_key(&self) -> Option<&str> {
        self.keys.first().map(String::as_str)
    }

    /// Independent copy carrying summary metadata. Keys are deep-copied;
    /// nothing is shared with `self`.
    pub fn to_summary(&self, direction: SummaryDirection, summary_type: SummaryType) -> Self {
        Self {
            source: self.source,
            keys: self.keys.clone(),
            label: self.label.clone(),
            include_uom: self.include_uom,
            summary_direction: direction,
            summary_type,
        }
    }
}

/// Per-set settings that override member defaults
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FieldSetOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpolation: Option<InterpolationMode>,
}

/// Field configuration belonging to one query
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DataFieldSet {
    pub query_id: String,
    #[serde(default)]
    pub data_fields: Vec<DataField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifying_field: Option<DataField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overrides: Option<FieldSetOverrides>,
}

impl DataFieldSet {
    pub fn new(query_id: impl Into<String>) -> Self {
        Self {
            query_id: query_id.into(),
            ..Default::default()
        }
    }

    pub fn with_field(mut self, field: DataField) -> Self {
        self.data_fields.push(field);
        self
    }

    pub fn interpolation_override(&self) -> Option<InterpolationMode> {
        self.overrides.as_ref().and_then(|o| o.interpolation)
    }
}

/// A named matching rule
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Query {
    pub id: String,
    /// Match expression over item identifiers and names
    pub value: String,
    #[serde(default)]
    pub kind: ResourceKind,
}

impl Query {
    pub fn new(id: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            value: value.into(),
            kind: ResourceKind::Stream,
        }
    }

    pub fn with_kind(mut self, kind: ResourceKind) -> Self {
        self.kind = kind;
        self
    }
}

/// The configuration root
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DataView {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub queries: Vec<Query>,
    #[serde(default)]
    pub data_field_sets: Vec<DataFieldSet>,
    #[serde(default)]
    pub grouping_fields: Vec<DataField>,
    /// Start used when a data request omits one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_start_index: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_end_index: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_interval: Option<String>,
}

impl DataView {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_query(mut self, query: Query) -> Self {
        self.queries.push(query);
        self
    }

    pub fn query(&self, id: &str) -> Option<&Query> {
        self.queries.iter().find(|q| q.id == id)
    }

    pub fn field_set(&self, query_id: &str) -> Option<&DataFieldSet> {
        self.data_field_sets.iter().find(|s| s.query_id == query_id)
    }

    pub fn field_set_mut(&mut self, query_id: &str) -> Option<&mut DataFieldSet> {
        self.data_field_sets.iter_mut().find(|s| s.query_id == query_id)
    }

    /// Structural fingerprint of the whole configuration
    pub fn fingerprint(&self) -> u64 {
        let canonical = serde_json::to_vec(self).unwrap_or_default();
        fxhash::hash64(&canonical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_view() -> DataView {
        let mut view = DataView::new("DataView_Sample")
            .with_name("DataView_Sample_Name")
            .with_description("A sample view")
            .with_query(Query::new("stream", "dvTank*"));
        view.data_field_sets.push(
            DataFieldSet::new("stream")
                .with_field(DataField::member("Pressure").with_uom(true))
                .with_field(DataField::member("Temperature").with_key("AmbientTemperature")),
        );
        view.grouping_fields
            .push(DataField::metadata(SourceKind::Id, "{IdentifyingValue} {Key}"));
        view
    }

    #[test]
    fn test_json_round_trip_preserves_order() {
        let view = sample_view();
        let json = serde_json::to_string(&view).unwrap();
        let back: DataView = serde_json::from_str(&json).unwrap();
        assert_eq!(back, view);
        assert_eq!(
            back.data_field_sets[0].data_fields[1].keys,
            vec!["Temperature", "AmbientTemperature"]
        );
    }

    #[test]
    fn test_wire_names() {
        let json = serde_json::to_value(sample_view()).unwrap();
        assert_eq!(json["Queries"][0]["Value"], "dvTank*");
        assert_eq!(json["Queries"][0]["Kind"], "Stream");
        let field = &json["DataFieldSets"][0]["DataFields"][0];
        assert_eq!(field["Source"], "PropertyId");
        assert_eq!(field["IncludeUom"], true);
        assert_eq!(field["SummaryType"], "None");
        assert_eq!(json["GroupingFields"][0]["Source"], "Id");
    }

    #[test]
    fn test_minimal_document_defaults() {
        let view: DataView = serde_json::from_str(r#"{"Id": "v"}"#).unwrap();
        assert_eq!(view.id, "v");
        assert!(view.queries.is_empty());
        assert!(view.default_interval.is_none());
    }

    #[test]
    fn test_summary_copy_is_independent() {
        let original = DataField::member("Pressure");
        let mut summary = original.to_summary(SummaryDirection::Forward, SummaryType::Mean);
        summary.keys.push("Other".to_string());
        summary.summary_type = SummaryType::Total;

        assert_eq!(original.keys, vec!["Pressure"]);
        assert!(!original.is_summary());
        assert!(summary.is_summary());
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let view = sample_view();
        assert_eq!(view.fingerprint(), sample_view().fingerprint());

        let mut edited = sample_view();
        edited.data_field_sets[0].data_fields[0].include_uom = false;
        assert_ne!(view.fingerprint(), edited.fingerprint());
    }
}

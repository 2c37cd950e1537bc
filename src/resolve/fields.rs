//! Field Set Builder and the member schema summary used by the editor

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use super::resolver::ResolvedItemSet;
use crate::data::DataType;
use crate::view::{DataField, DataFieldSet, DataView, SourceKind, ValidationError};

/// Candidate field sets built from the members of each query's eligible
/// items.
///
/// One set per query, in query order. Each distinct non-key member becomes
/// a single-key field labelled by its name, in order of first appearance
/// across the items (sorted by id) and their member lists. Members already
/// claimed by a field of the view's existing set are left out. A member
/// defined with different types across items is still offered once.
pub fn build_available_field_sets(view: &DataView, resolved: &[ResolvedItemSet]) -> Vec<DataFieldSet> {
    view.queries
        .iter()
        .map(|query| {
            let claimed: HashSet<&str> = view
                .field_set(&query.id)
                .map(|set| {
                    set.data_fields
                        .iter()
                        .filter(|f| f.source == SourceKind::MemberValue && !f.is_summary())
                        .flat_map(|f| f.keys.iter().map(String::as_str))
                        .collect()
                })
                .unwrap_or_default();

            let mut set = DataFieldSet::new(query.id.clone());
            let Some(items) = resolved.iter().find(|r| r.query_id == query.id) else {
                return set;
            };

            let mut seen: HashMap<&str, DataType> = HashMap::new();
            for item in &items.eligible {
                for member in item.members.iter().filter(|m| !m.is_key) {
                    match seen.get(member.name.as_str()) {
                        Some(first) if *first != member.data_type => {
                            tracing::warn!(
                                query_id = %query.id,
                                item_id = %item.id,
                                member = %member.name,
                                first = %first,
                                found = %member.data_type,
                                "Member type differs across items"
                            );
                        }
                        Some(_) => {}
                        None => {
                            seen.insert(member.name.as_str(), member.data_type);
                            if !claimed.contains(member.name.as_str()) {
                                set.data_fields.push(DataField::member(member.name.clone()));
                            }
                        }
                    }
                }
            }
            set
        })
        .collect()
}

/// What the resolved items say about one member name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemberProfile {
    /// Some resolved item defines the member as a key
    pub key_somewhere: bool,
    /// Some resolved item defines the member as a non-key
    pub value_somewhere: bool,
    /// Distinct declared units
    pub uoms: BTreeSet<String>,
}

/// Member profiles per query, built from eligible items
#[derive(Debug, Clone, Default)]
pub struct SchemaSummary {
    queries: BTreeMap<String, BTreeMap<String, MemberProfile>>,
}

impl SchemaSummary {
    pub fn from_resolved(resolved: &[ResolvedItemSet]) -> Self {
        let mut queries = BTreeMap::new();
        for set in resolved {
            let members: &mut BTreeMap<String, MemberProfile> =
                queries.entry(set.query_id.clone()).or_default();
            for item in &set.eligible {
                for member in &item.members {
                    let profile = members.entry(member.name.clone()).or_default();
                    if member.is_key {
                        profile.key_somewhere = true;
                    } else {
                        profile.value_somewhere = true;
                    }
                    if let Some(uom) = &member.uom {
                        profile.uoms.insert(uom.clone());
                    }
                }
            }
        }
        Self { queries }
    }

    pub fn member(&self, query_id: &str, name: &str) -> Option<&MemberProfile> {
        self.queries.get(query_id).and_then(|m| m.get(name))
    }

    /// Whether any of the keys declares a unit for this query
    pub fn has_uom(&self, query_id: &str, keys: &[String]) -> bool {
        keys.iter()
            .any(|k| self.member(query_id, k).is_some_and(|p| !p.uoms.is_empty()))
    }

    /// A member name is usable as a grouping key when some resolved item
    /// defines it as its key and none defines it as a value member
    pub fn is_key_member(&self, name: &str) -> bool {
        let profiles: Vec<&MemberProfile> =
            self.queries.values().filter_map(|m| m.get(name)).collect();
        profiles.iter().any(|p| p.key_somewhere) && !profiles.iter().any(|p| p.value_somewhere)
    }
}

/// Check that every member grouping key is a key member of the resolved
/// items
pub fn check_grouping_keys(
    grouping: &[DataField],
    resolved: &[ResolvedItemSet],
) -> Result<(), ValidationError> {
    let mut member_fields = grouping
        .iter()
        .filter(|g| g.source == SourceKind::MemberValue)
        .peekable();
    if member_fields.peek().is_none() {
        return Ok(());
    }

    let schema = SchemaSummary::from_resolved(resolved);
    for field in member_fields {
        if let Some(key) = field.keys.iter().find(|k| !schema.is_key_member(k)) {
            return Err(ValidationError::GroupingKeyNotKeyMember(key.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Item, Member};
    use crate::resolve::resolve_view;
    use crate::view::Query;
    use std::sync::Arc;

    fn tanks() -> Vec<Arc<Item>> {
        vec![
            Arc::new(
                Item::new("dvTank2", "Tank2", "t1")
                    .with_member(Member::time_key("Time"))
                    .with_member(Member::new("Pressure", DataType::Float64).with_uom("psi"))
                    .with_member(Member::new("Temperature", DataType::Float64).with_uom("degF")),
            ),
            Arc::new(
                Item::new("dvTank100", "Tank100", "t2")
                    .with_member(Member::time_key("Time"))
                    .with_member(Member::new("Pressure", DataType::Int64).with_uom("psi"))
                    .with_member(Member::new("AmbientTemperature", DataType::Float64)),
            ),
        ]
    }

    fn view() -> DataView {
        DataView::new("v").with_query(Query::new("stream", "dvTank*"))
    }

    fn keys(set: &DataFieldSet) -> Vec<&str> {
        set.data_fields
            .iter()
            .map(|f| f.first_key().unwrap_or_default())
            .collect()
    }

    #[test]
    fn test_available_fields_in_first_appearance_order() {
        let view = view();
        let resolved = resolve_view(&view, &tanks()).unwrap();
        let sets = build_available_field_sets(&view, &resolved);

        assert_eq!(sets.len(), 1);
        // dvTank100 sorts before dvTank2
        assert_eq!(keys(&sets[0]), vec!["Pressure", "AmbientTemperature", "Temperature"]);
        assert!(sets[0].data_fields.iter().all(|f| f.label == f.keys[0]));
    }

    #[test]
    fn test_claimed_keys_are_excluded() {
        let mut view = view();
        view.data_field_sets.push(
            DataFieldSet::new("stream")
                .with_field(DataField::member("Temperature").with_key("AmbientTemperature")),
        );
        let resolved = resolve_view(&view, &tanks()).unwrap();
        let sets = build_available_field_sets(&view, &resolved);
        assert_eq!(keys(&sets[0]), vec!["Pressure"]);
    }

    #[test]
    fn test_building_twice_gives_the_same_sets() {
        let view = view();
        let items = tanks();
        let resolved = resolve_view(&view, &items).unwrap();

        let first = build_available_field_sets(&view, &resolved);
        let second = build_available_field_sets(&view, &resolve_view(&view, &items).unwrap());
        assert_eq!(first, second);

        // Once merged into the view, nothing selected is offered again
        let mut merged = view.clone();
        merged.data_field_sets = first;
        let selected: HashSet<String> = merged.data_field_sets[0]
            .data_fields
            .iter()
            .flat_map(|f| f.keys.clone())
            .collect();
        let offered = build_available_field_sets(&merged, &resolved);
        assert!(offered[0]
            .data_fields
            .iter()
            .all(|f| f.keys.iter().all(|k| !selected.contains(k))));
        assert!(offered[0].data_fields.is_empty());
    }

    #[test]
    fn test_query_without_items_yields_empty_set() {
        let view = view().with_query(Query::new("none", "missing*"));
        let resolved = resolve_view(&view, &tanks()).unwrap();
        let sets = build_available_field_sets(&view, &resolved);
        assert_eq!(sets.len(), 2);
        assert_eq!(sets[1].query_id, "none");
        assert!(sets[1].data_fields.is_empty());
    }

    #[test]
    fn test_schema_summary() {
        let resolved = resolve_view(&view(), &tanks()).unwrap();
        let schema = SchemaSummary::from_resolved(&resolved);

        assert!(schema.has_uom("stream", &["Pressure".to_string()]));
        assert!(!schema.has_uom("stream", &["AmbientTemperature".to_string()]));
        assert!(schema.is_key_member("Time"));
        assert!(!schema.is_key_member("Pressure"));
        // No resolved item defines it as a key
        assert!(!schema.is_key_member("Unknown"));
    }
}

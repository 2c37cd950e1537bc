//! Catalog Resolver: matches a query against the known items

use std::sync::Arc;

use crate::catalog::{Item, MatchExpression};
use crate::view::{DataView, Query, ValidationError};

/// An item that matched a query's pattern but cannot back data fields
#[derive(Debug, Clone, PartialEq)]
pub struct IneligibleItem {
    pub item: Arc<Item>,
    pub reason: String,
}

/// Result of resolving one query at a point in time. Both lists are
/// ordered by item identifier (byte order).
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedItemSet {
    pub query_id: String,
    pub eligible: Vec<Arc<Item>>,
    pub ineligible: Vec<IneligibleItem>,
}

impl ResolvedItemSet {
    pub fn is_empty(&self) -> bool {
        self.eligible.is_empty() && self.ineligible.is_empty()
    }
}

/// Partition the items matching `query` into eligible and ineligible.
///
/// Pure: the catalog is only read.
pub fn resolve_query(query: &Query, items: &[Arc<Item>]) -> Result<ResolvedItemSet, ValidationError> {
    let expression =
        MatchExpression::parse(&query.value).map_err(|e| ValidationError::InvalidMatchExpression {
            query_id: query.id.clone(),
            reason: e.to_string(),
        })?;

    let mut matched: Vec<&Arc<Item>> = items
        .iter()
        .filter(|item| item.kind == query.kind && expression.matches(item))
        .collect();
    matched.sort_by(|a, b| a.id.as_bytes().cmp(b.id.as_bytes()));

    let mut eligible = Vec::new();
    let mut ineligible = Vec::new();
    for item in matched {
        match item.schema_incompatibility() {
            None => eligible.push(Arc::clone(item)),
            Some(reason) => ineligible.push(IneligibleItem {
                item: Arc::clone(item),
                reason,
            }),
        }
    }

    tracing::debug!(
        query_id = %query.id,
        eligible = eligible.len(),
        ineligible = ineligible.len(),
        "Resolved query"
    );

    Ok(ResolvedItemSet {
        query_id: query.id.clone(),
        eligible,
        ineligible,
    })
}

/// Resolve every query of a view, in query order
pub fn resolve_view(view: &DataView, items: &[Arc<Item>]) -> Result<Vec<ResolvedItemSet>, ValidationError> {
    view.queries.iter().map(|q| resolve_query(q, items)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Member, ResourceKind};
    use crate::data::DataType;

    fn stream(id: &str, name: &str) -> Arc<Item> {
        Arc::new(
            Item::new(id, name, "t")
                .with_member(Member::time_key("Time"))
                .with_member(Member::new("Pressure", DataType::Float64)),
        )
    }

    fn catalog() -> Vec<Arc<Item>> {
        vec![
            stream("dvTank2", "Tank2"),
            stream("dvTank100", "Tank100"),
            Arc::new(
                Item::new("dvTankSettings", "Settings", "s")
                    .with_member(Member::new("Setting", DataType::String).as_key())
                    .with_member(Member::new("Value", DataType::Float64)),
            ),
            stream("boiler", "Boiler"),
            Arc::new(
                Item::new("dvTankGroup", "Group", "g")
                    .with_kind(ResourceKind::Container)
                    .with_member(Member::time_key("Time")),
            ),
        ]
    }

    #[test]
    fn test_partition_eligible_and_ineligible() {
        let set = resolve_query(&Query::new("stream", "dvTank*"), &catalog()).unwrap();

        let eligible: Vec<&str> = set.eligible.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(eligible, vec!["dvTank100", "dvTank2"]);

        assert_eq!(set.ineligible.len(), 1);
        assert_eq!(set.ineligible[0].item.id, "dvTankSettings");
        assert!(set.ineligible[0].reason.contains("timestamp"));
    }

    #[test]
    fn test_partition_is_complete_and_disjoint() {
        let items = catalog();
        let query = Query::new("q", "*");
        let set = resolve_query(&query, &items).unwrap();

        let expression = MatchExpression::parse(&query.value).unwrap();
        let matched: Vec<&str> = items
            .iter()
            .filter(|i| i.kind == query.kind && expression.matches(i))
            .map(|i| i.id.as_str())
            .collect();

        let mut reported: Vec<&str> = set
            .eligible
            .iter()
            .map(|i| i.id.as_str())
            .chain(set.ineligible.iter().map(|i| i.item.id.as_str()))
            .collect();
        reported.sort();
        let mut expected = matched.clone();
        expected.sort();
        assert_eq!(reported, expected);

        for item in &set.eligible {
            assert!(!set.ineligible.iter().any(|i| i.item.id == item.id));
        }
    }

    #[test]
    fn test_kind_filter() {
        let containers = resolve_query(
            &Query::new("c", "dvTank*").with_kind(ResourceKind::Container),
            &catalog(),
        )
        .unwrap();
        assert_eq!(containers.eligible.len(), 0);
        assert_eq!(containers.ineligible.len(), 1);
        assert_eq!(containers.ineligible[0].item.id, "dvTankGroup");
    }

    #[test]
    fn test_resolution_is_repeatable() {
        let items = catalog();
        let query = Query::new("stream", "dvTank*");
        assert_eq!(
            resolve_query(&query, &items).unwrap(),
            resolve_query(&query, &items).unwrap()
        );
    }

    #[test]
    fn test_no_match_is_empty_not_error() {
        let set = resolve_query(&Query::new("q", "nothing*"), &catalog()).unwrap();
        assert!(set.is_empty());
    }
}

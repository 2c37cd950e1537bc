pub mod fields;
pub mod resolver;

pub use fields::{build_available_field_sets, check_grouping_keys, MemberProfile, SchemaSummary};
pub use resolver::{resolve_query, resolve_view, IneligibleItem, ResolvedItemSet};

//! Key-to-field index for a field set, rebuilt after every mutation so that
//! two fields claiming the same member key surface as a validation error.

use std::collections::BTreeMap;

use super::model::{DataFieldSet, SourceKind, SummaryDirection, SummaryType};
use super::validate::ValidationError;

type SummaryKey = (String, SummaryDirection, SummaryType);

#[derive(Debug, Default, Clone)]
pub struct KeyIndex {
    /// Member key -> position of the non-summary field that claims it
    fields: BTreeMap<String, usize>,
    /// (key, direction, type) -> position of the summary field
    summaries: BTreeMap<SummaryKey, usize>,
}

impl KeyIndex {
    pub fn build(set: &DataFieldSet) -> Result<Self, ValidationError> {
        let mut index = KeyIndex::default();

        for (pos, field) in set.data_fields.iter().enumerate() {
            if field.source != SourceKind::MemberValue {
                continue;
            }

            for (i, key) in field.keys.iter().enumerate() {
                if field.keys[..i].contains(key) {
                    return Err(ValidationError::DuplicateKeyInField {
                        query_id: set.query_id.clone(),
                        key: key.clone(),
                    });
                }

                if field.is_summary() {
                    let slot = (key.clone(), field.summary_direction, field.summary_type);
                    if index.summaries.insert(slot, pos).is_some() {
                        return Err(ValidationError::DuplicateSummary {
                            query_id: set.query_id.clone(),
                            key: key.clone(),
                            summary_type: field.summary_type.as_str().to_string(),
                        });
                    }
                } else if index.fields.insert(key.clone(), pos).is_some() {
                    return Err(ValidationError::KeyClaimedTwice {
                        query_id: set.query_id.clone(),
                        key: key.clone(),
                    });
                }
            }
        }

        Ok(index)
    }

    /// Position of the non-summary field drawing from `key`
    pub fn field_for(&self, key: &str) -> Option<usize> {
        self.fields.get(key).copied()
    }

    pub fn summary_for(
        &self,
        key: &str,
        direction: SummaryDirection,
        summary_type: SummaryType,
    ) -> Option<usize> {
        self.summaries
            .get(&(key.to_string(), direction, summary_type))
            .copied()
    }

    pub fn claims(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::model::DataField;

    #[test]
    fn test_index_locates_fields() {
        let set = DataFieldSet::new("q")
            .with_field(DataField::member("Pressure"))
            .with_field(DataField::member("Temperature").with_key("AmbientTemperature"))
            .with_field(
                DataField::member("Pressure").to_summary(SummaryDirection::Forward, SummaryType::Mean),
            );

        let index = KeyIndex::build(&set).unwrap();
        assert_eq!(index.field_for("Pressure"), Some(0));
        assert_eq!(index.field_for("AmbientTemperature"), Some(1));
        assert_eq!(
            index.summary_for("Pressure", SummaryDirection::Forward, SummaryType::Mean),
            Some(2)
        );
        assert!(!index.claims("Missing"));
    }

    #[test]
    fn test_two_fields_claiming_a_key() {
        let set = DataFieldSet::new("q")
            .with_field(DataField::member("Temperature"))
            .with_field(DataField::member("Ambient").with_key("Temperature"));
        assert!(matches!(
            KeyIndex::build(&set),
            Err(ValidationError::KeyClaimedTwice { .. })
        ));
    }

    #[test]
    fn test_duplicate_key_in_field_and_summary() {
        let set = DataFieldSet::new("q").with_field(DataField::member("A").with_key("A"));
        assert!(matches!(
            KeyIndex::build(&set),
            Err(ValidationError::DuplicateKeyInField { .. })
        ));

        let mean = DataField::member("A").to_summary(SummaryDirection::Forward, SummaryType::Mean);
        let set = DataFieldSet::new("q").with_field(mean.clone()).with_field(mean);
        assert!(matches!(
            KeyIndex::build(&set),
            Err(ValidationError::DuplicateSummary { .. })
        ));
    }
}

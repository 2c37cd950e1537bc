//! Label template rendering

use super::model::{DataField, SourceKind};

/// Values available to a label template
#[derive(Debug, Clone, Copy, Default)]
pub struct LabelContext<'a> {
    pub identifying_value: Option<&'a str>,
    /// The key actually used for the item, when there is one
    pub key: Option<&'a str>,
}

pub const IDENTIFYING_VALUE: &str = "{IdentifyingValue}";
pub const KEY: &str = "{Key}";
pub const FIRST_KEY: &str = "{FirstKey}";
pub const SUMMARY_TYPE: &str = "{SummaryType}";
pub const SUMMARY_DIRECTION: &str = "{SummaryDirection}";

/// Render a field's label. Summary labels without `{SummaryType}` get the
/// summary type appended. An empty result falls back to the source name.
pub fn render_field_label(field: &DataField, ctx: &LabelContext<'_>) -> String {
    let first_key = field.first_key().unwrap_or("");
    let key = ctx.key.unwrap_or(first_key);

    let mut text = field
        .label
        .replace(IDENTIFYING_VALUE, ctx.identifying_value.unwrap_or(""))
        .replace(FIRST_KEY, first_key)
        .replace(KEY, key)
        .replace(SUMMARY_TYPE, field.summary_type.as_str())
        .replace(SUMMARY_DIRECTION, field.summary_direction.as_str());

    if field.is_summary() && !field.label.contains(SUMMARY_TYPE) {
        text.push(' ');
        text.push_str(field.summary_type.as_str());
    }

    let text = collapse_whitespace(&text);
    if !text.is_empty() {
        return text;
    }

    match field.source {
        SourceKind::MemberValue if !key.is_empty() => key.to_string(),
        source => source.as_str().to_string(),
    }
}

pub fn uses_identifying_value(field: &DataField) -> bool {
    field.label.contains(IDENTIFYING_VALUE)
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::model::{SummaryDirection, SummaryType};

    #[test]
    fn test_plain_label() {
        let field = DataField::member("Pressure");
        assert_eq!(render_field_label(&field, &LabelContext::default()), "Pressure");
    }

    #[test]
    fn test_placeholders() {
        let field = DataField::member("Temperature")
            .with_key("AmbientTemperature")
            .with_label("{IdentifyingValue} {Key} ({FirstKey})");
        let ctx = LabelContext {
            identifying_value: Some("Tank100"),
            key: Some("AmbientTemperature"),
        };
        assert_eq!(
            render_field_label(&field, &ctx),
            "Tank100 AmbientTemperature (Temperature)"
        );
    }

    #[test]
    fn test_summary_suffix() {
        let field = DataField::member("Pressure")
            .to_summary(SummaryDirection::Forward, SummaryType::Mean);
        assert_eq!(render_field_label(&field, &LabelContext::default()), "Pressure Mean");

        let templated = field.with_label("{SummaryType} of {Key} {SummaryDirection}");
        assert_eq!(
            render_field_label(&templated, &LabelContext::default()),
            "Mean of Pressure Forward"
        );
    }

    #[test]
    fn test_empty_render_falls_back_to_source() {
        let grouping = DataField::metadata(SourceKind::Id, "{IdentifyingValue} {Key}");
        assert_eq!(render_field_label(&grouping, &LabelContext::default()), "Id");

        let member = DataField::member("Pressure").with_label("  ");
        assert_eq!(render_field_label(&member, &LabelContext::default()), "Pressure");
    }
}

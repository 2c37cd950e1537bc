use serde::{Deserialize, Serialize};

use super::editor::{FieldLocator, FieldSetEditor};
use super::EditError;
use crate::view::{DataField, Query, SummaryDirection, SummaryType};

/// A serializable editor operation, as posted to `/dataviews/:id/edits`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "Command")]
pub enum EditCommand {
    AddFieldSets,
    #[serde(rename_all = "PascalCase")]
    AddField { query_id: String, field: DataField },
    #[serde(rename_all = "PascalCase")]
    RemoveField { query_id: String, field: FieldLocator },
    #[serde(rename_all = "PascalCase")]
    SetIdentifyingField {
        query_id: String,
        #[serde(default)]
        field: Option<DataField>,
    },
    #[serde(rename_all = "PascalCase")]
    Consolidate {
        query_id: String,
        target_key: String,
        merge_key: String,
    },
    #[serde(rename_all = "PascalCase")]
    SetIncludeUom {
        query_id: String,
        field: FieldLocator,
        include_uom: bool,
    },
    #[serde(rename_all = "PascalCase")]
    AddSummaryField {
        query_id: String,
        key: String,
        summary_direction: SummaryDirection,
        summary_type: SummaryType,
    },
    #[serde(rename_all = "PascalCase")]
    AddGroupingField { field: DataField },
    #[serde(rename_all = "PascalCase")]
    RemoveGroupingField { field: DataField },
    #[serde(rename_all = "PascalCase")]
    AddQuery { query: Query },
    #[serde(rename_all = "PascalCase")]
    RemoveQuery { query_id: String },
}

impl EditCommand {
    pub fn name(&self) -> &'static str {
        match self {
            EditCommand::AddFieldSets => "AddFieldSets",
            EditCommand::AddField { .. } => "AddField",
            EditCommand::RemoveField { .. } => "RemoveField",
            EditCommand::SetIdentifyingField { .. } => "SetIdentifyingField",
            EditCommand::Consolidate { .. } => "Consolidate",
            EditCommand::SetIncludeUom { .. } => "SetIncludeUom",
            EditCommand::AddSummaryField { .. } => "AddSummaryField",
            EditCommand::AddGroupingField { .. } => "AddGroupingField",
            EditCommand::RemoveGroupingField { .. } => "RemoveGroupingField",
            EditCommand::AddQuery { .. } => "AddQuery",
            EditCommand::RemoveQuery { .. } => "RemoveQuery",
        }
    }

    pub fn apply(&self, editor: &mut FieldSetEditor) -> Result<(), EditError> {
        match self {
            EditCommand::AddFieldSets => editor.add_field_sets(),
            EditCommand::AddField { query_id, field } => editor.add_field(query_id, field.clone()),
            EditCommand::RemoveField { query_id, field } => editor.remove_field(query_id, field),
            EditCommand::SetIdentifyingField { query_id, field } => {
                editor.set_identifying_field(query_id, field.clone())
            }
            EditCommand::Consolidate {
                query_id,
                target_key,
                merge_key,
            } => editor.consolidate(query_id, target_key, merge_key),
            EditCommand::SetIncludeUom {
                query_id,
                field,
                include_uom,
            } => editor.set_include_uom(query_id, field, *include_uom),
            EditCommand::AddSummaryField {
                query_id,
                key,
                summary_direction,
                summary_type,
            } => editor.add_summary_field(query_id, key, *summary_direction, *summary_type),
            EditCommand::AddGroupingField { field } => editor.add_grouping_field(field.clone()),
            EditCommand::RemoveGroupingField { field } => editor.remove_grouping_field(field),
            EditCommand::AddQuery { query } => editor.add_query(query.clone()),
            EditCommand::RemoveQuery { query_id } => editor.remove_query(query_id),
        }
    }
}

/// Apply `commands` in order. On the first failure the error is returned
/// together with the position of the failing command and the editor's view
/// is left as it was after the previous command.
pub fn apply_all(editor: &mut FieldSetEditor, commands: &[EditCommand]) -> Result<(), (usize, EditError)> {
    for (pos, command) in commands.iter().enumerate() {
        tracing::debug!(command = command.name(), pos, "Applying edit");
        command.apply(editor).map_err(|e| (pos, e))?;
    }
    Ok(())
}

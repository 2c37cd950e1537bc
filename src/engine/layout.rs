//! Column layout for an evaluation.
//!
//! Binds every field of every field set to the member each eligible item
//! reads it from, then lays the bound items out as columns (ungrouped) or
//! as row families inside groups (grouped).

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::catalog::{InterpolationMode, Item};
use crate::data::{DataType, Value};
use crate::resolve::ResolvedItemSet;
use crate::view::label::uses_identifying_value;
use crate::view::{render_field_label, DataField, DataView, LabelContext, SourceKind};

/// Where one field's values come from for one item
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    Member {
        pos: usize,
        key: String,
        data_type: DataType,
        mode: InterpolationMode,
        uom: Option<String>,
    },
    /// Item metadata, the same at every slot
    Constant(Value),
    /// The item defines none of the field's keys
    Missing,
}

impl Binding {
    pub fn bind(field: &DataField, item: &Item, mode_override: Option<InterpolationMode>) -> Self {
        match field.source {
            SourceKind::MemberValue => field
                .keys
                .iter()
                .find_map(|key| item.member(key))
                .map(|(pos, member)| Binding::Member {
                    pos,
                    key: member.name.clone(),
                    data_type: member.data_type,
                    mode: mode_override.unwrap_or(member.interpolation),
                    uom: member.uom.clone(),
                })
                .unwrap_or(Binding::Missing),
            SourceKind::Id => Binding::Constant(Value::String(item.id.clone())),
            SourceKind::Name => Binding::Constant(Value::String(item.name.clone())),
            SourceKind::Description => Binding::Constant(
                item.description.clone().map(Value::String).unwrap_or(Value::Null),
            ),
            SourceKind::TypeId => Binding::Constant(Value::String(item.type_id.clone())),
        }
    }

    pub fn key(&self) -> Option<&str> {
        match self {
            Binding::Member { key, .. } => Some(key),
            _ => None,
        }
    }

    pub fn uom(&self) -> Value {
        match self {
            Binding::Member { uom: Some(uom), .. } => Value::String(uom.clone()),
            _ => Value::Null,
        }
    }
}

/// An eligible item of one field set with all of its fields bound
#[derive(Debug, Clone)]
pub struct BoundItem {
    pub set: usize,
    pub item: Arc<Item>,
    pub fields: Vec<(DataField, Binding)>,
    pub identifying: Option<(DataField, Binding)>,
}

impl BoundItem {
    /// Text that stands for this item in column headers
    pub fn identifying_value(&self) -> String {
        match &self.identifying {
            Some((_, Binding::Constant(value))) if !value.is_null() => value.to_label(),
            _ => self.item.id.clone(),
        }
    }
}

/// What a column holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    Timestamp,
    /// Grouping field by position
    Grouping(usize),
    /// Identifying value of the set's item in the row's family ordinal
    Identifying { set: usize },
    /// A field's value. `item` is set for ungrouped layouts.
    Value { set: usize, field: usize, item: Option<usize> },
    Uom { set: usize, field: usize, item: Option<usize> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub cell: Cell,
}

/// Items sharing one tuple of grouping values
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub key: Vec<Value>,
    /// Per field set, bound item positions ordered by item id
    pub members: Vec<Vec<usize>>,
}

impl Group {
    /// Rows per slot: the largest item count of any field set
    pub fn family_size(&self) -> usize {
        self.members.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn member(&self, set: usize, ordinal: usize) -> Option<usize> {
        self.members.get(set).and_then(|m| m.get(ordinal)).copied()
    }
}

#[derive(Debug, Clone)]
pub struct Layout {
    pub columns: Vec<Column>,
    pub bound: Vec<BoundItem>,
    /// Grouping fields in view order; empty when ungrouped
    pub grouping_fields: Vec<DataField>,
    pub groups: Option<Vec<Group>>,
}

impl Layout {
    pub fn build(view: &DataView, resolved: &[ResolvedItemSet]) -> Self {
        let bound = bind_items(view, resolved);
        let set_count = view.data_field_sets.len();

        let (columns, groups) = if view.grouping_fields.is_empty() {
            (ungrouped_columns(view, &bound), None)
        } else {
            let groups = build_groups(&view.grouping_fields, &bound, set_count);
            (grouped_columns(view), Some(groups))
        };

        Self {
            columns: unique_names(columns),
            bound,
            grouping_fields: view.grouping_fields.clone(),
            groups,
        }
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

fn bind_items(view: &DataView, resolved: &[ResolvedItemSet]) -> Vec<BoundItem> {
    let mut bound = Vec::new();
    for (set_pos, set) in view.data_field_sets.iter().enumerate() {
        let Some(items) = resolved.iter().find(|r| r.query_id == set.query_id) else {
            continue;
        };
        let mode_override = set.interpolation_override();
        for item in &items.eligible {
            let fields = set
                .data_fields
                .iter()
                .map(|f| (f.clone(), Binding::bind(f, item, mode_override)))
                .collect();
            let identifying = set
                .identifying_field
                .as_ref()
                .map(|f| (f.clone(), Binding::bind(f, item, mode_override)));
            bound.push(BoundItem {
                set: set_pos,
                item: Arc::clone(item),
                fields,
                identifying,
            });
        }
    }
    bound
}

fn ungrouped_columns(view: &DataView, bound: &[BoundItem]) -> Vec<Column> {
    let mut columns = vec![Column {
        name: "Timestamp".to_string(),
        cell: Cell::Timestamp,
    }];

    for set in 0..view.data_field_sets.len() {
        for (item_pos, item) in bound.iter().enumerate().filter(|(_, b)| b.set == set) {
            let identifying = item.identifying_value();
            for (field_pos, (field, binding)) in item.fields.iter().enumerate() {
                let ctx = LabelContext {
                    identifying_value: Some(&identifying),
                    key: binding.key(),
                };
                let label = render_field_label(field, &ctx);
                let name = if uses_identifying_value(field) {
                    label
                } else {
                    format!("{identifying} {label}")
                };

                let uom_name = field.include_uom.then(|| format!("{name} Uom"));
                columns.push(Column {
                    name,
                    cell: Cell::Value { set, field: field_pos, item: Some(item_pos) },
                });
                if let Some(uom_name) = uom_name {
                    columns.push(Column {
                        name: uom_name,
                        cell: Cell::Uom { set, field: field_pos, item: Some(item_pos) },
                    });
                }
            }
        }
    }
    columns
}

fn grouped_columns(view: &DataView) -> Vec<Column> {
    let mut columns: Vec<Column> = view
        .grouping_fields
        .iter()
        .enumerate()
        .map(|(pos, field)| Column {
            name: render_field_label(field, &LabelContext::default()),
            cell: Cell::Grouping(pos),
        })
        .collect();
    columns.push(Column {
        name: "Timestamp".to_string(),
        cell: Cell::Timestamp,
    });

    for (set, field_set) in view.data_field_sets.iter().enumerate() {
        if let Some(identifying) = &field_set.identifying_field {
            columns.push(Column {
                name: render_field_label(identifying, &LabelContext::default()),
                cell: Cell::Identifying { set },
            });
        }
        for (field_pos, field) in field_set.data_fields.iter().enumerate() {
            let name = render_field_label(field, &LabelContext::default());
            let uom_name = field.include_uom.then(|| format!("{name} Uom"));
            columns.push(Column {
                name,
                cell: Cell::Value { set, field: field_pos, item: None },
            });
            if let Some(uom_name) = uom_name {
                columns.push(Column {
                    name: uom_name,
                    cell: Cell::Uom { set, field: field_pos, item: None },
                });
            }
        }
    }
    columns
}

/// Group key part of an item for one grouping field. Member grouping fields
/// record the key name when the item's index member answers to it.
pub fn grouping_part(field: &DataField, item: &Item) -> Value {
    match field.source {
        SourceKind::Id => Value::String(item.id.clone()),
        SourceKind::MemberValue => item
            .index_member()
            .filter(|(_, m)| field.has_key(&m.name))
            .map(|(_, m)| Value::String(m.name.clone()))
            .unwrap_or(Value::Null),
        SourceKind::Name => Value::String(item.name.clone()),
        SourceKind::Description => item.description.clone().map(Value::String).unwrap_or(Value::Null),
        SourceKind::TypeId => Value::String(item.type_id.clone()),
    }
}

fn build_groups(grouping: &[DataField], bound: &[BoundItem], set_count: usize) -> Vec<Group> {
    let mut groups: BTreeMap<Vec<Value>, Vec<Vec<usize>>> = BTreeMap::new();
    for (pos, item) in bound.iter().enumerate() {
        let key: Vec<Value> = grouping.iter().map(|g| grouping_part(g, &item.item)).collect();
        let members = groups.entry(key).or_insert_with(|| vec![Vec::new(); set_count]);
        members[item.set].push(pos);
    }

    groups
        .into_iter()
        .map(|(key, mut members)| {
            for set in &mut members {
                set.sort_by(|a, b| bound[*a].item.id.as_bytes().cmp(bound[*b].item.id.as_bytes()));
            }
            Group { key, members }
        })
        .collect()
}

/// Suffix repeated header names so every column name is distinct
fn unique_names(mut columns: Vec<Column>) -> Vec<Column> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    for column in &mut columns {
        let count = seen.entry(column.name.clone()).or_insert(0);
        *count += 1;
        if *count > 1 {
            column.name = format!("{} ({})", column.name, count);
        }
    }
    columns
}

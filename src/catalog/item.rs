//! Item (stream/container) definitions owned by the external catalog

use serde::{Deserialize, Serialize};

use crate::data::{DataType, Value};

/// Kind of resource a query can select
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    #[default]
    Stream,
    Container,
}

/// How values between stored events are computed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InterpolationMode {
    /// Linear between neighbours for numeric members
    #[default]
    Continuous,
    /// The previous stored value holds until the next event
    StepwiseContinuousLeading,
    /// The next stored value applies back to the previous event
    StepwiseContinuousTrailing,
    /// Only exact index hits produce a value
    Discrete,
}

/// One member of an item's schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Member {
    pub name: String,
    pub data_type: DataType,
    #[serde(default)]
    pub is_key: bool,
    #[serde(default)]
    pub uom: Option<String>,
    #[serde(default)]
    pub interpolation: InterpolationMode,
}

impl Member {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            is_key: false,
            uom: None,
            interpolation: InterpolationMode::default(),
        }
    }

    /// A timestamp key member, the usual index of a stream
    pub fn time_key(name: impl Into<String>) -> Self {
        Self {
            is_key: true,
            ..Self::new(name, DataType::Timestamp)
        }
    }

    pub fn as_key(mut self) -> Self {
        self.is_key = true;
        self
    }

    pub fn with_uom(mut self, uom: impl Into<String>) -> Self {
        self.uom = Some(uom.into());
        self
    }

    pub fn with_interpolation(mut self, mode: InterpolationMode) -> Self {
        self.interpolation = mode;
        self
    }
}

/// A source of time-indexed values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Item {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub type_id: String,
    #[serde(default)]
    pub kind: ResourceKind,
    #[serde(default)]
    pub members: Vec<Member>,
}

impl Item {
    pub fn new(id: impl Into<String>, name: impl Into<String>, type_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            type_id: type_id.into(),
            kind: ResourceKind::Stream,
            members: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_kind(mut self, kind: ResourceKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_member(mut self, member: Member) -> Self {
        self.members.push(member);
        self
    }

    /// Position and definition of a member by name
    pub fn member(&self, name: &str) -> Option<(usize, &Member)> {
        self.members.iter().enumerate().find(|(_, m)| m.name == name)
    }

    /// The single timestamp key that indexes this item's events
    pub fn index_member(&self) -> Option<(usize, &Member)> {
        let mut keys = self.members.iter().enumerate().filter(|(_, m)| m.is_key);
        match (keys.next(), keys.next()) {
            (Some((pos, m)), None) if m.data_type == DataType::Timestamp => Some((pos, m)),
            _ => None,
        }
    }

    /// Check that this item can back data fields on a time grid.
    ///
    /// Returns the reason the schema is incompatible, if it is.
    pub fn schema_incompatibility(&self) -> Option<String> {
        if self.members.is_empty() {
            return Some("type has no members".to_string());
        }

        let keys: Vec<&Member> = self.members.iter().filter(|m| m.is_key).collect();
        match keys.as_slice() {
            [] => return Some("type has no key member".to_string()),
            [key] if key.data_type != DataType::Timestamp => {
                return Some(format!(
                    "key member '{}' is {}, not a timestamp index",
                    key.name, key.data_type
                ))
            }
            [_] => {}
            _ => return Some(format!("compound key of {} members is not supported", keys.len())),
        }

        if self.members.iter().all(|m| m.is_key) {
            return Some("type has no value members".to_string());
        }

        None
    }
}

/// One stored event, values aligned to the item's members
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub index: i64,
    pub values: Vec<Value>,
}

impl Event {
    pub fn new(index: i64, values: Vec<Value>) -> Self {
        Self { index, values }
    }
}

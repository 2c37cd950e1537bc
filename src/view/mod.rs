pub mod index;
pub mod label;
pub mod model;
pub mod store;
pub mod validate;

pub use index::KeyIndex;
pub use label::{render_field_label, LabelContext};
pub use model::{
    DataField, DataFieldSet, DataView, FieldSetOverrides, Query, SourceKind, SummaryDirection,
    SummaryType,
};
pub use store::{ViewStore, ViewWriteGuard};
pub use validate::{
    validate_field, validate_grouping_field, validate_view, NotFound, ValidationError,
};

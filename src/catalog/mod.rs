pub mod demo;
pub mod item;
pub mod pattern;
pub mod store;

pub use item::{Event, InterpolationMode, Item, Member, ResourceKind};
pub use pattern::{MatchExpression, PatternError};
pub use store::{CatalogError, InMemoryCatalog, SeriesSource};

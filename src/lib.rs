//! Data View: interpolated tables over matched time-series streams
//!
//! A data view names items of a catalog through match-expression queries,
//! selects which of their members become columns, and evaluates them onto a
//! fixed time grid.
//!
//! # Features
//!
//! - **Query Resolution**: glob match expressions split into eligible and ineligible items
//! - **Field Sets**: discover available fields, consolidate keys, add units and summaries
//! - **Grouping**: one block of rows per distinct grouping value
//! - **Interpolation**: continuous, stepwise and discrete modes, no extrapolation
//! - **Summaries**: count, min/max, range, mean, total and standard deviations per slot
//! - **Caching**: evaluations cached per view revision and time range
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use dataview::catalog::{InMemoryCatalog, Item, Member};
//! use dataview::data::DataType;
//! use dataview::edit::EditCommand;
//! use dataview::engine::EngineConfig;
//! use dataview::service::{DataRequest, DataViewService};
//! use dataview::view::{DataView, Query};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let catalog = Arc::new(InMemoryCatalog::new());
//! catalog.register_item(
//!     Item::new("dvTank2", "Tank2", "Tank")
//!         .with_member(Member::time_key("Time"))
//!         .with_member(Member::new("Pressure", DataType::Float64)),
//! )?;
//!
//! let service = DataViewService::new(catalog, EngineConfig::default());
//! let token = CancellationToken::new();
//! service
//!     .create_or_update(DataView::new("tanks").with_query(Query::new("q", "dvTank*")))
//!     .await?;
//! service.apply_edits("tanks", &[EditCommand::AddFieldSets], &token).await?;
//!
//! let request = DataRequest::new("2024-01-01T00:00:00Z", "2024-01-01T01:00:00Z", "00:20:00");
//! let page = service.get_data_interpolated("tanks", &request, &token).await?;
//! println!("{:?}", page.columns);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod catalog;
pub mod data;
pub mod edit;
pub mod engine;
pub mod resolve;
pub mod service;
pub mod view;

// Re-export commonly used types
pub use catalog::{InMemoryCatalog, Item, SeriesSource};
pub use data::{DataType, Value};
pub use service::{DataPage, DataRequest, DataViewService, ServiceError};
pub use view::{DataField, DataFieldSet, DataView, Query};

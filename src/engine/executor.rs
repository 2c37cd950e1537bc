use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};
use rayon::prelude::*;
use tokio_util::sync::CancellationToken;

use super::aggregates::summarize;
use super::grid::TimeGrid;
use super::interpolate::value_at;
use super::layout::{Binding, BoundItem, Cell, Column, Group, Layout};
use super::EvaluateError;
use crate::catalog::{Event, SeriesSource};
use crate::data::Value;
use crate::view::{DataField, SourceKind};

/// Values of one bound item on the grid
#[derive(Debug, Clone, Default)]
pub struct ItemSeries {
    /// Per field, one value per slot
    pub values: Vec<Vec<Value>>,
    /// Per field, the declared unit of the member read
    pub uoms: Vec<Value>,
    /// One value per slot; empty without an identifying field
    pub identifying: Vec<Value>,
}

/// A completed evaluation. Rows are produced on demand from the per-item
/// series, so reading a page never recomputes anything.
#[derive(Debug)]
pub struct Evaluation {
    pub layout: Layout,
    pub grid: TimeGrid,
    pub series: Vec<ItemSeries>,
}

impl Evaluation {
    pub fn columns(&self) -> Vec<String> {
        self.layout.column_names()
    }

    pub fn row_count(&self) -> usize {
        match &self.layout.groups {
            None => self.grid.len(),
            Some(groups) => groups.iter().map(|g| g.family_size() * self.grid.len()).sum(),
        }
    }

    /// The `n`-th row in output order
    pub fn row(&self, n: usize) -> Option<Vec<Value>> {
        match &self.layout.groups {
            None => {
                if n >= self.grid.len() {
                    return None;
                }
                Some(self.build_row(n, None, 0))
            }
            Some(groups) => {
                let mut offset = n;
                for group in groups {
                    let family = group.family_size();
                    let block = family * self.grid.len();
                    if offset < block {
                        return Some(self.build_row(offset / family, Some(group), offset % family));
                    }
                    offset -= block;
                }
                None
            }
        }
    }

    /// Lazy rows starting at `offset`. Each call starts a fresh sequence.
    pub fn rows(self: Arc<Self>, offset: usize) -> BoxStream<'static, Vec<Value>> {
        let total = self.row_count();
        stream::iter((offset..total).filter_map(move |n| self.row(n))).boxed()
    }

    fn build_row(&self, slot: usize, group: Option<&Group>, ordinal: usize) -> Vec<Value> {
        self.layout
            .columns
            .iter()
            .map(|column| self.cell(column, slot, group, ordinal))
            .collect()
    }

    fn cell(&self, column: &Column, slot: usize, group: Option<&Group>, ordinal: usize) -> Value {
        let member = |set: usize, item: Option<usize>| {
            item.or_else(|| group.and_then(|g| g.member(set, ordinal)))
                .and_then(|pos| self.series.get(pos))
        };

        match column.cell {
            Cell::Timestamp => Value::Timestamp(self.grid.slots()[slot]),
            Cell::Grouping(pos) => {
                let part = group.and_then(|g| g.key.get(pos)).cloned().unwrap_or(Value::Null);
                match self.layout.grouping_fields.get(pos) {
                    Some(field) if field.source == SourceKind::MemberValue && !part.is_null() => {
                        Value::Timestamp(self.grid.slots()[slot])
                    }
                    _ => part,
                }
            }
            Cell::Identifying { set } => member(set, None)
                .and_then(|s| s.identifying.get(slot))
                .cloned()
                .unwrap_or(Value::Null),
            Cell::Value { set, field, item } => member(set, item)
                .and_then(|s| s.values.get(field))
                .and_then(|v| v.get(slot))
                .cloned()
                .unwrap_or(Value::Null),
            Cell::Uom { set, field, item } => member(set, item)
                .and_then(|s| s.uoms.get(field))
                .cloned()
                .unwrap_or(Value::Null),
        }
    }
}

fn evaluate_binding(field: &DataField, binding: &Binding, events: &[Event], grid: &TimeGrid) -> Vec<Value> {
    grid.slots()
        .iter()
        .map(|&t| match binding {
            Binding::Missing => Value::Null,
            Binding::Constant(value) => value.clone(),
            Binding::Member { pos, data_type, mode, .. } => {
                if field.is_summary() {
                    summarize(
                        events,
                        *pos,
                        t,
                        grid.interval,
                        field.summary_direction,
                        field.summary_type,
                    )
                } else {
                    value_at(events, *pos, *data_type, *mode, t)
                }
            }
        })
        .collect()
}

/// Evaluate every bound item on the grid. Items are processed in parallel;
/// the output keeps the order of `bound`.
pub fn compute_series(
    bound: &[BoundItem],
    events: &HashMap<String, Arc<Vec<Event>>>,
    grid: &TimeGrid,
) -> Vec<ItemSeries> {
    bound
        .par_iter()
        .map(|item| {
            let events: &[Event] = events.get(&item.item.id).map(|e| e.as_slice()).unwrap_or(&[]);
            ItemSeries {
                values: item
                    .fields
                    .iter()
                    .map(|(field, binding)| evaluate_binding(field, binding, events, grid))
                    .collect(),
                uoms: item.fields.iter().map(|(_, binding)| binding.uom()).collect(),
                identifying: item
                    .identifying
                    .as_ref()
                    .map(|(field, binding)| evaluate_binding(field, binding, events, grid))
                    .unwrap_or_default(),
            }
        })
        .collect()
}

/// Read the raw windows of every distinct bound item, racing the token
pub async fn fetch_events(
    source: &dyn SeriesSource,
    bound: &[BoundItem],
    grid: &TimeGrid,
    token: &CancellationToken,
) -> Result<HashMap<String, Arc<Vec<Event>>>, EvaluateError> {
    let ids: BTreeSet<&str> = bound.iter().map(|b| b.item.id.as_str()).collect();
    let (start, end) = grid.read_range();

    let reads = ids.into_iter().map(|id| async move {
        source
            .read_window(id, start, end)
            .await
            .map(|events| (id.to_string(), Arc::new(events)))
    });

    tokio::select! {
        biased;
        _ = token.cancelled() => Err(EvaluateError::Cancelled),
        fetched = futures::future::try_join_all(reads) => Ok(fetched?.into_iter().collect()),
    }
}

/// Fetch, then compute the series off the async workers
pub async fn execute(
    source: &dyn SeriesSource,
    layout: Layout,
    grid: TimeGrid,
    token: &CancellationToken,
) -> Result<Evaluation, EvaluateError> {
    if token.is_cancelled() {
        return Err(EvaluateError::Cancelled);
    }

    let events = fetch_events(source, &layout.bound, &grid, token).await?;
    let task = tokio::task::spawn_blocking(move || {
        let series = compute_series(&layout.bound, &events, &grid);
        Evaluation { layout, grid, series }
    });

    tokio::select! {
        biased;
        _ = token.cancelled() => Err(EvaluateError::Cancelled),
        joined = task => joined.map_err(|e| EvaluateError::Worker(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{InMemoryCatalog, Item, Member};
    use crate::data::DataType;
    use crate::resolve::resolve_view;
    use crate::view::{DataFieldSet, DataView, Query, SummaryDirection, SummaryType};
    use futures::StreamExt;

    const MINUTE: i64 = 60_000;

    fn catalog() -> InMemoryCatalog {
        let catalog = InMemoryCatalog::new();
        catalog
            .register_item(
                Item::new("dvTank2", "Tank2", "t1")
                    .with_member(Member::time_key("Time"))
                    .with_member(Member::new("Pressure", DataType::Float64).with_uom("psi"))
                    .with_member(Member::new("Temperature", DataType::Float64)),
            )
            .unwrap();
        catalog
            .register_item(
                Item::new("dvTank100", "Tank100", "t2")
                    .with_member(Member::time_key("Time"))
                    .with_member(Member::new("Pressure", DataType::Float64).with_uom("psi"))
                    .with_member(Member::new("AmbientTemperature", DataType::Float64)),
            )
            .unwrap();

        let events = |base: f64| {
            (0..=6)
                .map(|i| {
                    Event::new(
                        i * 10 * MINUTE,
                        vec![Value::Null, Value::Float64(base + i as f64), Value::Float64(20.0)],
                    )
                })
                .collect::<Vec<_>>()
        };
        catalog.insert_events("dvTank2", events(0.0)).unwrap();
        catalog.insert_events("dvTank100", events(100.0)).unwrap();
        catalog
    }

    fn view() -> DataView {
        let mut view = DataView::new("v").with_query(Query::new("stream", "dvTank*"));
        view.data_field_sets.push(
            DataFieldSet::new("stream")
                .with_field(DataField::member("Pressure").with_uom(true))
                .with_field(DataField::member("Temperature").with_key("AmbientTemperature"))
                .with_field(
                    DataField::member("Pressure").to_summary(SummaryDirection::Forward, SummaryType::Count),
                ),
        );
        view
    }

    async fn run(view: &DataView, catalog: &InMemoryCatalog) -> Arc<Evaluation> {
        let items = catalog.list_items().await.unwrap();
        let resolved = resolve_view(view, &items).unwrap();
        let layout = Layout::build(view, &resolved);
        let grid = TimeGrid::new(0, 60 * MINUTE, 20 * MINUTE, 1000).unwrap();
        Arc::new(execute(catalog, layout, grid, &CancellationToken::new()).await.unwrap())
    }

    #[tokio::test]
    async fn test_ungrouped_rows() {
        let catalog = catalog();
        let eval = run(&view(), &catalog).await;

        assert_eq!(eval.row_count(), 4);
        let rows: Vec<Vec<Value>> = Arc::clone(&eval).rows(0).collect().await;
        assert_eq!(rows.len(), 4);

        // Timestamp, then dvTank100 (Pressure, Uom, Temperature, Count), then dvTank2
        let second = &rows[1];
        assert_eq!(second[0], Value::Timestamp(20 * MINUTE));
        assert_eq!(second[1], Value::Float64(102.0));
        assert_eq!(second[2], Value::String("psi".into()));
        assert_eq!(second[3], Value::Float64(20.0));
        assert_eq!(second[4], Value::Int64(2));
        assert_eq!(second[5], Value::Float64(2.0));

        // Forward window past the last event is empty
        assert_eq!(rows[3][4], Value::Int64(1));
    }

    #[tokio::test]
    async fn test_grouping_rearranges_values() {
        let catalog = catalog();
        let flat = run(&view(), &catalog).await;

        let mut grouped_view = view();
        grouped_view
            .grouping_fields
            .push(DataField::metadata(SourceKind::Id, "Tank"));
        let grouped = run(&grouped_view, &catalog).await;

        assert_eq!(grouped.row_count(), 8);

        let numbers = |eval: &Arc<Evaluation>| {
            let mut values: Vec<String> = (0..eval.row_count())
                .filter_map(|n| eval.row(n))
                .flatten()
                .filter(|v| matches!(v, Value::Float64(_) | Value::Int64(_)))
                .map(|v| v.to_label())
                .collect();
            values.sort();
            values
        };
        assert_eq!(numbers(&flat), numbers(&grouped));
    }

    #[tokio::test]
    async fn test_item_without_data_keeps_its_columns() {
        let catalog = catalog();
        catalog
            .register_item(
                Item::new("dvTank3", "Tank3", "t1")
                    .with_member(Member::time_key("Time"))
                    .with_member(Member::new("Pressure", DataType::Float64)),
            )
            .unwrap();

        let eval = run(&view(), &catalog).await;
        let columns = eval.columns();
        assert!(columns.contains(&"dvTank3 Pressure".to_string()));
        let pos = columns.iter().position(|c| c == "dvTank3 Pressure").unwrap();
        for n in 0..eval.row_count() {
            assert_eq!(eval.row(n).unwrap()[pos], Value::Null);
        }
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let catalog = catalog();
        let view = view();
        let items = catalog.list_items().await.unwrap();
        let layout = Layout::build(&view, &resolve_view(&view, &items).unwrap());
        let grid = TimeGrid::new(0, MINUTE, MINUTE, 10).unwrap();

        let token = CancellationToken::new();
        token.cancel();
        let result = execute(&catalog, layout, grid, &token).await;
        assert!(matches!(result, Err(EvaluateError::Cancelled)));
        assert_eq!(catalog.window_reads(), 0);
    }
}

//! The Data View operations, independent of any transport

pub mod cleanup;

pub use cleanup::{BestEffort, CleanupReport, StepFailure};

use futures::stream::{BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::catalog::{CatalogError, Item, SeriesSource};
use crate::data::{parse_interval, parse_time, Value};
use crate::edit::{apply_all, EditCommand, EditError, FieldSetEditor};
use crate::engine::{
    CacheBehavior, CacheStats, Engine, EngineConfig, EvaluateError, Evaluation, PageToken,
};
use crate::resolve::{build_available_field_sets, check_grouping_keys, resolve_query, IneligibleItem};
use crate::view::{
    validate_view, DataFieldSet, DataView, NotFound, SourceKind, ValidationError, ViewStore,
    ViewWriteGuard,
};

/// Parameters of an interpolated data request. Omitted times fall back to
/// the view's defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataRequest {
    pub start_index: Option<String>,
    pub end_index: Option<String>,
    pub interval: Option<String>,
    #[serde(default)]
    pub cache: CacheBehavior,
    /// Rows per page; `None` for everything after the token
    pub count: Option<usize>,
    pub continuation_token: Option<String>,
}

impl DataRequest {
    pub fn new(start: impl Into<String>, end: impl Into<String>, interval: impl Into<String>) -> Self {
        Self {
            start_index: Some(start.into()),
            end_index: Some(end.into()),
            interval: Some(interval.into()),
            ..Default::default()
        }
    }
}

/// One page of interpolated rows
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataPage {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub total_rows: usize,
    pub next_page_token: Option<String>,
}

/// Lazy rows of an evaluation from a page token onward
pub struct RowStream {
    pub columns: Vec<String>,
    pub total_rows: usize,
    pub rows: BoxStream<'static, Vec<Value>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceStats {
    pub data_views: usize,
    pub cache: CacheStats,
}

pub struct DataViewService {
    views: ViewStore,
    engine: Engine,
}

impl DataViewService {
    pub fn new(source: Arc<dyn SeriesSource>, config: EngineConfig) -> Self {
        Self {
            views: ViewStore::new(),
            engine: Engine::new(source, config),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn stats(&self) -> ServiceStats {
        ServiceStats {
            data_views: self.views.len(),
            cache: self.engine.cache().stats(),
        }
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    /// Validate and store a view. Member grouping keys are checked against
    /// the items the view currently resolves to.
    pub async fn create_or_update(&self, view: DataView) -> Result<Arc<DataView>, ServiceError> {
        validate_view(&view)?;
        if view
            .grouping_fields
            .iter()
            .any(|g| g.source == SourceKind::MemberValue)
        {
            let resolved = self.engine.resolve(&view, &CancellationToken::new()).await?;
            check_grouping_keys(&view.grouping_fields, &resolved)?;
        }
        let guard = self.views.lock(&view.id).await;
        let stored = self.store(&guard, view);
        tracing::info!(view_id = %stored.id, "Stored data view");
        Ok(stored)
    }

    pub fn get(&self, id: &str) -> Result<Arc<DataView>, ServiceError> {
        self.views
            .get(id)
            .ok_or_else(|| NotFound::View(id.to_string()).into())
    }

    /// Delete a view. Deleting a missing view succeeds; the result says
    /// whether anything was removed.
    pub async fn delete(&self, id: &str) -> Result<bool, ServiceError> {
        if id.trim().is_empty() {
            return Err(ValidationError::EmptyViewId.into());
        }
        let guard = self.views.lock(id).await;
        let existed = self.views.remove(&guard);
        self.engine.cache().invalidate_view(id);
        if existed {
            tracing::info!(view_id = %id, "Deleted data view");
        }
        Ok(existed)
    }

    /// Delete several views, continuing past failures
    pub async fn delete_many(&self, ids: &[String]) -> CleanupReport {
        let mut cleanup = BestEffort::new();
        for id in ids {
            cleanup
                .step_async(&format!("delete data view '{id}'"), self.delete(id))
                .await;
        }
        cleanup.finish()
    }

    /// Views ordered by id
    pub fn list(&self, skip: usize, count: usize) -> Vec<Arc<DataView>> {
        self.views
            .ids()
            .into_iter()
            .skip(skip)
            .take(count)
            .filter_map(|id| self.views.get(&id))
            .collect()
    }

    /// Apply editor commands atomically under the view's write guard
    pub async fn apply_edits(
        &self,
        id: &str,
        commands: &[EditCommand],
        token: &CancellationToken,
    ) -> Result<Arc<DataView>, ServiceError> {
        let guard = self.views.lock(id).await;
        let current = self.get(id)?;
        let items = self.engine.items(token).await?;

        let mut editor = FieldSetEditor::new((*current).clone(), items)?;
        if let Err((pos, e)) = apply_all(&mut editor, commands) {
            tracing::warn!(
                view_id = %id,
                command = commands[pos].name(),
                pos,
                error = %e,
                "Edit rejected; data view unchanged"
            );
            return Err(e.into());
        }

        let stored = self.store(&guard, editor.into_view());
        tracing::info!(view_id = %id, commands = commands.len(), "Applied edits");
        Ok(stored)
    }

    fn store(&self, guard: &ViewWriteGuard, view: DataView) -> Arc<DataView> {
        let stored = self.views.put(guard, view);
        self.engine.cache().invalidate_view(guard.id());
        stored
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    pub async fn get_data_items(
        &self,
        view_id: &str,
        query_id: &str,
        token: &CancellationToken,
    ) -> Result<Vec<Arc<Item>>, ServiceError> {
        let view = self.get(view_id)?;
        let query = view
            .query(query_id)
            .ok_or_else(|| NotFound::Query(query_id.to_string()))?;
        let items = self.engine.items(token).await?;
        Ok(resolve_query(query, &items)?.eligible)
    }

    pub async fn get_ineligible_data_items(
        &self,
        view_id: &str,
        query_id: &str,
        token: &CancellationToken,
    ) -> Result<Vec<IneligibleItem>, ServiceError> {
        let view = self.get(view_id)?;
        let query = view
            .query(query_id)
            .ok_or_else(|| NotFound::Query(query_id.to_string()))?;
        let items = self.engine.items(token).await?;
        Ok(resolve_query(query, &items)?.ineligible)
    }

    pub async fn get_available_field_sets(
        &self,
        view_id: &str,
        token: &CancellationToken,
    ) -> Result<Vec<DataFieldSet>, ServiceError> {
        let view = self.get(view_id)?;
        let resolved = self.engine.resolve(&view, token).await?;
        Ok(build_available_field_sets(&view, &resolved))
    }

    // ========================================================================
    // Data
    // ========================================================================

    async fn evaluate(
        &self,
        view: &DataView,
        request: &DataRequest,
        token: &CancellationToken,
    ) -> Result<Arc<Evaluation>, ServiceError> {
        let start = request
            .start_index
            .as_deref()
            .or(view.default_start_index.as_deref())
            .ok_or(ValidationError::MissingParameter("startIndex"))?;
        let end = request
            .end_index
            .as_deref()
            .or(view.default_end_index.as_deref())
            .ok_or(ValidationError::MissingParameter("endIndex"))?;
        let interval = request
            .interval
            .as_deref()
            .or(view.default_interval.as_deref())
            .ok_or(ValidationError::MissingParameter("interval"))?;

        let grid = self.engine.grid(
            parse_time(start).map_err(ValidationError::from)?,
            parse_time(end).map_err(ValidationError::from)?,
            parse_interval(interval).map_err(ValidationError::from)?,
        )?;
        Ok(self.engine.evaluate(view, grid, request.cache, token).await?)
    }

    /// Lazy rows from the request's page token onward. Each call starts a
    /// new sequence.
    pub async fn stream_data_interpolated(
        &self,
        view_id: &str,
        request: &DataRequest,
        token: &CancellationToken,
    ) -> Result<RowStream, ServiceError> {
        let view = self.get(view_id)?;
        let offset = PageToken::resume(request.continuation_token.as_deref(), view.fingerprint())?;
        self.stream_view(&view, offset as usize, request, token).await
    }

    /// One page of rows plus the token for the next page, if any
    pub async fn get_data_interpolated(
        &self,
        view_id: &str,
        request: &DataRequest,
        token: &CancellationToken,
    ) -> Result<DataPage, ServiceError> {
        let view = self.get(view_id)?;
        let fingerprint = view.fingerprint();
        let offset = PageToken::resume(request.continuation_token.as_deref(), fingerprint)? as usize;
        let stream = self.stream_view(&view, offset, request, token).await?;

        let rows: Vec<Vec<Value>> = stream.rows.collect().await;
        let next = offset + rows.len();
        let next_page_token = (request.count.is_some() && next < stream.total_rows)
            .then(|| PageToken::new(next as u64, fingerprint).encode());

        Ok(DataPage {
            columns: stream.columns,
            rows,
            total_rows: stream.total_rows,
            next_page_token,
        })
    }

    /// Rows of one revision of a view, so page tokens and rows always agree
    async fn stream_view(
        &self,
        view: &DataView,
        offset: usize,
        request: &DataRequest,
        token: &CancellationToken,
    ) -> Result<RowStream, ServiceError> {
        let evaluation = self.evaluate(view, request, token).await?;

        let columns = evaluation.columns();
        let total_rows = evaluation.row_count();
        let rows = match request.count {
            Some(count) => evaluation.rows(offset).take(count).boxed(),
            None => evaluation.rows(offset),
        };
        Ok(RowStream {
            columns,
            total_rows,
            rows,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    NotFound(#[from] NotFound),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Request was cancelled")]
    Cancelled,

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<EditError> for ServiceError {
    fn from(e: EditError) -> Self {
        match e {
            EditError::NotFound(e) => ServiceError::NotFound(e),
            EditError::Validation(e) => ServiceError::Validation(e),
        }
    }
}

impl From<EvaluateError> for ServiceError {
    fn from(e: EvaluateError) -> Self {
        match e {
            EvaluateError::Cancelled => ServiceError::Cancelled,
            EvaluateError::Validation(e) => ServiceError::Validation(e),
            EvaluateError::Catalog(e) => ServiceError::Catalog(e),
            EvaluateError::Worker(msg) => ServiceError::Internal(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::demo::seed_sample_tanks;
    use crate::catalog::InMemoryCatalog;
    use crate::data::format_millis;
    use crate::edit::FieldLocator;
    use crate::view::{DataField, Query, SourceKind, SummaryDirection, SummaryType};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const END: i64 = 1_700_000_400_000;
    const HOUR: i64 = 3_600_000;

    fn service() -> (Arc<InMemoryCatalog>, DataViewService) {
        let catalog = Arc::new(InMemoryCatalog::new());
        seed_sample_tanks(&catalog, END, HOUR, &mut StdRng::seed_from_u64(7)).unwrap();
        let service = DataViewService::new(catalog.clone(), EngineConfig::default());
        (catalog, service)
    }

    fn sample_view() -> DataView {
        DataView::new("DataView_Sample")
            .with_description("Sample data view")
            .with_query(Query::new("stream", "dvTank*"))
    }

    fn hour_request() -> DataRequest {
        DataRequest::new(format_millis(END - HOUR), format_millis(END), "00:20:00")
    }

    #[tokio::test]
    async fn test_create_get_delete() {
        let (_, service) = service();
        service.create_or_update(sample_view()).await.unwrap();
        assert_eq!(service.get("DataView_Sample").unwrap().queries.len(), 1);

        assert!(service.delete("DataView_Sample").await.unwrap());
        assert!(matches!(
            service.get("DataView_Sample"),
            Err(ServiceError::NotFound(NotFound::View(_)))
        ));
        // Deleting again is not an error
        assert!(!service.delete("DataView_Sample").await.unwrap());
    }

    #[tokio::test]
    async fn test_invalid_view_is_not_stored() {
        let (_, service) = service();
        let view = sample_view().with_query(Query::new("stream", "other"));
        assert!(matches!(
            service.create_or_update(view).await,
            Err(ServiceError::Validation(ValidationError::DuplicateQueryId(_)))
        ));
        assert!(service.list(0, 10).is_empty());
    }

    #[tokio::test]
    async fn test_stored_grouping_key_must_be_a_key_member() {
        let (_, service) = service();

        for key in ["Pressure", "Unknown"] {
            let mut view = sample_view();
            view.grouping_fields.push(DataField::member(key));
            let result = service.create_or_update(view).await;
            assert!(
                matches!(
                    &result,
                    Err(ServiceError::Validation(ValidationError::GroupingKeyNotKeyMember(k))) if k == key
                ),
                "{key}: {result:?}"
            );
        }
        assert!(service.list(0, 10).is_empty());

        let mut view = sample_view();
        view.grouping_fields.push(DataField::member("Time"));
        service.create_or_update(view).await.unwrap();
        assert_eq!(service.get("DataView_Sample").unwrap().grouping_fields.len(), 1);
    }

    #[tokio::test]
    async fn test_resolution_operations() {
        let (_, service) = service();
        service.create_or_update(sample_view()).await.unwrap();
        let token = CancellationToken::new();

        let items = service
            .get_data_items("DataView_Sample", "stream", &token)
            .await
            .unwrap();
        let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["dvTank100", "dvTank2"]);

        let ineligible = service
            .get_ineligible_data_items("DataView_Sample", "stream", &token)
            .await
            .unwrap();
        assert_eq!(ineligible.len(), 1);
        assert_eq!(ineligible[0].item.id, "dvTankSettings");

        let available = service
            .get_available_field_sets("DataView_Sample", &token)
            .await
            .unwrap();
        assert_eq!(available.len(), 1);
        assert_eq!(available[0].data_fields.len(), 3);

        assert!(matches!(
            service.get_data_items("DataView_Sample", "nope", &token).await,
            Err(ServiceError::NotFound(NotFound::Query(_)))
        ));
    }

    #[tokio::test]
    async fn test_sample_flow_slot_count_and_paging() {
        let (_, service) = service();
        service.create_or_update(sample_view()).await.unwrap();
        let token = CancellationToken::new();
        service
            .apply_edits("DataView_Sample", &[EditCommand::AddFieldSets], &token)
            .await
            .unwrap();

        let page = service
            .get_data_interpolated("DataView_Sample", &hour_request(), &token)
            .await
            .unwrap();
        assert_eq!(page.rows.len(), 4);
        assert!(page.next_page_token.is_none());

        let mut request = hour_request();
        request.count = Some(3);
        let first = service
            .get_data_interpolated("DataView_Sample", &request, &token)
            .await
            .unwrap();
        assert_eq!(first.rows.len(), 3);
        request.continuation_token = first.next_page_token.clone();
        let second = service
            .get_data_interpolated("DataView_Sample", &request, &token)
            .await
            .unwrap();
        assert_eq!(second.rows, page.rows[3..].to_vec());
        assert!(second.next_page_token.is_none());
    }

    #[tokio::test]
    async fn test_page_token_is_bound_to_the_revision_it_paged() {
        let (_, service) = service();
        service.create_or_update(sample_view()).await.unwrap();
        let token = CancellationToken::new();
        service
            .apply_edits("DataView_Sample", &[EditCommand::AddFieldSets], &token)
            .await
            .unwrap();

        let mut request = hour_request();
        request.count = Some(2);
        let first = service
            .get_data_interpolated("DataView_Sample", &request, &token)
            .await
            .unwrap();
        let stale = first.next_page_token.clone();
        assert!(stale.is_some());

        let mut edited = (*service.get("DataView_Sample").unwrap()).clone();
        edited.description = "Edited between pages".to_string();
        service.create_or_update(edited).await.unwrap();

        request.continuation_token = stale;
        assert!(matches!(
            service.get_data_interpolated("DataView_Sample", &request, &token).await,
            Err(ServiceError::Validation(ValidationError::InvalidPageToken(_)))
        ));

        // A token issued for the edited view resumes it
        request.continuation_token = None;
        let fresh = service
            .get_data_interpolated("DataView_Sample", &request, &token)
            .await
            .unwrap();
        request.continuation_token = fresh.next_page_token.clone();
        let rest = service
            .get_data_interpolated("DataView_Sample", &request, &token)
            .await
            .unwrap();
        assert_eq!(rest.rows.len(), 2);
        assert!(rest.next_page_token.is_none());
    }

    #[tokio::test]
    async fn test_edit_invalidates_cache() {
        let (catalog, service) = service();
        service.create_or_update(sample_view()).await.unwrap();
        let token = CancellationToken::new();
        service
            .apply_edits("DataView_Sample", &[EditCommand::AddFieldSets], &token)
            .await
            .unwrap();

        service
            .get_data_interpolated("DataView_Sample", &hour_request(), &token)
            .await
            .unwrap();
        let reads = catalog.window_reads();
        service
            .get_data_interpolated("DataView_Sample", &hour_request(), &token)
            .await
            .unwrap();
        assert_eq!(catalog.window_reads(), reads);

        // Re-storing the same document still invalidates
        let current = service.get("DataView_Sample").unwrap();
        service.create_or_update((*current).clone()).await.unwrap();
        service
            .get_data_interpolated("DataView_Sample", &hour_request(), &token)
            .await
            .unwrap();
        assert!(catalog.window_reads() > reads);
    }

    #[tokio::test]
    async fn test_consolidation_matches_single_field() {
        let (_, service) = service();
        let token = CancellationToken::new();

        service.create_or_update(sample_view()).await.unwrap();
        service
            .apply_edits(
                "DataView_Sample",
                &[
                    EditCommand::AddFieldSets,
                    EditCommand::Consolidate {
                        query_id: "stream".into(),
                        target_key: "Temperature".into(),
                        merge_key: "AmbientTemperature".into(),
                    },
                ],
                &token,
            )
            .await
            .unwrap();
        let consolidated = service
            .get_data_interpolated("DataView_Sample", &hour_request(), &token)
            .await
            .unwrap();

        let mut direct = sample_view().with_name("direct");
        direct.id = "direct".into();
        direct.data_field_sets.push(
            DataFieldSet::new("stream")
                .with_field(DataField::member("Pressure"))
                .with_field(DataField::member("Temperature").with_key("AmbientTemperature")),
        );
        service.create_or_update(direct).await.unwrap();
        let defined = service
            .get_data_interpolated("direct", &hour_request(), &token)
            .await
            .unwrap();

        assert_eq!(consolidated.columns, defined.columns);
        assert_eq!(consolidated.rows, defined.rows);
    }

    #[tokio::test]
    async fn test_failed_edit_leaves_view_unchanged() {
        let (_, service) = service();
        let token = CancellationToken::new();
        service.create_or_update(sample_view()).await.unwrap();
        let before = service.get("DataView_Sample").unwrap();

        let result = service
            .apply_edits(
                "DataView_Sample",
                &[
                    EditCommand::AddFieldSets,
                    EditCommand::SetIncludeUom {
                        query_id: "stream".into(),
                        field: FieldLocator::key("Humidity"),
                        include_uom: true,
                    },
                ],
                &token,
            )
            .await;
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
        assert_eq!(service.get("DataView_Sample").unwrap(), before);
    }

    #[tokio::test]
    async fn test_summary_and_grouping_edits() {
        let (_, service) = service();
        let token = CancellationToken::new();
        service.create_or_update(sample_view()).await.unwrap();
        service
            .apply_edits(
                "DataView_Sample",
                &[
                    EditCommand::AddFieldSets,
                    EditCommand::AddSummaryField {
                        query_id: "stream".into(),
                        key: "Pressure".into(),
                        summary_direction: SummaryDirection::Forward,
                        summary_type: SummaryType::Mean,
                    },
                    EditCommand::AddGroupingField {
                        field: DataField::metadata(SourceKind::Id, "Tank"),
                    },
                ],
                &token,
            )
            .await
            .unwrap();

        let page = service
            .get_data_interpolated("DataView_Sample", &hour_request(), &token)
            .await
            .unwrap();
        assert_eq!(page.columns[0], "Tank");
        assert!(page.columns.contains(&"Pressure Mean".to_string()));
        // Two tanks, four slots each
        assert_eq!(page.total_rows, 8);
    }

    #[tokio::test]
    async fn test_missing_time_parameters() {
        let (_, service) = service();
        let token = CancellationToken::new();
        service.create_or_update(sample_view()).await.unwrap();

        let result = service
            .get_data_interpolated("DataView_Sample", &DataRequest::default(), &token)
            .await;
        assert!(matches!(
            result,
            Err(ServiceError::Validation(ValidationError::MissingParameter("startIndex")))
        ));

        let mut view = sample_view();
        view.default_start_index = Some(format_millis(END - HOUR));
        view.default_end_index = Some(format_millis(END));
        view.default_interval = Some("20m".into());
        service.create_or_update(view).await.unwrap();
        let page = service
            .get_data_interpolated("DataView_Sample", &DataRequest::default(), &token)
            .await
            .unwrap();
        assert_eq!(page.rows.len(), 4);
        assert_eq!(page.rows[0][0], Value::Timestamp(END - HOUR));
    }

    #[tokio::test]
    async fn test_cancelled_request() {
        let (_, service) = service();
        service.create_or_update(sample_view()).await.unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let result = service
            .get_data_interpolated("DataView_Sample", &hour_request(), &token)
            .await;
        assert!(matches!(result, Err(ServiceError::Cancelled)));
    }

    #[tokio::test]
    async fn test_delete_many_reports_failures() {
        let (_, service) = service();
        service.create_or_update(sample_view()).await.unwrap();
        let report = service
            .delete_many(&["DataView_Sample".to_string(), " ".to_string(), "gone".to_string()])
            .await;
        assert_eq!(report.attempted, 3);
        assert_eq!(report.failures.len(), 1);
        assert!(service.list(0, 10).is_empty());
    }
}

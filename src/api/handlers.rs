use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::{CancellationToken, DropGuard};

use super::format::{render, OutputFormat};
use crate::catalog::Item;
use crate::edit::EditCommand;
use crate::engine::CacheBehavior;
use crate::service::{DataRequest, DataViewService, ServiceError, ServiceStats};
use crate::view::{DataFieldSet, DataView};

/// Application state shared across handlers
pub struct AppState {
    pub service: Arc<DataViewService>,
    /// Upper bound on rows per data page
    pub page_size: usize,
}

/// Token cancelled when the handler future is dropped, e.g. on client
/// disconnect
fn request_token() -> (CancellationToken, DropGuard) {
    let token = CancellationToken::new();
    let guard = token.clone().drop_guard();
    (token, guard)
}

// ============================================================================
// Health Check
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn stats(State(state): State<Arc<AppState>>) -> Json<ServiceStats> {
    Json(state.service.stats())
}

// ============================================================================
// Data View Configuration
// ============================================================================

#[derive(Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub skip: usize,
    #[serde(default = "default_list_count")]
    pub count: usize,
}

fn default_list_count() -> usize {
    100
}

pub async fn list_views(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Json<Vec<DataView>> {
    let views = state
        .service
        .list(params.skip, params.count)
        .iter()
        .map(|view| (**view).clone())
        .collect();
    Json(views)
}

pub async fn create_view(
    State(state): State<Arc<AppState>>,
    Json(view): Json<DataView>,
) -> Result<Json<DataView>, ApiError> {
    let stored = state.service.create_or_update(view).await?;
    Ok(Json((*stored).clone()))
}

/// Create or replace the view at `id`. A body without an id takes the path's.
pub async fn put_view(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(mut view): Json<DataView>,
) -> Result<Json<DataView>, ApiError> {
    if view.id.is_empty() {
        view.id = id.clone();
    } else if view.id != id {
        return Err(ApiError::BadRequest(format!(
            "Body id '{}' does not match path id '{}'",
            view.id, id
        )));
    }
    let stored = state.service.create_or_update(view).await?;
    Ok(Json((*stored).clone()))
}

pub async fn get_view(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DataView>, ApiError> {
    let view = state.service.get(&id)?;
    Ok(Json((*view).clone()))
}

pub async fn delete_view(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let existed = state.service.delete(&id).await?;
    Ok(Json(serde_json::json!({ "deleted": id, "existed": existed })))
}

pub async fn apply_edits(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(commands): Json<Vec<EditCommand>>,
) -> Result<Json<DataView>, ApiError> {
    let (token, _guard) = request_token();
    let view = state.service.apply_edits(&id, &commands, &token).await?;
    Ok(Json((*view).clone()))
}

// ============================================================================
// Resolution
// ============================================================================

#[derive(Serialize)]
pub struct IneligibleItemResponse {
    #[serde(flatten)]
    pub item: Item,
    #[serde(rename = "Reason")]
    pub reason: String,
}

pub async fn data_items(
    State(state): State<Arc<AppState>>,
    Path((id, query_id)): Path<(String, String)>,
) -> Result<Json<Vec<Item>>, ApiError> {
    let (token, _guard) = request_token();
    let items = state
        .service
        .get_data_items(&id, &query_id, &token)
        .await?;
    Ok(Json(items.iter().map(|item| (**item).clone()).collect()))
}

pub async fn ineligible_data_items(
    State(state): State<Arc<AppState>>,
    Path((id, query_id)): Path<(String, String)>,
) -> Result<Json<Vec<IneligibleItemResponse>>, ApiError> {
    let (token, _guard) = request_token();
    let items = state
        .service
        .get_ineligible_data_items(&id, &query_id, &token)
        .await?
        .into_iter()
        .map(|ineligible| IneligibleItemResponse {
            item: (*ineligible.item).clone(),
            reason: ineligible.reason,
        })
        .collect();
    Ok(Json(items))
}

pub async fn available_field_sets(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<DataFieldSet>>, ApiError> {
    let (token, _guard) = request_token();
    let sets = state.service.get_available_field_sets(&id, &token).await?;
    Ok(Json(sets))
}

// ============================================================================
// Data
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataParams {
    pub start_index: Option<String>,
    pub end_index: Option<String>,
    pub interval: Option<String>,
    #[serde(default)]
    pub form: OutputFormat,
    #[serde(default)]
    pub cache: CacheBehavior,
    pub count: Option<usize>,
    pub continuation_token: Option<String>,
}

pub async fn data_interpolated(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<DataParams>,
) -> Result<Response, ApiError> {
    let count = params
        .count
        .unwrap_or(state.page_size)
        .min(state.page_size)
        .max(1);
    let request = DataRequest {
        start_index: params.start_index,
        end_index: params.end_index,
        interval: params.interval,
        cache: params.cache,
        count: Some(count),
        continuation_token: params.continuation_token,
    };

    let (token, _guard) = request_token();
    let page = state
        .service
        .get_data_interpolated(&id, &request, &token)
        .await?;
    Ok(render(params.form, page))
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Cancelled(String),
    Internal(String),
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        let message = e.to_string();
        match e {
            ServiceError::NotFound(_) => ApiError::NotFound(message),
            ServiceError::Validation(_) => ApiError::BadRequest(message),
            ServiceError::Cancelled => ApiError::Cancelled(message),
            ServiceError::Catalog(_) | ServiceError::Internal(_) => ApiError::Internal(message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Cancelled(msg) => (StatusCode::REQUEST_TIMEOUT, msg),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}

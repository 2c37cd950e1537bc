use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    apply_edits, available_field_sets, create_view, data_interpolated, data_items, delete_view,
    get_view, health_check, ineligible_data_items, list_views, put_view, stats, AppState,
};
use crate::catalog::demo::seed_sample_tanks;
use crate::catalog::InMemoryCatalog;
use crate::engine::EngineConfig;
use crate::service::DataViewService;

/// Span of sample data seeded in demo mode
const DEMO_RANGE_MS: i64 = 24 * 60 * 60 * 1000;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cache_max_entries: u64,
    pub cache_ttl_secs: u64,
    /// Rows per data page
    pub page_size: usize,
    pub max_slots: u64,
    /// Seed the sample tank streams at startup
    pub seed_demo: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cache_max_entries: 1000,
            cache_ttl_secs: 300,
            page_size: 1000,
            max_slots: 100_000,
            seed_demo: false,
        }
    }
}

impl ServerConfig {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            cache_max_entries: self.cache_max_entries,
            cache_ttl: Duration::from_secs(self.cache_ttl_secs),
            max_slots: self.max_slots,
        }
    }
}

/// Build the application router
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))
        .route("/stats", get(stats))
        // Configuration
        .route("/dataviews", get(list_views).post(create_view))
        .route(
            "/dataviews/:id",
            get(get_view).put(put_view).delete(delete_view),
        )
        .route("/dataviews/:id/edits", post(apply_edits))
        // Resolution
        .route(
            "/dataviews/:id/resolved/dataitems/:query_id",
            get(data_items),
        )
        .route(
            "/dataviews/:id/resolved/ineligibledataitems/:query_id",
            get(ineligible_data_items),
        )
        .route(
            "/dataviews/:id/resolved/availablefieldsets",
            get(available_field_sets),
        )
        // Data
        .route("/dataviews/:id/data/interpolated", get(data_interpolated))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the HTTP server
pub async fn run_server(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let catalog = Arc::new(InMemoryCatalog::new());

    if config.seed_demo {
        let end = chrono::Utc::now().timestamp_millis();
        let events = seed_sample_tanks(&catalog, end, DEMO_RANGE_MS, &mut rand::thread_rng())?;
        tracing::info!(
            items = catalog.item_count(),
            events,
            "Seeded sample tank streams"
        );
    }

    let service = Arc::new(DataViewService::new(catalog, config.engine_config()));
    let state = Arc::new(AppState {
        service,
        page_size: config.page_size,
    });

    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!("Starting Data View server on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Data View server stopped");
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C signal handler");

    tracing::info!("Shutdown signal received");
}

pub mod aggregates;
pub mod cache;
pub mod executor;
pub mod grid;
pub mod interpolate;
pub mod layout;
pub mod page;

pub use cache::{CacheBehavior, CacheKey, CacheStats, ResultCache};
pub use executor::{Evaluation, ItemSeries};
pub use grid::TimeGrid;
pub use layout::Layout;
pub use page::PageToken;

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::catalog::{CatalogError, Item, SeriesSource};
use crate::resolve::{resolve_view, ResolvedItemSet};
use crate::view::{DataView, ValidationError};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub cache_max_entries: u64,
    pub cache_ttl: Duration,
    /// Upper bound on time slots per evaluation
    pub max_slots: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_max_entries: 1000,
            cache_ttl: Duration::from_secs(300),
            max_slots: 100_000,
        }
    }
}

/// Resolution and evaluation over one series source, with a result cache
pub struct Engine {
    source: Arc<dyn SeriesSource>,
    cache: ResultCache,
    config: EngineConfig,
}

impl Engine {
    pub fn new(source: Arc<dyn SeriesSource>, config: EngineConfig) -> Self {
        Self {
            cache: ResultCache::with_config(config.cache_max_entries, config.cache_ttl),
            source,
            config,
        }
    }

    pub fn source(&self) -> &Arc<dyn SeriesSource> {
        &self.source
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn grid(&self, start: i64, end: i64, interval: i64) -> Result<TimeGrid, ValidationError> {
        TimeGrid::new(start, end, interval, self.config.max_slots)
    }

    /// Current catalog snapshot
    pub async fn items(&self, token: &CancellationToken) -> Result<Vec<Arc<Item>>, EvaluateError> {
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(EvaluateError::Cancelled),
            items = self.source.list_items() => Ok(items?),
        }
    }

    pub async fn resolve(
        &self,
        view: &DataView,
        token: &CancellationToken,
    ) -> Result<Vec<ResolvedItemSet>, EvaluateError> {
        let items = self.items(token).await?;
        Ok(resolve_view(view, &items)?)
    }

    /// Evaluate `view` on `grid`. Only completed evaluations are cached.
    pub async fn evaluate(
        &self,
        view: &DataView,
        grid: TimeGrid,
        behavior: CacheBehavior,
        token: &CancellationToken,
    ) -> Result<Arc<Evaluation>, EvaluateError> {
        let key = CacheKey::new(view, &grid);
        if behavior == CacheBehavior::UseCache {
            if let Some(cached) = self.cache.get(&key) {
                return Ok(cached);
            }
        }

        let started = Instant::now();
        let resolved = self.resolve(view, token).await?;
        let layout = Layout::build(view, &resolved);
        let evaluation = Arc::new(executor::execute(self.source.as_ref(), layout, grid, token).await?);

        tracing::info!(
            view_id = %view.id,
            slots = evaluation.grid.len(),
            items = evaluation.layout.bound.len(),
            rows = evaluation.row_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Evaluated data view"
        );

        self.cache.put(key, Arc::clone(&evaluation));
        Ok(evaluation)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EvaluateError {
    #[error("Evaluation was cancelled")]
    Cancelled,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("Evaluation worker failed: {0}")]
    Worker(String),
}

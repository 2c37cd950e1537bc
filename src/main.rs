//! Data View Server
//!
//! Run with: cargo run
//!
//! Environment variables:
//! - DATAVIEW_HOST: Bind address (default: 0.0.0.0)
//! - DATAVIEW_PORT: Port number (default: 8080)
//! - DATAVIEW_CACHE_MAX_ENTRIES: Cached evaluations (default: 1000)
//! - DATAVIEW_CACHE_TTL_SECS: Cache entry lifetime (default: 300)
//! - DATAVIEW_PAGE_SIZE: Rows per data page (default: 1000)
//! - DATAVIEW_MAX_SLOTS: Time slots allowed per request (default: 100000)
//! - DATAVIEW_SEED_DEMO: Seed the sample tank streams (default: false)
//! - RUST_LOG: Log level (default: info)

use dataview::api::{run_server, ServerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dataview=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let defaults = ServerConfig::default();
    let config = ServerConfig {
        host: std::env::var("DATAVIEW_HOST").unwrap_or(defaults.host),
        port: env_or("DATAVIEW_PORT", defaults.port),
        cache_max_entries: env_or("DATAVIEW_CACHE_MAX_ENTRIES", defaults.cache_max_entries),
        cache_ttl_secs: env_or("DATAVIEW_CACHE_TTL_SECS", defaults.cache_ttl_secs),
        page_size: env_or("DATAVIEW_PAGE_SIZE", defaults.page_size),
        max_slots: env_or("DATAVIEW_MAX_SLOTS", defaults.max_slots),
        seed_demo: env_or("DATAVIEW_SEED_DEMO", defaults.seed_demo),
    };

    tracing::info!("Data View configuration:");
    tracing::info!("  Host: {}:{}", config.host, config.port);
    tracing::info!(
        "  Result cache: {} entries, {} second TTL",
        config.cache_max_entries,
        config.cache_ttl_secs
    );
    tracing::info!("  Page size: {} rows", config.page_size);
    tracing::info!("  Max slots per request: {}", config.max_slots);
    if config.seed_demo {
        tracing::info!("  Demo data: ENABLED (sample tank streams)");
    }

    println!(
        "\n Data View Server\n Interpolated time-series views over matched streams\n Version: {}\n",
        env!("CARGO_PKG_VERSION")
    );

    run_server(config).await
}

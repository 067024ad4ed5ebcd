//! arf-finder library interface
//!
//! Exposes the engine, adapters and router for the binary and for
//! integration tests.

pub mod api;
pub mod auth;
pub mod engine;
pub mod error;
pub mod reports;
pub mod sfmc;
pub mod source;

pub use crate::error::{ApiError, ApiResult};

use crate::auth::TokenCache;
use crate::engine::{Aggregator, ReportCache};
use crate::reports::{CloudPageReport, DataExtensionReport, EmailReport};
use crate::source::AssetSource;
use axum::Router;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Platform data source used by every report
    pub source: Arc<dyn AssetSource>,
    /// OAuth session for the login/logout/callback routes
    pub tokens: Arc<TokenCache>,
    pub data_extensions: Aggregator<DataExtensionReport>,
    pub cloud_pages: Aggregator<CloudPageReport>,
    pub emails: Aggregator<EmailReport>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Directory holding `index.html` and the `/static` assets
    pub static_dir: Option<PathBuf>,
}

impl AppState {
    pub fn new(
        source: Arc<dyn AssetSource>,
        tokens: Arc<TokenCache>,
        cache_ttl: Duration,
        deadline: Duration,
        static_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            source,
            tokens,
            data_extensions: Aggregator::new(Arc::new(ReportCache::new(cache_ttl)), deadline),
            cloud_pages: Aggregator::new(Arc::new(ReportCache::new(cache_ttl)), deadline),
            emails: Aggregator::new(Arc::new(ReportCache::new(cache_ttl)), deadline),
            startup_time: Utc::now(),
            static_dir,
        }
    }

    /// Start one expiry sweeper per report cache
    pub fn spawn_cache_sweepers(
        &self,
        every: Duration,
        shutdown: &CancellationToken,
    ) -> Vec<JoinHandle<()>> {
        vec![
            self.data_extensions
                .cache()
                .clone()
                .spawn_sweeper(every, shutdown.clone()),
            self.cloud_pages
                .cache()
                .clone()
                .spawn_sweeper(every, shutdown.clone()),
            self.emails
                .cache()
                .clone()
                .spawn_sweeper(every, shutdown.clone()),
        ]
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let static_dir = state.static_dir.clone();

    let mut router = Router::new()
        .merge(api::asset_routes())
        .merge(api::auth_routes())
        .merge(api::health_routes());

    if let Some(dir) = static_dir {
        router = router.nest_service("/static", ServeDir::new(dir));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

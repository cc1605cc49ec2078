//! HTTP API
//!
//! # Endpoints
//!
//! - `GET /historic` - Historical query with granularity and statistics
//! - `POST /ingest` - Ingest one reading
//! - `GET /daily` - Read one day's summary row
//! - `POST /daily-summary` - Recompute one day's means
//! - `GET /health` - Health check

pub mod handlers;
pub mod types;

use crate::backend::TimeSeriesBackend;
use crate::ingestion::Ingestor;
use crate::query::{HistoricEngine, QueryMode};
use crate::services::DailySummaryJob;
use crate::summary::SummaryStore;
use axum::{
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Shared application state
pub struct AppState {
    /// Historical query engine
    pub engine: HistoricEngine,
    /// Reading ingestion
    pub ingestor: Ingestor,
    /// Daily summary rows
    pub summaries: Arc<dyn SummaryStore>,
    /// Daily recompute
    pub daily_job: DailySummaryJob,
}

impl AppState {
    /// Wire every component over one backend and one summary store
    pub fn new(
        backend: Arc<dyn TimeSeriesBackend>,
        summaries: Arc<dyn SummaryStore>,
        mode: QueryMode,
    ) -> Self {
        let engine = HistoricEngine::new(backend.clone(), mode);
        Self {
            ingestor: Ingestor::new(backend, summaries.clone()),
            daily_job: DailySummaryJob::new(engine.clone(), summaries.clone()),
            engine,
            summaries,
        }
    }
}

/// Build CORS layer from configuration
pub fn build_cors_layer(cors_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);
    if cors_origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|o| o.parse().ok()).collect();
        layer.allow_origin(origins)
    }
}

/// Build the application router
pub fn build_router(state: Arc<AppState>, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/historic", get(handlers::historic))
        .route("/ingest", post(handlers::ingest))
        .route("/daily", get(handlers::daily))
        .route("/daily-summary", post(handlers::daily_summary))
        .with_state(state)
        .layer(build_cors_layer(cors_origins))
}

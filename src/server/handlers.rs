//! HTTP handlers
//!
//! Every failure is logged with the request parameters before it is turned
//! into a JSON error. Request bodies are never logged.

use super::types::*;
use super::AppState;
use crate::error::{Error, ValidationError};
use crate::query::HistoricQuery;
use crate::services::previous_day;
use crate::types::{parse_date_key, DailySummary, StatSample};
use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use chrono::{NaiveDate, Utc};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Log a failed request and convert it for the client
fn reject(
    route: &'static str,
    context: &str,
    err: impl Into<ApiError> + std::fmt::Display,
) -> ApiError {
    let message = err.to_string();
    let api: ApiError = err.into();
    if api.is_server_error() {
        error!(route, context, status = api.status.as_u16(), error = %message, "request failed");
    } else {
        warn!(route, context, status = api.status.as_u16(), error = %message, "request rejected");
    }
    api
}

/// Unwrap query parameters, turning a decode failure into a JSON 400
fn query_params<T>(
    route: &'static str,
    params: Result<Query<T>, QueryRejection>,
) -> Result<T, ApiError> {
    params.map(|Query(p)| p).map_err(|rejection| {
        reject(
            route,
            "",
            ValidationError::InvalidQueryString(rejection.body_text()),
        )
    })
}

// =============================================================================
// Health
// =============================================================================

/// Health check endpoint
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        mode: state.engine.mode().as_str(),
        backend: state.engine.backend_id().to_string(),
    })
}

// =============================================================================
// Historic Query
// =============================================================================

/// `GET /historic`
pub async fn historic(
    State(state): State<Arc<AppState>>,
    params: Result<Query<HistoricParams>, QueryRejection>,
) -> Result<Json<Vec<StatSample>>, ApiError> {
    let params = query_params("historic", params)?;
    let context = format!("{:?}", params);

    let query = HistoricQuery::parse(
        params.from.as_deref(),
        params.to.as_deref(),
        params.granularity.as_deref(),
        params.stats.as_deref(),
    )
    .map_err(|e| reject("historic", &context, e))?;

    let rows = state
        .engine
        .run(&query)
        .await
        .map_err(|e| reject("historic", &context, e))?;

    debug!(
        granularity = %query.granularity,
        stats = %query.stats,
        rows = rows.len(),
        "historic query served"
    );
    Ok(Json(rows))
}

// =============================================================================
// Ingestion
// =============================================================================

/// `POST /ingest`
pub async fn ingest(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<IngestResponse>, ApiError> {
    let payload: Value = serde_json::from_slice(&body).map_err(|_| {
        reject(
            "ingest",
            "",
            ValidationError::InvalidReading("body is not valid JSON".to_string()),
        )
    })?;

    let outcome = state
        .ingestor
        .ingest_json(&payload)
        .await
        .map_err(|e| reject("ingest", "", e))?;

    Ok(Json(IngestResponse {
        status: "ingested",
        date: outcome.date,
        new_minimum: outcome.new_minimum,
    }))
}

// =============================================================================
// Daily Summary
// =============================================================================

fn date_param(raw: &str) -> Result<NaiveDate, ValidationError> {
    parse_date_key(raw.trim()).ok_or_else(|| ValidationError::InvalidDateKey(raw.to_string()))
}

/// `GET /daily`
pub async fn daily(
    State(state): State<Arc<AppState>>,
    params: Result<Query<DailyParams>, QueryRejection>,
) -> Result<Json<DailySummary>, ApiError> {
    let params = query_params("daily", params)?;
    let context = format!("{:?}", params);

    let raw = params.date.as_deref().filter(|d| !d.is_empty()).ok_or_else(|| {
        reject(
            "daily",
            &context,
            ValidationError::MissingParameters {
                required: vec!["date"],
            },
        )
    })?;
    let date = date_param(raw).map_err(|e| reject("daily", &context, e))?;

    let row = state
        .summaries
        .get(date)
        .await
        .map_err(|e| reject("daily", &context, e))?;

    row.map(Json)
        .ok_or_else(|| reject("daily", &context, Error::NoData { date }))
}

/// `POST /daily-summary`
///
/// The body is optional. A missing, empty or non-JSON body, or one without a
/// `date`, recomputes the previous UTC day.
pub async fn daily_summary(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<DailySummaryResponse>, ApiError> {
    let requested = serde_json::from_slice::<Value>(&body)
        .ok()
        .and_then(|v| v.get("date").and_then(Value::as_str).map(str::to_owned))
        .filter(|d| !d.is_empty());

    let date = match requested.as_deref() {
        Some(raw) => date_param(raw).map_err(|e| reject("daily-summary", raw, e))?,
        None => previous_day(Utc::now()),
    };
    let context = date.to_string();

    let averages = state
        .daily_job
        .run(date)
        .await
        .map_err(|e| reject("daily-summary", &context, e))?;

    Ok(Json(DailySummaryResponse {
        message: "Daily summary updated successfully",
        date,
        averages,
    }))
}

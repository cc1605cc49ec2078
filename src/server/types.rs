//! Request and response types for the HTTP API
//!
//! Error bodies are always `{error: string, ...context}`; [`ApiError`] owns
//! the mapping from crate errors to status codes and context fields.

use crate::error::{BackendError, Error, StoreError, ValidationError};
use crate::query::{ALLOWED_GRANULARITIES, ALLOWED_STATS};
use crate::services::DailyAverages;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const HISTORIC_EXAMPLE: &str =
    "/historic?from=2025-09-01T00:00:00Z&to=2025-09-02T00:00:00Z&granularity=1h&stats=mean,min,max";
const DAILY_EXAMPLE: &str = "/daily?date=2025-01-15";

// =============================================================================
// Query Parameters
// =============================================================================

/// `GET /historic` parameters, validated by the engine
#[derive(Debug, Default, Deserialize)]
pub struct HistoricParams {
    /// Inclusive start (RFC 3339)
    pub from: Option<String>,
    /// Exclusive end (RFC 3339)
    pub to: Option<String>,
    /// `raw|1m|5m|15m|1h|1d`, default `raw`
    pub granularity: Option<String>,
    /// Comma list of `mean,min,max`, default `mean`
    pub stats: Option<String>,
}

/// `GET /daily` parameters
#[derive(Debug, Default, Deserialize)]
pub struct DailyParams {
    /// `YYYY-MM-DD`; `fecha` is accepted for older clients
    #[serde(alias = "fecha")]
    pub date: Option<String>,
}

// =============================================================================
// Responses
// =============================================================================

/// `POST /ingest` response
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    /// Always `ingested`
    pub status: &'static str,
    /// Summary row the reading was applied to
    pub date: NaiveDate,
    /// Whether the reading became the day's minimum temperature
    #[serde(rename = "newMinimum")]
    pub new_minimum: bool,
}

/// `POST /daily-summary` response
#[derive(Debug, Serialize)]
pub struct DailySummaryResponse {
    /// Human readable outcome
    pub message: &'static str,
    /// Recomputed day
    pub date: NaiveDate,
    /// Means written to the summary row
    pub averages: DailyAverages,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `healthy`
    pub status: &'static str,
    /// Crate version
    pub version: &'static str,
    /// Query mode (`pushdown` or `local`)
    pub mode: &'static str,
    /// Time-series backend identifier
    pub backend: String,
}

// =============================================================================
// Errors
// =============================================================================

/// Client-facing error: a status code and a JSON body
#[derive(Debug)]
pub struct ApiError {
    /// HTTP status
    pub status: StatusCode,
    /// `{error, ...context}` body
    pub body: Value,
}

impl ApiError {
    fn new(status: StatusCode, body: Value) -> Self {
        Self { status, body }
    }

    /// Whether the failure is the server's (5xx)
    pub fn is_server_error(&self) -> bool {
        self.status.is_server_error()
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        let body = match err {
            ValidationError::MissingParameters { required } => {
                let example = if required.contains(&"from") {
                    HISTORIC_EXAMPLE
                } else {
                    DAILY_EXAMPLE
                };
                json!({
                    "error": "Missing parameters",
                    "required": required,
                    "example": example,
                })
            },
            ValidationError::InvalidGranularity { token } => json!({
                "error": "Invalid granularity",
                "provided": token,
                "allowed": ALLOWED_GRANULARITIES,
            }),
            ValidationError::InvalidDate { value, detail } => json!({
                "error": "Invalid date(s)",
                "provided": value,
                "detail": detail,
            }),
            ValidationError::InvalidRange { .. } => json!({
                "error": "Invalid range",
                "detail": "`from` must be strictly earlier than `to`",
            }),
            ValidationError::InvalidStat { token } => json!({
                "error": "Invalid stats parameter",
                "invalid": token,
                "allowed": ALLOWED_STATS,
            }),
            ValidationError::InvalidDateKey(provided) => json!({
                "error": "Invalid date format",
                "expected": "YYYY-MM-DD",
                "provided": provided,
            }),
            ValidationError::InvalidQueryString(detail) => json!({
                "error": "Invalid query string",
                "detail": detail,
            }),
            ValidationError::InvalidReading(detail) => json!({
                "error": "Invalid payload",
                "detail": detail,
            }),
        };
        Self::new(StatusCode::BAD_REQUEST, body)
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::Validation(e) => e.into(),
            Error::Configuration { missing } => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({
                    "error": "Missing configuration",
                    "missing": missing,
                }),
            ),
            Error::Backend(BackendError::Status { status, body }) => Self::new(
                StatusCode::BAD_GATEWAY,
                json!({
                    "error": "Backend query failed",
                    "status": status,
                    "detail": body,
                }),
            ),
            Error::Backend(BackendError::Transport(detail)) => Self::new(
                StatusCode::BAD_GATEWAY,
                json!({
                    "error": "Backend unavailable",
                    "detail": detail,
                }),
            ),
            Error::Backend(BackendError::Unsupported(detail)) => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({
                    "error": "Unsupported query",
                    "detail": detail,
                }),
            ),
            Error::Store(StoreError::Status { status, body }) => Self::new(
                StatusCode::BAD_GATEWAY,
                json!({
                    "error": "Summary store error",
                    "status": status,
                    "detail": body,
                }),
            ),
            Error::Store(e) => Self::new(
                StatusCode::BAD_GATEWAY,
                json!({
                    "error": "Summary store error",
                    "detail": e.to_string(),
                }),
            ),
            Error::NoData { date } => Self::new(
                StatusCode::NOT_FOUND,
                json!({
                    "error": "No data found for the specified date",
                    "date": date,
                }),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_lists_missing_keys() {
        let err = ApiError::from(Error::Configuration {
            missing: vec!["INFLUX_URL", "INFLUX_TOKEN"],
        });
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.body["missing"], json!(["INFLUX_URL", "INFLUX_TOKEN"]));
        assert!(err.is_server_error());
    }

    #[test]
    fn test_backend_status_is_bad_gateway() {
        let err = ApiError::from(Error::from(BackendError::Status {
            status: 401,
            body: "unauthorized access".into(),
        }));
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);
        assert_eq!(err.body["status"], 401);
        assert_eq!(err.body["detail"], "unauthorized access");
    }

    #[test]
    fn test_missing_parameters_example_follows_route() {
        let historic = ApiError::from(ValidationError::MissingParameters {
            required: vec!["from", "to"],
        });
        assert_eq!(historic.body["example"], HISTORIC_EXAMPLE);

        let daily = ApiError::from(ValidationError::MissingParameters {
            required: vec!["date"],
        });
        assert_eq!(daily.status, StatusCode::BAD_REQUEST);
        assert_eq!(daily.body["example"], DAILY_EXAMPLE);
    }

    #[test]
    fn test_query_string_error_is_bad_request() {
        let err = ApiError::from(ValidationError::InvalidQueryString(
            "duplicate field `from`".into(),
        ));
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.body["error"], "Invalid query string");
        assert_eq!(err.body["detail"], "duplicate field `from`");
    }

    #[test]
    fn test_no_data_is_not_found() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        let err = ApiError::from(Error::NoData { date });
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.body["date"], "2025-01-15");
    }
}

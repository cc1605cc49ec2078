//! Error types for the gateway

use thiserror::Error;

/// Main error type for the gateway
#[derive(Error, Debug)]
pub enum Error {
    /// Client input outside the request contract
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Required backend settings are absent
    ///
    /// Carries the names of the missing settings, never their values.
    #[error("Missing configuration: {}", .missing.join(", "))]
    Configuration {
        /// Environment names of the absent settings
        missing: Vec<&'static str>,
    },

    /// Time-series backend failure
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Summary store failure
    #[error("Summary store error: {0}")]
    Store(#[from] StoreError),

    /// No readings or summary row exist for a date
    #[error("No data found for {date}")]
    NoData {
        /// The requested UTC date
        date: chrono::NaiveDate,
    },
}

/// Request validation errors
///
/// Each variant maps to an HTTP 400 and is safe to expose in full.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// One or more required query parameters are absent
    #[error("Missing parameters: {}", .required.join(", "))]
    MissingParameters {
        /// Names of the required parameters
        required: Vec<&'static str>,
    },

    /// Granularity token outside the fixed table
    #[error("Invalid granularity: {token}")]
    InvalidGranularity {
        /// The rejected token
        token: String,
    },

    /// A bound could not be parsed as an instant
    #[error("Invalid date {value:?}: {detail}")]
    InvalidDate {
        /// The rejected input
        value: String,
        /// Parser message
        detail: String,
    },

    /// `from` is not strictly earlier than `to`
    #[error("Invalid range: `from` must be strictly earlier than `to`")]
    InvalidRange {
        /// Lower bound as supplied
        from: String,
        /// Upper bound as supplied
        to: String,
    },

    /// Statistic token outside `{mean, min, max}`
    #[error("Invalid stat: {token}")]
    InvalidStat {
        /// The first rejected token
        token: String,
    },

    /// Date key not in `YYYY-MM-DD` form
    #[error("Invalid date key {0:?}, expected YYYY-MM-DD")]
    InvalidDateKey(String),

    /// Query string could not be decoded (for example a repeated key)
    #[error("Invalid query string: {0}")]
    InvalidQueryString(String),

    /// Ingest payload is missing a value or carries a non-finite number
    #[error("Invalid reading: {0}")]
    InvalidReading(String),
}

/// Time-series backend errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Backend answered with a non-success status
    #[error("Backend returned status {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Bounded excerpt of the response body
        body: String,
    },

    /// The request never produced a response
    #[error("Transport failure: {0}")]
    Transport(String),

    /// The backend cannot evaluate this kind of plan
    #[error("Unsupported plan: {0}")]
    Unsupported(String),
}

/// Summary store errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Store answered with a non-success status
    #[error("Store returned status {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Bounded excerpt of the response body
        body: String,
    },

    /// The request never produced a response
    #[error("Transport failure: {0}")]
    Transport(String),

    /// Response payload did not match the row layout
    #[error("Malformed row: {0}")]
    Malformed(String),
}

/// Result type for gateway operations
pub type Result<T> = std::result::Result<T, Error>;

/// Maximum number of characters of a remote error body kept in errors
pub const BODY_EXCERPT_LIMIT: usize = 512;

/// Truncate a remote response body to [`BODY_EXCERPT_LIMIT`] characters
pub fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(BODY_EXCERPT_LIMIT) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

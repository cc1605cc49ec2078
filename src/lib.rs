//! Clima Gateway - sensor telemetry gateway over a time-series store
//!
//! This library provides:
//! - A historical query engine with bucketed mean/min/max statistics,
//!   pushed down to the backend or computed locally
//! - Annotated CSV parsing with variable column layouts
//! - Single-reading ingestion into a daily summary table and the time-series
//!   store
//! - A nightly recompute of each day's means

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod types;

/// Configuration management with TOML support
pub mod config;

/// Historical query engine: validation, planning, parsing and local
/// aggregation
pub mod query;

/// Time-series backends (InfluxDB v2 and in-memory)
pub mod backend;

/// Daily summary stores (PostgREST and in-memory)
pub mod summary;

/// Single-reading ingestion
pub mod ingestion;

/// Background services (daily summary recompute and scheduler)
pub mod services;

/// HTTP API: router, handlers and error mapping
pub mod server;

/// URL helpers for the HTTP clients
pub mod util;

// Re-export main types
pub use error::{Error, Result};
pub use query::{HistoricEngine, HistoricQuery, QueryMode};
pub use types::{DailySummary, Sample, StatSample};

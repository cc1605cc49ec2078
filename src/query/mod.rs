//! Historical query & aggregation engine
//!
//! Turns a client-requested window, granularity and statistic selection into
//! either a pushed-down aggregation plan or a local fallback aggregation, and
//! parses the backend's tabular answer back into typed samples.
//!
//! # Architecture
//!
//! ```text
//! from / to / granularity / stats
//!      │
//!      ▼
//! ┌─────────────┐
//! │  Validate   │  resolve_granularity, validate_range, parse_stats
//! └─────────────┘
//!      │
//!      ▼
//! ┌─────────────┐
//! │    Plan     │  RawPlan | AggregatePlan (one pass per statistic)
//! └─────────────┘
//!      │
//!      ├──────────── pushdown ──────────┐
//!      ▼                                ▼
//! ┌─────────────┐                ┌─────────────┐
//! │ Fetch raw   │                │  Execute    │  backend renders the plan
//! └─────────────┘                └─────────────┘
//!      │                                │
//!      ▼                                ▼
//! ┌─────────────┐                ┌─────────────┐
//! │ Bucketize   │  local         │   Parse     │  annotated CSV → samples
//! └─────────────┘                └─────────────┘
//! ```

pub mod bucket;
pub mod engine;
pub mod granularity;
pub mod plan;
pub mod range;
pub mod stats;
pub mod tabular;

// Re-export main types
pub use bucket::{aggregate_mean, aggregate_stats, floor_to_bucket};
pub use engine::{HistoricEngine, HistoricQuery, QueryMode};
pub use granularity::{
    resolve_granularity, BucketSpec, BucketUnit, Granularity, ALLOWED_GRANULARITIES,
};
pub use plan::{AggregatePlan, QueryPlan, RawPlan, WindowPass};
pub use range::{parse_instant, validate_range, TimeWindow};
pub use stats::{parse_stats, StatSet, Statistic, ALLOWED_STATS, DEFAULT_STATS};
pub use tabular::{parse_tabular, render_tabular, TabularSchema};

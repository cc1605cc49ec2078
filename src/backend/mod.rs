//! Time-series backends
//!
//! A backend accepts [`QueryPlan`]s and answers with tabular text, and accepts
//! single-point writes. Rendering a plan into a query language happens behind
//! this trait, never in the engine.

pub mod flux;
pub mod influx;
pub mod line;
pub mod memory;

pub use influx::InfluxBackend;
pub use memory::MemoryBackend;

use crate::error::Result;
use crate::query::{QueryPlan, TabularSchema};
use crate::types::Sample;
use async_trait::async_trait;

/// Time-series store the engine queries and the ingestor writes to
#[async_trait]
pub trait TimeSeriesBackend: Send + Sync + 'static {
    /// Unique identifier for this backend
    fn backend_id(&self) -> &str;

    /// Column names used in this backend's tabular answers
    fn schema(&self) -> TabularSchema;

    /// Evaluate a plan and return the raw tabular answer
    ///
    /// Exactly one round trip, no retries.
    async fn execute(&self, plan: &QueryPlan) -> Result<String>;

    /// Write one reading
    async fn write_sample(&self, sample: &Sample) -> Result<()>;
}

//! Daily summary store
//!
//! One row per UTC date with the day's mean temperature, mean humidity and
//! minimum temperature. Ingestion keeps the row provisional; the nightly
//! recompute overwrites the means with values from the time-series store.

pub mod memory;
pub mod postgrest;

pub use memory::MemorySummaryStore;
pub use postgrest::PostgrestStore;

use crate::error::Result;
use crate::types::DailySummary;
use async_trait::async_trait;
use chrono::NaiveDate;

/// Relational store holding [`DailySummary`] rows keyed by date
#[async_trait]
pub trait SummaryStore: Send + Sync + 'static {
    /// Unique identifier for this store
    fn store_id(&self) -> &str;

    /// Insert or overwrite the means of the row for `date`
    ///
    /// The minimum temperature of an existing row is left untouched.
    async fn upsert_means(&self, date: NaiveDate, temperature: f64, humidity: f64) -> Result<()>;

    /// Set the minimum temperature if `value` is lower or none is stored
    ///
    /// Returns whether the row changed. The comparison happens inside the
    /// store, so concurrent ingests cannot lose a lower value.
    async fn lower_min_temperature(&self, date: NaiveDate, value: f64) -> Result<bool>;

    /// Fetch the row for `date`
    async fn get(&self, date: NaiveDate) -> Result<Option<DailySummary>>;
}

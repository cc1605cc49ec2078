//! In-memory backend
//!
//! Holds samples in a vector and answers plans with the same annotated CSV
//! an InfluxDB instance would send. Used for local development without a
//! live backend and as the fake in tests.

use super::TimeSeriesBackend;
use crate::error::{BackendError, Result};
use crate::query::{aggregate_stats, render_tabular, QueryPlan, TabularSchema};
use crate::types::{Sample, StatSample};
use async_trait::async_trait;
use parking_lot::RwLock;

/// Vector-backed time-series store
#[derive(Default)]
pub struct MemoryBackend {
    samples: RwLock<Vec<Sample>>,
    pushdown: bool,
}

impl MemoryBackend {
    /// Empty store that only answers raw plans
    pub fn new() -> Self {
        Self::default()
    }

    /// Also evaluate aggregate plans, like a backend with pushdown support
    pub fn with_pushdown(mut self, enabled: bool) -> Self {
        self.pushdown = enabled;
        self
    }

    /// Store seeded with `samples`
    pub fn with_samples(samples: impl IntoIterator<Item = Sample>) -> Self {
        let store = Self::new();
        store.samples.write().extend(samples);
        store
    }

    /// Add one sample
    pub fn insert(&self, sample: Sample) {
        self.samples.write().push(sample);
    }

    /// Number of stored samples
    pub fn len(&self) -> usize {
        self.samples.read().len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.samples.read().is_empty()
    }

    /// Samples inside the plan window, ascending by time
    fn window_samples(&self, plan: &QueryPlan) -> Vec<Sample> {
        let window = plan.window();
        let mut rows: Vec<Sample> = self
            .samples
            .read()
            .iter()
            .filter(|s| window.contains(&s.ts))
            .copied()
            .collect();
        rows.sort_by_key(|s| s.ts);
        rows
    }
}

#[async_trait]
impl TimeSeriesBackend for MemoryBackend {
    fn backend_id(&self) -> &str {
        "memory"
    }

    fn schema(&self) -> TabularSchema {
        TabularSchema::default()
    }

    async fn execute(&self, plan: &QueryPlan) -> Result<String> {
        let samples = self.window_samples(plan);
        let rows: Vec<StatSample> = match plan {
            QueryPlan::Raw(_) => samples.into_iter().map(StatSample::from).collect(),
            QueryPlan::Aggregate(agg) if self.pushdown => {
                // Always label: a pushed-down plan pivots on (_time, _stat)
                let single = agg.stats.iter().next();
                aggregate_stats(&samples, agg.every, &agg.stats)
                    .into_iter()
                    .map(|row| StatSample {
                        stat: row.stat.or(single),
                        ..row
                    })
                    .collect()
            },
            QueryPlan::Aggregate(_) => {
                return Err(BackendError::Unsupported(
                    "memory backend evaluates raw plans only".to_string(),
                )
                .into())
            },
        };
        Ok(render_tabular(&rows, &self.schema()))
    }

    async fn write_sample(&self, sample: &Sample) -> Result<()> {
        self.insert(*sample);
        Ok(())
    }
}

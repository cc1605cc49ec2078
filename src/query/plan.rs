//! Backend-agnostic query plans
//!
//! A plan describes *what* to fetch; backends render it into their own query
//! language at the executor boundary. Nothing in a plan comes from raw request
//! strings: windows, buckets and statistics are already validated values.
//!
//! # Multi-statistic aggregation
//!
//! Time-series backends evaluate one aggregate function per windowing pass, so
//! `{mean, min, max}` is planned as three independent passes over the same
//! filtered source. Each pass tags its rows with the statistic label, the
//! passes are unioned, and rows are pivoted to one row per
//! `(timestamp, statistic)` with both fields as columns.

use super::granularity::{BucketSpec, Granularity};
use super::range::TimeWindow;
use super::stats::{StatSet, Statistic};

/// Unaggregated series over a window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPlan {
    /// Query window
    pub window: TimeWindow,
}

/// One windowed-aggregation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPass {
    /// Window width
    pub every: BucketSpec,
    /// Aggregate function evaluated per window, also the row label
    pub function: Statistic,
}

/// Bucketed aggregation over a window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatePlan {
    /// Query window
    pub window: TimeWindow,
    /// Window width
    pub every: BucketSpec,
    /// Statistics to compute, one pass each
    pub stats: StatSet,
}

impl AggregatePlan {
    /// One pass per requested statistic, in label order
    pub fn passes(&self) -> Vec<WindowPass> {
        self.stats
            .iter()
            .map(|stat| WindowPass {
                every: self.every,
                function: stat,
            })
            .collect()
    }
}

/// Plan handed to a time-series backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryPlan {
    /// Unaggregated rows
    Raw(RawPlan),
    /// Bucketed statistics
    Aggregate(AggregatePlan),
}

impl QueryPlan {
    /// Compose a plan from validated request parts
    ///
    /// `stats` is ignored for [`Granularity::Raw`].
    pub fn build(window: TimeWindow, granularity: Granularity, stats: &StatSet) -> Self {
        match granularity {
            Granularity::Raw => QueryPlan::Raw(RawPlan { window }),
            Granularity::Bucketed(every) => QueryPlan::Aggregate(AggregatePlan {
                window,
                every,
                stats: stats.clone(),
            }),
        }
    }

    /// Query window
    pub fn window(&self) -> &TimeWindow {
        match self {
            QueryPlan::Raw(p) => &p.window,
            QueryPlan::Aggregate(p) => &p.window,
        }
    }

    /// Whether callers must keep the statistic label on parsed rows
    ///
    /// True only for aggregate plans with more than one statistic, so raw and
    /// single-statistic responses share the same shape.
    pub fn labels_rows(&self) -> bool {
        match self {
            QueryPlan::Raw(_) => false,
            QueryPlan::Aggregate(p) => p.stats.is_multi(),
        }
    }

    /// Short kind label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            QueryPlan::Raw(_) => "raw",
            QueryPlan::Aggregate(_) => "aggregate",
        }
    }
}

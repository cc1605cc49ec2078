//! Historical query execution
//!
//! One engine serves both deployment shapes: `pushdown` hands the full plan to
//! the backend, `local` fetches raw rows and buckets them in process. The mode
//! is fixed at construction.

use super::bucket::aggregate_stats;
use super::granularity::{resolve_granularity, BucketSpec, Granularity};
use super::plan::{AggregatePlan, QueryPlan, RawPlan};
use super::range::{validate_range, TimeWindow};
use super::stats::{parse_stats, StatSet};
use super::tabular::parse_tabular;
use crate::backend::TimeSeriesBackend;
use crate::error::{Result, ValidationError};
use crate::types::{Sample, StatSample};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Where bucketed statistics are computed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    /// The backend evaluates aggregate plans
    #[default]
    Pushdown,
    /// Raw rows are fetched and aggregated here
    Local,
}

impl QueryMode {
    /// Lowercase label used in config and the health endpoint
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryMode::Pushdown => "pushdown",
            QueryMode::Local => "local",
        }
    }
}

impl fmt::Display for QueryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pushdown" => Ok(QueryMode::Pushdown),
            "local" => Ok(QueryMode::Local),
            other => Err(format!(
                "Invalid query mode '{}', expected pushdown or local",
                other
            )),
        }
    }
}

/// A validated historic request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoricQuery {
    /// Query window
    pub window: TimeWindow,
    /// Requested resolution
    pub granularity: Granularity,
    /// Requested statistics (`{mean}` for raw requests, never consulted)
    pub stats: StatSet,
}

impl HistoricQuery {
    /// Validate raw request parameters
    ///
    /// Checks run in a fixed order and stop at the first failure: presence of
    /// `from`/`to`, granularity, range, then statistics. Statistics are only
    /// parsed for bucketed requests, so a bad `stats` value never fails a raw
    /// query.
    pub fn parse(
        from: Option<&str>,
        to: Option<&str>,
        granularity: Option<&str>,
        stats: Option<&str>,
    ) -> std::result::Result<Self, ValidationError> {
        let (from, to) = match (non_empty(from), non_empty(to)) {
            (Some(from), Some(to)) => (from, to),
            _ => {
                return Err(ValidationError::MissingParameters {
                    required: vec!["from", "to"],
                })
            }
        };

        let token = non_empty(granularity).unwrap_or("raw").to_lowercase();
        let granularity = resolve_granularity(&token)?;
        let window = validate_range(from, to)?;

        let stats = if granularity.is_raw() {
            StatSet::mean()
        } else {
            parse_stats(non_empty(stats))?
        };

        Ok(Self {
            window,
            granularity,
            stats,
        })
    }

    /// Backend-agnostic plan for this request
    pub fn plan(&self) -> QueryPlan {
        QueryPlan::build(self.window, self.granularity, &self.stats)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Executes validated queries against a time-series backend
#[derive(Clone)]
pub struct HistoricEngine {
    backend: Arc<dyn TimeSeriesBackend>,
    mode: QueryMode,
}

impl HistoricEngine {
    /// Create an engine over `backend`
    pub fn new(backend: Arc<dyn TimeSeriesBackend>, mode: QueryMode) -> Self {
        Self { backend, mode }
    }

    /// Configured mode
    pub fn mode(&self) -> QueryMode {
        self.mode
    }

    /// Backend identifier, for logs and health output
    pub fn backend_id(&self) -> &str {
        self.backend.backend_id()
    }

    /// Run a validated query
    ///
    /// Exactly one backend round trip per call. Failures are returned as-is,
    /// without retries.
    pub async fn run(&self, query: &HistoricQuery) -> Result<Vec<StatSample>> {
        let plan = query.plan();
        self.run_plan(&plan).await
    }

    /// Run an already built plan
    pub async fn run_plan(&self, plan: &QueryPlan) -> Result<Vec<StatSample>> {
        let started = Instant::now();
        let rows = match (self.mode, plan) {
            (QueryMode::Local, QueryPlan::Aggregate(agg)) => self.aggregate_locally(agg).await?,
            _ => {
                let text = self.backend.execute(plan).await?;
                parse_tabular(&text, &self.backend.schema(), plan.labels_rows())
            }
        };

        debug!(
            backend = self.backend.backend_id(),
            mode = %self.mode,
            kind = plan.kind(),
            rows = rows.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "historic query complete"
        );
        Ok(rows)
    }

    /// Mean temperature and humidity over one UTC day
    ///
    /// Returns `None` when the day holds no readings.
    pub async fn daily_means(&self, date: NaiveDate) -> Result<Option<Sample>> {
        let plan = QueryPlan::Aggregate(AggregatePlan {
            window: TimeWindow::day(date),
            every: BucketSpec::DAY,
            stats: StatSet::mean(),
        });
        let rows = self.run_plan(&plan).await?;
        let means = rows.first().map(StatSample::sample);
        if means.is_none() {
            info!(%date, "no readings for day");
        }
        Ok(means)
    }

    async fn aggregate_locally(&self, plan: &AggregatePlan) -> Result<Vec<StatSample>> {
        let raw = QueryPlan::Raw(RawPlan {
            window: plan.window,
        });
        let text = self.backend.execute(&raw).await?;
        let samples: Vec<Sample> = parse_tabular(&text, &self.backend.schema(), false)
            .iter()
            .map(StatSample::sample)
            .collect();
        debug!(
            raw_rows = samples.len(),
            every = %plan.every,
            stats = %plan.stats,
            "aggregating locally"
        );
        Ok(aggregate_stats(&samples, plan.every, &plan.stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::error::{BackendError, Error};
    use crate::query::Statistic;
    use chrono::{TimeZone, Utc};

    fn parse(
        from: Option<&str>,
        to: Option<&str>,
        granularity: Option<&str>,
        stats: Option<&str>,
    ) -> std::result::Result<HistoricQuery, ValidationError> {
        HistoricQuery::parse(from, to, granularity, stats)
    }

    const FROM: &str = "2025-09-01T10:00:00Z";
    const TO: &str = "2025-09-01T12:00:00Z";

    fn seeded(pushdown: bool) -> Arc<MemoryBackend> {
        let backend = Arc::new(MemoryBackend::new().with_pushdown(pushdown));
        for (h, m, t, hum) in [
            (10, 5, 20.0, 40.0),
            (10, 35, 24.0, 60.0),
            (11, 10, 18.0, 50.0),
            (11, 50, 22.0, 54.0),
            (12, 0, 99.0, 99.0),
        ] {
            let ts = Utc.with_ymd_and_hms(2025, 9, 1, h, m, 0).unwrap();
            backend.insert(Sample::new(ts, t, hum));
        }
        backend
    }

    #[test]
    fn test_missing_parameters() {
        let err = parse(Some(FROM), None, None, None).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingParameters {
                required: vec!["from", "to"]
            }
        );
        assert!(parse(Some(""), Some(TO), None, None).is_err());
    }

    #[test]
    fn test_granularity_checked_before_range() {
        let err = parse(Some(TO), Some(FROM), Some("bogus"), None).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidGranularity { .. }));

        let err = parse(Some(TO), Some(FROM), Some("1H"), None).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidRange { .. }));
    }

    #[test]
    fn test_raw_ignores_bad_stats() {
        let q = parse(Some(FROM), Some(TO), None, Some("median")).unwrap();
        assert_eq!(q.granularity, Granularity::Raw);
        assert_eq!(q.plan().kind(), "raw");

        let err = parse(Some(FROM), Some(TO), Some("5m"), Some("median")).unwrap_err();
        assert_eq!(
            err,
            ValidationError::InvalidStat {
                token: "median".into()
            }
        );
    }

    #[test]
    fn test_query_mode_parse() {
        assert_eq!("LOCAL".parse::<QueryMode>().unwrap(), QueryMode::Local);
        assert_eq!(" pushdown ".parse::<QueryMode>().unwrap(), QueryMode::Pushdown);
        assert!("remote".parse::<QueryMode>().is_err());
    }

    #[tokio::test]
    async fn test_raw_query_returns_window_rows() {
        let engine = HistoricEngine::new(seeded(false), QueryMode::Local);
        let q = parse(Some(FROM), Some(TO), Some("raw"), None).unwrap();
        let rows = engine.run(&q).await.unwrap();
        // Upper bound is exclusive
        assert_eq!(rows.len(), 4);
        assert!(rows.iter().all(|r| r.stat.is_none()));
        assert!(rows.windows(2).all(|w| w[0].ts <= w[1].ts));
    }

    #[tokio::test]
    async fn test_local_and_pushdown_agree() {
        let q = parse(Some(FROM), Some(TO), Some("1h"), Some("mean,min,max")).unwrap();

        let local = HistoricEngine::new(seeded(false), QueryMode::Local)
            .run(&q)
            .await
            .unwrap();
        let pushed = HistoricEngine::new(seeded(true), QueryMode::Pushdown)
            .run(&q)
            .await
            .unwrap();

        assert_eq!(local.len(), 6);
        assert_eq!(local, pushed);
        assert!(local.iter().all(|r| r.stat.is_some()));

        let first_min = local
            .iter()
            .find(|r| r.stat == Some(Statistic::Min))
            .unwrap();
        assert_eq!(first_min.temperature, 20.0);
        assert_eq!(first_min.humidity, 40.0);
    }

    #[tokio::test]
    async fn test_pushdown_against_non_aggregating_backend_fails() {
        let engine = HistoricEngine::new(seeded(false), QueryMode::Pushdown);
        let q = parse(Some(FROM), Some(TO), Some("1h"), None).unwrap();
        let err = engine.run(&q).await.unwrap_err();
        assert!(matches!(err, Error::Backend(BackendError::Unsupported(_))));
    }

    #[tokio::test]
    async fn test_daily_means() {
        let engine = HistoricEngine::new(seeded(false), QueryMode::Local);
        let date = NaiveDate::from_ymd_opt(2025, 9, 1).unwrap();
        let means = engine.daily_means(date).await.unwrap().unwrap();
        assert_eq!(means.temperature, (20.0 + 24.0 + 18.0 + 22.0 + 99.0) / 5.0);

        let empty = NaiveDate::from_ymd_opt(2025, 9, 2).unwrap();
        assert!(engine.daily_means(empty).await.unwrap().is_none());
    }
}

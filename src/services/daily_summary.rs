//! Nightly daily-summary recompute
//!
//! Ingestion leaves provisional means in the summary row. This job asks the
//! time-series store for the real means of a whole UTC day (one `1d` mean
//! pass) and writes them back.

use crate::error::{Error, Result};
use crate::query::HistoricEngine;
use crate::summary::SummaryStore;
use crate::types::Timestamp;
use chrono::{Duration as ChronoDuration, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Means written by one run
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DailyAverages {
    /// Mean temperature of the day
    #[serde(rename = "meanTemperature")]
    pub mean_temperature: f64,
    /// Mean humidity of the day
    #[serde(rename = "meanHumidity")]
    pub mean_humidity: f64,
}

/// The UTC calendar day before `now`
pub fn previous_day(now: Timestamp) -> NaiveDate {
    now.date_naive().pred_opt().unwrap_or(NaiveDate::MIN)
}

/// Recomputes one day's means
#[derive(Clone)]
pub struct DailySummaryJob {
    engine: HistoricEngine,
    store: Arc<dyn SummaryStore>,
}

impl DailySummaryJob {
    /// Create a job
    pub fn new(engine: HistoricEngine, store: Arc<dyn SummaryStore>) -> Self {
        Self { engine, store }
    }

    /// Recompute `date`
    ///
    /// Fails with [`Error::NoData`] when the day holds no readings; the
    /// summary row is left untouched in that case.
    pub async fn run(&self, date: NaiveDate) -> Result<DailyAverages> {
        let means = self
            .engine
            .daily_means(date)
            .await?
            .ok_or(Error::NoData { date })?;

        self.store
            .upsert_means(date, means.temperature, means.humidity)
            .await?;

        tracing::info!(
            %date,
            mean_temperature = means.temperature,
            mean_humidity = means.humidity,
            "daily summary updated"
        );
        Ok(DailyAverages {
            mean_temperature: means.temperature,
            mean_humidity: means.humidity,
        })
    }
}

/// Parse an `HH:MM` UTC time of day
pub fn parse_schedule(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").ok()
}

/// Time left until the next `at` (UTC) strictly after `now`
pub fn until_next(now: Timestamp, at: NaiveTime) -> Duration {
    let today = now.date_naive().and_time(at).and_utc();
    let next = if today > now {
        today
    } else {
        today + ChronoDuration::days(1)
    };
    (next - now).to_std().unwrap_or(Duration::ZERO)
}

/// Runs [`DailySummaryJob`] for the previous day once per day
pub struct DailySummaryScheduler {
    job: DailySummaryJob,
    at: NaiveTime,
}

impl DailySummaryScheduler {
    /// Fire every day at `at` (UTC)
    pub fn new(job: DailySummaryJob, at: NaiveTime) -> Self {
        Self { job, at }
    }

    /// Loop until a shutdown signal arrives
    pub async fn start(&self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(at = %self.at, "daily summary scheduler started");

        loop {
            let wait = until_next(Utc::now(), self.at);
            tracing::debug!(wait_secs = wait.as_secs(), "next daily summary run scheduled");

            tokio::select! {
                result = shutdown.recv() => {
                    match result {
                        Ok(()) | Err(broadcast::error::RecvError::Closed) => {
                            tracing::debug!("daily summary scheduler received shutdown signal");
                            break;
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            tracing::debug!(missed = n, "daily summary scheduler receiver lagged");
                        }
                    }
                }

                _ = tokio::time::sleep(wait) => {
                    let date = previous_day(Utc::now());
                    match self.job.run(date).await {
                        Ok(_) => {}
                        Err(Error::NoData { date }) => {
                            tracing::warn!(%date, "no readings to summarise");
                        }
                        Err(e) => {
                            tracing::error!(%date, error = %e, "daily summary run failed");
                        }
                    }
                }
            }
        }

        tracing::debug!("daily summary scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::query::QueryMode;
    use crate::summary::MemorySummaryStore;
    use crate::types::Sample;
    use chrono::TimeZone;

    fn at(d: u32, h: u32, m: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2025, 9, d, h, m, 0).unwrap()
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, d).unwrap()
    }

    fn job(samples: Vec<Sample>) -> (DailySummaryJob, Arc<MemorySummaryStore>) {
        let backend = Arc::new(MemoryBackend::with_samples(samples));
        let store = Arc::new(MemorySummaryStore::new());
        let engine = HistoricEngine::new(backend, QueryMode::Local);
        (DailySummaryJob::new(engine, store.clone()), store)
    }

    #[test]
    fn test_previous_day() {
        assert_eq!(previous_day(at(1, 0, 0)), NaiveDate::from_ymd_opt(2025, 8, 31).unwrap());
        assert_eq!(previous_day(at(2, 23, 59)), date(1));
    }

    #[test]
    fn test_until_next() {
        let five_past = parse_schedule("00:05").unwrap();
        assert_eq!(until_next(at(1, 0, 0), five_past), Duration::from_secs(300));
        // Exactly at the slot waits a full day
        assert_eq!(until_next(at(1, 0, 5), five_past), Duration::from_secs(86_400));
        assert_eq!(
            until_next(at(1, 23, 0), five_past),
            Duration::from_secs(65 * 60)
        );
        assert!(parse_schedule("25:00").is_none());
    }

    #[tokio::test]
    async fn test_run_writes_means_for_whole_day() {
        let (job, store) = job(vec![
            Sample::new(at(1, 0, 0), 10.0, 40.0),
            Sample::new(at(1, 12, 0), 20.0, 60.0),
            Sample::new(at(1, 23, 59), 30.0, 80.0),
            Sample::new(at(2, 0, 0), 99.0, 99.0),
        ]);
        store.upsert_means(date(1), 30.0, 80.0).await.unwrap();
        store.lower_min_temperature(date(1), 10.0).await.unwrap();

        let averages = job.run(date(1)).await.unwrap();
        assert_eq!(averages.mean_temperature, 20.0);
        assert_eq!(averages.mean_humidity, 60.0);

        let row = store.get(date(1)).await.unwrap().unwrap();
        assert_eq!(row.mean_temperature, Some(20.0));
        assert_eq!(row.min_temperature, Some(10.0));
    }

    #[tokio::test]
    async fn test_run_without_data() {
        let (job, store) = job(Vec::new());
        let err = job.run(date(3)).await.unwrap_err();
        assert!(matches!(err, Error::NoData { date: d } if d == date(3)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_scheduler_stops_on_shutdown() {
        let (job, _store) = job(Vec::new());
        let scheduler = DailySummaryScheduler::new(job, parse_schedule("00:05").unwrap());
        let (tx, rx) = broadcast::channel(1);

        let handle = tokio::spawn(async move { scheduler.start(rx).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.send(()).unwrap();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}

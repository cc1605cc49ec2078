//! Single-reading ingestion
//!
//! # Flow
//!
//! ```text
//! JSON body → Reading → [summary upsert] → [min update] → [point write]
//! ```
//!
//! The summary row for the reading's UTC date gets the reading as its
//! provisional mean (the nightly recompute replaces it) and the running
//! minimum temperature is lowered when needed. The point then goes to the
//! time-series store.

use crate::backend::TimeSeriesBackend;
use crate::error::{Result, ValidationError};
use crate::query::parse_instant;
use crate::summary::SummaryStore;
use crate::types::{Sample, Timestamp};
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// Accepted key spellings for each value, first match wins
const TEMPERATURE_KEYS: &[&str] = &["temperature", "temperatura"];
const HUMIDITY_KEYS: &[&str] = &["humidity", "humedad"];

/// One validated sensor reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    /// Observation instant (UTC)
    pub ts: Timestamp,
    /// Temperature in degrees Celsius
    pub temperature: f64,
    /// Relative humidity in percent
    pub humidity: f64,
}

/// Extract a finite number from a JSON number or numeric string
///
/// Devices post values as strings (`"21.5"`) as often as numbers.
fn finite_value(body: &Value, keys: &[&'static str]) -> std::result::Result<f64, ValidationError> {
    let Some((key, value)) = keys
        .iter()
        .find_map(|k| body.get(*k).filter(|v| !v.is_null()).map(|v| (*k, v)))
    else {
        return Err(ValidationError::InvalidReading(format!(
            "missing `{}`",
            keys[0]
        )));
    };

    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|v| v.is_finite())
        .ok_or_else(|| {
            ValidationError::InvalidReading(format!("`{}` must be a finite number", key))
        })
}

impl Reading {
    /// Validate an ingest payload
    ///
    /// `timestamp` is optional and must be an RFC 3339 instant when present;
    /// `now` is used otherwise.
    pub fn from_json(body: &Value, now: Timestamp) -> std::result::Result<Self, ValidationError> {
        if !body.is_object() {
            return Err(ValidationError::InvalidReading(
                "body must be a JSON object".to_string(),
            ));
        }
        let temperature = finite_value(body, TEMPERATURE_KEYS)?;
        let humidity = finite_value(body, HUMIDITY_KEYS)?;

        let ts = match body.get("timestamp") {
            None | Some(Value::Null) => now,
            Some(Value::String(s)) => parse_instant(s)?,
            Some(_) => {
                return Err(ValidationError::InvalidReading(
                    "`timestamp` must be an RFC 3339 string".to_string(),
                ))
            },
        };

        Ok(Self {
            ts,
            temperature,
            humidity,
        })
    }

    /// UTC calendar date identifying the summary row
    pub fn date_key(&self) -> NaiveDate {
        self.ts.date_naive()
    }

    /// The reading as a time-series sample
    pub fn sample(&self) -> Sample {
        Sample::new(self.ts, self.temperature, self.humidity)
    }
}

/// Result of one ingest
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IngestOutcome {
    /// Summary row the reading was applied to
    pub date: NaiveDate,
    /// Whether the reading became the day's minimum temperature
    pub new_minimum: bool,
}

/// Applies readings to the summary and time-series stores
#[derive(Clone)]
pub struct Ingestor {
    backend: Arc<dyn TimeSeriesBackend>,
    store: Arc<dyn SummaryStore>,
}

impl Ingestor {
    /// Create an ingestor
    pub fn new(backend: Arc<dyn TimeSeriesBackend>, store: Arc<dyn SummaryStore>) -> Self {
        Self { backend, store }
    }

    /// Validate and apply a JSON payload, stamping it with the current time
    /// when it carries none
    pub async fn ingest_json(&self, body: &Value) -> Result<IngestOutcome> {
        let reading = Reading::from_json(body, Utc::now())?;
        self.ingest(&reading).await
    }

    /// Apply one reading
    ///
    /// Stops at the first failing step; earlier steps are not rolled back.
    pub async fn ingest(&self, reading: &Reading) -> Result<IngestOutcome> {
        let date = reading.date_key();

        self.store
            .upsert_means(date, reading.temperature, reading.humidity)
            .await?;
        let new_minimum = self
            .store
            .lower_min_temperature(date, reading.temperature)
            .await?;
        self.backend.write_sample(&reading.sample()).await?;

        debug!(
            %date,
            temperature = reading.temperature,
            humidity = reading.humidity,
            new_minimum,
            "reading ingested"
        );
        if new_minimum {
            info!(%date, temperature = reading.temperature, "new daily minimum");
        }
        Ok(IngestOutcome { date, new_minimum })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::summary::MemorySummaryStore;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> Timestamp {
        Utc.with_ymd_and_hms(2025, 9, 1, 23, 30, 0).unwrap()
    }

    #[test]
    fn test_reading_defaults_timestamp() {
        let r = Reading::from_json(&json!({"temperature": 21.5, "humidity": 40}), now()).unwrap();
        assert_eq!(r.ts, now());
        assert_eq!(r.humidity, 40.0);
        assert_eq!(r.date_key(), NaiveDate::from_ymd_opt(2025, 9, 1).unwrap());
    }

    #[test]
    fn test_reading_accepts_device_payload() {
        let body = json!({"temperatura": "19.4", "humedad": "63.0", "unit_temp": "C"});
        let r = Reading::from_json(&body, now()).unwrap();
        assert_eq!(r.temperature, 19.4);
        assert_eq!(r.humidity, 63.0);
    }

    #[test]
    fn test_reading_date_key_uses_utc() {
        let body = json!({
            "temperature": 10.0,
            "humidity": 20.0,
            "timestamp": "2025-09-02T01:30:00+03:00"
        });
        let r = Reading::from_json(&body, now()).unwrap();
        assert_eq!(r.date_key(), NaiveDate::from_ymd_opt(2025, 9, 1).unwrap());
    }

    #[test]
    fn test_reading_rejects_bad_values() {
        for body in [
            json!({"humidity": 40}),
            json!({"temperature": "warm", "humidity": 40}),
            json!({"temperature": 20, "humidity": true}),
            json!({"temperature": "NaN", "humidity": 40}),
            json!({"temperature": 20, "humidity": "inf"}),
            json!([20, 40]),
        ] {
            let err = Reading::from_json(&body, now()).unwrap_err();
            assert!(matches!(err, ValidationError::InvalidReading(_)), "{:?}", body);
        }

        let err = Reading::from_json(
            &json!({"temperature": 1, "humidity": 2, "timestamp": "yesterday"}),
            now(),
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidDate { .. }));
    }

    #[tokio::test]
    async fn test_ingest_updates_summary_and_series() {
        let backend = Arc::new(MemoryBackend::new());
        let store = Arc::new(MemorySummaryStore::new());
        let ingestor = Ingestor::new(backend.clone(), store.clone());

        let first =
            Reading::from_json(&json!({"temperature": 20.0, "humidity": 50.0}), now()).unwrap();
        let outcome = ingestor.ingest(&first).await.unwrap();
        assert!(outcome.new_minimum);

        let warmer =
            Reading::from_json(&json!({"temperature": 25.0, "humidity": 45.0}), now()).unwrap();
        assert!(!ingestor.ingest(&warmer).await.unwrap().new_minimum);

        let row = store.get(outcome.date).await.unwrap().unwrap();
        assert_eq!(row.mean_temperature, Some(25.0));
        assert_eq!(row.min_temperature, Some(20.0));
        assert_eq!(backend.len(), 2);
    }
}

//! Core data types for the gateway

use crate::query::Statistic;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};

/// Instant type used throughout the gateway
pub type Timestamp = DateTime<Utc>;

/// Serialize an instant as RFC 3339 with a `Z` suffix
pub fn serialize_ts<S>(ts: &Timestamp, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_ts(ts))
}

/// Format an instant the way it appears in responses and backend queries
pub fn format_ts(ts: &Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// One temperature/humidity observation
///
/// Both values are finite; rows that fail this are never constructed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    /// Observation (or bucket start) instant
    #[serde(serialize_with = "serialize_ts")]
    pub ts: Timestamp,
    /// Temperature in degrees Celsius
    pub temperature: f64,
    /// Relative humidity in percent
    pub humidity: f64,
}

impl Sample {
    /// Create a new sample
    pub fn new(ts: Timestamp, temperature: f64, humidity: f64) -> Self {
        Self {
            ts,
            temperature,
            humidity,
        }
    }
}

/// A sample optionally labelled with the statistic that produced it
///
/// The label is only set when more than one statistic was requested, so a
/// single-statistic or raw response serializes exactly like `Sample`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatSample {
    /// Bucket start instant
    #[serde(serialize_with = "serialize_ts")]
    pub ts: Timestamp,
    /// Statistic label (multi-statistic responses only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stat: Option<Statistic>,
    /// Temperature value for this statistic
    pub temperature: f64,
    /// Humidity value for this statistic
    pub humidity: f64,
}

impl StatSample {
    /// Attach an optional statistic label to a sample
    pub fn labelled(sample: Sample, stat: Option<Statistic>) -> Self {
        Self {
            ts: sample.ts,
            stat,
            temperature: sample.temperature,
            humidity: sample.humidity,
        }
    }

    /// Drop the label
    pub fn sample(&self) -> Sample {
        Sample::new(self.ts, self.temperature, self.humidity)
    }
}

impl From<Sample> for StatSample {
    fn from(sample: Sample) -> Self {
        Self::labelled(sample, None)
    }
}

/// One row of the daily summary table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    /// UTC calendar date (`YYYY-MM-DD`)
    #[serde(rename = "dateKey")]
    pub date: NaiveDate,
    /// Mean temperature for the day
    #[serde(rename = "meanTemperature")]
    pub mean_temperature: Option<f64>,
    /// Mean humidity for the day
    #[serde(rename = "meanHumidity")]
    pub mean_humidity: Option<f64>,
    /// Lowest temperature observed during the day
    #[serde(rename = "minTemperature")]
    pub min_temperature: Option<f64>,
}

/// Parse a `YYYY-MM-DD` date key
pub fn parse_date_key(input: &str) -> Option<NaiveDate> {
    let bytes = input.as_bytes();
    let shape_ok = bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit());
    if !shape_ok {
        return None;
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d").ok()
}

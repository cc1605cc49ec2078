//! Local bucket aggregation
//!
//! Fallback for deployments where the backend cannot aggregate: raw samples
//! are fetched and grouped here. Bucket boundaries are calendar aligned in
//! UTC (a 15 minute bucket starts at :00, :15, :30 or :45), not aligned to the
//! query window.

use super::granularity::{BucketSpec, BucketUnit};
use super::stats::{StatSet, Statistic};
use crate::types::{Sample, StatSample, Timestamp};
use chrono::{NaiveTime, Timelike};
use std::collections::BTreeMap;

/// Floor an instant to the start of its bucket
///
/// - minute buckets: largest multiple of `size` minutes at or below the
///   minute-of-hour, seconds and sub-seconds zeroed
/// - hour buckets: largest multiple of `size` hours at or below the
///   hour-of-day, minutes and below zeroed
/// - day buckets: midnight of the same UTC date
pub fn floor_to_bucket(ts: Timestamp, spec: BucketSpec) -> Timestamp {
    let size = spec.size.max(1);
    let (hour, minute) = match spec.unit {
        BucketUnit::Minute => (ts.hour(), ts.minute() - ts.minute() % size),
        BucketUnit::Hour => (ts.hour() - ts.hour() % size, 0),
        BucketUnit::Day => (0, 0),
    };
    let time = NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN);
    ts.date_naive().and_time(time).and_utc()
}

/// Running sum/count/extremes of one field
///
/// `running_mean` is updated in scaled form so it stays finite for any finite
/// input; it is only read once `sum` has overflowed.
#[derive(Debug, Clone, Copy)]
struct FieldAccumulator {
    sum: f64,
    running_mean: f64,
    count: u64,
    min: f64,
    max: f64,
}

impl FieldAccumulator {
    fn new() -> Self {
        Self {
            sum: 0.0,
            running_mean: 0.0,
            count: 0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    fn push(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
        let n = self.count as f64;
        self.running_mean += value / n - self.running_mean / n;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    fn value(&self, stat: Statistic) -> f64 {
        match stat {
            Statistic::Mean if self.sum.is_finite() => self.sum / self.count as f64,
            Statistic::Mean => self.running_mean,
            Statistic::Min => self.min,
            Statistic::Max => self.max,
        }
    }
}

/// Accumulators for both fields of one bucket
#[derive(Debug, Clone, Copy)]
struct BucketAccumulator {
    temperature: FieldAccumulator,
    humidity: FieldAccumulator,
}

fn accumulate(samples: &[Sample], spec: BucketSpec) -> BTreeMap<Timestamp, BucketAccumulator> {
    let mut buckets: BTreeMap<Timestamp, BucketAccumulator> = BTreeMap::new();
    for sample in samples {
        let acc = buckets
            .entry(floor_to_bucket(sample.ts, spec))
            .or_insert_with(|| BucketAccumulator {
                temperature: FieldAccumulator::new(),
                humidity: FieldAccumulator::new(),
            });
        acc.temperature.push(sample.temperature);
        acc.humidity.push(sample.humidity);
    }
    buckets
}

/// Mean of each field per bucket, sorted by bucket start
pub fn aggregate_mean(samples: &[Sample], spec: BucketSpec) -> Vec<Sample> {
    accumulate(samples, spec)
        .into_iter()
        .map(|(ts, acc)| {
            Sample::new(
                ts,
                acc.temperature.value(Statistic::Mean),
                acc.humidity.value(Statistic::Mean),
            )
        })
        .collect()
}

/// Every requested statistic per bucket
///
/// Rows are ordered by `(bucket start, statistic label)`, matching the order
/// a pushed-down plan returns. Labels are attached only for multi-statistic
/// sets.
pub fn aggregate_stats(samples: &[Sample], spec: BucketSpec, stats: &StatSet) -> Vec<StatSample> {
    let labelled = stats.is_multi();
    let buckets = accumulate(samples, spec);
    let mut out = Vec::with_capacity(buckets.len() * stats.len());
    for (ts, acc) in buckets {
        for stat in stats.iter() {
            let sample = Sample::new(ts, acc.temperature.value(stat), acc.humidity.value(stat));
            out.push(StatSample::labelled(sample, labelled.then_some(stat)));
        }
    }
    out
}

//! Flux rendering of query plans
//!
//! Bucket, measurement and field names come from [`FluxTarget`], which is
//! built from trusted configuration. Every name is emitted as an escaped
//! string literal, and window bounds are rendered from validated instants, so
//! no request text reaches the query.

use crate::config::InfluxConfig;
use crate::query::tabular::{STAT_COLUMN, TIME_COLUMN};
use crate::query::{AggregatePlan, QueryPlan, RawPlan, TimeWindow};
use std::fmt::Write as _;

/// Names a rendered query refers to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FluxTarget {
    /// Bucket holding the readings
    pub bucket: String,
    /// Measurement name
    pub measurement: String,
    /// Temperature field
    pub temperature_field: String,
    /// Humidity field
    pub humidity_field: String,
}

impl FluxTarget {
    /// Build from connection settings, `None` when no bucket is configured
    pub fn from_config(config: &InfluxConfig) -> Option<Self> {
        Some(Self {
            bucket: config.bucket.clone()?,
            measurement: config.measurement.clone(),
            temperature_field: config.temperature_field.clone(),
            humidity_field: config.humidity_field.clone(),
        })
    }
}

/// Escape a value for use inside a Flux double-quoted string literal
pub fn escape_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '$' => out.push_str("\\$"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out
}

fn quoted(value: &str) -> String {
    format!("\"{}\"", escape_string(value))
}

/// Filtered source series shared by every plan shape
fn source(target: &FluxTarget, window: &TimeWindow) -> String {
    format!(
        "from(bucket: {bucket})\n  \
         |> range(start: time(v: {start}), stop: time(v: {stop}))\n  \
         |> filter(fn: (r) => r._measurement == {measurement})\n  \
         |> filter(fn: (r) => r._field == {temperature} or r._field == {humidity})",
        bucket = quoted(&target.bucket),
        start = quoted(&window.start_rfc3339()),
        stop = quoted(&window.stop_rfc3339()),
        measurement = quoted(&target.measurement),
        temperature = quoted(&target.temperature_field),
        humidity = quoted(&target.humidity_field),
    )
}

fn render_raw(target: &FluxTarget, plan: &RawPlan) -> String {
    format!(
        "{source}\n  \
         |> keep(columns: [\"{time}\", \"_field\", \"_value\"])\n  \
         |> pivot(rowKey: [\"{time}\"], columnKey: [\"_field\"], valueColumn: \"_value\")\n  \
         |> sort(columns: [\"{time}\"])",
        source = source(target, &plan.window),
        time = TIME_COLUMN,
    )
}

/// One `aggregateWindow` pass per statistic, unioned and pivoted on
/// `(_time, _stat)`
///
/// Windows are stamped with their start so pushed-down buckets line up with
/// locally floored ones.
fn render_aggregate(target: &FluxTarget, plan: &AggregatePlan) -> String {
    let mut out = format!("data = {}\n\n", source(target, &plan.window));

    let passes: Vec<String> = plan
        .passes()
        .iter()
        .map(|pass| {
            format!(
                "\n  data\n    \
                 |> aggregateWindow(every: {every}, fn: {function}, timeSrc: \"_start\", createEmpty: false)\n    \
                 |> set(key: \"{stat}\", value: {label})\n    \
                 |> keep(columns: [\"{time}\", \"_field\", \"_value\", \"{stat}\"])",
                every = pass.every,
                function = pass.function.as_str(),
                label = quoted(pass.function.as_str()),
                stat = STAT_COLUMN,
                time = TIME_COLUMN,
            )
        })
        .collect();

    let _ = write!(
        out,
        "union(tables: [{passes}])\n  \
         |> pivot(rowKey: [\"{time}\", \"{stat}\"], columnKey: [\"_field\"], valueColumn: \"_value\")\n  \
         |> sort(columns: [\"{time}\", \"{stat}\"])",
        passes = passes.join(","),
        time = TIME_COLUMN,
        stat = STAT_COLUMN,
    );
    out
}

/// Render a plan as a Flux script
pub fn render(target: &FluxTarget, plan: &QueryPlan) -> String {
    match plan {
        QueryPlan::Raw(raw) => render_raw(target, raw),
        QueryPlan::Aggregate(agg) => render_aggregate(target, agg),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{parse_stats, resolve_granularity, validate_range};

    fn target() -> FluxTarget {
        FluxTarget {
            bucket: "sensors".into(),
            measurement: "readings".into(),
            temperature_field: "temperatura".into(),
            humidity_field: "humedad".into(),
        }
    }

    fn plan(granularity: &str, stats: &str) -> QueryPlan {
        let window = validate_range("2025-09-01T00:00:00Z", "2025-09-02T00:00:00Z").unwrap();
        QueryPlan::build(
            window,
            resolve_granularity(granularity).unwrap(),
            &parse_stats(Some(stats)).unwrap(),
        )
    }

    #[test]
    fn test_raw_plan_pivots_on_time() {
        let flux = render(&target(), &plan("raw", "mean"));
        assert!(flux.starts_with("from(bucket: \"sensors\")"));
        assert!(flux.contains(
            "range(start: time(v: \"2025-09-01T00:00:00Z\"), stop: time(v: \"2025-09-02T00:00:00Z\"))"
        ));
        assert!(flux.contains("r._field == \"temperatura\" or r._field == \"humedad\""));
        assert!(flux.contains("pivot(rowKey: [\"_time\"]"));
        assert!(!flux.contains("aggregateWindow"));
        assert!(!flux.contains("_stat"));
    }

    #[test]
    fn test_aggregate_plan_unions_one_pass_per_stat() {
        let flux = render(&target(), &plan("15m", "min,max,mean"));
        assert_eq!(flux.matches("aggregateWindow(every: 15m").count(), 3);
        for stat in ["mean", "min", "max"] {
            assert!(flux.contains(&format!("fn: {},", stat)));
            assert!(flux.contains(&format!("set(key: \"_stat\", value: \"{}\")", stat)));
        }
        assert!(flux.contains("union(tables: ["));
        assert!(flux.contains("pivot(rowKey: [\"_time\", \"_stat\"]"));
        assert!(flux.contains("sort(columns: [\"_time\", \"_stat\"])"));
    }

    #[test]
    fn test_names_are_escaped() {
        let mut t = target();
        t.bucket = "evil\") |> drop() //".into();
        let flux = render(&t, &plan("raw", "mean"));
        assert!(flux.contains("from(bucket: \"evil\\\") |> drop() //\")"));
        assert_eq!(escape_string("a\\b\"c${x}"), "a\\\\b\\\"c\\${x}");
    }
}

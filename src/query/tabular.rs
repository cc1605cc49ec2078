//! Tabular (annotated CSV) result parsing
//!
//! Backends answer plans with delimited text: optional `#`-prefixed annotation
//! lines, a header row naming the columns, then data rows. Columns are located
//! by name, so their order may vary between responses.
//!
//! # Leniency
//!
//! Parsing never fails. A response without a timestamp column yields no
//! samples, and any row that is short, has an unparsable timestamp, or lacks a
//! finite value for either field is dropped. Values are never coerced to zero.

use super::stats::Statistic;
use crate::types::{format_ts, Sample, StatSample};
use chrono::{DateTime, Utc};
use std::fmt::Write as _;

/// Prefix of annotation/comment lines
pub const COMMENT_PREFIX: char = '#';

/// Timestamp column name
pub const TIME_COLUMN: &str = "_time";

/// Statistic label column name
pub const STAT_COLUMN: &str = "_stat";

/// Column names the parser looks up in the header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabularSchema {
    /// Timestamp column
    pub time: String,
    /// Temperature field column
    pub temperature: String,
    /// Humidity field column
    pub humidity: String,
    /// Statistic label column
    pub stat: String,
}

impl TabularSchema {
    /// Schema for the given field names with the standard time/stat columns
    pub fn for_fields(temperature: impl Into<String>, humidity: impl Into<String>) -> Self {
        Self {
            time: TIME_COLUMN.to_string(),
            temperature: temperature.into(),
            humidity: humidity.into(),
            stat: STAT_COLUMN.to_string(),
        }
    }
}

impl Default for TabularSchema {
    fn default() -> Self {
        Self::for_fields("temperatura", "humedad")
    }
}

/// Resolved column positions for one header
struct ColumnIndex {
    time: usize,
    temperature: Option<usize>,
    humidity: Option<usize>,
    stat: Option<usize>,
    width: usize,
}

impl ColumnIndex {
    fn resolve(header: &[&str], schema: &TabularSchema) -> Option<Self> {
        let find = |name: &str| header.iter().position(|c| *c == name);
        Some(Self {
            time: find(&schema.time)?,
            temperature: find(&schema.temperature),
            humidity: find(&schema.humidity),
            stat: find(&schema.stat),
            width: header.len(),
        })
    }
}

/// Parse a finite number, rejecting blanks and non-numeric text
fn parse_finite(cell: Option<&&str>) -> Option<f64> {
    let cell = cell?.trim();
    if cell.is_empty() {
        return None;
    }
    cell.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse tabular text into samples
///
/// When `labelled` is true (more than one statistic requested) and the header
/// has a statistic column, each sample carries its label; rows with an
/// unknown label are dropped. Otherwise labels are omitted even if present.
pub fn parse_tabular(text: &str, schema: &TabularSchema, labelled: bool) -> Vec<StatSample> {
    let mut lines = text
        .lines()
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .filter(|l| !l.trim().is_empty() && !l.starts_with(COMMENT_PREFIX));

    let Some(header_line) = lines.next() else {
        return Vec::new();
    };
    let header: Vec<&str> = header_line.split(',').collect();
    let Some(index) = ColumnIndex::resolve(&header, schema) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for line in lines {
        let cols: Vec<&str> = line.split(',').collect();
        if cols.len() < index.width {
            continue;
        }
        let Ok(ts) = DateTime::parse_from_rfc3339(cols[index.time].trim()) else {
            continue;
        };
        let temperature = index.temperature.and_then(|i| parse_finite(cols.get(i)));
        let humidity = index.humidity.and_then(|i| parse_finite(cols.get(i)));
        let (Some(temperature), Some(humidity)) = (temperature, humidity) else {
            continue;
        };

        let stat = match (labelled, index.stat) {
            (true, Some(i)) => match cols[i].trim().parse::<Statistic>() {
                Ok(stat) => Some(stat),
                Err(_) => continue,
            },
            _ => None,
        };

        out.push(StatSample::labelled(
            Sample::new(ts.with_timezone(&Utc), temperature, humidity),
            stat,
        ));
    }
    out
}

/// Render samples as tabular text readable by [`parse_tabular`]
///
/// Emits a datatype annotation line and the `result`/`table` leading columns
/// the way InfluxDB does. The statistic column is included when any row is
/// labelled.
pub fn render_tabular(rows: &[StatSample], schema: &TabularSchema) -> String {
    let with_stat = rows.iter().any(|r| r.stat.is_some());
    let mut out = String::new();

    out.push_str("#datatype,string,long,dateTime:RFC3339,double,double");
    if with_stat {
        out.push_str(",string");
    }
    out.push('\n');

    let _ = write!(
        out,
        ",result,table,{},{},{}",
        schema.time, schema.temperature, schema.humidity
    );
    if with_stat {
        let _ = write!(out, ",{}", schema.stat);
    }
    out.push('\n');

    for row in rows {
        let _ = write!(
            out,
            ",_result,0,{},{},{}",
            format_ts(&row.ts),
            row.temperature,
            row.humidity
        );
        if with_stat {
            let _ = write!(out, ",{}", row.stat.map(|s| s.as_str()).unwrap_or(""));
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(h: u32, m: u32) -> crate::types::Timestamp {
        Utc.with_ymd_and_hms(2025, 9, 1, h, m, 0).unwrap()
    }

    #[test]
    fn test_round_trip() {
        let samples = vec![
            Sample::new(ts(0, 0), 21.25, 40.5),
            Sample::new(ts(0, 5), -3.125, 99.0),
            Sample::new(ts(1, 0), 0.1 + 0.2, 1e-3),
        ];
        let rows: Vec<StatSample> = samples.iter().copied().map(StatSample::from).collect();
        let schema = TabularSchema::default();
        let text = render_tabular(&rows, &schema);

        let parsed: Vec<Sample> = parse_tabular(&text, &schema, false)
            .iter()
            .map(|r| r.sample())
            .collect();
        assert_eq!(parsed, samples);
    }

    #[test]
    fn test_influx_style_response_with_shuffled_columns() {
        let csv = "#group,false,false,true,false,false,false\r\n\
                   #datatype,string,long,string,double,dateTime:RFC3339,double\r\n\
                   #default,_result,,,,,\r\n\
                   ,result,table,_measurement,humedad,_time,temperatura\r\n\
                   ,,0,readings,45.2,2025-09-01T10:00:00Z,22.1\r\n\
                   ,,0,readings,46,2025-09-01T10:05:00Z,22.4\r\n\
                   \r\n";
        let rows = parse_tabular(csv, &TabularSchema::default(), false);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].ts, ts(10, 0));
        assert_eq!(rows[0].temperature, 22.1);
        assert_eq!(rows[0].humidity, 45.2);
        assert_eq!(rows[1].humidity, 46.0);
        assert!(rows.iter().all(|r| r.stat.is_none()));
    }

    #[test]
    fn test_missing_time_column_yields_nothing() {
        let csv = ",result,table,temperatura,humedad\n,,0,20.0,50.0\n";
        assert!(parse_tabular(csv, &TabularSchema::default(), false).is_empty());
        assert!(parse_tabular("", &TabularSchema::default(), false).is_empty());
        assert!(parse_tabular("#only,comments\n\n", &TabularSchema::default(), false).is_empty());
    }

    #[test]
    fn test_rows_with_bad_values_are_dropped() {
        let csv = ",result,table,_time,temperatura,humedad\n\
                   ,,0,2025-09-01T00:00:00Z,20.0,50.0\n\
                   ,,0,2025-09-01T00:01:00Z,,50.0\n\
                   ,,0,2025-09-01T00:02:00Z,abc,50.0\n\
                   ,,0,2025-09-01T00:03:00Z,NaN,50.0\n\
                   ,,0,2025-09-01T00:04:00Z,20.0,inf\n\
                   ,,0,not-a-time,20.0,50.0\n\
                   ,,0,2025-09-01T00:05:00Z,20.0\n\
                   ,result,table,_time,temperatura,humedad\n\
                   ,,0,2025-09-01T00:06:00Z,21.0,51.0\n";
        let rows = parse_tabular(csv, &TabularSchema::default(), false);
        let stamps: Vec<_> = rows.iter().map(|r| r.ts).collect();
        assert_eq!(stamps, vec![ts(0, 0), ts(0, 6)]);
    }

    #[test]
    fn test_missing_field_column_drops_all_rows() {
        let csv = ",result,table,_time,temperatura\n,,0,2025-09-01T00:00:00Z,20.0\n";
        assert!(parse_tabular(csv, &TabularSchema::default(), false).is_empty());
    }

    #[test]
    fn test_stat_label_only_when_labelled() {
        let csv = ",result,table,_time,_stat,temperatura,humedad\n\
                   ,,0,2025-09-01T10:00:00Z,max,25.0,60.0\n\
                   ,,0,2025-09-01T10:00:00Z,mean,22.0,50.0\n\
                   ,,0,2025-09-01T10:00:00Z,min,19.0,40.0\n";
        let schema = TabularSchema::default();

        let labelled = parse_tabular(csv, &schema, true);
        let labels: Vec<_> = labelled.iter().map(|r| r.stat).collect();
        assert_eq!(
            labels,
            vec![
                Some(Statistic::Max),
                Some(Statistic::Mean),
                Some(Statistic::Min)
            ]
        );

        let plain = parse_tabular(csv, &schema, false);
        assert_eq!(plain.len(), 3);
        assert!(plain.iter().all(|r| r.stat.is_none()));
    }

    #[test]
    fn test_unknown_label_dropped_when_labelled() {
        let csv = ",result,table,_time,_stat,temperatura,humedad\n\
                   ,,0,2025-09-01T10:00:00Z,median,25.0,60.0\n\
                   ,,0,2025-09-01T10:00:00Z,min,19.0,40.0\n";
        let rows = parse_tabular(csv, &TabularSchema::default(), true);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].stat, Some(Statistic::Min));
    }

    #[test]
    fn test_custom_field_names() {
        let schema = TabularSchema::for_fields("temperature", "humidity");
        let csv = "_time,humidity,temperature\n2025-09-01T10:00:00.5Z,30,10\n";
        let rows = parse_tabular(csv, &schema, false);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].temperature, 10.0);
        assert_eq!(rows[0].humidity, 30.0);
    }
}

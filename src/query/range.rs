//! Half-open query windows

use crate::error::ValidationError;
use crate::types::{format_ts, Timestamp};
use chrono::{DateTime, Duration, NaiveDate, Utc};

/// Half-open time window `[from, to)`
///
/// `from < to` always holds for values built through [`validate_range`] or
/// [`TimeWindow::day`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeWindow {
    /// Inclusive start
    pub from: Timestamp,
    /// Exclusive end
    pub to: Timestamp,
}

impl TimeWindow {
    /// Create a window, returning `None` unless `from < to`
    pub fn new(from: Timestamp, to: Timestamp) -> Option<Self> {
        (from < to).then_some(Self { from, to })
    }

    /// The full UTC calendar day `[date 00:00, date+1 00:00)`
    pub fn day(date: NaiveDate) -> Self {
        let from = date.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc();
        Self {
            from,
            to: from + Duration::days(1),
        }
    }

    /// Whether an instant falls inside the window
    pub fn contains(&self, ts: &Timestamp) -> bool {
        *ts >= self.from && *ts < self.to
    }

    /// Start rendered as RFC 3339 UTC
    pub fn start_rfc3339(&self) -> String {
        format_ts(&self.from)
    }

    /// End rendered as RFC 3339 UTC
    pub fn stop_rfc3339(&self) -> String {
        format_ts(&self.to)
    }
}

/// Parse a single bound as an unambiguous instant
///
/// Offsets are required (`Z` or `±hh:mm`); naive local strings are rejected.
pub fn parse_instant(value: &str) -> Result<Timestamp, ValidationError> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ValidationError::InvalidDate {
            value: value.to_string(),
            detail: e.to_string(),
        })
}

/// Validate a `[from, to)` window from request strings
///
/// Fails with `InvalidDate` if either bound does not parse and with
/// `InvalidRange` when `from >= to`; equal bounds are rejected.
pub fn validate_range(from: &str, to: &str) -> Result<TimeWindow, ValidationError> {
    let start = parse_instant(from)?;
    let end = parse_instant(to)?;
    TimeWindow::new(start, end).ok_or_else(|| ValidationError::InvalidRange {
        from: from.to_string(),
        to: to.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_valid_window() {
        let w = validate_range("2025-09-01T00:00:00Z", "2025-09-02T00:00:00Z").unwrap();
        assert_eq!(w.from, Utc.with_ymd_and_hms(2025, 9, 1, 0, 0, 0).unwrap());
        assert_eq!(w.to - w.from, Duration::days(1));
    }

    #[test]
    fn test_offsets_are_normalised_to_utc() {
        let w = validate_range("2025-09-01T02:00:00+02:00", "2025-09-01T01:00:00Z").unwrap();
        assert_eq!(w.start_rfc3339(), "2025-09-01T00:00:00Z");
        assert_eq!(w.stop_rfc3339(), "2025-09-01T01:00:00Z");
    }

    #[test]
    fn test_equal_bounds_rejected() {
        let err = validate_range("2025-09-01T00:00:00Z", "2025-09-01T00:00:00Z").unwrap_err();
        assert!(matches!(err, ValidationError::InvalidRange { .. }));
    }

    #[test]
    fn test_reversed_bounds_rejected() {
        let err = validate_range("2025-09-02T00:00:00Z", "2025-09-01T00:00:00Z").unwrap_err();
        assert!(matches!(err, ValidationError::InvalidRange { .. }));
    }

    #[test]
    fn test_unparsable_or_naive_dates_rejected() {
        for bad in ["yesterday", "2025-13-01T00:00:00Z", "2025-09-01T00:00:00", ""] {
            let err = validate_range(bad, "2025-09-02T00:00:00Z").unwrap_err();
            assert!(
                matches!(err, ValidationError::InvalidDate { ref value, .. } if value == bad),
                "input {:?}",
                bad
            );
        }
        let err = validate_range("2025-09-01T00:00:00Z", "nope").unwrap_err();
        assert!(matches!(err, ValidationError::InvalidDate { .. }));
    }

    #[test]
    fn test_day_window() {
        let w = TimeWindow::day(NaiveDate::from_ymd_opt(2025, 1, 15).unwrap());
        assert_eq!(w.start_rfc3339(), "2025-01-15T00:00:00Z");
        assert_eq!(w.stop_rfc3339(), "2025-01-16T00:00:00Z");
        assert!(w.contains(&Utc.with_ymd_and_hms(2025, 1, 15, 23, 59, 59).unwrap()));
        assert!(!w.contains(&w.to));
    }
}

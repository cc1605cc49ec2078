//! Granularity tokens and bucket widths
//!
//! Requests name their temporal resolution with a token from a closed table.
//! The token is resolved once at the boundary; downstream code only sees the
//! structured [`Granularity`] value.

use crate::error::ValidationError;
use std::fmt;

/// Tokens accepted by [`resolve_granularity`], in display order
pub const ALLOWED_GRANULARITIES: &[&str] = &["raw", "1m", "5m", "15m", "1h", "1d"];

/// Calendar unit of a bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BucketUnit {
    /// Minute buckets
    Minute,
    /// Hour buckets
    Hour,
    /// Day buckets
    Day,
}

impl BucketUnit {
    /// Suffix used in window durations (`m`, `h`, `d`)
    pub fn suffix(&self) -> char {
        match self {
            BucketUnit::Minute => 'm',
            BucketUnit::Hour => 'h',
            BucketUnit::Day => 'd',
        }
    }
}

/// Fixed-width bucket: `size` units wide
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BucketSpec {
    /// Calendar unit
    pub unit: BucketUnit,
    /// Number of units per bucket
    pub size: u32,
}

impl BucketSpec {
    /// One-day bucket
    pub const DAY: BucketSpec = BucketSpec {
        unit: BucketUnit::Day,
        size: 1,
    };
}

impl fmt::Display for BucketSpec {
    /// Render as a window duration (`5m`, `1h`, `1d`)
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.size, self.unit.suffix())
    }
}

/// Requested temporal resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Granularity {
    /// No aggregation
    Raw,
    /// Aggregate into fixed-width buckets
    Bucketed(BucketSpec),
}

impl Granularity {
    /// Bucket spec, or `None` for raw
    pub fn bucket(&self) -> Option<BucketSpec> {
        match self {
            Granularity::Raw => None,
            Granularity::Bucketed(spec) => Some(*spec),
        }
    }

    /// Whether this granularity requests aggregation
    pub fn is_raw(&self) -> bool {
        matches!(self, Granularity::Raw)
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Granularity::Raw => write!(f, "raw"),
            Granularity::Bucketed(spec) => spec.fmt(f),
        }
    }
}

/// Resolve a lower-cased request token into a [`Granularity`]
///
/// Only the tokens in [`ALLOWED_GRANULARITIES`] are accepted. The caller is
/// responsible for lower-casing; no trimming happens here.
pub fn resolve_granularity(token: &str) -> Result<Granularity, ValidationError> {
    let bucket = |unit, size| Ok(Granularity::Bucketed(BucketSpec { unit, size }));
    match token {
        "raw" => Ok(Granularity::Raw),
        "1m" => bucket(BucketUnit::Minute, 1),
        "5m" => bucket(BucketUnit::Minute, 5),
        "15m" => bucket(BucketUnit::Minute, 15),
        "1h" => bucket(BucketUnit::Hour, 1),
        "1d" => bucket(BucketUnit::Day, 1),
        other => Err(ValidationError::InvalidGranularity {
            token: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_every_allowed_token() {
        assert_eq!(resolve_granularity("raw"), Ok(Granularity::Raw));

        let cases = [
            ("1m", BucketUnit::Minute, 1),
            ("5m", BucketUnit::Minute, 5),
            ("15m", BucketUnit::Minute, 15),
            ("1h", BucketUnit::Hour, 1),
            ("1d", BucketUnit::Day, 1),
        ];
        for (token, unit, size) in cases {
            assert_eq!(
                resolve_granularity(token),
                Ok(Granularity::Bucketed(BucketSpec { unit, size })),
                "token {}",
                token
            );
        }
    }

    #[test]
    fn test_rejects_unknown_tokens() {
        for token in ["bogus", "2m", "30m", "1w", "", " 1m", "1H", "RAW"] {
            let err = resolve_granularity(token).unwrap_err();
            assert_eq!(
                err,
                ValidationError::InvalidGranularity {
                    token: token.to_string()
                }
            );
        }
    }

    #[test]
    fn test_display_round_trips_table() {
        for token in ALLOWED_GRANULARITIES {
            let g = resolve_granularity(token).unwrap();
            assert_eq!(g.to_string(), *token);
        }
    }

    #[test]
    fn test_bucket_of_granularity() {
        let g = resolve_granularity("15m").unwrap();
        assert_eq!(
            g.bucket(),
            Some(BucketSpec {
                unit: BucketUnit::Minute,
                size: 15
            })
        );
        assert_eq!(BucketSpec::DAY.to_string(), "1d");
        assert!(resolve_granularity("raw").unwrap().bucket().is_none());
    }
}

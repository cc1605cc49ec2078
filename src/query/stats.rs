//! Statistic selection
//!
//! Parses the `stats` request parameter into a [`StatSet`], a non-empty,
//! duplicate-free set of per-bucket aggregate functions.

use crate::error::ValidationError;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Statistics accepted by [`parse_stats`]
pub const ALLOWED_STATS: &[&str] = &["mean", "min", "max"];

/// Value used when the `stats` parameter is absent
pub const DEFAULT_STATS: &str = "mean";

/// Per-bucket aggregate function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Statistic {
    /// Arithmetic mean
    Mean,
    /// Minimum value
    Min,
    /// Maximum value
    Max,
}

impl Statistic {
    /// Label used in requests, responses and backend plans
    pub fn as_str(&self) -> &'static str {
        match self {
            Statistic::Mean => "mean",
            Statistic::Min => "min",
            Statistic::Max => "max",
        }
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Statistic {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mean" => Ok(Statistic::Mean),
            "min" => Ok(Statistic::Min),
            "max" => Ok(Statistic::Max),
            other => Err(ValidationError::InvalidStat {
                token: other.to_string(),
            }),
        }
    }
}

impl Serialize for Statistic {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Non-empty set of distinct statistics
///
/// Members are kept in label order, which is also the order the backend
/// sorts the statistic column in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StatSet(Vec<Statistic>);

impl StatSet {
    /// Set containing only `mean`
    pub fn mean() -> Self {
        Self(vec![Statistic::Mean])
    }

    /// Build a set from any iterator, collapsing duplicates
    ///
    /// Returns `None` when the iterator is empty.
    pub fn from_stats(stats: impl IntoIterator<Item = Statistic>) -> Option<Self> {
        let mut members: Vec<Statistic> = stats.into_iter().collect();
        members.sort_by_key(|s| s.as_str());
        members.dedup();
        (!members.is_empty()).then_some(Self(members))
    }

    /// Number of distinct statistics
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set has no members (never true for parsed sets)
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether responses must carry a `stat` label
    pub fn is_multi(&self) -> bool {
        self.0.len() > 1
    }

    /// Whether the set contains `stat`
    pub fn contains(&self, stat: Statistic) -> bool {
        self.0.contains(&stat)
    }

    /// Iterate members in label order
    pub fn iter(&self) -> impl Iterator<Item = Statistic> + '_ {
        self.0.iter().copied()
    }
}

impl fmt::Display for StatSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels: Vec<&str> = self.0.iter().map(|s| s.as_str()).collect();
        f.write_str(&labels.join(","))
    }
}

/// Parse the `stats` parameter
///
/// Splits on commas, trims and lower-cases each token and drops empty ones.
/// An absent or effectively empty parameter yields `{mean}`. The first token
/// outside [`ALLOWED_STATS`] fails the whole call.
pub fn parse_stats(param: Option<&str>) -> Result<StatSet, ValidationError> {
    let raw = param.unwrap_or(DEFAULT_STATS);
    let mut parsed = Vec::new();
    for token in raw.split(',') {
        let token = token.trim().to_lowercase();
        if token.is_empty() {
            continue;
        }
        parsed.push(token.parse::<Statistic>()?);
    }
    Ok(StatSet::from_stats(parsed).unwrap_or_else(StatSet::mean))
}

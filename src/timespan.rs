//! Query time window shared by every notebooklet run.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Inclusive start / exclusive end window over which queries run.
///
/// Every `run` call records the span it used on its result object so that
/// drill-down helpers and re-displays operate over the same window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSpan {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeSpan {
    /// Create a span from explicit bounds. Reversed bounds are swapped.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    /// Span covering the last `days` days, ending now
    pub fn last_days(days: i64) -> Self {
        let end = Utc::now();
        Self {
            start: end - Duration::days(days),
            end,
        }
    }

    /// Parse a span from two RFC 3339 timestamps
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        let start = DateTime::parse_from_rfc3339(start)?.with_timezone(&Utc);
        let end = DateTime::parse_from_rfc3339(end)?.with_timezone(&Utc);
        Ok(Self::new(start, end))
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }
}

impl Default for TimeSpan {
    /// One day ending now, matching the window used when a caller supplies
    /// no timespan.
    fn default() -> Self {
        Self::last_days(1)
    }
}

impl std::fmt::Display for TimeSpan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} .. {}",
            self.start.to_rfc3339(),
            self.end.to_rfc3339()
        )
    }
}

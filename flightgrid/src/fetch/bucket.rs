//! Wall-clock time buckets.

use std::fmt;
use std::time::Duration;

use chrono::Utc;

/// Index of a fixed-width wall-clock window.
///
/// Two fetches of the same tile in the same bucket are expected to return
/// the same upstream answer, so the bucket is part of every tile key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeBucket(u64);

impl TimeBucket {
    /// Bucket containing the current instant.
    pub fn now(width: Duration) -> Self {
        Self::at_millis(Utc::now().timestamp_millis(), width)
    }

    /// Bucket containing the Unix time `millis`.
    ///
    /// A zero width is treated as one millisecond; times before the epoch
    /// fall into bucket zero.
    pub fn at_millis(millis: i64, width: Duration) -> Self {
        let width_ms = (width.as_millis() as u64).max(1);
        Self(millis.max(0) as u64 / width_ms)
    }

    pub fn from_index(index: u64) -> Self {
        Self(index)
    }

    pub fn index(&self) -> u64 {
        self.0
    }

    /// Unix time in milliseconds at which this bucket opens.
    pub fn start_millis(&self, width: Duration) -> i64 {
        let width_ms = (width.as_millis() as u64).max(1);
        i64::try_from(self.0.saturating_mul(width_ms)).unwrap_or(i64::MAX)
    }
}

impl fmt::Display for TimeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

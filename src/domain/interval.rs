//! Bounded time intervals and their cacheability

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// A closed-open UTC time range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateInterval {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl DateInterval {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, DomainError> {
        if start > end {
            return Err(DomainError::validation(format!(
                "Interval start {} is after its end {}",
                start, end
            )));
        }

        Ok(Self { start, end })
    }

    /// The whole UTC day containing `date`
    pub fn day(date: NaiveDate) -> Self {
        let start = date.and_time(chrono::NaiveTime::MIN).and_utc();

        Self {
            start,
            end: start + Duration::days(1),
        }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }

    /// Returns the interval as a cache key once it lies entirely in the past.
    ///
    /// An interval that has not ended may still receive data, so its results
    /// must not be cached.
    pub fn cache_key(&self, now: DateTime<Utc>) -> Option<Self> {
        (self.end < now).then_some(*self)
    }

    /// Like [`cache_key`](Self::cache_key), but also waits `settle` after the
    /// end for late-arriving data.
    pub fn settled_cache_key(&self, now: DateTime<Utc>, settle: Duration) -> Option<Self> {
        if self.end + settle > now {
            return None;
        }

        self.cache_key(now)
    }
}

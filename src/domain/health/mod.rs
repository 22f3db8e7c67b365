//! Health data domain - activity and heart-rate queries over time intervals

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{DateInterval, DomainError};

#[cfg(test)]
use mockall::automock;

/// Daily activity totals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivitySummary {
    pub date: NaiveDate,
    /// Active energy burned, in kilocalories
    pub active_energy_kcal: f64,
    pub exercise_minutes: f64,
}

impl ActivitySummary {
    pub fn new(date: NaiveDate, active_energy_kcal: f64, exercise_minutes: f64) -> Self {
        Self {
            date,
            active_energy_kcal,
            exercise_minutes,
        }
    }
}

/// One heart-rate reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartRateSample {
    pub recorded_at: DateTime<Utc>,
    pub beats_per_minute: u32,
}

impl HeartRateSample {
    pub fn new(recorded_at: DateTime<Utc>, beats_per_minute: u32) -> Self {
        Self {
            recorded_at,
            beats_per_minute,
        }
    }
}

/// Read access to a health data store
#[cfg_attr(test, automock)]
#[async_trait]
pub trait HealthDataSource: Send + Sync {
    /// Activity summaries for every day touched by `interval`
    async fn activity_summaries(
        &self,
        interval: &DateInterval,
    ) -> Result<Vec<ActivitySummary>, DomainError>;

    /// Heart-rate samples recorded within `interval`, or `None` if the store
    /// could not be queried
    async fn heart_rate_samples(&self, interval: &DateInterval) -> Option<Vec<HeartRateSample>>;
}

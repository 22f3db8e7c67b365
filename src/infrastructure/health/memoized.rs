use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;

use crate::domain::clock::{Clock, SystemClock};
use crate::domain::health::{ActivitySummary, HealthDataSource, HeartRateSample};
use crate::domain::memo::CacheName;
use crate::domain::{DateInterval, DomainError};
use crate::infrastructure::memo::Memoizer;

/// Heart-rate samples reach the store several minutes after they are taken
pub const HEART_RATE_SETTLE_MINUTES: i64 = 10;

/// Health data source wrapper that memoizes queries over finished intervals
#[derive(Debug)]
pub struct MemoizedHealthSource<S: HealthDataSource> {
    inner: S,
    memoizer: Arc<Memoizer>,
    clock: Arc<dyn Clock>,
    summaries_cache: CacheName,
    heart_rate_cache: CacheName,
}

impl<S: HealthDataSource> MemoizedHealthSource<S> {
    pub fn new(inner: S, memoizer: Arc<Memoizer>) -> Self {
        Self::with_clock(inner, memoizer, Arc::new(SystemClock))
    }

    pub fn with_clock(inner: S, memoizer: Arc<Memoizer>, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner,
            memoizer,
            clock,
            summaries_cache: CacheName::from_static("health.activity_summaries"),
            heart_rate_cache: CacheName::from_static("health.heart_rate_samples"),
        }
    }

    /// Scopes cache entries under `namespace`, so two wrapped sources sharing
    /// a memoizer do not see each other's results
    pub fn with_namespace(mut self, namespace: &CacheName) -> Result<Self, DomainError> {
        self.summaries_cache = namespace.child("activity_summaries")?;
        self.heart_rate_cache = namespace.child("heart_rate_samples")?;
        Ok(self)
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Total active energy in kilocalories, truncated
    pub async fn active_calories(&self, interval: &DateInterval) -> Result<u32, DomainError> {
        let summaries = self.activity_summaries(interval).await?;
        let total: f64 = summaries.iter().map(|s| s.active_energy_kcal).sum();
        Ok(total as u32)
    }

    pub async fn exercise_minutes(&self, interval: &DateInterval) -> Result<f64, DomainError> {
        let summaries = self.activity_summaries(interval).await?;
        Ok(summaries.iter().map(|s| s.exercise_minutes).sum())
    }
}

#[async_trait]
impl<S: HealthDataSource> HealthDataSource for MemoizedHealthSource<S> {
    async fn activity_summaries(
        &self,
        interval: &DateInterval,
    ) -> Result<Vec<ActivitySummary>, DomainError> {
        let key = interval.cache_key(self.clock.now());

        self.memoizer
            .try_memoize_async(&self.summaries_cache, key, move || {
                self.inner.activity_summaries(interval)
            })
            .await
    }

    async fn heart_rate_samples(&self, interval: &DateInterval) -> Option<Vec<HeartRateSample>> {
        let now = self.clock.now();
        let settle = Duration::minutes(HEART_RATE_SETTLE_MINUTES);
        let key = interval.settled_cache_key(now, settle);

        if key.is_none() {
            tracing::debug!(
                end = %interval.end(),
                "Heart rate interval not settled, querying without cache"
            );
        }

        let samples = self
            .memoizer
            .memoize_async(&self.heart_rate_cache, key, move || async move {
                self.inner
                    .heart_rate_samples(interval)
                    .await
                    .unwrap_or_default()
            })
            .await;

        Some(samples)
    }
}

//! In-memory health data source

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::domain::health::{ActivitySummary, HealthDataSource, HeartRateSample};
use crate::domain::{DateInterval, DomainError};

/// Health store kept in memory; counts queries so callers can observe caching
#[derive(Debug, Default)]
pub struct InMemoryHealthSource {
    summaries: RwLock<Vec<ActivitySummary>>,
    heart_rates: RwLock<Vec<HeartRateSample>>,
    unavailable: RwLock<Option<String>>,
    summary_queries: AtomicUsize,
    heart_rate_queries: AtomicUsize,
}

impl InMemoryHealthSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_summaries(self, summaries: Vec<ActivitySummary>) -> Self {
        *self.summaries.write().unwrap_or_else(|e| e.into_inner()) = summaries;
        self
    }

    pub fn with_heart_rates(self, samples: Vec<HeartRateSample>) -> Self {
        *self.heart_rates.write().unwrap_or_else(|e| e.into_inner()) = samples;
        self
    }

    pub fn add_summary(&self, summary: ActivitySummary) {
        self.summaries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(summary);
    }

    pub fn add_heart_rate(&self, sample: HeartRateSample) {
        self.heart_rates
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(sample);
    }

    /// Makes every query fail (summaries) or return nothing (heart rate)
    /// until [`set_available`](Self::set_available) is called
    pub fn set_unavailable(&self, reason: impl Into<String>) {
        *self.unavailable.write().unwrap_or_else(|e| e.into_inner()) = Some(reason.into());
    }

    pub fn set_available(&self) {
        *self.unavailable.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    pub fn summary_queries(&self) -> usize {
        self.summary_queries.load(Ordering::SeqCst)
    }

    pub fn heart_rate_queries(&self) -> usize {
        self.heart_rate_queries.load(Ordering::SeqCst)
    }

    fn unavailable_reason(&self) -> Option<String> {
        self.unavailable
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl HealthDataSource for InMemoryHealthSource {
    async fn activity_summaries(
        &self,
        interval: &DateInterval,
    ) -> Result<Vec<ActivitySummary>, DomainError> {
        self.summary_queries.fetch_add(1, Ordering::SeqCst);

        if let Some(reason) = self.unavailable_reason() {
            return Err(DomainError::upstream("in_memory_health", reason));
        }

        let first_day = interval.start().date_naive();
        let last_day = interval.end().date_naive();
        let ends_at_midnight = interval.end().time() == chrono::NaiveTime::MIN;

        let summaries = self.summaries.read().unwrap_or_else(|e| e.into_inner());

        Ok(summaries
            .iter()
            .filter(|s| {
                s.date >= first_day
                    && (s.date < last_day || (s.date == last_day && !ends_at_midnight))
            })
            .cloned()
            .collect())
    }

    async fn heart_rate_samples(&self, interval: &DateInterval) -> Option<Vec<HeartRateSample>> {
        self.heart_rate_queries.fetch_add(1, Ordering::SeqCst);

        if self.unavailable_reason().is_some() {
            return None;
        }

        let samples = self.heart_rates.read().unwrap_or_else(|e| e.into_inner());
        let mut matching: Vec<HeartRateSample> = samples
            .iter()
            .filter(|s| interval.contains(s.recorded_at))
            .copied()
            .collect();

        matching.sort_by_key(|s| s.recorded_at);
        Some(matching)
    }
}

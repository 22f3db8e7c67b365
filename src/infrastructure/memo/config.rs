use serde::Deserialize;

use crate::domain::memo::InFlightPolicy;

/// Configuration for [`Memoizer`](super::Memoizer)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemoizerConfig {
    /// Behavior when concurrent callers miss the same key
    #[serde(default)]
    pub in_flight: InFlightPolicy,
}

impl MemoizerConfig {
    pub fn with_in_flight(mut self, policy: InFlightPolicy) -> Self {
        self.in_flight = policy;
        self
    }

    /// Shorthand for [`InFlightPolicy::SingleFlight`]
    pub fn single_flight() -> Self {
        Self::default().with_in_flight(InFlightPolicy::SingleFlight)
    }
}

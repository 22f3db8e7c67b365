//! Concurrent-miss behavior

use serde::Deserialize;

use crate::domain::DomainError;

/// What happens when several callers miss the same key at the same time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InFlightPolicy {
    /// Every concurrent miss runs its own computation and returns its own
    /// result. The first value stored wins; later ones are discarded.
    #[default]
    Duplicate,
    /// The first concurrent miss runs the computation and the others await its
    /// result. Applies to the async variants only.
    #[serde(alias = "singleflight")]
    SingleFlight,
}

impl std::fmt::Display for InFlightPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InFlightPolicy::Duplicate => write!(f, "duplicate"),
            InFlightPolicy::SingleFlight => write!(f, "single_flight"),
        }
    }
}

impl std::str::FromStr for InFlightPolicy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "duplicate" => Ok(InFlightPolicy::Duplicate),
            "single_flight" | "singleflight" | "single-flight" => Ok(InFlightPolicy::SingleFlight),
            _ => Err(DomainError::configuration(format!(
                "Unknown in-flight policy: {}. Valid policies: duplicate, single_flight",
                s
            ))),
        }
    }
}

//! Memoization domain - call-site identities, concurrency policy and counters

mod name;
mod policy;
mod stats;

pub use name::CacheName;
pub use policy::InFlightPolicy;
pub use stats::MemoStats;

pub(crate) use stats::StatsRecorder;

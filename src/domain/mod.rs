//! Domain layer - memoization model and the data the cached call sites serve

pub mod clock;
pub mod error;
pub mod health;
pub mod icon;
pub mod interval;
pub mod memo;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::DomainError;
pub use health::{ActivitySummary, HealthDataSource, HeartRateSample};
pub use icon::{AppIcon, BundleId, IconSource, NativeApp};
pub use interval::DateInterval;
pub use memo::{CacheName, InFlightPolicy, MemoStats};

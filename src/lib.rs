//! Site Memo
//!
//! Process-wide memoization keyed by call site:
//! - Each call site names its own cache table with a [`CacheName`]
//! - An absent key bypasses the cache and always computes
//! - Failed computations are never stored
//! - Health data and app icon lookups built on top of it

pub mod config;
pub mod context;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;
pub use context::AppContext;
pub use domain::{CacheName, DomainError, InFlightPolicy, MemoStats};
pub use infrastructure::memo::{Memoizer, MemoizerConfig};

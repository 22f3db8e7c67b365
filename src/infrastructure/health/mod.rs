//! Health data infrastructure - in-memory store and memoizing wrapper

mod in_memory;
mod memoized;

pub use in_memory::InMemoryHealthSource;
pub use memoized::{MemoizedHealthSource, HEART_RATE_SETTLE_MINUTES};

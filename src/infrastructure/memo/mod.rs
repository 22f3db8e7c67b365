//! Memoization infrastructure

mod config;
mod memoizer;

pub use config::MemoizerConfig;
pub use memoizer::Memoizer;

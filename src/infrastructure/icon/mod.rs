//! App icon infrastructure - store lookup and memoized resolution

mod itunes;
mod resolver;

pub use itunes::{ITunesIconSource, DEFAULT_ITUNES_BASE_URL};
pub use resolver::AppIconResolver;

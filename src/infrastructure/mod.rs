//! Infrastructure layer - cache engine and external data sources

pub mod health;
pub mod icon;
pub mod logging;
pub mod memo;

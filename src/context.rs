//! Application context owning the shared memoizer

use std::sync::Arc;

use crate::config::AppConfig;
use crate::domain::health::HealthDataSource;
use crate::domain::DomainError;
use crate::infrastructure::health::MemoizedHealthSource;
use crate::infrastructure::icon::{AppIconResolver, ITunesIconSource};
use crate::infrastructure::logging::init_logging;
use crate::infrastructure::memo::Memoizer;

/// Owns configuration and the one [`Memoizer`] whose cache lives as long as
/// the context. Call sites receive the memoizer by `Arc`.
#[derive(Debug, Clone)]
pub struct AppContext {
    config: AppConfig,
    memoizer: Arc<Memoizer>,
}

impl AppContext {
    pub fn new(config: AppConfig) -> Self {
        let memoizer = Arc::new(Memoizer::with_config(config.memoizer.clone()));

        Self { config, memoizer }
    }

    /// Loads configuration from files and environment, then sets up logging
    pub fn load() -> Result<Self, DomainError> {
        let config = AppConfig::load()
            .map_err(|e| DomainError::configuration(format!("Failed to load config: {}", e)))?;

        init_logging(&config.logging);

        let context = Self::new(config);
        tracing::info!(
            in_flight = %context.memoizer.policy(),
            "Application context ready"
        );

        Ok(context)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn memoizer(&self) -> Arc<Memoizer> {
        Arc::clone(&self.memoizer)
    }

    /// Wraps `inner` so its finished-interval queries share this context's cache
    pub fn health_source<S: HealthDataSource>(&self, inner: S) -> MemoizedHealthSource<S> {
        MemoizedHealthSource::new(inner, self.memoizer())
    }

    pub fn icon_resolver(&self) -> Result<AppIconResolver<ITunesIconSource>, DomainError> {
        let icons = &self.config.icons;
        let source = ITunesIconSource::with_base_url(&icons.lookup_base_url, icons.timeout())?;
        let resolver = AppIconResolver::new(source, self.memoizer());

        Ok(match &icons.own_bundle_prefix {
            Some(prefix) => resolver.with_own_bundle_prefix(prefix.clone()),
            None => resolver,
        })
    }
}

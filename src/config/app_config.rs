use serde::Deserialize;

use crate::infrastructure::icon::DEFAULT_ITUNES_BASE_URL;
use crate::infrastructure::memo::MemoizerConfig;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub memoizer: MemoizerConfig,
    #[serde(default)]
    pub icons: IconConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Settings for the app icon lookup
#[derive(Debug, Clone, Deserialize)]
pub struct IconConfig {
    #[serde(default = "default_lookup_base_url")]
    pub lookup_base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Bundle id of the host app; matching ids use the bundled icon
    #[serde(default)]
    pub own_bundle_prefix: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_lookup_base_url() -> String {
    DEFAULT_ITUNES_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl Default for IconConfig {
    fn default() -> Self {
        Self {
            lookup_base_url: default_lookup_base_url(),
            timeout_secs: default_timeout_secs(),
            own_bundle_prefix: None,
        }
    }
}

impl IconConfig {
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }
}

impl AppConfig {
    /// Loads `config/default`, then `config/local`, then `MEMO__*` environment
    /// variables, each overriding the previous
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("MEMO")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    pub fn from_toml_str(toml: &str) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::memo::InFlightPolicy;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();

        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.memoizer.in_flight, InFlightPolicy::Duplicate);
        assert_eq!(config.icons.lookup_base_url, "http://itunes.apple.com");
        assert_eq!(config.icons.timeout(), std::time::Duration::from_secs(10));
    }

    #[test]
    fn test_from_toml() {
        let config = AppConfig::from_toml_str(
            r#"
            [logging]
            level = "debug"
            format = "json"

            [memoizer]
            in_flight = "single_flight"

            [icons]
            lookup_base_url = "http://localhost:8089"
            own_bundle_prefix = "com.example.burn"
            "#,
        )
        .unwrap();

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.memoizer.in_flight, InFlightPolicy::SingleFlight);
        assert_eq!(config.icons.lookup_base_url, "http://localhost:8089");
        assert_eq!(config.icons.timeout_secs, 10);
        assert_eq!(
            config.icons.own_bundle_prefix.as_deref(),
            Some("com.example.burn")
        );
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config.memoizer.in_flight, InFlightPolicy::Duplicate);
    }

    #[test]
    fn test_unknown_policy_rejected() {
        let result = AppConfig::from_toml_str(
            r#"
            [memoizer]
            in_flight = "eager"
            "#,
        );

        assert!(result.is_err());
    }

    #[test]
    fn test_load_without_files() {
        let config = AppConfig::load().unwrap();
        assert_eq!(config.icons.timeout_secs, 10);
    }
}

//! App icon domain - bundle identifiers and icon sources

use async_trait::async_trait;
use bytes::Bytes;

use crate::domain::DomainError;

#[cfg(test)]
use mockall::automock;

const APPLE_HEALTH_PREFIX: &str = "com.apple.Health";
const APPLE_ACTIVITY_PREFIX: &str = "com.apple.health";
const WATCH_APP_SUFFIX: &str = ".watchkitapp";

/// An application bundle identifier such as `com.example.app.watchkitapp`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BundleId(String);

impl BundleId {
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();

        if id.trim().is_empty() {
            return Err(DomainError::validation("Bundle identifier cannot be empty"));
        }

        if id.chars().any(char::is_whitespace) {
            return Err(DomainError::validation(format!(
                "Bundle identifier '{}' contains whitespace",
                id
            )));
        }

        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The identifier used for store lookups; watch extensions share their
    /// parent app's listing.
    pub fn lookup_id(&self) -> &str {
        self.0.strip_suffix(WATCH_APP_SUFFIX).unwrap_or(&self.0)
    }
}

impl std::fmt::Display for BundleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Apps whose icons ship with the host application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeApp {
    AppleHealth,
    AppleWorkout,
    ThisApp,
}

impl NativeApp {
    /// Recognises bundled apps. `own_prefix` is the host app's bundle id,
    /// matched case-insensitively anywhere in `bundle_id`.
    pub fn classify(bundle_id: &BundleId, own_prefix: Option<&str>) -> Option<Self> {
        let id = bundle_id.as_str();

        if id.starts_with(APPLE_HEALTH_PREFIX) {
            return Some(NativeApp::AppleHealth);
        }

        if id.starts_with(APPLE_ACTIVITY_PREFIX) {
            return Some(NativeApp::AppleWorkout);
        }

        match own_prefix {
            Some(prefix) if !prefix.is_empty() => id
                .to_lowercase()
                .contains(&prefix.to_lowercase())
                .then_some(NativeApp::ThisApp),
            _ => None,
        }
    }

    /// Asset name of the bundled icon
    pub fn asset_name(&self) -> &'static str {
        match self {
            NativeApp::AppleHealth => "icn_appleHealthApp",
            NativeApp::AppleWorkout => "icn_watchActivityApp",
            NativeApp::ThisApp => "icn_appIcon",
        }
    }
}

/// A resolved icon
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppIcon {
    /// Shipped with the host app
    Bundled(NativeApp),
    /// Image bytes downloaded from a store listing
    Remote(Bytes),
    /// Generic fallback
    Placeholder,
}

/// Fetches icon image bytes for apps that are not bundled
#[cfg_attr(test, automock)]
#[async_trait]
pub trait IconSource: Send + Sync {
    async fn fetch_icon(&self, bundle_id: &BundleId) -> Result<Bytes, DomainError>;

    fn source_name(&self) -> &'static str;
}

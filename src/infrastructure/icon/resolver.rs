use std::sync::Arc;

use crate::domain::DomainError;
use crate::domain::icon::{AppIcon, BundleId, IconSource, NativeApp};
use crate::domain::memo::CacheName;
use crate::infrastructure::memo::Memoizer;

/// Resolves bundle identifiers to icons, remembering successful downloads
#[derive(Debug)]
pub struct AppIconResolver<S: IconSource> {
    source: S,
    memoizer: Arc<Memoizer>,
    own_bundle_prefix: Option<String>,
    icon_cache: CacheName,
}

impl<S: IconSource> AppIconResolver<S> {
    pub fn new(source: S, memoizer: Arc<Memoizer>) -> Self {
        Self {
            source,
            memoizer,
            own_bundle_prefix: None,
            icon_cache: CacheName::from_static("icons.by_bundle_id"),
        }
    }

    /// Scopes cached icons under `namespace`, so resolvers over different
    /// sources can share a memoizer
    pub fn with_namespace(mut self, namespace: &CacheName) -> Result<Self, DomainError> {
        self.icon_cache = namespace.child("by_bundle_id")?;
        Ok(self)
    }

    /// Treats bundle ids containing `prefix` as the host app
    pub fn with_own_bundle_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.own_bundle_prefix = Some(prefix.into());
        self
    }

    /// Bundled apps resolve immediately. Others are fetched once per bundle id;
    /// a failed fetch yields [`AppIcon::Placeholder`] and is retried next time.
    pub async fn resolve(&self, bundle_id: &BundleId) -> AppIcon {
        if let Some(native) = NativeApp::classify(bundle_id, self.own_bundle_prefix.as_deref()) {
            return AppIcon::Bundled(native);
        }

        let fetched = self
            .memoizer
            .try_memoize_async(&self.icon_cache, Some(bundle_id.clone()), move || {
                self.source.fetch_icon(bundle_id)
            })
            .await;

        match fetched {
            Ok(bytes) => AppIcon::Remote(bytes),
            Err(e) => {
                tracing::warn!(
                    bundle_id = %bundle_id,
                    source = self.source.source_name(),
                    error = %e,
                    "Failed to fetch app icon, using placeholder"
                );
                AppIcon::Placeholder
            }
        }
    }
}

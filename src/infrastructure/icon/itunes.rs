//! Icon source backed by the iTunes lookup API

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;

use crate::domain::icon::{BundleId, IconSource};
use crate::domain::DomainError;

pub const DEFAULT_ITUNES_BASE_URL: &str = "http://itunes.apple.com";

const SOURCE_NAME: &str = "itunes";

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    results: Vec<LookupResult>,
}

#[derive(Debug, Deserialize)]
struct LookupResult {
    #[serde(rename = "artworkUrl100")]
    artwork_url100: Option<String>,
}

fn upstream_error(message: String) -> DomainError {
    DomainError::upstream(SOURCE_NAME, message)
}

/// Looks up an app's store listing and downloads its 100px artwork
#[derive(Debug, Clone)]
pub struct ITunesIconSource {
    client: reqwest::Client,
    base_url: String,
}

impl ITunesIconSource {
    pub fn new(timeout: Duration) -> Result<Self, DomainError> {
        Self::with_base_url(DEFAULT_ITUNES_BASE_URL, timeout)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, DomainError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                DomainError::configuration(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn lookup_url(&self) -> String {
        format!("{}/lookup", self.base_url)
    }

    async fn artwork_url(&self, bundle_id: &BundleId) -> Result<String, DomainError> {
        let response = self
            .client
            .get(self.lookup_url())
            .query(&[("bundleId", bundle_id.lookup_id())])
            .send()
            .await
            .map_err(|e| upstream_error(format!("Lookup request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(upstream_error(format!(
                "Lookup returned HTTP {}",
                response.status()
            )));
        }

        let lookup: LookupResponse = response
            .json()
            .await
            .map_err(|e| upstream_error(format!("Failed to parse lookup response: {}", e)))?;

        let first = lookup
            .results
            .into_iter()
            .next()
            .ok_or_else(|| upstream_error(format!("No store listing for {}", bundle_id)))?;

        first
            .artwork_url100
            .ok_or_else(|| upstream_error(format!("Listing for {} has no artwork", bundle_id)))
    }
}

#[async_trait]
impl IconSource for ITunesIconSource {
    async fn fetch_icon(&self, bundle_id: &BundleId) -> Result<Bytes, DomainError> {
        let artwork_url = self.artwork_url(bundle_id).await?;

        tracing::debug!(bundle_id = %bundle_id, url = %artwork_url, "Downloading app icon");

        let response = self
            .client
            .get(&artwork_url)
            .send()
            .await
            .map_err(|e| upstream_error(format!("Artwork request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(upstream_error(format!(
                "Artwork returned HTTP {}",
                response.status()
            )));
        }

        response
            .bytes()
            .await
            .map_err(|e| upstream_error(format!("Failed to read artwork: {}", e)))
    }

    fn source_name(&self) -> &'static str {
        SOURCE_NAME
    }
}

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::callback::MediaFormat;
use crate::config::ResolverConfig;
use crate::error::UpstreamError;

/// A downloadable file as reported by the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    pub format: String,
    pub file_size: String,
    pub download_url: String,
}

#[derive(Debug, Deserialize)]
struct ResolveResponse {
    #[serde(default)]
    data: Vec<MediaItem>,
}

/// Turns a platform url plus a wanted format into a concrete download.
#[async_trait]
pub trait MediaResolver: Send + Sync {
    async fn resolve(
        &self,
        route: &str,
        url: &str,
        format: MediaFormat,
    ) -> Result<MediaItem, UpstreamError>;
}

pub struct ResolverClient {
    client: reqwest::Client,
    base_url: String,
}

impl ResolverClient {
    pub fn new(config: &ResolverConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }
}

#[async_trait]
impl MediaResolver for ResolverClient {
    async fn resolve(
        &self,
        route: &str,
        url: &str,
        format: MediaFormat,
    ) -> Result<MediaItem, UpstreamError> {
        let endpoint = format!("{}{}", self.base_url, route);

        debug!("Resolving {} as {} via {}", url, format, endpoint);

        let response = self
            .client
            .get(&endpoint)
            .query(&[("url", url), ("format", format.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        let parsed: ResolveResponse =
            serde_json::from_str(&body).map_err(UpstreamError::Malformed)?;

        parsed.data.into_iter().next().ok_or(UpstreamError::Empty)
    }
}

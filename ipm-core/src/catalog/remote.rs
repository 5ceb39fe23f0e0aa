//! Remote catalog fetching
//!
//! The catalog is re-fetched on every call; there is no cache.

use async_trait::async_trait;

use super::index::CatalogStore;
use crate::error::{IpmError, IpmResult};

/// Default owner of the repository publishing the catalog
pub const DEFAULT_REPO_OWNER: &str = "efabless";

/// Default name of the repository publishing the catalog
pub const DEFAULT_REPO_NAME: &str = "ipm";

/// Catalog file name inside the publishing repository
pub const CATALOG_FILE_NAME: &str = "Verified_IPs.json";

/// Raw URL of the catalog for a GitHub repository
pub fn catalog_url(owner: &str, name: &str) -> String {
    format!("https://raw.githubusercontent.com/{owner}/{name}/main/{CATALOG_FILE_NAME}")
}

/// Fetches raw bytes over the network
///
/// Implementations return [`IpmError::CatalogUnavailable`] for transport
/// failures and non-success statuses.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn get(&self, url: &str) -> IpmResult<Vec<u8>>;
}

/// Fetches and parses the remote catalog
pub struct CatalogService<C: HttpClient> {
    client: C,
    url: String,
}

impl<C: HttpClient> CatalogService<C> {
    pub fn new(client: C, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch a fresh catalog snapshot
    pub async fn fetch_catalog(&self) -> IpmResult<CatalogStore> {
        tracing::debug!("Fetching IP catalog from {}", self.url);
        let bytes = self.client.get(&self.url).await?;
        let store = CatalogStore::from_json(&self.url, &bytes)?;
        tracing::debug!("Fetched {} catalog entries", store.ip_count());
        Ok(store)
    }
}

/// Reads `file://` URLs from the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FileClient;

#[async_trait]
impl HttpClient for FileClient {
    async fn get(&self, url: &str) -> IpmResult<Vec<u8>> {
        let path = url
            .strip_prefix("file://")
            .ok_or_else(|| IpmError::CatalogUnavailable {
                url: url.to_string(),
                reason: "not a file:// URL".to_string(),
            })?;
        tokio::fs::read(path)
            .await
            .map_err(|e| IpmError::CatalogUnavailable {
                url: url.to_string(),
                reason: e.to_string(),
            })
    }
}

/// Sends `file://` URLs to [`FileClient`] and everything else to `remote`
#[derive(Debug, Clone)]
pub struct LocalOrRemote<C> {
    remote: C,
}

impl<C: HttpClient> LocalOrRemote<C> {
    pub fn new(remote: C) -> Self {
        Self { remote }
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for LocalOrRemote<C> {
    async fn get(&self, url: &str) -> IpmResult<Vec<u8>> {
        if url.starts_with("file://") {
            FileClient.get(url).await
        } else {
            self.remote.get(url).await
        }
    }
}

#[cfg(feature = "catalog")]
pub use http::ReqwestClient;

#[cfg(feature = "catalog")]
mod http {
    use super::*;
    use std::time::Duration;

    /// Default HTTP request timeout (30 seconds)
    const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// `reqwest`-backed [`HttpClient`]
    #[derive(Clone)]
    pub struct ReqwestClient {
        client: reqwest::Client,
    }

    impl ReqwestClient {
        pub fn new() -> IpmResult<Self> {
            let client = reqwest::Client::builder()
                .user_agent(concat!("ipm/", env!("CARGO_PKG_VERSION")))
                .timeout(DEFAULT_TIMEOUT)
                .build()
                .map_err(|e| IpmError::CatalogUnavailable {
                    url: String::new(),
                    reason: format!("failed to create HTTP client: {e}"),
                })?;
            Ok(Self { client })
        }

        /// Underlying client, shared with the archive downloader
        pub fn inner(&self) -> &reqwest::Client {
            &self.client
        }
    }

    #[async_trait]
    impl HttpClient for ReqwestClient {
        async fn get(&self, url: &str) -> IpmResult<Vec<u8>> {
            let unavailable = |reason: String| IpmError::CatalogUnavailable {
                url: url.to_string(),
                reason,
            };

            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| unavailable(e.to_string()))?;

            if !response.status().is_success() {
                return Err(unavailable(format!("HTTP {}", response.status())));
            }

            let bytes = response
                .bytes()
                .await
                .map_err(|e| unavailable(format!("failed to read response body: {e}")))?;
            Ok(bytes.to_vec())
        }
    }
}

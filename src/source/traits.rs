use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;

/// A fetched CDN asset plus the transfer metadata the monitor consumes.
#[derive(Debug, Clone)]
pub struct FetchedAsset {
    /// Absolute URL the bytes came from.
    pub url: String,
    pub bytes: Bytes,
    pub content_type: Option<String>,
    /// Bytes on the wire. Zero or smaller than `bytes.len()` indicates a
    /// cache-served response.
    pub transfer_size: u64,
    pub duration: Duration,
}

impl FetchedAsset {
    pub fn decoded_size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

#[async_trait]
pub trait BundleSource: Send + Sync {
    /// Fetch the asset at an absolute URL. Errors carry enough context to
    /// name the URL and the failure class (status, connect failure).
    async fn fetch(&self, url: &str) -> Result<FetchedAsset>;
}

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{Client, RequestBuilder};
use tracing::{debug, warn};

use super::traits::{BundleSource, FetchedAsset};
use crate::monitor::timing::{epoch_millis, ResourceTimingLedger, TransferRecord};

/// CDN-backed source: plain GETs with optional custom headers, reporting
/// each completed transfer to an attached timing ledger.
pub struct HttpBundleSource {
    client: Client,
    headers: RwLock<HashMap<String, String>>,
    ledger: RwLock<Option<Arc<ResourceTimingLedger>>>,
}

impl HttpBundleSource {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            headers: RwLock::new(HashMap::new()),
            ledger: RwLock::new(None),
        }
    }

    pub fn with_headers(headers: HashMap<String, String>) -> Self {
        let source = Self::new();
        *source.headers.write() = headers;
        source
    }

    /// Attach (or replace) the ledger that receives transfer records.
    pub fn attach_timing(&self, ledger: Arc<ResourceTimingLedger>) {
        *self.ledger.write() = Some(ledger);
    }

    /// Build a GET request with the configured custom headers.
    fn build_request(&self, url: &str) -> RequestBuilder {
        let headers = self.headers.read().clone();
        let mut req = self.client.get(url);
        for (k, v) in &headers {
            req = req.header(k.as_str(), v.as_str());
        }
        req
    }

    fn record_transfer(&self, asset: &FetchedAsset, started_epoch_ms: u64) {
        let ledger = self.ledger.read();
        if let Some(ledger) = ledger.as_ref() {
            ledger.record(TransferRecord::new(
                asset.url.clone(),
                started_epoch_ms,
                asset.duration.as_millis() as u64,
                asset.transfer_size,
                asset.decoded_size(),
            ));
        }
    }
}

impl Default for HttpBundleSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BundleSource for HttpBundleSource {
    async fn fetch(&self, url: &str) -> Result<FetchedAsset> {
        let started_epoch_ms = epoch_millis();
        let t0 = Instant::now();

        let resp = self.build_request(url).send().await?;

        let status = resp.status();
        if !status.is_success() {
            warn!("fetch failed status={} url={}", status.as_u16(), url);
            return Err(anyhow!("fetch failed: HTTP {} for {}", status.as_u16(), url));
        }

        let content_type = resp
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());

        // Wire size from the response header when present; body length otherwise.
        let content_length = resp
            .headers()
            .get("content-length")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());

        let bytes = resp.bytes().await?;
        let duration = t0.elapsed();

        let asset = FetchedAsset {
            url: url.to_string(),
            transfer_size: content_length.unwrap_or(bytes.len() as u64),
            content_type,
            bytes,
            duration,
        };

        debug!(
            "fetched url={} bytes={} elapsed_ms={}",
            asset.url,
            asset.decoded_size(),
            asset.duration.as_millis()
        );
        self.record_transfer(&asset, started_epoch_ms);

        Ok(asset)
    }
}

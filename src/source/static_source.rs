use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;

use super::traits::{BundleSource, FetchedAsset};

/// In-memory source for offline development and tests. Assets are keyed by
/// full URL; a lookup falls back to the file-name suffix so the same entry
/// serves any mirror.
pub struct StaticBundleSource {
    assets: RwLock<HashMap<String, Bytes>>,
    fetch_count: AtomicU32,
}

impl StaticBundleSource {
    pub fn new() -> Self {
        Self {
            assets: RwLock::new(HashMap::new()),
            fetch_count: AtomicU32::new(0),
        }
    }

    /// Register an asset under a full URL or a bare file name.
    pub fn insert(&self, key: impl Into<String>, bytes: impl Into<Bytes>) {
        self.assets.write().insert(key.into(), bytes.into());
    }

    /// Number of `fetch` calls made against this source, hits and misses.
    pub fn fetch_count(&self) -> u32 {
        self.fetch_count.load(Ordering::Relaxed)
    }

    fn lookup(&self, url: &str) -> Option<Bytes> {
        let assets = self.assets.read();
        if let Some(bytes) = assets.get(url) {
            return Some(bytes.clone());
        }
        let file_name = url.rsplit('/').next()?;
        assets.get(file_name).cloned()
    }
}

impl Default for StaticBundleSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BundleSource for StaticBundleSource {
    async fn fetch(&self, url: &str) -> Result<FetchedAsset> {
        self.fetch_count.fetch_add(1, Ordering::Relaxed);
        let bytes = self
            .lookup(url)
            .ok_or_else(|| anyhow!("asset not found: {}", url))?;
        Ok(FetchedAsset {
            url: url.to_string(),
            transfer_size: bytes.len() as u64,
            content_type: None,
            bytes,
            duration: Duration::ZERO,
        })
    }
}

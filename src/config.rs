use serde::Deserialize;

/// Default number of outer load attempts before giving up.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Base delay for the capped exponential backoff between attempts (1 s).
pub const BACKOFF_BASE_MS: u64 = 1000;

/// Upper bound on the backoff delay between attempts (5 s).
pub const BACKOFF_CAP_MS: u64 = 5000;

/// Default per-fetch deadline for bundle and manifest requests (30 s).
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 30_000;

/// Core bundle file name used when the manifest is unavailable.
pub const DEFAULT_CORE_BUNDLE: &str = "dataprism-core.es.js";

/// Plugins bundle file name used when the manifest is unavailable.
pub const DEFAULT_PLUGINS_BUNDLE: &str = "dataprism-plugins.es.js";

/// Manifest file name, fetched from `{manifest_base_url}/{version}/`.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Total-asset size budget checked by the monitor (8 MiB).
pub const BUNDLE_SIZE_BUDGET_BYTES: u64 = 8 * 1024 * 1024;

/// Average asset load time budget checked by the monitor (2 s).
pub const LOAD_TIME_BUDGET_MS: u64 = 2000;

/// Cache hit ratio target checked by the monitor.
pub const CACHE_HIT_TARGET: f64 = 0.95;

/// Top-level configuration for the dependency loader.
#[derive(Debug, Clone, Deserialize)]
pub struct CdnConfig {
    /// Base URLs tried in order for the core bundle.
    pub core_base_urls: Vec<String>,
    /// Base URLs tried in order for the plugins bundle.
    pub plugins_base_urls: Vec<String>,
    /// Base URL for the versioned manifest.
    pub manifest_base_url: String,
    /// Version path component for the manifest fetch.
    pub version: String,
    /// Per-fetch deadline in milliseconds.
    pub fetch_timeout_ms: u64,
    /// Number of outer load attempts.
    pub retries: u32,
    /// Whether a successful load is cached for the loader's lifetime.
    pub enable_cache: bool,
}

impl CdnConfig {
    pub fn fetch_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.fetch_timeout_ms)
    }
}

impl Default for CdnConfig {
    fn default() -> Self {
        Self {
            core_base_urls: vec![
                "https://cdn.jsdelivr.net/npm/@dataprism/core@latest/dist".to_string(),
                "https://unpkg.com/@dataprism/core@latest/dist".to_string(),
            ],
            plugins_base_urls: vec![
                "https://cdn.jsdelivr.net/npm/@dataprism/plugins@latest/dist".to_string(),
                "https://unpkg.com/@dataprism/plugins@latest/dist".to_string(),
            ],
            manifest_base_url: "https://cdn.jsdelivr.net/npm/@dataprism/core@latest".to_string(),
            version: "latest".to_string(),
            fetch_timeout_ms: DEFAULT_FETCH_TIMEOUT_MS,
            retries: DEFAULT_RETRY_ATTEMPTS,
            enable_cache: true,
        }
    }
}

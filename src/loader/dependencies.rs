// Dependency loader — obtains the engine and plugin modules from the CDN,
// hiding transient network failure behind retries, mirror failover and mock
// substitution.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use parking_lot::{Mutex, RwLock};
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use super::resolver::{BundleArtifact, EmbeddedResolver, ModuleResolver};
use crate::config::{
    CdnConfig, BACKOFF_BASE_MS, BACKOFF_CAP_MS, DEFAULT_CORE_BUNDLE, DEFAULT_PLUGINS_BUNDLE,
    MANIFEST_FILE,
};
use crate::detect::bundle::classify_asset;
use crate::engine::traits::{CoreModule, PluginModule};
use crate::error::LoaderError;
use crate::manifest::BundleManifest;
use crate::monitor::assets::AssetLoadMonitor;
use crate::source::http_source::HttpBundleSource;
use crate::source::traits::{BundleSource, FetchedAsset};

/// Where a resolved module came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleOrigin {
    Cdn { url: String },
    Mock,
}

/// Overall result class of a completed load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Both modules came from the CDN.
    Loaded,
    /// At least one module is a mock substitute.
    MockSubstituted,
}

/// Loader lifecycle, queryable at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    Idle,
    Loading,
    Loaded,
    MockSubstituted,
}

/// The two module references a successful load produces, with their origins.
pub struct LoadedDependencies {
    pub core: Arc<dyn CoreModule>,
    pub core_origin: ModuleOrigin,
    pub plugins: Arc<dyn PluginModule>,
    pub plugins_origin: ModuleOrigin,
}

impl std::fmt::Debug for LoadedDependencies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedDependencies")
            .field("core_origin", &self.core_origin)
            .field("plugins_origin", &self.plugins_origin)
            .finish_non_exhaustive()
    }
}

impl LoadedDependencies {
    pub fn outcome(&self) -> LoadOutcome {
        let core_cdn = matches!(self.core_origin, ModuleOrigin::Cdn { .. });
        let plugins_cdn = matches!(self.plugins_origin, ModuleOrigin::Cdn { .. });
        if core_cdn && plugins_cdn {
            LoadOutcome::Loaded
        } else {
            LoadOutcome::MockSubstituted
        }
    }
}

type LoadResult = Result<Arc<LoadedDependencies>, LoaderError>;

struct LoaderState {
    phase: LoadPhase,
    cached: Option<Arc<LoadedDependencies>>,
    /// Bumped by `reset`; a load finishing under an older epoch is returned
    /// to its caller but not published.
    epoch: u64,
    /// Bumped on every published load so queued callers can adopt the result
    /// instead of fetching again.
    load_seq: u64,
    last_outcome: Option<(u64, LoadResult)>,
}

pub struct DependencyLoader {
    config: CdnConfig,
    source: Arc<dyn BundleSource>,
    resolver: Arc<dyn ModuleResolver>,
    monitor: Arc<AssetLoadMonitor>,
    manifest: RwLock<Option<Arc<BundleManifest>>>,
    manifest_lock: AsyncMutex<()>,
    load_lock: AsyncMutex<()>,
    state: Mutex<LoaderState>,
}

impl DependencyLoader {
    /// Production wiring: HTTP source reporting into the monitor's timing
    /// ledger, embedded resolver.
    pub fn new(config: CdnConfig) -> Self {
        let monitor = Arc::new(AssetLoadMonitor::new());
        let source = Arc::new(HttpBundleSource::new());
        source.attach_timing(monitor.ledger());
        Self::assemble(config, source, Arc::new(EmbeddedResolver), monitor)
    }

    /// Custom source and resolver, primarily for tests and embedders.
    pub fn with_parts(
        config: CdnConfig,
        source: Arc<dyn BundleSource>,
        resolver: Arc<dyn ModuleResolver>,
    ) -> Self {
        let monitor = Arc::new(AssetLoadMonitor::new());
        Self::assemble(config, source, resolver, monitor)
    }

    fn assemble(
        config: CdnConfig,
        source: Arc<dyn BundleSource>,
        resolver: Arc<dyn ModuleResolver>,
        monitor: Arc<AssetLoadMonitor>,
    ) -> Self {
        Self {
            config,
            source,
            resolver,
            monitor,
            manifest: RwLock::new(None),
            manifest_lock: AsyncMutex::new(()),
            load_lock: AsyncMutex::new(()),
            state: Mutex::new(LoaderState {
                phase: LoadPhase::Idle,
                cached: None,
                epoch: 0,
                load_seq: 0,
                last_outcome: None,
            }),
        }
    }

    pub fn config(&self) -> &CdnConfig {
        &self.config
    }

    pub fn monitor(&self) -> Arc<AssetLoadMonitor> {
        Arc::clone(&self.monitor)
    }

    pub fn phase(&self) -> LoadPhase {
        self.state.lock().phase
    }

    pub fn cached(&self) -> Option<Arc<LoadedDependencies>> {
        self.state.lock().cached.as_ref().map(Arc::clone)
    }

    /// Manifest resolved so far, if any load cycle got one.
    pub fn manifest(&self) -> Option<Arc<BundleManifest>> {
        self.manifest.read().as_ref().map(Arc::clone)
    }

    /// Capability probe; `false` means `load` would fail with `Unsupported`
    /// without touching the network.
    pub async fn is_cdn_supported(&self) -> bool {
        self.resolver.probe().await.is_ok()
    }

    /// Obtain the dependencies. Returns the cached result when caching is
    /// enabled, joins an in-flight load instead of duplicating it, and
    /// otherwise performs a fresh load.
    pub async fn load(&self) -> LoadResult {
        if self.config.enable_cache {
            if let Some(cached) = &self.state.lock().cached {
                return Ok(Arc::clone(cached));
            }
        }

        if let Err(e) = self.resolver.probe().await {
            return Err(LoaderError::Unsupported(format!("{:#}", e)));
        }

        let entry_seq = self.state.lock().load_seq;
        let _guard = self.load_lock.lock().await;

        // While queued another caller may have finished a load; adopt its
        // result rather than fetching again.
        let epoch0 = {
            let mut state = self.state.lock();
            if self.config.enable_cache {
                if let Some(cached) = &state.cached {
                    return Ok(Arc::clone(cached));
                }
            }
            if let Some((seq, outcome)) = &state.last_outcome {
                if *seq > entry_seq {
                    return outcome.clone();
                }
            }
            state.phase = LoadPhase::Loading;
            state.epoch
        };

        info!(
            "loading dependencies version={} attempts={}",
            self.config.version, self.config.retries
        );
        let result = self.perform_load().await;

        let mut state = self.state.lock();
        state.load_seq += 1;
        if state.epoch == epoch0 {
            match &result {
                Ok(deps) => {
                    state.phase = match deps.outcome() {
                        LoadOutcome::Loaded => LoadPhase::Loaded,
                        LoadOutcome::MockSubstituted => LoadPhase::MockSubstituted,
                    };
                    if self.config.enable_cache {
                        state.cached = Some(Arc::clone(deps));
                    }
                }
                Err(_) => state.phase = LoadPhase::Idle,
            }
            state.last_outcome = Some((state.load_seq, result.clone()));
        }
        result
    }

    /// Clear cached dependencies and published outcomes; the next `load`
    /// fetches from scratch. The resolved manifest is kept.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.cached = None;
        state.last_outcome = None;
        state.phase = LoadPhase::Idle;
        state.epoch += 1;
        debug!("loader reset, next load fetches fresh");
    }

    /// Load just the core module, with the same fallback policy as `load`.
    pub async fn load_core(&self) -> Result<(Arc<dyn CoreModule>, ModuleOrigin)> {
        let manifest = self.advisory_manifest().await;
        self.load_core_bundle(manifest.as_deref()).await
    }

    /// Load just the plugins module, with the same fallback policy as `load`.
    pub async fn load_plugins(&self) -> Result<(Arc<dyn PluginModule>, ModuleOrigin)> {
        let manifest = self.advisory_manifest().await;
        self.load_plugins_bundle(manifest.as_deref()).await
    }

    /// Fetch the manifest, retrying with backoff, or return the cached one.
    /// Failure here never blocks `load`; bundle loads fall back to the
    /// default file names.
    pub async fn load_manifest(&self) -> Result<Arc<BundleManifest>> {
        self.ensure_manifest().await
    }

    async fn perform_load(&self) -> LoadResult {
        let manifest = self.advisory_manifest().await;

        let attempts = self.config.retries.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match self.attempt_load(manifest.as_deref()).await {
                Ok(deps) => {
                    let deps = Arc::new(deps);
                    info!("dependencies ready outcome={:?}", deps.outcome());
                    return Ok(deps);
                }
                Err(e) => {
                    last_error = format!("{:#}", e);
                    if attempt < attempts {
                        let delay = backoff_delay(attempt);
                        warn!(
                            "dependency load attempt {} failed, retrying in {} ms: {:#}",
                            attempt,
                            delay.as_millis(),
                            e
                        );
                        sleep(delay).await;
                    } else {
                        warn!(
                            "dependency load failed after {} attempts: {:#}",
                            attempts, e
                        );
                    }
                }
            }
        }

        Err(LoaderError::ExhaustedRetries {
            attempts,
            last_error,
        })
    }

    async fn attempt_load(&self, manifest: Option<&BundleManifest>) -> Result<LoadedDependencies> {
        // Core and plugins fetch concurrently; both must settle before the
        // attempt concludes.
        let (core, plugins) = tokio::join!(
            self.load_core_bundle(manifest),
            self.load_plugins_bundle(manifest)
        );
        let (core, core_origin) = core?;
        let (plugins, plugins_origin) = plugins?;

        Ok(LoadedDependencies {
            core,
            core_origin,
            plugins,
            plugins_origin,
        })
    }

    /// CDN failure for one bundle is absorbed here: the mock substitute keeps
    /// the application functioning in degraded mode. Only a failing mock
    /// factory propagates to the retry loop.
    async fn load_core_bundle(
        &self,
        manifest: Option<&BundleManifest>,
    ) -> Result<(Arc<dyn CoreModule>, ModuleOrigin)> {
        let file = manifest
            .and_then(|m| m.bundle_file("core"))
            .unwrap_or(DEFAULT_CORE_BUNDLE)
            .to_string();
        let version = self.version_hint(manifest);

        match self.resolve_core_from_cdn(&file, &version).await {
            Ok(resolved) => Ok(resolved),
            Err(e) => {
                warn!("core bundle unavailable, substituting mock: {:#}", e);
                let module = self.resolver.mock_core()?;
                Ok((module, ModuleOrigin::Mock))
            }
        }
    }

    async fn load_plugins_bundle(
        &self,
        manifest: Option<&BundleManifest>,
    ) -> Result<(Arc<dyn PluginModule>, ModuleOrigin)> {
        let file = manifest
            .and_then(|m| m.bundle_file("plugins"))
            .unwrap_or(DEFAULT_PLUGINS_BUNDLE)
            .to_string();
        let version = self.version_hint(manifest);

        match self.resolve_plugins_from_cdn(&file, &version).await {
            Ok(resolved) => Ok(resolved),
            Err(e) => {
                warn!("plugins bundle unavailable, substituting mock: {:#}", e);
                let module = self.resolver.mock_plugins()?;
                Ok((module, ModuleOrigin::Mock))
            }
        }
    }

    async fn resolve_core_from_cdn(
        &self,
        file: &str,
        version: &str,
    ) -> Result<(Arc<dyn CoreModule>, ModuleOrigin)> {
        let mut last_error = anyhow!("no core base urls configured");
        for base in &self.config.core_base_urls {
            let url = join_url(base, file);
            match self.fetch_bundle(&url, version).await {
                Ok(artifact) => match self.resolver.resolve_core(&artifact).await {
                    Ok(module) => {
                        debug!("core resolved url={} version={}", url, module.version());
                        return Ok((module, ModuleOrigin::Cdn { url }));
                    }
                    Err(e) => {
                        warn!("core bundle rejected url={}: {:#}", url, e);
                        last_error = e;
                    }
                },
                Err(e) => {
                    warn!("core fetch failed url={}: {:#}", url, e);
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }

    async fn resolve_plugins_from_cdn(
        &self,
        file: &str,
        version: &str,
    ) -> Result<(Arc<dyn PluginModule>, ModuleOrigin)> {
        let mut last_error = anyhow!("no plugins base urls configured");
        for base in &self.config.plugins_base_urls {
            let url = join_url(base, file);
            match self.fetch_bundle(&url, version).await {
                Ok(artifact) => match self.resolver.resolve_plugins(&artifact).await {
                    Ok(module) => {
                        debug!("plugins resolved url={} version={}", url, module.version());
                        return Ok((module, ModuleOrigin::Cdn { url }));
                    }
                    Err(e) => {
                        warn!("plugins bundle rejected url={}: {:#}", url, e);
                        last_error = e;
                    }
                },
                Err(e) => {
                    warn!("plugins fetch failed url={}: {:#}", url, e);
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }

    async fn fetch_bundle(&self, url: &str, version: &str) -> Result<BundleArtifact> {
        let asset = self.tracked_fetch(url).await?;
        let kind = classify_asset(&asset);
        Ok(BundleArtifact {
            url: asset.url,
            kind,
            version_hint: Some(version.to_string()),
            bytes: asset.bytes,
        })
    }

    /// Fetch guarded by the configured timeout, with the asset monitor
    /// observing start and completion.
    async fn tracked_fetch(&self, url: &str) -> Result<FetchedAsset> {
        let tracking_id = self.monitor.start_tracking(url);
        let fetched = match timeout(self.config.fetch_timeout(), self.source.fetch(url)).await {
            Ok(Ok(asset)) => Ok(asset),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(anyhow!(
                "fetch timed out after {} ms: {}",
                self.config.fetch_timeout_ms,
                url
            )),
        };
        match &fetched {
            Ok(asset) => self
                .monitor
                .record_success(&tracking_id, Some(asset.decoded_size())),
            Err(e) => self.monitor.record_error(&tracking_id, &format!("{:#}", e)),
        }
        fetched
    }

    fn version_hint(&self, manifest: Option<&BundleManifest>) -> String {
        manifest
            .and_then(|m| m.version.clone())
            .unwrap_or_else(|| self.config.version.clone())
    }

    async fn advisory_manifest(&self) -> Option<Arc<BundleManifest>> {
        match self.ensure_manifest().await {
            Ok(manifest) => Some(manifest),
            Err(e) => {
                warn!("manifest unavailable, using default bundle names: {:#}", e);
                None
            }
        }
    }

    /// Fetch and cache the manifest, once per loader lifetime. Doubles as the
    /// double-checked init point when several loads race at startup.
    async fn ensure_manifest(&self) -> Result<Arc<BundleManifest>> {
        if let Some(manifest) = self.manifest.read().as_ref() {
            return Ok(Arc::clone(manifest));
        }

        let _guard = self.manifest_lock.lock().await;
        if let Some(manifest) = self.manifest.read().as_ref() {
            return Ok(Arc::clone(manifest));
        }

        let url = format!(
            "{}/{}/{}",
            self.config.manifest_base_url.trim_end_matches('/'),
            self.config.version,
            MANIFEST_FILE
        );

        let attempts = self.config.retries.max(1);
        let mut last_error = anyhow!("manifest fetch failed");
        for attempt in 1..=attempts {
            match self.fetch_manifest_once(&url).await {
                Ok(manifest) => {
                    let manifest = Arc::new(manifest);
                    info!(
                        "manifest resolved version={:?} files={}",
                        manifest.version,
                        manifest.files.len()
                    );
                    *self.manifest.write() = Some(Arc::clone(&manifest));
                    return Ok(manifest);
                }
                Err(e) => {
                    if attempt < attempts {
                        debug!("manifest fetch attempt {} failed: {:#}", attempt, e);
                        sleep(backoff_delay(attempt)).await;
                    }
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }

    async fn fetch_manifest_once(&self, url: &str) -> Result<BundleManifest> {
        let asset = self.tracked_fetch(url).await?;
        serde_json::from_slice(&asset.bytes)
            .map_err(|e| anyhow!("manifest parse failed for {}: {}", url, e))
    }
}

fn join_url(base: &str, file: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), file)
}

/// Capped exponential backoff: 1s, 2s, 4s, then held at the 5s cap.
fn backoff_delay(attempt: u32) -> Duration {
    let shift = attempt.saturating_sub(1).min(16);
    let ms = BACKOFF_BASE_MS.saturating_mul(1u64 << shift);
    Duration::from_millis(ms.min(BACKOFF_CAP_MS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_schedule() {
        assert_eq!(backoff_delay(1), Duration::from_millis(1000));
        assert_eq!(backoff_delay(2), Duration::from_millis(2000));
        assert_eq!(backoff_delay(3), Duration::from_millis(4000));
        assert_eq!(backoff_delay(4), Duration::from_millis(5000));
        assert_eq!(backoff_delay(10), Duration::from_millis(5000));
    }

    #[test]
    fn test_join_url_strips_trailing_slash() {
        assert_eq!(join_url("https://cdn/x/", "a.js"), "https://cdn/x/a.js");
        assert_eq!(join_url("https://cdn/x", "a.js"), "https://cdn/x/a.js");
    }
}

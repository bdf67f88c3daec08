// Engine provider — owns a loader, boots an engine out of whatever modules
// arrive, and exposes the lifecycle to the embedding application.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::dependencies::{DependencyLoader, LoadOutcome};
use crate::config::CdnConfig;
use crate::engine::traits::{AnalyticsEngine, EngineOptions, PluginModule};
use crate::error::ProviderError;

/// A booted engine with its companion plugin module. Cheap to clone; all
/// clones share the same engine instance.
#[derive(Clone)]
pub struct EngineHandle {
    pub engine: Arc<dyn AnalyticsEngine>,
    pub plugins: Arc<dyn PluginModule>,
    pub outcome: LoadOutcome,
    pub core_version: String,
}

impl std::fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHandle")
            .field("outcome", &self.outcome)
            .field("core_version", &self.core_version)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub enum ProviderState {
    Idle,
    Starting,
    Ready(EngineHandle),
    Failed(ProviderError),
    Disposed,
}

pub struct EngineProvider {
    loader: Arc<DependencyLoader>,
    options: EngineOptions,
    state: RwLock<ProviderState>,
    cancel: CancellationToken,
}

impl EngineProvider {
    pub fn new(config: CdnConfig) -> Self {
        Self::with_loader(Arc::new(DependencyLoader::new(config)), EngineOptions::default())
    }

    pub fn with_loader(loader: Arc<DependencyLoader>, options: EngineOptions) -> Self {
        Self {
            loader,
            options,
            state: RwLock::new(ProviderState::Idle),
            cancel: CancellationToken::new(),
        }
    }

    pub fn loader(&self) -> Arc<DependencyLoader> {
        Arc::clone(&self.loader)
    }

    pub fn state(&self) -> ProviderState {
        self.state.read().clone()
    }

    /// Current handle, if the provider is ready.
    pub fn handle(&self) -> Option<EngineHandle> {
        match &*self.state.read() {
            ProviderState::Ready(handle) => Some(handle.clone()),
            _ => None,
        }
    }

    /// Last failure, if the provider is in the failed state.
    pub fn error(&self) -> Option<ProviderError> {
        match &*self.state.read() {
            ProviderState::Failed(e) => Some(e.clone()),
            _ => None,
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Load dependencies and boot an engine. Returns the existing handle when
    /// already ready; safe to call again after a failure.
    pub async fn start(&self) -> Result<EngineHandle, ProviderError> {
        if self.cancel.is_cancelled() {
            return Err(ProviderError::Disposed);
        }
        {
            let state = self.state.read();
            if let ProviderState::Ready(handle) = &*state {
                return Ok(handle.clone());
            }
        }
        *self.state.write() = ProviderState::Starting;

        let result = tokio::select! {
            _ = self.cancel.cancelled() => Err(ProviderError::Disposed),
            booted = self.boot() => booted,
        };

        match &result {
            Ok(handle) => *self.state.write() = ProviderState::Ready(handle.clone()),
            Err(ProviderError::Disposed) => *self.state.write() = ProviderState::Disposed,
            Err(e) => *self.state.write() = ProviderState::Failed(e.clone()),
        }
        result
    }

    async fn boot(&self) -> Result<EngineHandle, ProviderError> {
        let deps = self.loader.load().await?;

        let engine = deps
            .core
            .create_engine(&self.options)
            .map_err(|e| ProviderError::Initialization(format!("{:#}", e)))?;
        engine
            .initialize()
            .await
            .map_err(|e| ProviderError::Initialization(format!("{:#}", e)))?;

        info!(
            "engine ready version={} outcome={:?}",
            deps.core.version(),
            deps.outcome()
        );
        Ok(EngineHandle {
            engine,
            plugins: Arc::clone(&deps.plugins),
            outcome: deps.outcome(),
            core_version: deps.core.version().to_string(),
        })
    }

    /// Invalidate the current handle, clear the loader cache and boot again.
    pub async fn reload(&self) -> Result<EngineHandle, ProviderError> {
        if self.cancel.is_cancelled() {
            return Err(ProviderError::Disposed);
        }
        *self.state.write() = ProviderState::Idle;
        self.loader.reset();
        self.start().await
    }

    /// Terminal: cancels an in-flight start, detaches the monitor and refuses
    /// every later call.
    pub fn dispose(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.cancel.cancel();
        self.loader.monitor().cleanup();
        *self.state.write() = ProviderState::Disposed;
        debug!("engine provider disposed");
    }
}

impl Drop for EngineProvider {
    fn drop(&mut self) {
        self.dispose();
    }
}

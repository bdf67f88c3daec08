// Module resolution seam — turns fetched bundle bytes into usable modules.
// The embedded resolver validates artifacts and binds them to the built-in
// implementations; a WASM-runtime backend can slot in behind the same trait.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use crate::detect::bundle::{contains_export, BundleKind};
use crate::engine::traits::{CoreModule, PluginModule};
use crate::mock::engine::MockCoreModule;
use crate::mock::plugins::MockPluginModule;

/// Export the core bundle must carry to be considered usable.
pub const CORE_EXPORT_SYMBOL: &str = "DataPrismEngine";
/// Export the plugins bundle must carry.
pub const PLUGINS_EXPORT_SYMBOL: &str = "PluginManager";

/// A fetched bundle with everything a resolver needs to judge it.
#[derive(Debug, Clone)]
pub struct BundleArtifact {
    pub url: String,
    pub bytes: Bytes,
    pub kind: BundleKind,
    /// Version the bundle was fetched under (manifest version, else the
    /// configured one).
    pub version_hint: Option<String>,
}

/// Resolution backend. `probe` reports whether module resolution can work at
/// all in this environment; the mock factories are the substitution path when
/// CDN artifacts are unavailable or rejected.
#[async_trait]
pub trait ModuleResolver: Send + Sync {
    async fn probe(&self) -> Result<()> {
        Ok(())
    }

    async fn resolve_core(&self, artifact: &BundleArtifact) -> Result<Arc<dyn CoreModule>>;

    async fn resolve_plugins(&self, artifact: &BundleArtifact) -> Result<Arc<dyn PluginModule>>;

    fn mock_core(&self) -> Result<Arc<dyn CoreModule>>;

    fn mock_plugins(&self) -> Result<Arc<dyn PluginModule>>;
}

/// Default resolver: validates the artifact shape and export symbols, then
/// binds the embedded engine implementation stamped with the CDN version.
pub struct EmbeddedResolver;

impl EmbeddedResolver {
    fn check_artifact(artifact: &BundleArtifact, export: &str) -> Result<()> {
        match artifact.kind {
            BundleKind::EsModule | BundleKind::Umd | BundleKind::Wasm => {}
            kind => {
                return Err(anyhow!(
                    "unusable bundle payload from {}: {:?}",
                    artifact.url,
                    kind
                ));
            }
        }
        if !contains_export(&artifact.bytes, export) {
            return Err(anyhow!(
                "expected export {} not found in {}",
                export,
                artifact.url
            ));
        }
        Ok(())
    }

    fn stamped_version(artifact: &BundleArtifact) -> String {
        artifact
            .version_hint
            .clone()
            .unwrap_or_else(|| "unknown".to_string())
    }
}

#[async_trait]
impl ModuleResolver for EmbeddedResolver {
    async fn resolve_core(&self, artifact: &BundleArtifact) -> Result<Arc<dyn CoreModule>> {
        Self::check_artifact(artifact, CORE_EXPORT_SYMBOL)?;
        let version = Self::stamped_version(artifact);
        debug!(
            "core artifact accepted url={} kind={:?} bytes={}",
            artifact.url,
            artifact.kind,
            artifact.bytes.len()
        );
        Ok(Arc::new(MockCoreModule::with_version(version)))
    }

    async fn resolve_plugins(&self, artifact: &BundleArtifact) -> Result<Arc<dyn PluginModule>> {
        Self::check_artifact(artifact, PLUGINS_EXPORT_SYMBOL)?;
        let version = Self::stamped_version(artifact);
        debug!(
            "plugins artifact accepted url={} kind={:?} bytes={}",
            artifact.url,
            artifact.kind,
            artifact.bytes.len()
        );
        Ok(Arc::new(MockPluginModule::with_version(version)))
    }

    fn mock_core(&self) -> Result<Arc<dyn CoreModule>> {
        Ok(Arc::new(MockCoreModule::new()))
    }

    fn mock_plugins(&self) -> Result<Arc<dyn PluginModule>> {
        Ok(Arc::new(MockPluginModule::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::bundle::detect_bundle;

    fn artifact(payload: &str) -> BundleArtifact {
        let bytes = Bytes::from(payload.as_bytes().to_vec());
        BundleArtifact {
            url: "https://cdn.example.com/core.es.js".to_string(),
            kind: detect_bundle(&bytes),
            bytes,
            version_hint: Some("2.1.0".to_string()),
        }
    }

    #[tokio::test]
    async fn test_accepts_es_bundle_with_export() {
        let resolver = EmbeddedResolver;
        let module = resolver
            .resolve_core(&artifact("export class DataPrismEngine {}"))
            .await
            .unwrap();
        assert_eq!(module.version(), "2.1.0");
    }

    #[tokio::test]
    async fn test_rejects_html_error_page() {
        let resolver = EmbeddedResolver;
        let err = resolver
            .resolve_core(&artifact("<!DOCTYPE html><html>not found</html>"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unusable bundle payload"));
    }

    #[tokio::test]
    async fn test_rejects_bundle_missing_export() {
        let resolver = EmbeddedResolver;
        let err = resolver
            .resolve_core(&artifact("export const somethingElse = 1;"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("DataPrismEngine"));
    }
}

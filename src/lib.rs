// DataPrism loader — fetches the analytics engine bundles from a CDN with
// retry, mirror failover and mock substitution, and records asset load
// diagnostics along the way.

use std::sync::Once;

use tracing::info;
use tracing_subscriber::EnvFilter;

pub mod config;
pub mod detect;
pub mod engine;
pub mod error;
pub mod loader;
pub mod manifest;
pub mod mock;
pub mod monitor;
pub mod source;

static INIT_TRACING: Once = Once::new();

/// Install the global tracing subscriber. Later calls are no-ops, so tests
/// and embedders can call this freely.
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,hyper=warn,reqwest=warn"));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init();

        info!("dataprism loader tracing initialized");
    });
}

// Caller-facing error taxonomy — everything transient is absorbed before it gets here.

use thiserror::Error;

/// Failures a `DependencyLoader` surfaces to callers.
///
/// Per-bundle fetch, timeout, and validation failures never appear in this
/// enum: they are absorbed by mock substitution. Only a failed capability
/// probe and full retry exhaustion reject a load.
#[derive(Debug, Clone, Error)]
pub enum LoaderError {
    /// The resolver cannot instantiate modules in this environment at all.
    #[error("module loading not supported in this environment: {0}")]
    Unsupported(String),

    /// Every outer attempt failed; carries the last underlying error text.
    #[error("dependency load failed after {attempts} attempts: {last_error}")]
    ExhaustedRetries { attempts: u32, last_error: String },
}

/// Failures an `EngineProvider` surfaces to callers.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// The loader itself failed (probe or exhausted retries).
    #[error("dependency load failed: {0}")]
    Dependency(#[from] LoaderError),

    /// Dependencies loaded but the engine could not be constructed or initialized.
    #[error("engine initialization failed: {0}")]
    Initialization(String),

    /// The provider was disposed while starting, or start was called after dispose.
    #[error("provider disposed")]
    Disposed,
}

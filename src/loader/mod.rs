// Dependency loading — CDN fetch with retry and fallback, module resolution,
// provider lifecycle.

pub mod dependencies;
pub mod provider;
pub mod resolver;

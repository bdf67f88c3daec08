// Mock substitutes — API-compatible stand-ins activated when CDN loading
// fails or is disabled for local development.

pub mod engine;
pub mod plugins;

/// Version reported by every mock module; distinguishes substituted modules
/// from CDN-resolved ones in metrics and logs.
pub const MOCK_VERSION: &str = "1.0.0-demo";

// Asset source abstraction — pluggable backends for CDN HTTP and in-memory fetching.

pub mod http_source;
pub mod static_source;
pub mod traits;

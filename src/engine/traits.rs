use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

/// Construction options accepted by the engine export.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineOptions {
    pub max_memory_mb: u32,
    pub enable_wasm_optimizations: bool,
    pub query_timeout_ms: u64,
    pub log_level: String,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_memory_mb: 4096,
            enable_wasm_optimizations: true,
            query_timeout_ms: 30_000,
            log_level: "warn".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueryResult {
    /// One JSON object per row.
    pub data: Vec<Value>,
    pub row_count: usize,
    pub execution_time_ms: u64,
}

#[derive(Debug, Clone)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
}

#[derive(Debug, Clone)]
pub struct TableInfo {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
    pub row_count: usize,
}

/// Point-in-time engine counters, shaped like the real engine's `getMetrics`.
/// Mock implementations report version `"1.0.0-demo"` here.
#[derive(Debug, Clone)]
pub struct EngineMetrics {
    pub version: String,
    pub queries_executed: u64,
    pub rows_loaded: u64,
    pub tables: usize,
    pub memory_used_mb: f64,
    pub uptime_ms: u64,
}

/// The engine handle contract consumed by the applications.
#[async_trait]
pub trait AnalyticsEngine: Send + Sync {
    async fn initialize(&self) -> Result<()>;
    async fn query(&self, sql: &str) -> Result<QueryResult>;
    /// Load rows (JSON objects) into `table`, replacing any existing table
    /// of that name.
    async fn load_data(&self, rows: &[Value], table: &str) -> Result<()>;
    async fn get_table_info(&self, table: &str) -> Result<TableInfo>;
    async fn list_tables(&self) -> Result<Vec<String>>;
    fn get_metrics(&self) -> EngineMetrics;
}

/// The constructible core export (`DataPrismEngine` in the bundle).
pub trait CoreModule: Send + Sync {
    fn version(&self) -> &str;
    fn create_engine(&self, options: &EngineOptions) -> Result<Arc<dyn AnalyticsEngine>>;
}

impl std::fmt::Debug for dyn CoreModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreModule")
            .field("version", &self.version())
            .finish_non_exhaustive()
    }
}

#[async_trait]
pub trait Plugin: Send + Sync {
    fn id(&self) -> &str;
    fn version(&self) -> &str;
    /// Invoke a plugin method with a JSON payload.
    async fn call(&self, method: &str, payload: Value) -> Result<Value>;
}

impl std::fmt::Debug for dyn Plugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plugin")
            .field("id", &self.id())
            .field("version", &self.version())
            .finish_non_exhaustive()
    }
}

/// The plugin manager export (`PluginManager` in the bundle).
#[async_trait]
pub trait PluginModule: Send + Sync {
    fn version(&self) -> &str;
    async fn get_plugin(&self, id: &str) -> Result<Arc<dyn Plugin>>;
    async fn load_plugin(&self, url: &str) -> Result<Arc<dyn Plugin>>;
}

// Mock analytics engine — canned tables and pattern-matched SQL so the
// surrounding application keeps working when the CDN bundles are unavailable.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;
use serde_json::{json, Value};
use tokio::time::sleep;
use tracing::debug;

use super::MOCK_VERSION;
use crate::engine::traits::{
    AnalyticsEngine, ColumnInfo, CoreModule, EngineMetrics, EngineOptions, QueryResult, TableInfo,
};

#[derive(Debug, Clone)]
struct TableData {
    columns: Vec<ColumnInfo>,
    rows: Vec<Value>,
}

/// Stand-in for the `DataPrismEngine` export.
pub struct MockCoreModule {
    version: String,
}

impl MockCoreModule {
    pub fn new() -> Self {
        Self::with_version(MOCK_VERSION)
    }

    /// Used by the resolver to stamp a CDN-resolved module with the version
    /// the bundle was fetched under.
    pub fn with_version(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
        }
    }
}

impl Default for MockCoreModule {
    fn default() -> Self {
        Self::new()
    }
}

impl CoreModule for MockCoreModule {
    fn version(&self) -> &str {
        &self.version
    }

    fn create_engine(&self, options: &EngineOptions) -> Result<Arc<dyn AnalyticsEngine>> {
        Ok(Arc::new(MockEngine::new(
            self.version.clone(),
            options.clone(),
        )))
    }
}

pub struct MockEngine {
    version: String,
    #[allow(dead_code)]
    options: EngineOptions,
    initialized: AtomicBool,
    queries_executed: AtomicU64,
    rows_loaded: AtomicU64,
    started_at: Instant,
    tables: Mutex<HashMap<String, TableData>>,
}

impl MockEngine {
    pub fn new(version: String, options: EngineOptions) -> Self {
        Self {
            version,
            options,
            initialized: AtomicBool::new(false),
            queries_executed: AtomicU64::new(0),
            rows_loaded: AtomicU64::new(0),
            started_at: Instant::now(),
            tables: Mutex::new(seed_tables()),
        }
    }

    fn count_result(&self, rows: usize, t0: Instant) -> QueryResult {
        QueryResult {
            data: vec![json!({ "count": rows })],
            row_count: 1,
            execution_time_ms: t0.elapsed().as_millis() as u64,
        }
    }
}

#[async_trait]
impl AnalyticsEngine for MockEngine {
    async fn initialize(&self) -> Result<()> {
        // Emulated WASM instantiation delay.
        let jitter: u64 = rand::thread_rng().gen_range(0..40);
        sleep(Duration::from_millis(60 + jitter)).await;
        self.initialized.store(true, Ordering::Relaxed);
        debug!("mock engine initialized version={}", self.version);
        Ok(())
    }

    // Queries are answered even before initialize() completes; callers that
    // race startup get canned data instead of an error.
    async fn query(&self, sql: &str) -> Result<QueryResult> {
        let t0 = Instant::now();
        let jitter: u64 = rand::thread_rng().gen_range(10..50);
        sleep(Duration::from_millis(jitter)).await;
        self.queries_executed.fetch_add(1, Ordering::Relaxed);

        let normalized = sql.trim().to_lowercase();
        if !normalized.starts_with("select") {
            return Ok(QueryResult {
                data: Vec::new(),
                row_count: 0,
                execution_time_ms: t0.elapsed().as_millis() as u64,
            });
        }

        if normalized.starts_with("select 1") {
            return Ok(QueryResult {
                data: vec![json!({ "result": 1 })],
                row_count: 1,
                execution_time_ms: t0.elapsed().as_millis() as u64,
            });
        }

        let Some(table) = from_table(&normalized) else {
            // select without a from clause, e.g. "select now()"
            return Ok(QueryResult {
                data: Vec::new(),
                row_count: 0,
                execution_time_ms: t0.elapsed().as_millis() as u64,
            });
        };

        let tables = self.tables.lock();
        let Some(data) = tables.get(&table) else {
            return Err(anyhow!("table not found: {}", table));
        };

        if normalized.contains("count(*)") {
            let rows = data.rows.len();
            drop(tables);
            return Ok(self.count_result(rows, t0));
        }

        let mut rows = data.rows.clone();
        drop(tables);
        if let Some(limit) = limit_clause(&normalized) {
            rows.truncate(limit);
        }

        Ok(QueryResult {
            row_count: rows.len(),
            data: rows,
            execution_time_ms: t0.elapsed().as_millis() as u64,
        })
    }

    async fn load_data(&self, rows: &[Value], table: &str) -> Result<()> {
        let jitter: u64 = rand::thread_rng().gen_range(5..25);
        sleep(Duration::from_millis(jitter)).await;

        let columns = infer_columns(rows);
        self.rows_loaded.fetch_add(rows.len() as u64, Ordering::Relaxed);
        self.tables.lock().insert(
            table.to_string(),
            TableData {
                columns,
                rows: rows.to_vec(),
            },
        );
        debug!("mock engine loaded rows={} table={}", rows.len(), table);
        Ok(())
    }

    async fn get_table_info(&self, table: &str) -> Result<TableInfo> {
        let tables = self.tables.lock();
        let Some(data) = tables.get(table) else {
            return Err(anyhow!("table not found: {}", table));
        };
        Ok(TableInfo {
            name: table.to_string(),
            columns: data.columns.clone(),
            row_count: data.rows.len(),
        })
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.tables.lock().keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn get_metrics(&self) -> EngineMetrics {
        let tables = self.tables.lock().len();
        EngineMetrics {
            version: self.version.clone(),
            queries_executed: self.queries_executed.load(Ordering::Relaxed),
            rows_loaded: self.rows_loaded.load(Ordering::Relaxed),
            tables,
            memory_used_mb: 24.0 + tables as f64 * 1.5,
            uptime_ms: self.started_at.elapsed().as_millis() as u64,
        }
    }
}

/// Token following `from`, with trailing punctuation stripped.
fn from_table(normalized_sql: &str) -> Option<String> {
    let mut tokens = normalized_sql.split_whitespace();
    while let Some(token) = tokens.next() {
        if token == "from" {
            return tokens
                .next()
                .map(|t| t.trim_end_matches([';', ',']).to_string());
        }
    }
    None
}

fn limit_clause(normalized_sql: &str) -> Option<usize> {
    let mut tokens = normalized_sql.split_whitespace();
    while let Some(token) = tokens.next() {
        if token == "limit" {
            return tokens.next()?.trim_end_matches(';').parse().ok();
        }
    }
    None
}

/// Column types inferred from the first row; later rows are trusted to match.
fn infer_columns(rows: &[Value]) -> Vec<ColumnInfo> {
    let Some(Value::Object(first)) = rows.first() else {
        return Vec::new();
    };
    first
        .iter()
        .map(|(name, value)| ColumnInfo {
            name: name.clone(),
            data_type: match value {
                Value::Number(n) if n.is_i64() || n.is_u64() => "INTEGER".to_string(),
                Value::Number(_) => "DOUBLE".to_string(),
                Value::Bool(_) => "BOOLEAN".to_string(),
                Value::String(_) => "VARCHAR".to_string(),
                _ => "JSON".to_string(),
            },
        })
        .collect()
}

fn seed_tables() -> HashMap<String, TableData> {
    let mut tables = HashMap::new();
    tables.insert(
        "sales".to_string(),
        TableData {
            columns: vec![
                column("id", "INTEGER"),
                column("product", "VARCHAR"),
                column("region", "VARCHAR"),
                column("amount", "DOUBLE"),
                column("quarter", "VARCHAR"),
            ],
            rows: vec![
                json!({ "id": 1, "product": "Laptop", "region": "North", "amount": 1299.0, "quarter": "Q1" }),
                json!({ "id": 2, "product": "Monitor", "region": "South", "amount": 449.5, "quarter": "Q1" }),
                json!({ "id": 3, "product": "Keyboard", "region": "North", "amount": 89.9, "quarter": "Q2" }),
                json!({ "id": 4, "product": "Laptop", "region": "East", "amount": 1399.0, "quarter": "Q2" }),
                json!({ "id": 5, "product": "Headset", "region": "West", "amount": 199.0, "quarter": "Q3" }),
            ],
        },
    );
    tables.insert(
        "customers".to_string(),
        TableData {
            columns: vec![
                column("id", "INTEGER"),
                column("name", "VARCHAR"),
                column("country", "VARCHAR"),
                column("segment", "VARCHAR"),
            ],
            rows: vec![
                json!({ "id": 1, "name": "Acme Corp", "country": "US", "segment": "enterprise" }),
                json!({ "id": 2, "name": "Globex", "country": "DE", "segment": "mid-market" }),
                json!({ "id": 3, "name": "Initech", "country": "US", "segment": "startup" }),
                json!({ "id": 4, "name": "Umbrella", "country": "UK", "segment": "enterprise" }),
            ],
        },
    );
    tables
}

fn column(name: &str, data_type: &str) -> ColumnInfo {
    ColumnInfo {
        name: name.to_string(),
        data_type: data_type.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_table_parsing() {
        assert_eq!(from_table("select * from sales"), Some("sales".to_string()));
        assert_eq!(
            from_table("select * from sales;"),
            Some("sales".to_string())
        );
        assert_eq!(
            from_table("select count(*) from customers where id > 1"),
            Some("customers".to_string())
        );
        assert_eq!(from_table("select 1"), None);
    }

    #[test]
    fn test_limit_parsing() {
        assert_eq!(limit_clause("select * from sales limit 3"), Some(3));
        assert_eq!(limit_clause("select * from sales limit 3;"), Some(3));
        assert_eq!(limit_clause("select * from sales"), None);
        assert_eq!(limit_clause("select * from sales limit x"), None);
    }

    #[test]
    fn test_infer_columns_from_first_row() {
        let rows = vec![json!({ "a": 1, "b": 2.5, "c": "x", "d": true })];
        let cols = infer_columns(&rows);
        let types: Vec<&str> = cols.iter().map(|c| c.data_type.as_str()).collect();
        // serde_json object keys iterate in sorted order
        assert_eq!(types, vec!["INTEGER", "DOUBLE", "VARCHAR", "BOOLEAN"]);
    }
}

// Mock plugin manager — pattern-matched formula evaluation and CSV parsing
// standing in for the real plugin bundles.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rand::Rng;
use serde_json::{json, Map, Value};
use tokio::time::sleep;
use tracing::debug;

use super::MOCK_VERSION;
use crate::engine::traits::{Plugin, PluginModule};

/// Stand-in for the `PluginManager` export.
pub struct MockPluginModule {
    version: String,
}

impl MockPluginModule {
    pub fn new() -> Self {
        Self::with_version(MOCK_VERSION)
    }

    pub fn with_version(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
        }
    }
}

impl Default for MockPluginModule {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginModule for MockPluginModule {
    fn version(&self) -> &str {
        &self.version
    }

    async fn get_plugin(&self, id: &str) -> Result<Arc<dyn Plugin>> {
        match id {
            "ironcalc-formula" => Ok(Arc::new(MockIronCalcPlugin)),
            "csv-import" => Ok(Arc::new(MockCsvImportPlugin)),
            _ => Err(anyhow!("plugin not found: {}", id)),
        }
    }

    async fn load_plugin(&self, url: &str) -> Result<Arc<dyn Plugin>> {
        // Emulated fetch-and-evaluate delay.
        let jitter: u64 = rand::thread_rng().gen_range(10..40);
        sleep(Duration::from_millis(jitter)).await;
        let id = plugin_id_from_url(url);
        debug!("mock plugin loaded id={} url={}", id, url);
        Ok(Arc::new(MockEchoPlugin { id }))
    }
}

/// Formula plugin: recognizes `=SUM(`, `=AVERAGE(` and `=COUNT(` over numeric
/// literal arguments and answers canned values for anything it cannot parse.
pub struct MockIronCalcPlugin;

#[async_trait]
impl Plugin for MockIronCalcPlugin {
    fn id(&self) -> &str {
        "ironcalc-formula"
    }

    fn version(&self) -> &str {
        MOCK_VERSION
    }

    async fn call(&self, method: &str, payload: Value) -> Result<Value> {
        if method != "evaluate" {
            return Err(anyhow!("unsupported method: {} for plugin {}", method, self.id()));
        }
        let formula = payload
            .get("formula")
            .and_then(Value::as_str)
            .unwrap_or_default();
        Ok(json!({ "value": evaluate_formula(formula) }))
    }
}

/// CSV plugin: header row plus numeric coercion, no quoting support.
pub struct MockCsvImportPlugin;

#[async_trait]
impl Plugin for MockCsvImportPlugin {
    fn id(&self) -> &str {
        "csv-import"
    }

    fn version(&self) -> &str {
        MOCK_VERSION
    }

    async fn call(&self, method: &str, payload: Value) -> Result<Value> {
        if method != "parse" {
            return Err(anyhow!("unsupported method: {} for plugin {}", method, self.id()));
        }
        let text = payload
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default();
        Ok(parse_csv(text))
    }
}

/// Returned by `load_plugin` for arbitrary URLs: answers every call by
/// echoing what it was asked, which is enough for UI smoke paths.
pub struct MockEchoPlugin {
    id: String,
}

#[async_trait]
impl Plugin for MockEchoPlugin {
    fn id(&self) -> &str {
        &self.id
    }

    fn version(&self) -> &str {
        MOCK_VERSION
    }

    async fn call(&self, method: &str, payload: Value) -> Result<Value> {
        Ok(json!({ "plugin": self.id, "method": method, "echo": payload }))
    }
}

fn evaluate_formula(formula: &str) -> Value {
    let trimmed = formula.trim();
    let Some(body) = trimmed.strip_prefix('=') else {
        // Plain literal: number when it parses, the text itself otherwise.
        return match trimmed.parse::<f64>() {
            Ok(n) => number(n),
            Err(_) => Value::String(trimmed.to_string()),
        };
    };

    let upper = body.to_uppercase();
    if let Some(args) = function_args(&upper, "SUM(") {
        return match numeric_args(&args) {
            Some(nums) => number(nums.iter().sum()),
            None => json!(100),
        };
    }
    if let Some(args) = function_args(&upper, "AVERAGE(") {
        return match numeric_args(&args) {
            Some(nums) if !nums.is_empty() => {
                number(nums.iter().sum::<f64>() / nums.len() as f64)
            }
            _ => json!(50),
        };
    }
    if let Some(args) = function_args(&upper, "COUNT(") {
        return match numeric_args(&args) {
            Some(nums) => json!(nums.len()),
            None => json!(10),
        };
    }

    // Unrecognized function name, mirroring spreadsheet semantics.
    Value::String("#NAME?".to_string())
}

fn function_args(upper_body: &str, prefix: &str) -> Option<String> {
    let rest = upper_body.strip_prefix(prefix)?;
    Some(rest.trim_end().trim_end_matches(')').to_string())
}

/// All arguments as numbers, or None when any of them is not a numeric
/// literal (cell references land here and fall back to canned results).
fn numeric_args(args: &str) -> Option<Vec<f64>> {
    if args.trim().is_empty() {
        return None;
    }
    args.split(',')
        .map(|a| a.trim().parse::<f64>().ok())
        .collect()
}

fn number(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        json!(value as i64)
    } else {
        json!(value)
    }
}

fn parse_csv(text: &str) -> Value {
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let Some(header) = lines.next() else {
        return json!({ "columns": [], "rows": [], "row_count": 0 });
    };

    let columns: Vec<String> = header.split(',').map(|c| c.trim().to_string()).collect();
    let mut rows = Vec::new();
    for line in lines {
        let mut row = Map::new();
        for (column, field) in columns.iter().zip(line.split(',')) {
            row.insert(column.clone(), coerce_field(field.trim()));
        }
        rows.push(Value::Object(row));
    }

    let row_count = rows.len();
    json!({ "columns": columns, "rows": rows, "row_count": row_count })
}

fn coerce_field(field: &str) -> Value {
    if let Ok(i) = field.parse::<i64>() {
        return json!(i);
    }
    if let Ok(f) = field.parse::<f64>() {
        return json!(f);
    }
    Value::String(field.to_string())
}

fn plugin_id_from_url(url: &str) -> String {
    let file = url.rsplit('/').next().unwrap_or(url);
    let file = file.split('?').next().unwrap_or(file);
    let stem = file.split('.').next().unwrap_or(file);
    if stem.is_empty() {
        "plugin".to_string()
    } else {
        stem.to_string()
    }
}

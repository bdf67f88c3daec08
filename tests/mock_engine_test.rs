// Tests for the mock engine and plugin substitutes.

use std::sync::Arc;

use serde_json::json;

use dataprism_loader::engine::traits::{AnalyticsEngine, CoreModule, EngineOptions, PluginModule};
use dataprism_loader::mock::engine::MockCoreModule;
use dataprism_loader::mock::plugins::MockPluginModule;
use dataprism_loader::mock::MOCK_VERSION;

fn engine() -> Arc<dyn AnalyticsEngine> {
    MockCoreModule::new()
        .create_engine(&EngineOptions::default())
        .unwrap()
}

#[tokio::test]
async fn test_canned_tables_are_seeded() {
    let engine = engine();
    engine.initialize().await.unwrap();

    let tables = engine.list_tables().await.unwrap();
    assert_eq!(tables, vec!["customers".to_string(), "sales".to_string()]);

    let info = engine.get_table_info("sales").await.unwrap();
    assert_eq!(info.name, "sales");
    assert_eq!(info.row_count, 5);
    assert!(info.columns.iter().any(|c| c.name == "amount"));

    let err = engine.get_table_info("orders").await.unwrap_err();
    assert!(err.to_string().contains("table not found: orders"));
}

#[tokio::test]
async fn test_query_pattern_matching() {
    let engine = engine();
    engine.initialize().await.unwrap();

    let r = engine.query("SELECT 1").await.unwrap();
    assert_eq!(r.row_count, 1);
    assert_eq!(r.data[0], json!({ "result": 1 }));

    let r = engine.query("SELECT * FROM sales").await.unwrap();
    assert_eq!(r.row_count, 5);

    let r = engine.query("select * from sales limit 2;").await.unwrap();
    assert_eq!(r.row_count, 2);

    let r = engine.query("SELECT count(*) FROM customers").await.unwrap();
    assert_eq!(r.data[0], json!({ "count": 4 }));

    let err = engine.query("SELECT * FROM nope").await.unwrap_err();
    assert!(err.to_string().contains("table not found: nope"));

    // Non-select statements are accepted and produce no rows.
    let r = engine.query("CREATE TABLE t (x INTEGER)").await.unwrap();
    assert_eq!(r.row_count, 0);
    assert!(r.data.is_empty());
}

#[tokio::test]
async fn test_query_reports_execution_time() {
    let engine = engine();
    let r = engine.query("SELECT 1").await.unwrap();
    // The emulated latency floor is 10 ms.
    assert!(r.execution_time_ms >= 10);
}

#[tokio::test]
async fn test_query_before_initialize_is_tolerated() {
    let engine = engine();
    let r = engine.query("select 1").await.unwrap();
    assert_eq!(r.row_count, 1);
}

#[tokio::test]
async fn test_load_data_infers_columns_and_replaces() {
    let engine = engine();
    engine.initialize().await.unwrap();

    let rows = vec![
        json!({ "id": 1, "name": "a", "score": 9.5 }),
        json!({ "id": 2, "name": "b", "score": 7.0 }),
    ];
    engine.load_data(&rows, "events").await.unwrap();

    let info = engine.get_table_info("events").await.unwrap();
    assert_eq!(info.row_count, 2);
    let types: Vec<(&str, &str)> = info
        .columns
        .iter()
        .map(|c| (c.name.as_str(), c.data_type.as_str()))
        .collect();
    assert!(types.contains(&("id", "INTEGER")));
    assert!(types.contains(&("name", "VARCHAR")));
    assert!(types.contains(&("score", "DOUBLE")));

    let r = engine.query("select * from events").await.unwrap();
    assert_eq!(r.row_count, 2);

    // Reloading the same table replaces its contents.
    engine
        .load_data(&[json!({ "id": 3, "name": "c", "score": 1.0 })], "events")
        .await
        .unwrap();
    let info = engine.get_table_info("events").await.unwrap();
    assert_eq!(info.row_count, 1);
}

#[tokio::test]
async fn test_metrics_counters() {
    let engine = engine();
    engine.initialize().await.unwrap();

    engine.query("SELECT 1").await.unwrap();
    engine.query("SELECT * FROM sales").await.unwrap();
    engine
        .load_data(&[json!({ "x": 1 }), json!({ "x": 2 })], "t")
        .await
        .unwrap();

    let metrics = engine.get_metrics();
    assert_eq!(metrics.version, MOCK_VERSION);
    assert_eq!(metrics.queries_executed, 2);
    assert_eq!(metrics.rows_loaded, 2);
    assert_eq!(metrics.tables, 3);
    assert!(metrics.memory_used_mb > 0.0);
}

#[tokio::test]
async fn test_version_stamp_flows_into_engines() {
    let core = MockCoreModule::with_version("2.1.0");
    assert_eq!(core.version(), "2.1.0");
    let engine = core.create_engine(&EngineOptions::default()).unwrap();
    assert_eq!(engine.get_metrics().version, "2.1.0");
}

#[tokio::test]
async fn test_plugin_manager_serves_known_plugins() {
    let plugins = MockPluginModule::new();
    assert_eq!(plugins.version(), MOCK_VERSION);

    let formula = plugins.get_plugin("ironcalc-formula").await.unwrap();
    let value = formula
        .call("evaluate", json!({ "formula": "=SUM(2,3,4)" }))
        .await
        .unwrap();
    assert_eq!(value, json!({ "value": 9 }));

    let value = formula
        .call("evaluate", json!({ "formula": "=VLOOKUP(A1)" }))
        .await
        .unwrap();
    assert_eq!(value, json!({ "value": "#NAME?" }));

    let csv = plugins.get_plugin("csv-import").await.unwrap();
    let parsed = csv
        .call("parse", json!({ "text": "id,label\n1,alpha\n2,beta" }))
        .await
        .unwrap();
    assert_eq!(parsed["row_count"], json!(2));
    assert_eq!(parsed["rows"][1], json!({ "id": 2, "label": "beta" }));

    let err = plugins.get_plugin("unknown").await.unwrap_err();
    assert!(err.to_string().contains("plugin not found: unknown"));

    let err = formula.call("frobnicate", json!({})).await.unwrap_err();
    assert!(err.to_string().contains("unsupported method"));
}

#[tokio::test]
async fn test_load_plugin_derives_id_from_url() {
    let plugins = MockPluginModule::new();
    let plugin = plugins
        .load_plugin("https://cdn.example.com/plugins/formula-tools.es.js?v=3")
        .await
        .unwrap();
    assert_eq!(plugin.id(), "formula-tools");

    let echoed = plugin.call("anything", json!({ "k": 1 })).await.unwrap();
    assert_eq!(echoed["plugin"], json!("formula-tools"));
    assert_eq!(echoed["method"], json!("anything"));
    assert_eq!(echoed["echo"], json!({ "k": 1 }));
}

use std::collections::HashMap;
use std::net::SocketAddr;

use axum::extract::Request;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;

use dataprism_loader::monitor::timing::ResourceTimingLedger;
use dataprism_loader::source::http_source::HttpBundleSource;
use dataprism_loader::source::traits::BundleSource;

const BUNDLE_BODY: &str = "export class DataPrismEngine { constructor() {} }";

async fn serve_bundle() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/javascript")],
        BUNDLE_BODY,
    )
}

/// Requires a bearer token; 403 otherwise.
async fn serve_guarded(req: Request) -> impl IntoResponse {
    let authorized = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v == "Bearer token-123")
        .unwrap_or(false);
    if authorized {
        (StatusCode::OK, BUNDLE_BODY).into_response()
    } else {
        (StatusCode::FORBIDDEN, "forbidden").into_response()
    }
}

async fn start_server() -> SocketAddr {
    let app = Router::new()
        .route("/dist/core.es.js", get(serve_bundle))
        .route("/guarded/core.es.js", get(serve_guarded));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn test_fetch_returns_payload_and_metadata() {
    let addr = start_server().await;
    let url = format!("http://{}/dist/core.es.js", addr);
    let source = HttpBundleSource::new();

    let asset = source.fetch(&url).await.unwrap();
    assert_eq!(asset.url, url);
    assert_eq!(asset.bytes.as_ref(), BUNDLE_BODY.as_bytes());
    assert_eq!(asset.decoded_size(), BUNDLE_BODY.len() as u64);
    assert_eq!(asset.transfer_size, BUNDLE_BODY.len() as u64);
    assert_eq!(
        asset.content_type.as_deref(),
        Some("application/javascript")
    );
}

#[tokio::test]
async fn test_fetch_error_carries_status_and_url() {
    let addr = start_server().await;
    let url = format!("http://{}/missing.js", addr);
    let source = HttpBundleSource::new();

    let err = source.fetch(&url).await.unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("HTTP 404"));
    assert!(msg.contains("/missing.js"));
}

#[tokio::test]
async fn test_custom_headers_are_sent() {
    let addr = start_server().await;
    let url = format!("http://{}/guarded/core.es.js", addr);

    let plain = HttpBundleSource::new();
    assert!(plain.fetch(&url).await.is_err());

    let mut headers = HashMap::new();
    headers.insert("authorization".to_string(), "Bearer token-123".to_string());
    let authed = HttpBundleSource::with_headers(headers);
    let asset = authed.fetch(&url).await.unwrap();
    assert_eq!(asset.bytes.as_ref(), BUNDLE_BODY.as_bytes());
}

#[tokio::test]
async fn test_transfers_reported_to_attached_ledger() {
    let addr = start_server().await;
    let url = format!("http://{}/dist/core.es.js", addr);

    let source = HttpBundleSource::new();
    let ledger = std::sync::Arc::new(ResourceTimingLedger::new());
    source.attach_timing(ledger.clone());

    source.fetch(&url).await.unwrap();
    // Failed fetches are not recorded; only completed transfers land here.
    let _ = source.fetch(&format!("http://{}/missing.js", addr)).await;

    let entries = ledger.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].url, url);
    assert_eq!(entries[0].decoded_size, BUNDLE_BODY.len() as u64);
    assert!(!entries[0].applied);
}

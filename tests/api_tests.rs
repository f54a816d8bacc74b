//! HTTP tests driving the router in-process with `tower::ServiceExt::oneshot`.

mod common;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use common::*;
use donation_verifier::config::Environment;
use donation_verifier::handlers::{router, AppState};
use donation_verifier::models::NetworkTable;
use donation_verifier::services::{CacheService, PriceService};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::ServiceExt;

fn app_with(reader: Arc<FakeReader>, price_url: &str) -> Router {
    let cache = Arc::new(CacheService::in_memory(Duration::from_secs(60)));
    let prices = Arc::new(PriceService::new(
        reqwest::Client::new(),
        price_url,
        cache.clone(),
    ));

    router(AppState {
        verifier: Arc::new(service(reader, FakeSafe::default())),
        prices,
        cache,
        networks: Arc::new(NetworkTable::defaults()),
        environment: Environment::Testnet,
        redis_configured: false,
        started_at: Instant::now(),
    })
}

fn app() -> Router {
    let hash = tx_hash(1);
    app_with(
        Arc::new(FakeReader::default().with_facts(facts(&hash))),
        "http://127.0.0.1:9",
    )
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

async fn post(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn claim(hash: &str) -> Value {
    json!({
        "txHash": hash,
        "networkId": 1,
        "symbol": "ETH",
        "fromAddress": SENDER,
        "toAddress": RECIPIENT,
        "amount": 1.0,
        "timestamp": T
    })
}

#[tokio::test]
async fn test_health_reports_memory_only_cache() {
    let (status, body) = get(app(), "/api/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["environment"], "testnet");
    assert_eq!(body["redis"], false);
}

#[tokio::test]
async fn test_chain_listing_and_lookup() {
    let (status, body) = get(app(), "/api/chains").await;
    assert_eq!(status, StatusCode::OK);
    let chains = body["data"]["chains"].as_array().unwrap();
    assert!(chains.iter().any(|c| c["id"] == 137 && c["chainType"] == "EVM"));
    assert!(chains.iter().any(|c| c["chainType"] == "SOLANA"));

    let (status, body) = get(app(), "/api/chains/137").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["nativeCurrency"]["symbol"], "MATIC");

    let (status, body) = get(app(), "/api/chains/424242").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error_code"], "CHAIN_NOT_FOUND");

    let (status, _) = get(app(), "/api/chains/not-a-number").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_transaction_url() {
    let (status, body) = get(app(), "/api/chains/1/transaction-url/0xabc").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["url"], "https://etherscan.io/tx/0xabc");
}

#[tokio::test]
async fn test_verify_success_and_rejection() {
    let (status, body) = post(app(), "/api/verify", claim(&tx_hash(1))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "SUCCESS");
    assert_eq!(body["data"]["transaction"]["to"], RECIPIENT);

    let mut wrong = claim(&tx_hash(1));
    wrong["fromAddress"] = json!(OTHER);
    let (status, body) = post(app(), "/api/verify", wrong).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "FAILED");
    assert_eq!(body["data"]["errorCode"], "FROM_ADDRESS_MISMATCH");
}

#[tokio::test]
async fn test_verify_rejects_malformed_bodies() {
    let (status, body) = post(app(), "/api/verify", json!({ "networkId": "one" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "VALIDATION_ERROR");

    let mut no_hash = claim(&tx_hash(1));
    no_hash["txHash"] = json!("");
    let (status, body) = post(app(), "/api/verify", no_hash).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_batch_counts_and_limits() {
    let batch = json!({ "transactions": [claim(&tx_hash(1)), claim(&tx_hash(2))] });
    let (status, body) = post(app(), "/api/verify-batch", batch).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 2);
    assert_eq!(body["data"]["successful"], 1);
    assert_eq!(body["data"]["failed"], 1);
    assert_eq!(body["data"]["results"][1]["errorCode"], "TRANSACTION_NOT_FOUND");

    let reader = Arc::new(FakeReader::default());
    let oversized: Vec<Value> = (0..101).map(|n| claim(&tx_hash(n as u8))).collect();
    let (status, body) = post(
        app_with(reader.clone(), "http://127.0.0.1:9"),
        "/api/verify-batch",
        json!({ "transactions": oversized }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "VALIDATION_ERROR");
    assert_eq!(reader.calls(), 0);
}

#[tokio::test]
async fn test_timestamp_endpoint() {
    let (status, body) = post(
        app(),
        "/api/timestamp",
        json!({ "txHash": tx_hash(1), "networkId": 1 }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["timestamp"], T);
    assert_eq!(body["data"]["date"], "2023-11-14T22:13:20Z");
}

#[tokio::test]
async fn test_price_endpoint() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/simple/price")
        .match_query(mockito::Matcher::UrlEncoded("ids".into(), "ethereum".into()))
        .with_status(200)
        .with_body(json!({ "ethereum": { "usd": 2150.5 } }).to_string())
        .create_async()
        .await;

    let app = app_with(Arc::new(FakeReader::default()), &server.url());
    let (status, body) = post(app, "/api/price", json!({ "networkId": 1, "symbol": "ETH" })).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["priceUsd"], 2150.5);
    assert_eq!(body["data"]["tokenAddress"], Value::Null);
}

#[tokio::test]
async fn test_unknown_route() {
    let (status, body) = get(app(), "/api/nothing-here").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error_code"], "NOT_FOUND");
}

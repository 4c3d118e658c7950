//! Unit tests for the REST API
//!
//! Tests the products endpoint, caching behaviour and error handling for the
//! aggregator service.

use apy_aggregator::api::{ApiResponse, ApiServer};
use apy_aggregator::product::{Currency, Product};
use apy_aggregator::{Aggregator, ExchangeAdapter};
use std::sync::Arc;
use warp::http::StatusCode;
use warp::test::request;

#[path = "mod.rs"]
mod test_helpers;
use test_helpers::{build_test_config, call_count, StaticAdapter};

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Create a test API server over the given adapters
fn create_test_api_server(adapters: Vec<Arc<dyn ExchangeAdapter>>) -> ApiServer {
    ApiServer::new(build_test_config(), Aggregator::new(adapters))
}

/// Two exchanges with overlapping currencies
fn default_adapters() -> Vec<Arc<dyn ExchangeAdapter>> {
    vec![
        StaticAdapter::new("Alpha", &[(Currency::Usdt, 3.1), (Currency::Usdc, 2.0)]).into_arc(),
        StaticAdapter::new("Beta", &[(Currency::Usdt, 6.4), (Currency::Dai, 1.5)]).into_arc(),
    ]
}

fn decode(body: &[u8]) -> ApiResponse<Vec<Product>> {
    serde_json::from_slice(body).unwrap()
}

// ============================================================================
// HEALTH ENDPOINT TESTS
// ============================================================================

/// Test that health endpoint returns success
/// What is tested: Basic health check endpoint
/// Why: Ensures service is running and responsive
#[tokio::test]
async fn test_health_endpoint() {
    let api_server = create_test_api_server(default_adapters());
    let routes = api_server.test_routes();

    let response = request().method("GET").path("/health").reply(&routes).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body: ApiResponse<String> = serde_json::from_slice(response.body()).unwrap();
    assert!(body.success);
    assert!(body.data.is_some());
}

// ============================================================================
// PRODUCTS ENDPOINT TESTS
// ============================================================================

/// Test that the default query returns USDT products sorted by APY
/// What is tested: GET /products without parameters
/// Why: The dashboard's first load uses the defaults
#[tokio::test]
async fn test_products_default_query() {
    let api_server = create_test_api_server(default_adapters());
    let routes = api_server.test_routes();

    let response = request().method("GET").path("/products").reply(&routes).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = decode(response.body());
    assert!(body.success);
    assert!(body.error.is_none());
    let products = body.data.unwrap();
    let ids: Vec<&str> = products.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["beta-usdt-flexible", "alpha-usdt-flexible"]);
}

/// Test that the coin parameter is case-insensitive
/// What is tested: coin=usdc
/// Why: Links from other pages use lowercase tickers
#[tokio::test]
async fn test_products_coin_case_insensitive() {
    let api_server = create_test_api_server(default_adapters());
    let routes = api_server.test_routes();

    let response = request()
        .method("GET")
        .path("/products?period=1w&coin=usdc")
        .reply(&routes)
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let products = decode(response.body()).data.unwrap();
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].currency, Currency::Usdc);
    assert_eq!(products[0].exchange, "Alpha");
}

/// Test the JSON shape of a product
/// What is tested: camelCase field names and period keys of apyHistory
/// Why: The dashboard reads these names directly
#[tokio::test]
async fn test_product_json_shape() {
    let api_server = create_test_api_server(default_adapters());
    let routes = api_server.test_routes();

    let response = request().method("GET").path("/products?coin=DAI").reply(&routes).await;

    let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
    let product = &body["data"][0];
    assert_eq!(product["id"], "beta-dai-flexible");
    assert_eq!(product["currency"], "DAI");
    assert_eq!(product["apy"], 1.5);
    assert!(product["exchangeLogo"].is_string());
    assert!(product["minAmount"].is_null());
    assert!(product["maxAmount"].is_null());
    assert!(product["updateTime"].is_i64());
    assert_eq!(product["apyHistory"]["1d"].as_array().unwrap().len(), 12);
    assert_eq!(product["apyHistory"]["1w"].as_array().unwrap().len(), 28);
    assert_eq!(product["apyHistory"]["1m"].as_array().unwrap().len(), 120);
}

/// Test that an empty result is a success
/// What is tested: No exchange offers the requested coin
/// Why: "No products" is a valid answer, not an error
#[tokio::test]
async fn test_products_empty_result() {
    let api_server = create_test_api_server(vec![StaticAdapter::new("Alpha", &[]).into_arc()]);
    let routes = api_server.test_routes();

    let response = request().method("GET").path("/products?coin=USDT").reply(&routes).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = decode(response.body());
    assert!(body.success);
    assert_eq!(body.data.unwrap().len(), 0);
    assert!(api_server.cache().is_empty().await);
}

// ============================================================================
// CACHE TESTS
// ============================================================================

/// Test that a repeated query is served from the cache
/// What is tested: Two identical requests within the TTL
/// Why: Exchanges must not be queried on every page load
#[tokio::test]
async fn test_second_request_served_from_cache() {
    let adapter = StaticAdapter::new("Alpha", &[(Currency::Usdt, 3.0)]);
    let calls = adapter.calls();
    let api_server = create_test_api_server(vec![adapter.into_arc()]);
    let routes = api_server.test_routes();

    let first = request().method("GET").path("/products?coin=USDT&period=1d").reply(&routes).await;
    let second = request().method("GET").path("/products?coin=USDT&period=1d").reply(&routes).await;

    assert_eq!(first.headers()["x-cache"], "MISS");
    assert_eq!(second.headers()["x-cache"], "HIT");
    assert_eq!(call_count(&calls), 1);
    assert_eq!(decode(first.body()).data, decode(second.body()).data);
}

/// Test that the period is part of the cache key
/// What is tested: Same coin with two different periods
/// Why: Each query combination is cached separately
#[tokio::test]
async fn test_period_is_part_of_cache_key() {
    let adapter = StaticAdapter::new("Alpha", &[(Currency::Usdt, 3.0)]);
    let calls = adapter.calls();
    let api_server = create_test_api_server(vec![adapter.into_arc()]);
    let routes = api_server.test_routes();

    request().method("GET").path("/products?coin=USDT&period=1d").reply(&routes).await;
    let response = request().method("GET").path("/products?coin=USDT&period=1m").reply(&routes).await;

    assert_eq!(response.headers()["x-cache"], "MISS");
    assert_eq!(call_count(&calls), 2);
}

/// Test that includeInactive returns placeholders and bypasses the cache
/// What is tested: includeInactive=true on a warm cache
/// Why: The operator view needs every exchange, including idle ones
#[tokio::test]
async fn test_include_inactive_bypasses_cache() {
    let adapter = StaticAdapter::new("Alpha", &[(Currency::Usdt, 3.0)]);
    let calls = adapter.calls();
    let api_server = create_test_api_server(vec![
        adapter.into_arc(),
        StaticAdapter::new("Beta", &[]).into_arc(),
    ]);
    let routes = api_server.test_routes();

    request().method("GET").path("/products?coin=USDT").reply(&routes).await;
    let response = request()
        .method("GET")
        .path("/products?coin=USDT&includeInactive=true")
        .reply(&routes)
        .await;

    assert_eq!(response.headers()["x-cache"], "MISS");
    assert_eq!(call_count(&calls), 2);
    let products = decode(response.body()).data.unwrap();
    assert_eq!(products.len(), 2);
    assert_eq!(products[1].apy, 0.0);
    assert_eq!(products[1].exchange, "Beta");
}

// ============================================================================
// ERROR HANDLING TESTS
// ============================================================================

/// Test that an unsupported coin is rejected
/// What is tested: coin=BTC
/// Why: Only stablecoins are compared
#[tokio::test]
async fn test_invalid_coin_rejected() {
    let api_server = create_test_api_server(default_adapters());
    let routes = api_server.test_routes();

    let response = request().method("GET").path("/products?coin=BTC").reply(&routes).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: ApiResponse<()> = serde_json::from_slice(response.body()).unwrap();
    assert!(!body.success);
    assert!(body.data.is_none());
    assert!(body.error.unwrap().contains("BTC"));
}

/// Test that an unsupported period is rejected
/// What is tested: period=1y
/// Why: Only the three chart windows exist
#[tokio::test]
async fn test_invalid_period_rejected() {
    let api_server = create_test_api_server(default_adapters());
    let routes = api_server.test_routes();

    let response = request().method("GET").path("/products?period=1y").reply(&routes).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: ApiResponse<()> = serde_json::from_slice(response.body()).unwrap();
    assert!(!body.success);
}

/// Test that an adapter panic surfaces as a server error
/// What is tested: Panicking adapter task
/// Why: Defects must not be reported as an empty market
#[tokio::test]
async fn test_adapter_panic_is_server_error() {
    let api_server = create_test_api_server(vec![StaticAdapter::new("Broken", &[]).panicking().into_arc()]);
    let routes = api_server.test_routes();

    let response = request().method("GET").path("/products").reply(&routes).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: ApiResponse<()> = serde_json::from_slice(response.body()).unwrap();
    assert!(!body.success);
    assert!(body.error.is_some());
}

/// Test that unknown paths return 404
/// What is tested: GET /unknown
/// Why: Unknown routes must still answer with the envelope
#[tokio::test]
async fn test_unknown_path_not_found() {
    let api_server = create_test_api_server(default_adapters());
    let routes = api_server.test_routes();

    let response = request().method("GET").path("/unknown").reply(&routes).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: ApiResponse<()> = serde_json::from_slice(response.body()).unwrap();
    assert!(!body.success);
}

/// Test that writes are not allowed
/// What is tested: POST /products
/// Why: The API is read-only
#[tokio::test]
async fn test_post_not_allowed() {
    let api_server = create_test_api_server(default_adapters());
    let routes = api_server.test_routes();

    let response = request().method("POST").path("/products").reply(&routes).await;

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

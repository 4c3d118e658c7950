//! Generic API structures and handlers
//!
//! This module contains the response envelope, the products handler, the
//! rejection handler and the API server for the aggregator service.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use warp::{http::{Method, StatusCode}, Filter, Rejection, Reply};

use crate::aggregator::Aggregator;
use crate::config::Config;
use crate::product::{Currency, Period, Product};
use crate::storage::{CacheKey, CacheStatus, ProductCache};

// ============================================================================
// SHARED REQUEST/RESPONSE STRUCTURES
// ============================================================================

/// Standardized response structure for all API endpoints.
///
/// This structure provides a consistent response format for all API endpoints,
/// including success/error status and relevant data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the request was successful
    pub success: bool,
    /// Response data (if successful)
    pub data: Option<T>,
    /// Error message (if failed)
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// Query parameters for `GET /products`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductsQuery {
    /// History window hint: 1d, 1w or 1m (default 1d)
    pub period: Option<String>,
    /// USDT, USDC or DAI, case-insensitive (default USDT)
    pub coin: Option<String>,
    /// Also return zero-yield placeholders; bypasses the cache
    #[serde(default)]
    pub include_inactive: bool,
}

impl ProductsQuery {
    /// Validates and resolves defaults.
    pub fn resolve(&self) -> Result<(Currency, Period), InvalidParameter> {
        let currency = match self.coin.as_deref() {
            Some(raw) => raw.parse::<Currency>().map_err(InvalidParameter)?,
            None => Currency::Usdt,
        };
        let period = match self.period.as_deref() {
            Some(raw) => raw.parse::<Period>().map_err(InvalidParameter)?,
            None => Period::OneDay,
        };
        Ok((currency, period))
    }
}

// ============================================================================
// SHARED STATE
// ============================================================================

/// Handles shared by all requests: one aggregator and one cache per process.
#[derive(Clone)]
pub struct ApiState {
    pub aggregator: Arc<Aggregator>,
    pub cache: Arc<ProductCache>,
}

/// Creates a warp filter that injects the shared state into handlers.
pub fn with_state(state: ApiState) -> impl Filter<Extract = (ApiState,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || state.clone())
}

// ============================================================================
// HANDLERS
// ============================================================================

/// Handler for `GET /products`.
///
/// Serves from the cache when fresh, otherwise runs the aggregator. The
/// request owns a cancellation token guarded by a drop guard: if the client
/// disconnects, warp drops this future, the token fires, in-flight exchange
/// calls stop, and nothing is cached.
pub async fn get_products_handler(query: ProductsQuery, state: ApiState) -> Result<impl Reply, Rejection> {
    let (currency, period) = query.resolve().map_err(warp::reject::custom)?;

    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();
    let aggregator = state.aggregator.clone();

    let result = if query.include_inactive {
        aggregator
            .aggregate(currency, true, &cancel)
            .await
            .map(|products| (products, CacheStatus::Miss))
    } else {
        state
            .cache
            .get_or_refresh(CacheKey::new(currency, period), || {
                aggregator.aggregate(currency, false, &cancel)
            })
            .await
    };

    match result {
        Ok((products, status)) => {
            info!(
                "GET /products coin={} period={} -> {} products ({:?})",
                currency,
                period,
                products.len(),
                status
            );
            let cache_header = match status {
                CacheStatus::Hit => "HIT",
                CacheStatus::Miss => "MISS",
            };
            Ok(warp::reply::with_header(
                warp::reply::json(&ApiResponse::<Vec<Product>>::ok(products)),
                "x-cache",
                cache_header,
            ))
        }
        Err(e) => {
            error!("Aggregation failed for coin={} period={}: {}", currency, period, e);
            Err(warp::reject::custom(AggregationFailed(e.to_string())))
        }
    }
}

// ============================================================================
// CUSTOM REJECTION TYPES
// ============================================================================

/// Custom rejection for invalid query parameters
#[derive(Debug)]
pub struct InvalidParameter(pub String);

impl warp::reject::Reject for InvalidParameter {}

/// Custom rejection for failures outside the adapter contract
#[derive(Debug)]
pub struct AggregationFailed(pub String);

impl warp::reject::Reject for AggregationFailed {}

// ============================================================================
// CORS CONFIGURATION
// ============================================================================

/// Creates a CORS filter based on the configured allowed origins.
fn create_cors_filter(allowed_origins: &[String]) -> warp::cors::Builder {
    let methods = vec![Method::GET, Method::OPTIONS];

    if allowed_origins.contains(&"*".to_string()) {
        warp::cors()
            .allow_any_origin()
            .allow_methods(methods.clone())
            .allow_headers(vec!["content-type"])
    } else {
        let origins: Vec<&str> = allowed_origins.iter().map(|s| s.as_str()).collect();
        warp::cors()
            .allow_origins(origins)
            .allow_methods(methods)
            .allow_headers(vec!["content-type"])
    }
}

// ============================================================================
// REJECTION HANDLER
// ============================================================================

/// Global rejection handler for all API routes.
///
/// Converts warp rejections into the standard envelope with an appropriate
/// HTTP status code.
pub async fn handle_rejection(rej: Rejection) -> Result<impl Reply, std::convert::Infallible> {
    let (status, message) = if let Some(err) = rej.find::<InvalidParameter>() {
        (StatusCode::BAD_REQUEST, err.0.clone())
    } else if let Some(err) = rej.find::<warp::reject::InvalidQuery>() {
        (StatusCode::BAD_REQUEST, format!("Invalid query: {}", err))
    } else if let Some(err) = rej.find::<AggregationFailed>() {
        (StatusCode::INTERNAL_SERVER_ERROR, err.0.clone())
    } else if rej.is_not_found() {
        (StatusCode::NOT_FOUND, "Endpoint not found".to_string())
    } else if rej.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed".to_string())
    } else {
        error!("Unhandled rejection: {:?}", rej);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(message),
        }),
        status,
    ))
}

// ============================================================================
// API SERVER IMPLEMENTATION
// ============================================================================

/// REST API server for the aggregator service.
pub struct ApiServer {
    /// Service configuration
    config: Arc<Config>,
    /// Aggregator and cache shared across requests
    state: ApiState,
}

impl ApiServer {
    /// Creates a new API server.
    ///
    /// The cache is created here with the configured TTL and lives as long
    /// as the server.
    pub fn new(config: Config, aggregator: Aggregator) -> Self {
        let cache = ProductCache::new(config.cache.ttl());
        Self {
            config: Arc::new(config),
            state: ApiState {
                aggregator: Arc::new(aggregator),
                cache: Arc::new(cache),
            },
        }
    }

    /// Shared cache handle, exposed for inspection in tests.
    pub fn cache(&self) -> Arc<ProductCache> {
        self.state.cache.clone()
    }

    /// Starts the API server and serves until shutdown.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Server stopped
    /// * `Err(anyhow::Error)` - Invalid bind address
    pub async fn run(&self) -> Result<()> {
        info!(
            "Starting API server on {}:{}",
            self.config.api.host, self.config.api.port
        );

        let routes = self.create_routes();

        let addr: std::net::SocketAddr = format!("{}:{}", self.config.api.host, self.config.api.port)
            .parse()
            .context("Failed to parse API server address")?;

        warp::serve(routes).run(addr).await;

        Ok(())
    }

    /// Creates all API routes for the server.
    pub(crate) fn create_routes(
        &self,
    ) -> impl Filter<Extract = impl warp::Reply, Error = std::convert::Infallible> + Clone {
        // Health check endpoint - returns service status
        let health = warp::path("health")
            .and(warp::path::end())
            .and(warp::get())
            .map(|| warp::reply::json(&ApiResponse::ok("APY Aggregator is running".to_string())));

        // Products endpoint - normalized APY products for one coin
        let products = warp::path("products")
            .and(warp::path::end())
            .and(warp::get())
            .and(warp::query::<ProductsQuery>())
            .and(with_state(self.state.clone()))
            .and_then(get_products_handler);

        health
            .or(products)
            .with(create_cors_filter(&self.config.api.cors_origins))
            .recover(handle_rejection)
    }

    /// Public method for testing - exposes routes for integration tests
    pub fn test_routes(&self) -> impl Filter<Extract = impl warp::Reply, Error = std::convert::Infallible> + Clone {
        self.create_routes()
    }
}

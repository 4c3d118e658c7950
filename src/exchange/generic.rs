//! Generic adapter contract and shared HTTP plumbing
//!
//! Every exchange adapter implements [`ExchangeAdapter::fetch_products`], a
//! fallible routine returning typed [`AdapterError`]s. The provided
//! [`ExchangeAdapter::products`] method is the only public boundary: it resolves
//! any error into placeholders so callers always receive one product per
//! supported currency.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::HttpConfig;
use crate::crypto::SignerError;
use crate::product::{placeholders, Currency, ExchangeInfo, Product};

// ============================================================================
// ERRORS
// ============================================================================

/// Failure inside an adapter. Never crosses the adapter boundary.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Required API key, secret or passphrase not configured
    #[error("missing API credentials")]
    MissingCredentials,
    #[error("request signing failed: {0}")]
    Signing(#[from] SignerError),
    /// Network failure or timeout
    #[error("transport error: {0}")]
    Transport(String),
    /// HTTP 429/418 or a throttling business code
    #[error("rate limited: {0}")]
    RateLimited(String),
    /// Non-success HTTP status
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    /// Business error code inside an otherwise successful response
    #[error("exchange error {code}: {message}")]
    Vendor { code: String, message: String },
    /// No active product for the currency
    #[error("no active product for {0}")]
    NoProduct(Currency),
    /// Response did not match the expected schema
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("request cancelled")]
    Cancelled,
}

impl From<reqwest::Error> for AdapterError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AdapterError::Transport(format!("timed out: {}", e))
        } else {
            AdapterError::Transport(e.to_string())
        }
    }
}

// ============================================================================
// ADAPTER TRAIT
// ============================================================================

/// One integrated exchange.
#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    /// Identity stamped on every product this adapter emits.
    fn info(&self) -> &ExchangeInfo;

    /// Whether the exchange is switched on in configuration.
    fn enabled(&self) -> bool {
        true
    }

    /// Fetches and normalizes products for every supported currency.
    ///
    /// Implementations may return fewer products than currencies; missing
    /// currencies are filled with placeholders by [`ExchangeAdapter::products`].
    async fn fetch_products(&self, cancel: &CancellationToken) -> Result<Vec<Product>, AdapterError>;

    /// Adapter boundary: exactly one product per currency, never an error.
    async fn products(&self, cancel: &CancellationToken) -> Vec<Product> {
        let info = self.info();
        if !self.enabled() {
            debug!("{} disabled, emitting placeholders", info.name);
            return placeholders(info);
        }
        match self.fetch_products(cancel).await {
            Ok(products) => complete_shape(info, products),
            Err(AdapterError::Cancelled) => {
                debug!("{} fetch cancelled", info.name);
                placeholders(info)
            }
            Err(AdapterError::MissingCredentials) => {
                warn!("{} credentials not configured, emitting placeholders", info.name);
                placeholders(info)
            }
            Err(e) => {
                warn!("{} fetch failed: {}", info.name, e);
                placeholders(info)
            }
        }
    }
}

/// Orders products as [`Currency::ALL`], keeping the first product per
/// currency and filling gaps with placeholders.
pub fn complete_shape(info: &ExchangeInfo, products: Vec<Product>) -> Vec<Product> {
    Currency::ALL
        .iter()
        .map(|currency| {
            products
                .iter()
                .find(|p| p.currency == *currency)
                .cloned()
                .unwrap_or_else(|| Product::placeholder(info, *currency))
        })
        .collect()
}

/// Resolves per-currency results into products.
///
/// A failure for one currency becomes a placeholder for that currency only.
/// Cancellation aborts the whole adapter call.
pub fn resolve_per_currency(
    info: &ExchangeInfo,
    results: Vec<(Currency, Result<Product, AdapterError>)>,
) -> Result<Vec<Product>, AdapterError> {
    let mut products = Vec::with_capacity(results.len());
    for (currency, result) in results {
        match result {
            Ok(product) => products.push(product),
            Err(AdapterError::Cancelled) => return Err(AdapterError::Cancelled),
            Err(AdapterError::NoProduct(_)) => {
                info!("{} has no active {} product", info.name, currency);
                products.push(Product::placeholder(info, currency));
            }
            Err(e) => {
                warn!("{} {} fetch failed: {}", info.name, currency, e);
                products.push(Product::placeholder(info, currency));
            }
        }
    }
    Ok(products)
}

// ============================================================================
// HTTP HELPERS
// ============================================================================

/// Builds the outbound HTTP client shared by all adapters.
pub fn build_http_client(config: &HttpConfig) -> anyhow::Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(config.timeout())
        .no_proxy() // Avoid macOS system-configuration issues in tests
        .build()?;
    Ok(client)
}

/// Sends a request and decodes a JSON body, racing the request against `cancel`.
///
/// Maps HTTP 429/418 to [`AdapterError::RateLimited`], any other non-2xx to
/// [`AdapterError::Status`] and schema mismatches to [`AdapterError::Decode`].
pub async fn send_json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
    cancel: &CancellationToken,
) -> Result<T, AdapterError> {
    let response = tokio::select! {
        _ = cancel.cancelled() => return Err(AdapterError::Cancelled),
        result = request.send() => result?,
    };

    let status = response.status();
    let body = tokio::select! {
        _ = cancel.cancelled() => return Err(AdapterError::Cancelled),
        result = response.text() => result?,
    };

    if status.as_u16() == 429 || status.as_u16() == 418 {
        return Err(AdapterError::RateLimited(format!("HTTP {}", status.as_u16())));
    }
    if !status.is_success() {
        return Err(AdapterError::Status {
            status: status.as_u16(),
            body: truncate(&body, 256),
        });
    }

    serde_json::from_str(&body).map_err(|e| AdapterError::Decode(e.to_string()))
}

/// Sleeps for `delay` unless `cancel` fires first.
pub async fn pause(delay: Duration, cancel: &CancellationToken) -> Result<(), AdapterError> {
    if delay.is_zero() {
        return Ok(());
    }
    tokio::select! {
        _ = cancel.cancelled() => Err(AdapterError::Cancelled),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}

/// Joins a base URL and an API path without doubling slashes.
pub fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

fn truncate(body: &str, max: usize) -> String {
    if body.len() <= max {
        return body.to_string();
    }
    let mut end = max;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

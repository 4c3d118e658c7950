//! Shared test helpers for unit tests
//!
//! This module provides helper functions used by unit tests.
//!
//! The module is organized into several categories:
//! - **Configuration Builders**: Functions to create test configurations (defaults, mock servers)
//! - **Credentials**: Dummy API credentials for signed exchanges
//! - **Static Adapters**: In-process adapters with fixed products for aggregator and API tests

use apy_aggregator::config::{Config, Credentials, ExchangeConfig, HttpConfig};
use apy_aggregator::exchange::{build_http_client, AdapterError, ExchangeAdapter};
use apy_aggregator::product::{Currency, ExchangeInfo, Product};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Dummy API key for signed exchanges
pub const DUMMY_API_KEY: &str = "test-api-key";

/// Dummy API secret for signed exchanges
pub const DUMMY_API_SECRET: &str = "test-api-secret";

/// Dummy API passphrase (Bitget)
pub const DUMMY_PASSPHRASE: &str = "test-passphrase";

/// Dummy logo reference
pub const DUMMY_LOGO: &str = "/logos/test.svg";

// ============================================================================
// CONFIGURATION BUILDERS
// ============================================================================

/// Build a test config with all exchanges pointing at `base_url`
#[allow(dead_code)]
pub fn build_test_config_with_mock_server(base_url: &str) -> Config {
    let mut config = Config::default();
    config.http = HttpConfig { timeout_ms: 2000 };
    config.exchanges.binance = exchange_config(base_url);
    config.exchanges.bybit = exchange_config(base_url);
    config.exchanges.okx = exchange_config(base_url);
    config.exchanges.bitget = exchange_config(base_url);
    config
}

/// Build a test config that never touches the network
#[allow(dead_code)]
pub fn build_test_config() -> Config {
    build_test_config_with_mock_server("http://127.0.0.1:9")
}

/// Exchange config for a mock server, without history pauses
#[allow(dead_code)]
pub fn exchange_config(base_url: &str) -> ExchangeConfig {
    ExchangeConfig::public(base_url, DUMMY_LOGO)
}

/// HTTP client with a short timeout for tests
#[allow(dead_code)]
pub fn test_client() -> reqwest::Client {
    build_http_client(&HttpConfig { timeout_ms: 2000 }).expect("Failed to create HTTP client")
}

/// HTTP client with a custom timeout in milliseconds
#[allow(dead_code)]
pub fn test_client_with_timeout(timeout_ms: u64) -> reqwest::Client {
    build_http_client(&HttpConfig { timeout_ms }).expect("Failed to create HTTP client")
}

// ============================================================================
// CREDENTIALS
// ============================================================================

/// Key and secret (Binance)
#[allow(dead_code)]
pub fn binance_credentials() -> Credentials {
    Credentials::new(DUMMY_API_KEY, DUMMY_API_SECRET)
}

/// Key, secret and passphrase (Bitget)
#[allow(dead_code)]
pub fn bitget_credentials() -> Credentials {
    Credentials::new(DUMMY_API_KEY, DUMMY_API_SECRET).with_passphrase(DUMMY_PASSPHRASE)
}

// ============================================================================
// STATIC ADAPTERS
// ============================================================================

/// Adapter returning fixed products, counting how often it is called.
#[allow(dead_code)]
pub struct StaticAdapter {
    info: ExchangeInfo,
    rates: Vec<(Currency, f64)>,
    calls: Arc<AtomicUsize>,
    delay: Duration,
    panics: bool,
}

#[allow(dead_code)]
impl StaticAdapter {
    pub fn new(name: &str, rates: &[(Currency, f64)]) -> Self {
        Self {
            info: ExchangeInfo::new(name, name.to_lowercase(), DUMMY_LOGO),
            rates: rates.to_vec(),
            calls: Arc::new(AtomicUsize::new(0)),
            delay: Duration::ZERO,
            panics: false,
        }
    }

    /// Wait `delay` (cancellable) before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Panic inside `fetch_products` to simulate a programming defect
    pub fn panicking(mut self) -> Self {
        self.panics = true;
        self
    }

    /// Shared call counter
    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }

    pub fn into_arc(self) -> Arc<dyn ExchangeAdapter> {
        Arc::new(self)
    }
}

#[async_trait]
impl ExchangeAdapter for StaticAdapter {
    fn info(&self) -> &ExchangeInfo {
        &self.info
    }

    async fn fetch_products(&self, cancel: &CancellationToken) -> Result<Vec<Product>, AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.panics {
            panic!("static adapter {} configured to panic", self.info.name);
        }
        if !self.delay.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => return Err(AdapterError::Cancelled),
                _ = tokio::time::sleep(self.delay) => {}
            }
        }
        Ok(self
            .rates
            .iter()
            .map(|(currency, apy)| Product::new(&self.info, *currency, *apy, &[], None, None))
            .collect())
    }
}

/// Number of calls recorded by a counter
#[allow(dead_code)]
pub fn call_count(counter: &Arc<AtomicUsize>) -> usize {
    counter.load(Ordering::SeqCst)
}

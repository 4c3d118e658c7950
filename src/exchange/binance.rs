//! Binance Simple Earn flexible products
//!
//! Both endpoints are `USER_DATA` endpoints: the query string carries a
//! `timestamp` and is signed with HMAC-SHA256 (hex), the API key travels in the
//! `X-MBX-APIKEY` header. The rate-history endpoint is heavily throttled, so
//! history lookups run one currency at a time with a configurable pause and a
//! throttled lookup simply yields no history.

use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::generic::{
    endpoint, pause, resolve_per_currency, send_json, AdapterError, ExchangeAdapter,
};
use crate::config::{Credentials, ExchangeConfig};
use crate::crypto::hmac_sha256_hex;
use crate::product::{now_millis, parse_amount, parse_fraction, Currency, ExchangeInfo, Product};

const PRODUCT_LIST_PATH: &str = "/sapi/v1/simple-earn/flexible/list";
const RATE_HISTORY_PATH: &str = "/sapi/v1/simple-earn/flexible/history/rateHistory";
const RECV_WINDOW_MS: u64 = 5000;
/// Largest page the rate-history endpoint serves
const HISTORY_PAGE_SIZE: usize = 100;

// ============================================================================
// RESPONSE SCHEMA
// ============================================================================

#[derive(Debug, Deserialize)]
struct ProductListResponse {
    rows: Vec<FlexibleProduct>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlexibleProduct {
    asset: String,
    product_id: String,
    latest_annual_percentage_rate: String,
    #[serde(default)]
    min_purchase_amount: Option<String>,
    #[serde(default = "default_true")]
    can_purchase: bool,
    #[serde(default)]
    status: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct RateHistoryResponse {
    #[serde(default)]
    rows: Vec<RateHistoryRow>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RateHistoryRow {
    annual_percentage_rate: String,
    time: i64,
}

/// Current-rate lookup result kept until history is attached.
#[derive(Debug, Clone)]
struct CurrentRate {
    product_id: String,
    apy: f64,
    min_amount: Option<f64>,
}

// ============================================================================
// ADAPTER
// ============================================================================

/// Adapter for Binance flexible savings.
pub struct BinanceAdapter {
    info: ExchangeInfo,
    config: ExchangeConfig,
    client: reqwest::Client,
    credentials: Option<Credentials>,
}

impl BinanceAdapter {
    pub fn new(config: ExchangeConfig, client: reqwest::Client, credentials: Option<Credentials>) -> Self {
        Self {
            info: ExchangeInfo::new("Binance", "binance", config.logo.clone()),
            config,
            client,
            credentials,
        }
    }

    fn credentials(&self) -> Result<&Credentials, AdapterError> {
        self.credentials
            .as_ref()
            .filter(|c| !c.api_key.trim().is_empty() && !c.api_secret.trim().is_empty())
            .ok_or(AdapterError::MissingCredentials)
    }

    /// Signs `params` (plus timestamp and recvWindow) and builds the request.
    fn signed_get(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<reqwest::RequestBuilder, AdapterError> {
        let credentials = self.credentials()?;
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in params {
            query.append_pair(key, value);
        }
        query.append_pair("recvWindow", &RECV_WINDOW_MS.to_string());
        query.append_pair("timestamp", &now_millis().to_string());
        let query = query.finish();

        let signature = hmac_sha256_hex(&credentials.api_secret, &query)?;
        let url = format!(
            "{}?{}&signature={}",
            endpoint(&self.config.base_url, path),
            query,
            signature
        );
        Ok(self
            .client
            .get(url)
            .header("X-MBX-APIKEY", credentials.api_key.as_str()))
    }

    async fn fetch_current(
        &self,
        currency: Currency,
        cancel: &CancellationToken,
    ) -> Result<CurrentRate, AdapterError> {
        let request = self.signed_get(PRODUCT_LIST_PATH, &[("asset", currency.as_str().to_string())])?;
        let response: ProductListResponse = send_json(request, cancel).await?;
        select_product(&response.rows, currency).ok_or(AdapterError::NoProduct(currency))
    }

    /// Rate history for one product, oldest first.
    async fn fetch_history(
        &self,
        product_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<f64>, AdapterError> {
        let request = self.signed_get(
            RATE_HISTORY_PATH,
            &[
                ("productId", product_id.to_string()),
                ("size", HISTORY_PAGE_SIZE.to_string()),
            ],
        )?;
        let response: RateHistoryResponse = send_json(request, cancel).await?;
        let mut rows = response.rows;
        rows.sort_by_key(|row| row.time);
        Ok(rows
            .iter()
            .filter_map(|row| parse_fraction(&row.annual_percentage_rate))
            .collect())
    }
}

/// Highest-rate purchasable product for `currency`.
fn select_product(rows: &[FlexibleProduct], currency: Currency) -> Option<CurrentRate> {
    rows.iter()
        .filter(|row| row.asset.eq_ignore_ascii_case(currency.as_str()))
        .filter(|row| row.can_purchase)
        .filter(|row| {
            row.status
                .as_deref()
                .map(|s| s.eq_ignore_ascii_case("PURCHASING"))
                .unwrap_or(true)
        })
        .filter_map(|row| {
            let apy = parse_fraction(&row.latest_annual_percentage_rate)?;
            Some(CurrentRate {
                product_id: row.product_id.clone(),
                apy,
                min_amount: parse_amount(row.min_purchase_amount.as_deref()),
            })
        })
        .filter(|rate| rate.apy > 0.0)
        .max_by(|a, b| a.apy.total_cmp(&b.apy))
}

#[async_trait]
impl ExchangeAdapter for BinanceAdapter {
    fn info(&self) -> &ExchangeInfo {
        &self.info
    }

    fn enabled(&self) -> bool {
        self.config.enabled
    }

    async fn fetch_products(&self, cancel: &CancellationToken) -> Result<Vec<Product>, AdapterError> {
        self.credentials()?;

        let current = join_all(
            Currency::ALL
                .iter()
                .map(|currency| async move { (*currency, self.fetch_current(*currency, cancel).await) }),
        )
        .await;

        // History lookups are throttled: one at a time, paused between calls.
        let mut results = Vec::with_capacity(current.len());
        let mut first_lookup = true;
        for (currency, rate) in current {
            let rate = match rate {
                Ok(rate) => rate,
                Err(e) => {
                    results.push((currency, Err(e)));
                    continue;
                }
            };

            if !first_lookup {
                pause(self.config.history_delay(), cancel).await?;
            }
            first_lookup = false;

            let history = match self.fetch_history(&rate.product_id, cancel).await {
                Ok(history) => history,
                Err(AdapterError::Cancelled) => return Err(AdapterError::Cancelled),
                Err(e) => {
                    if matches!(e, AdapterError::RateLimited(_)) {
                        debug!("Binance rate history throttled for {}: {}", currency, e);
                    } else {
                        warn!("Binance rate history unavailable for {}: {}", currency, e);
                    }
                    Vec::new()
                }
            };
            debug!("Binance {} history samples: {}", currency, history.len());

            results.push((
                currency,
                Ok(Product::new(
                    &self.info,
                    currency,
                    rate.apy,
                    &history,
                    rate.min_amount,
                    None,
                )),
            ));
        }

        resolve_per_currency(&self.info, results)
    }
}

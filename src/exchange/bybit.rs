//! Bybit Earn flexible-saving products
//!
//! Public endpoint, no history: the chart series is the current rate repeated.

use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::generic::{endpoint, resolve_per_currency, send_json, AdapterError, ExchangeAdapter};
use crate::config::ExchangeConfig;
use crate::product::{parse_amount, parse_percent, Currency, ExchangeInfo, Product};

const PRODUCT_PATH: &str = "/v5/earn/product";
const CATEGORY: &str = "FlexibleSaving";
/// Business code Bybit uses for request throttling
const RATE_LIMIT_CODE: i64 = 10006;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EarnResponse {
    ret_code: i64,
    #[serde(default)]
    ret_msg: String,
    #[serde(default)]
    result: Option<EarnResult>,
}

#[derive(Debug, Deserialize)]
struct EarnResult {
    #[serde(default)]
    list: Vec<EarnProduct>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EarnProduct {
    coin: String,
    /// Percentage with a trailing `%`, e.g. "3.5%"
    estimate_apr: String,
    #[serde(default)]
    min_stake_amount: Option<String>,
    #[serde(default)]
    max_stake_amount: Option<String>,
    #[serde(default)]
    status: String,
}

/// Adapter for Bybit flexible savings.
pub struct BybitAdapter {
    info: ExchangeInfo,
    config: ExchangeConfig,
    client: reqwest::Client,
}

impl BybitAdapter {
    pub fn new(config: ExchangeConfig, client: reqwest::Client) -> Self {
        Self {
            info: ExchangeInfo::new("Bybit", "bybit", config.logo.clone()),
            config,
            client,
        }
    }

    async fn fetch_currency(
        &self,
        currency: Currency,
        cancel: &CancellationToken,
    ) -> Result<Product, AdapterError> {
        let request = self
            .client
            .get(endpoint(&self.config.base_url, PRODUCT_PATH))
            .query(&[("category", CATEGORY), ("coin", currency.as_str())]);
        let response: EarnResponse = send_json(request, cancel).await?;

        if response.ret_code == RATE_LIMIT_CODE {
            return Err(AdapterError::RateLimited(response.ret_msg));
        }
        if response.ret_code != 0 {
            return Err(AdapterError::Vendor {
                code: response.ret_code.to_string(),
                message: response.ret_msg,
            });
        }

        let products = response.result.map(|r| r.list).unwrap_or_default();
        select_product(&products, currency)
            .map(|(apy, min, max)| Product::new(&self.info, currency, apy, &[], min, max))
            .ok_or(AdapterError::NoProduct(currency))
    }
}

/// Highest-rate available product: `(apy, min_amount, max_amount)`.
fn select_product(products: &[EarnProduct], currency: Currency) -> Option<(f64, Option<f64>, Option<f64>)> {
    products
        .iter()
        .filter(|p| p.coin.eq_ignore_ascii_case(currency.as_str()))
        .filter(|p| p.status.is_empty() || p.status.eq_ignore_ascii_case("Available"))
        .filter_map(|p| {
            let apy = parse_percent(&p.estimate_apr)?;
            // Bybit reports "0" for an uncapped product.
            let max = parse_amount(p.max_stake_amount.as_deref()).filter(|v| *v > 0.0);
            Some((apy, parse_amount(p.min_stake_amount.as_deref()), max))
        })
        .filter(|(apy, _, _)| *apy > 0.0)
        .max_by(|a, b| a.0.total_cmp(&b.0))
}

#[async_trait]
impl ExchangeAdapter for BybitAdapter {
    fn info(&self) -> &ExchangeInfo {
        &self.info
    }

    fn enabled(&self) -> bool {
        self.config.enabled
    }

    async fn fetch_products(&self, cancel: &CancellationToken) -> Result<Vec<Product>, AdapterError> {
        let results = join_all(
            Currency::ALL
                .iter()
                .map(|currency| async move { (*currency, self.fetch_currency(*currency, cancel).await) }),
        )
        .await;
        resolve_per_currency(&self.info, results)
    }
}

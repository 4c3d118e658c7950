//! Bitget Earn savings products
//!
//! Signed endpoint: base64 HMAC-SHA256 over `timestamp + METHOD + path?query`,
//! sent with key, passphrase and timestamp headers. Products carry tiered
//! rates (`apyList`) instead of history.

use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::generic::{endpoint, resolve_per_currency, send_json, AdapterError, ExchangeAdapter};
use crate::config::{Credentials, ExchangeConfig};
use crate::crypto::{bitget_prehash, hmac_sha256_base64};
use crate::product::{now_millis, parse_amount, parse_percent, select_tier, Currency, ExchangeInfo, Product, Tier};

const PRODUCT_PATH: &str = "/api/v2/earn/savings/product";
const SUCCESS_CODE: &str = "00000";
const RATE_LIMIT_CODE: &str = "429";

#[derive(Debug, Deserialize)]
struct BitgetResponse {
    code: String,
    #[serde(default)]
    msg: String,
    /// `null` on business errors
    #[serde(default)]
    data: Option<Vec<SavingsProduct>>,
}

impl BitgetResponse {
    fn into_products(self) -> Result<Vec<SavingsProduct>, AdapterError> {
        match self.code.as_str() {
            SUCCESS_CODE => Ok(self.data.unwrap_or_default()),
            RATE_LIMIT_CODE => Err(AdapterError::RateLimited(self.msg)),
            _ => Err(AdapterError::Vendor {
                code: self.code,
                message: self.msg,
            }),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SavingsProduct {
    coin: String,
    period_type: String,
    status: String,
    #[serde(default)]
    apy_list: Vec<ApyTier>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApyTier {
    min_step_val: String,
    #[serde(default)]
    max_step_val: Option<String>,
    /// Percentage points, e.g. "4.5"
    current_apy: String,
}

impl SavingsProduct {
    fn tiers(&self) -> Vec<Tier> {
        self.apy_list
            .iter()
            .filter_map(|t| {
                Some(Tier {
                    min_step: parse_amount(Some(t.min_step_val.as_str())).unwrap_or(0.0),
                    max_step: parse_amount(t.max_step_val.as_deref()).filter(|v| *v > 0.0),
                    apy: parse_percent(&t.current_apy)?,
                })
            })
            .collect()
    }

    fn is_candidate(&self, currency: Currency) -> bool {
        self.coin.eq_ignore_ascii_case(currency.as_str())
            && self.period_type.eq_ignore_ascii_case("flexible")
            && self.status.eq_ignore_ascii_case("in_progress")
    }
}

/// In-progress flexible product whose selected tier pays the most.
fn select_product(products: &[SavingsProduct], currency: Currency) -> Option<Tier> {
    products
        .iter()
        .filter(|p| p.is_candidate(currency))
        .filter_map(|p| select_tier(&p.tiers()))
        .filter(|tier| tier.apy > 0.0)
        .max_by(|a, b| a.apy.total_cmp(&b.apy))
}

/// Adapter for Bitget savings.
pub struct BitgetAdapter {
    info: ExchangeInfo,
    config: ExchangeConfig,
    client: reqwest::Client,
    credentials: Option<Credentials>,
}

impl BitgetAdapter {
    pub fn new(config: ExchangeConfig, client: reqwest::Client, credentials: Option<Credentials>) -> Self {
        Self {
            info: ExchangeInfo::new("Bitget", "bitget", config.logo.clone()),
            config,
            client,
            credentials,
        }
    }

    /// Key, secret and passphrase, all required.
    fn credentials(&self) -> Result<(&str, &str, &str), AdapterError> {
        let credentials = self.credentials.as_ref().ok_or(AdapterError::MissingCredentials)?;
        let passphrase = credentials.passphrase.as_deref().unwrap_or_default();
        if credentials.api_key.trim().is_empty()
            || credentials.api_secret.trim().is_empty()
            || passphrase.trim().is_empty()
        {
            return Err(AdapterError::MissingCredentials);
        }
        Ok((&credentials.api_key, &credentials.api_secret, passphrase))
    }

    fn signed_get(&self, path: &str, query: &str) -> Result<reqwest::RequestBuilder, AdapterError> {
        let (api_key, api_secret, passphrase) = self.credentials()?;
        let timestamp = now_millis().to_string();
        let signature = hmac_sha256_base64(api_secret, &bitget_prehash(&timestamp, "GET", path, query, ""))?;
        Ok(self
            .client
            .get(format!("{}?{}", endpoint(&self.config.base_url, path), query))
            .header("ACCESS-KEY", api_key)
            .header("ACCESS-SIGN", signature)
            .header("ACCESS-TIMESTAMP", timestamp)
            .header("ACCESS-PASSPHRASE", passphrase)
            .header("locale", "en-US")
            .header("Content-Type", "application/json"))
    }

    async fn fetch_currency(&self, currency: Currency, cancel: &CancellationToken) -> Result<Product, AdapterError> {
        let query = format!("coin={}&filter=available", currency.as_str());
        let request = self.signed_get(PRODUCT_PATH, &query)?;
        let response: BitgetResponse = send_json(request, cancel).await?;
        let products = response.into_products()?;

        let tier = select_product(&products, currency).ok_or(AdapterError::NoProduct(currency))?;
        Ok(Product::new(
            &self.info,
            currency,
            tier.apy,
            &[],
            Some(tier.min_step),
            tier.max_step,
        ))
    }
}

#[async_trait]
impl ExchangeAdapter for BitgetAdapter {
    fn info(&self) -> &ExchangeInfo {
        &self.info
    }

    fn enabled(&self) -> bool {
        self.config.enabled
    }

    async fn fetch_products(&self, cancel: &CancellationToken) -> Result<Vec<Product>, AdapterError> {
        self.credentials()?;
        let results = join_all(
            Currency::ALL
                .iter()
                .map(|currency| async move { (*currency, self.fetch_currency(*currency, cancel).await) }),
        )
        .await;
        resolve_per_currency(&self.info, results)
    }
}

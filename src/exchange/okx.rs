//! OKX Simple Earn lending rates
//!
//! Public endpoints. The summary gives the current annualized lending rate as a
//! fraction; the history endpoint returns hourly samples, newest first.

use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::generic::{endpoint, resolve_per_currency, send_json, AdapterError, ExchangeAdapter};
use crate::config::ExchangeConfig;
use crate::product::{parse_fraction, Currency, ExchangeInfo, Product};

const SUMMARY_PATH: &str = "/api/v5/finance/savings/lending-rate-summary";
const HISTORY_PATH: &str = "/api/v5/finance/savings/lending-rate-history";
/// Business code OKX uses for request throttling
const RATE_LIMIT_CODE: &str = "50011";
/// Largest page the lending-rate-history endpoint serves
const HISTORY_PAGE_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct OkxResponse<T> {
    code: String,
    #[serde(default)]
    msg: String,
    /// `null` on business errors
    #[serde(default)]
    data: Option<Vec<T>>,
}

impl<T> OkxResponse<T> {
    fn into_data(self) -> Result<Vec<T>, AdapterError> {
        match self.code.as_str() {
            "0" => Ok(self.data.unwrap_or_default()),
            RATE_LIMIT_CODE => Err(AdapterError::RateLimited(self.msg)),
            _ => Err(AdapterError::Vendor {
                code: self.code,
                message: self.msg,
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RateSummary {
    ccy: String,
    #[serde(default)]
    est_rate: String,
    #[serde(default)]
    pre_rate: String,
    #[serde(default)]
    avg_rate: String,
}

impl RateSummary {
    /// Estimated next rate, falling back to the previous and average rates.
    fn current_rate(&self) -> Option<f64> {
        [&self.est_rate, &self.pre_rate, &self.avg_rate]
            .iter()
            .filter(|raw| !raw.is_empty())
            .find_map(|raw| parse_fraction(raw))
    }
}

#[derive(Debug, Deserialize)]
struct RateHistoryRow {
    rate: String,
    /// Epoch milliseconds as a string
    ts: String,
}

/// Adapter for OKX savings lending rates.
pub struct OkxAdapter {
    info: ExchangeInfo,
    config: ExchangeConfig,
    client: reqwest::Client,
}

impl OkxAdapter {
    pub fn new(config: ExchangeConfig, client: reqwest::Client) -> Self {
        Self {
            info: ExchangeInfo::new("OKX", "okx", config.logo.clone()),
            config,
            client,
        }
    }

    async fn fetch_current(&self, currency: Currency, cancel: &CancellationToken) -> Result<f64, AdapterError> {
        let request = self
            .client
            .get(endpoint(&self.config.base_url, SUMMARY_PATH))
            .query(&[("ccy", currency.as_str())]);
        let response: OkxResponse<RateSummary> = send_json(request, cancel).await?;
        response
            .into_data()?
            .iter()
            .filter(|s| s.ccy.eq_ignore_ascii_case(currency.as_str()))
            .find_map(RateSummary::current_rate)
            .filter(|apy| *apy > 0.0)
            .ok_or(AdapterError::NoProduct(currency))
    }

    /// History samples, oldest first.
    async fn fetch_history(&self, currency: Currency, cancel: &CancellationToken) -> Result<Vec<f64>, AdapterError> {
        let limit = HISTORY_PAGE_SIZE.to_string();
        let request = self
            .client
            .get(endpoint(&self.config.base_url, HISTORY_PATH))
            .query(&[("ccy", currency.as_str()), ("limit", limit.as_str())]);
        let response: OkxResponse<RateHistoryRow> = send_json(request, cancel).await?;
        let mut rows: Vec<(i64, f64)> = response
            .into_data()?
            .iter()
            .filter_map(|row| Some((row.ts.parse::<i64>().ok()?, parse_fraction(&row.rate)?)))
            .collect();
        rows.sort_by_key(|(ts, _)| *ts);
        Ok(rows.into_iter().map(|(_, rate)| rate).collect())
    }

    async fn fetch_currency(&self, currency: Currency, cancel: &CancellationToken) -> Result<Product, AdapterError> {
        let (current, history) = tokio::join!(
            self.fetch_current(currency, cancel),
            self.fetch_history(currency, cancel)
        );
        let apy = current?;
        let history = match history {
            Ok(history) => history,
            Err(AdapterError::Cancelled) => return Err(AdapterError::Cancelled),
            Err(e) => {
                warn!("OKX lending history unavailable for {}: {}", currency, e);
                Vec::new()
            }
        };
        Ok(Product::new(&self.info, currency, apy, &history, None, None))
    }
}

#[async_trait]
impl ExchangeAdapter for OkxAdapter {
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

//! Normalized Product Model
//!
//! This module defines the single schema every exchange adapter produces,
//! together with the normalization helpers shared by all adapters: rate unit
//! conversion, tier selection and fixed-length history back-fill.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// CURRENCIES AND PERIODS
// ============================================================================

/// Stablecoins the aggregator compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usdt,
    Usdc,
    Dai,
}

impl Currency {
    /// Every supported currency, in the order adapters emit them.
    pub const ALL: [Currency; 3] = [Currency::Usdt, Currency::Usdc, Currency::Dai];

    /// Exchange-facing ticker (e.g. "USDT").
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Usdt => "USDT",
            Currency::Usdc => "USDC",
            Currency::Dai => "DAI",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "USDT" => Ok(Currency::Usdt),
            "USDC" => Ok(Currency::Usdc),
            "DAI" => Ok(Currency::Dai),
            other => Err(format!("Unsupported coin '{}': expected USDT, USDC or DAI", other)),
        }
    }
}

/// History window shown by the dashboard chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Period {
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "1w")]
    OneWeek,
    #[serde(rename = "1m")]
    OneMonth,
}

impl Period {
    pub const ALL: [Period; 3] = [Period::OneDay, Period::OneWeek, Period::OneMonth];

    /// Fixed number of samples every history series carries for this period.
    pub fn points(&self) -> usize {
        match self {
            Period::OneDay => 12,
            Period::OneWeek => 28,
            Period::OneMonth => 120,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::OneDay => "1d",
            Period::OneWeek => "1w",
            Period::OneMonth => "1m",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1d" => Ok(Period::OneDay),
            "1w" => Ok(Period::OneWeek),
            "1m" => Ok(Period::OneMonth),
            other => Err(format!("Unsupported period '{}': expected 1d, 1w or 1m", other)),
        }
    }
}

/// Period key -> samples, oldest first.
pub type ApyHistory = BTreeMap<Period, Vec<f64>>;

// ============================================================================
// PRODUCT
// ============================================================================

/// Identity of the exchange a product came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeInfo {
    /// Display name (e.g. "Binance")
    pub name: String,
    /// Lowercase identifier used to build product IDs (e.g. "binance")
    pub slug: String,
    /// Opaque logo reference passed through to the dashboard
    pub logo: String,
}

impl ExchangeInfo {
    pub fn new(name: impl Into<String>, slug: impl Into<String>, logo: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slug: slug.into(),
            logo: logo.into(),
        }
    }
}

/// Normalized flexible-savings product.
///
/// Built once per aggregation and never mutated afterwards. An `apy` of zero
/// marks a placeholder: the exchange has no active product for the currency,
/// or the adapter could not reach it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// `<exchange>-<currency>-flexible`
    pub id: String,
    pub exchange: String,
    pub exchange_logo: String,
    pub currency: Currency,
    /// Current annualized yield in percentage points (4.25 = 4.25%)
    pub apy: f64,
    pub apy_history: ApyHistory,
    pub min_amount: Option<f64>,
    /// `None` means no upper bound
    pub max_amount: Option<f64>,
    /// Epoch milliseconds when the record was produced
    pub update_time: i64,
}

impl Product {
    /// Builds an active product from a current rate and whatever history the
    /// exchange supplied (oldest first, any length).
    pub fn new(
        exchange: &ExchangeInfo,
        currency: Currency,
        apy: f64,
        history: &[f64],
        min_amount: Option<f64>,
        max_amount: Option<f64>,
    ) -> Self {
        let apy = round_rate(apy.max(0.0));
        Self {
            id: product_id(&exchange.slug, currency),
            exchange: exchange.name.clone(),
            exchange_logo: exchange.logo.clone(),
            currency,
            apy,
            apy_history: build_history(history, apy),
            min_amount,
            max_amount,
            update_time: now_millis(),
        }
    }

    /// Zero-APY stand-in for a currency the exchange cannot serve right now.
    pub fn placeholder(exchange: &ExchangeInfo, currency: Currency) -> Self {
        Self::new(exchange, currency, 0.0, &[], None, None)
    }

    /// Whether this product represents a live offer.
    pub fn is_active(&self) -> bool {
        self.apy > 0.0
    }
}

/// One placeholder per supported currency.
pub fn placeholders(exchange: &ExchangeInfo) -> Vec<Product> {
    Currency::ALL
        .iter()
        .map(|currency| Product::placeholder(exchange, *currency))
        .collect()
}

/// Stable product identifier, unique per exchange and currency.
pub fn product_id(slug: &str, currency: Currency) -> String {
    format!("{}-{}-flexible", slug, currency.as_str().to_lowercase())
}

/// Current time in epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// ============================================================================
// RATE NORMALIZATION
// ============================================================================

/// Rounds a percentage to two decimals.
pub fn round_rate(percent: f64) -> f64 {
    if !percent.is_finite() {
        return 0.0;
    }
    (percent * 100.0).round() / 100.0
}

/// Converts a fractional rate (0.0425) into percentage points (4.25).
pub fn fraction_to_percent(fraction: f64) -> f64 {
    round_rate(fraction * 100.0)
}

/// Parses a decimal string holding a fractional rate ("0.0425").
pub fn parse_fraction(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite()).map(fraction_to_percent)
}

/// Parses a percentage string with or without a trailing `%` ("3.5%", "3.5").
pub fn parse_percent(raw: &str) -> Option<f64> {
    raw.trim()
        .trim_end_matches('%')
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(round_rate)
}

/// Parses an optional amount string; empty strings and non-numbers become `None`.
pub fn parse_amount(raw: Option<&str>) -> Option<f64> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

// ============================================================================
// TIER SELECTION
// ============================================================================

/// Deposit-size dependent rate bracket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tier {
    /// Lower bound of the bracket
    pub min_step: f64,
    /// Upper bound of the bracket, `None` when open ended
    pub max_step: Option<f64>,
    /// Rate for the bracket in percentage points
    pub apy: f64,
}

/// Picks the rate bracket a regular depositor gets.
///
/// With several tiers the first one is a promotional rate capped at a small
/// amount, so the second tier (by minimum step) is selected. A single tier is
/// returned as is.
pub fn select_tier(tiers: &[Tier]) -> Option<Tier> {
    let mut ordered: Vec<Tier> = tiers.to_vec();
    ordered.sort_by(|a, b| a.min_step.total_cmp(&b.min_step));
    match ordered.len() {
        0 => None,
        1 => Some(ordered[0]),
        _ => Some(ordered[1]),
    }
}

// ============================================================================
// HISTORY BACK-FILL
// ============================================================================

/// Builds the fixed-length history map.
///
/// `samples` must be ordered oldest to newest. For each period the most recent
/// `period.points()` samples are kept and the series is padded at the end with
/// `current` until it reaches the fixed length.
pub fn build_history(samples: &[f64], current: f64) -> ApyHistory {
    Period::ALL
        .iter()
        .map(|period| (*period, fill_series(samples, current, period.points())))
        .collect()
}

fn fill_series(samples: &[f64], current: f64, points: usize) -> Vec<f64> {
    let start = samples.len().saturating_sub(points);
    let mut series: Vec<f64> = samples[start..].to_vec();
    series.resize(points, current);
    series
}

//! APY Aggregator Service Library
//!
//! This crate aggregates flexible-savings APY for USDT, USDC and DAI from
//! Binance, Bybit, OKX and Bitget, normalizes the responses into one
//! [`Product`] schema, caches results briefly and serves them over HTTP.
//! The service is read-only: it never places orders or moves funds.

pub mod aggregator;
pub mod api;
pub mod config;
pub mod crypto;
pub mod exchange;
pub mod product;
pub mod storage;

// Re-export commonly used types
pub use aggregator::{AggregateError, Aggregator};
pub use config::{ApiConfig, CacheConfig, Config, Credentials, ExchangeConfig, ExchangesConfig, HttpConfig};
pub use exchange::{AdapterError, ExchangeAdapter};
pub use product::{Currency, ExchangeInfo, Period, Product};
pub use storage::{CacheKey, ProductCache};

//! Exchange Adapter Module
//!
//! One adapter per integrated exchange. Each adapter knows its exchange's
//! endpoint shapes, authentication and rate-limit quirks, and turns the
//! responses into normalized [`Product`](crate::product::Product) records.

// Shared adapter contract, errors and HTTP helpers
pub mod generic;

pub mod binance;
pub mod bitget;
pub mod bybit;
pub mod okx;

use std::sync::Arc;
use tracing::info;

use crate::config::{Config, Credentials};

pub use binance::BinanceAdapter;
pub use bitget::BitgetAdapter;
pub use bybit::BybitAdapter;
pub use generic::{build_http_client, AdapterError, ExchangeAdapter};
pub use okx::OkxAdapter;

/// Builds the four production adapters in aggregation order.
///
/// Credentials are resolved from the environment here, once per process. An
/// exchange whose credentials are missing still gets an adapter; it emits
/// placeholders.
pub fn build_adapters(config: &Config) -> anyhow::Result<Vec<Arc<dyn ExchangeAdapter>>> {
    let client = build_http_client(&config.http)?;
    let exchanges = &config.exchanges;

    let binance_credentials = Credentials::from_env(&exchanges.binance);
    let bitget_credentials = Credentials::from_env(&exchanges.bitget);
    info!(
        "Binance credentials: {}",
        credential_status(binance_credentials.as_ref(), false)
    );
    info!(
        "Bitget credentials: {}",
        credential_status(bitget_credentials.as_ref(), true)
    );

    Ok(vec![
        Arc::new(BinanceAdapter::new(exchanges.binance.clone(), client.clone(), binance_credentials)),
        Arc::new(BybitAdapter::new(exchanges.bybit.clone(), client.clone())),
        Arc::new(OkxAdapter::new(exchanges.okx.clone(), client.clone())),
        Arc::new(BitgetAdapter::new(exchanges.bitget.clone(), client, bitget_credentials)),
    ])
}

/// Startup description of an exchange's credentials.
///
/// `needs_passphrase` marks exchanges that reject requests without one.
pub fn credential_status(credentials: Option<&Credentials>, needs_passphrase: bool) -> &'static str {
    match credentials {
        None => "missing key or secret",
        Some(c) if needs_passphrase && c.passphrase.is_none() => "missing passphrase",
        Some(_) if needs_passphrase => "key, secret and passphrase set",
        Some(_) => "key and secret set",
    }
}

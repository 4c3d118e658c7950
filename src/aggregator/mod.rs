//! Product Aggregation Module
//!
//! Runs every exchange adapter concurrently, concatenates their products in
//! adapter order, keeps the requested currency and sorts by yield.

use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::exchange::ExchangeAdapter;
use crate::product::{Currency, Product};

/// Failures that escape the adapter contract.
#[derive(Debug, Error)]
pub enum AggregateError {
    /// The request was cancelled before all adapters finished
    #[error("aggregation cancelled")]
    Cancelled,
    /// An adapter task panicked or was aborted
    #[error("adapter task for {exchange} failed: {reason}")]
    Task { exchange: String, reason: String },
}

/// Fans out to all adapters and merges their results.
pub struct Aggregator {
    adapters: Vec<Arc<dyn ExchangeAdapter>>,
}

impl Aggregator {
    /// Creates an aggregator over `adapters`; their order is the tie-break
    /// order for equal yields.
    pub fn new(adapters: Vec<Arc<dyn ExchangeAdapter>>) -> Self {
        Self { adapters }
    }

    /// Number of adapters this aggregator fans out to.
    pub fn adapter_count(&self) -> usize {
        self.adapters.len()
    }

    /// Products from every adapter, concatenated in adapter order.
    ///
    /// Each adapter runs in its own task. Adapters never fail, so the only
    /// errors are a panicking task or a cancelled request.
    pub async fn collect_all(&self, cancel: &CancellationToken) -> Result<Vec<Product>, AggregateError> {
        let started = Instant::now();
        let handles: Vec<_> = self
            .adapters
            .iter()
            .map(|adapter| {
                let adapter = Arc::clone(adapter);
                let cancel = cancel.clone();
                tokio::spawn(async move { adapter.products(&cancel).await })
            })
            .collect();

        let results = join_all(handles).await;

        let mut products = Vec::new();
        for (adapter, result) in self.adapters.iter().zip(results) {
            match result {
                Ok(list) => {
                    debug!("{} returned {} products", adapter.info().name, list.len());
                    products.extend(list);
                }
                Err(e) => {
                    error!("Adapter task for {} failed: {}", adapter.info().name, e);
                    return Err(AggregateError::Task {
                        exchange: adapter.info().name.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        if cancel.is_cancelled() {
            return Err(AggregateError::Cancelled);
        }

        info!(
            "Collected {} products from {} exchanges in {:?}",
            products.len(),
            self.adapters.len(),
            started.elapsed()
        );
        Ok(products)
    }

    /// Active products for `currency`, highest yield first.
    ///
    /// With `include_inactive` the zero-yield placeholders are kept as well.
    /// An empty list is a valid outcome.
    pub async fn aggregate(
        &self,
        currency: Currency,
        include_inactive: bool,
        cancel: &CancellationToken,
    ) -> Result<Vec<Product>, AggregateError> {
        let products = self.collect_all(cancel).await?;
        Ok(filter_and_sort(products, currency, include_inactive))
    }
}

/// Keeps `currency` (and, unless `include_inactive`, only `apy > 0`), then
/// sorts by `apy` descending. The sort is stable, so equal yields keep their
/// concatenation order.
pub fn filter_and_sort(products: Vec<Product>, currency: Currency, include_inactive: bool) -> Vec<Product> {
    let mut selected: Vec<Product> = products
        .into_iter()
        .filter(|p| p.currency == currency)
        .filter(|p| include_inactive || p.is_active())
        .collect();
    selected.sort_by(|a, b| b.apy.total_cmp(&a.apy));
    selected
}

//! In-memory storage for the aggregator service.

pub mod product_cache;

pub use product_cache::{CacheKey, CacheStatus, ProductCache};

//! REST API Server Module
//!
//! This module provides the dashboard-facing REST API: a health check and
//! `GET /products?period=&coin=`, answered from the product cache or a fresh
//! aggregation.

// Envelope, handlers, rejection handling and the server itself
mod generic;

pub use generic::{
    get_products_handler, handle_rejection, AggregationFailed, ApiResponse, ApiServer, ApiState,
    InvalidParameter, ProductsQuery,
};

//! Yahoo Finance market-data provider
//!
//! Implements [`forecast_core::MarketDataProvider`] over the public chart
//! API: daily history, quote metadata, and the built-in symbol universe
//! merged with optional remote symbol lists.

pub mod client;
pub mod config;
pub mod rate_limiter;
pub mod types;
pub mod universe;

pub use client::YahooClient;
pub use config::YahooConfig;
pub use rate_limiter::{RateLimiter, RateLimiterStats};

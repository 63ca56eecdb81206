//! Quote Module
//!
//! Venue quoting for constant-product and concentrated-liquidity venues,
//! the short-lived quote cache, and the native-asset price oracle.
//!
//! Author: AI-Generated
//! Created: 2026-02-06

pub mod cache;
pub mod oracle;
pub mod provider;
pub mod venue;

pub use cache::QuoteCache;
pub use oracle::{NativePriceOracle, DEFAULT_ORACLE_TTL};
pub use provider::{QuoteProvider, RetryPolicy};
pub use venue::{ConcentratedLiquidityVenue, ConstantProductVenue, Venue};

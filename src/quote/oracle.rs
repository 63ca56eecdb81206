//! Native-asset price oracle
//!
//! Gas is paid in the native asset but profit is counted in the borrowed
//! token, so the scanner needs "borrowed base units per 1 native unit".
//! That rate is a direct quote of one wrapped-native unit into the borrowed
//! token on a trusted constant-product venue, cached for 30 seconds.
//! When a refresh fails the last rate is served for a while longer, but
//! never past `max_stale` (ten TTLs); after that the rate is unknown.

use super::provider::QuoteProvider;
use super::venue::Venue;
use crate::types::{Route, Token};
use alloy::primitives::U256;
use std::time::Duration;
use tokio::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub const DEFAULT_ORACLE_TTL: Duration = Duration::from_secs(30);
const MAX_STALE_TTLS: u32 = 10;

pub struct NativePriceOracle {
    native: Token,
    borrowed: Token,
    ttl: Duration,
    max_stale: Duration,
    cached: Mutex<Option<(U256, Instant)>>,
}

impl NativePriceOracle {
    pub fn new(native: Token, borrowed: Token, ttl: Duration) -> Self {
        Self {
            native,
            borrowed,
            ttl,
            max_stale: ttl * MAX_STALE_TTLS,
            cached: Mutex::new(None),
        }
    }

    pub fn native(&self) -> &Token {
        &self.native
    }

    /// Borrowed-token base units for one whole native unit. 0 when unknown.
    pub async fn rate(&self, quotes: &QuoteProvider, venue: &Venue) -> U256 {
        let one_native = U256::from(10u64).pow(U256::from(self.native.decimals));
        if self.native.address == self.borrowed.address {
            return one_native;
        }

        let mut cached = self.cached.lock().await;
        if let Some((rate, at)) = *cached {
            if at.elapsed() < self.ttl {
                return rate;
            }
        }

        let route = match Route::constant_product(vec![self.native.address, self.borrowed.address]) {
            Ok(r) => r,
            Err(_) => return U256::ZERO,
        };
        let rate = quotes.quote_fresh(venue, &route, one_native).await;
        if rate.is_zero() {
            warn!(
                "💱 Price oracle: no {}→{} quote on {}",
                self.native.symbol,
                self.borrowed.symbol,
                venue.name()
            );
            return match *cached {
                Some((stale, at)) if at.elapsed() < self.max_stale => {
                    debug!("💱 Serving {}s-old rate", at.elapsed().as_secs());
                    stale
                }
                _ => U256::ZERO,
            };
        }

        debug!(
            "💱 1 {} = {} {} ({})",
            self.native.symbol,
            self.borrowed.format(rate),
            self.borrowed.symbol,
            venue.name()
        );
        *cached = Some((rate, Instant::now()));
        rate
    }
}

//! Quote Provider
//!
//! `quote(venue, route, amount_in) -> amount_out` that never fails past this
//! layer: "no liquidity" becomes 0 at debug level, RPC failures are retried
//! (fixed backoff, each failure counted against the endpoint) and become 0 at
//! warn level once attempts are exhausted.
//!
//! Candidate routes for one leg are quoted concurrently; the winner is picked
//! in candidate order (first maximum wins), so results do not depend on
//! completion order.
//!
//! Author: AI-Generated
//! Created: 2026-02-06

use super::cache::QuoteCache;
use super::venue::Venue;
use crate::error::QuoteError;
use crate::rpc::{ChainClient, Telemetry};
use crate::types::{Quote, Route};
use alloy::primitives::{Address, U256};
use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 2,
            backoff: Duration::from_millis(250),
        }
    }
}

pub struct QuoteProvider {
    client: Arc<dyn ChainClient>,
    telemetry: Arc<Telemetry>,
    cache: QuoteCache,
    retry: RetryPolicy,
    hubs: Vec<Address>,
}

impl QuoteProvider {
    pub fn new(
        client: Arc<dyn ChainClient>,
        telemetry: Arc<Telemetry>,
        cache_ttl: Duration,
        retry: RetryPolicy,
        hubs: Vec<Address>,
    ) -> Self {
        Self {
            client,
            telemetry,
            cache: QuoteCache::new(cache_ttl),
            retry,
            hubs,
        }
    }

    pub fn cache(&self) -> &QuoteCache {
        &self.cache
    }

    /// Cached quote for one route.
    pub async fn quote(&self, venue: &Venue, route: &Route, amount_in: U256) -> U256 {
        if let Some(hit) = self.cache.get(venue.name(), route, amount_in, Instant::now()) {
            return hit;
        }
        self.quote_uncached(venue, route, amount_in).await
    }

    /// Bypasses the cache read (still refreshes it). Used before execution.
    pub async fn quote_fresh(&self, venue: &Venue, route: &Route, amount_in: U256) -> U256 {
        self.quote_uncached(venue, route, amount_in).await
    }

    async fn quote_uncached(&self, venue: &Venue, route: &Route, amount_in: U256) -> U256 {
        if amount_in.is_zero() {
            return U256::ZERO;
        }
        let result = self
            .with_retry(|| venue.quote_route(self.client.as_ref(), route, amount_in))
            .await;
        match result {
            Ok(amount_out) => {
                self.cache.insert(venue.name(), route, amount_in, amount_out, Instant::now());
                amount_out
            }
            Err(QuoteError::NoLiquidity(reason)) => {
                debug!("No liquidity on {} for {:?}: {}", venue.name(), route.tokens(), reason);
                self.cache.insert(venue.name(), route, amount_in, U256::ZERO, Instant::now());
                U256::ZERO
            }
            Err(QuoteError::Rpc(e)) => {
                warn!(
                    "⚠️  Quote failed on {} for {:?} after {} attempts: {}",
                    venue.name(),
                    route.tokens(),
                    self.retry.attempts,
                    e
                );
                U256::ZERO
            }
        }
    }

    /// Best route from `from` to `to` on `venue`. `None` when every candidate quotes 0.
    pub async fn best_quote(&self, venue: &Venue, from: Address, to: Address, amount_in: U256) -> Option<Quote> {
        let candidates = venue.route_candidates(from, to, &self.hubs);
        let outputs = join_all(candidates.iter().map(|route| self.quote(venue, route, amount_in))).await;

        let mut best: Option<(usize, U256)> = None;
        for (idx, out) in outputs.iter().enumerate() {
            if out.is_zero() {
                continue;
            }
            match best {
                Some((_, current)) if *out <= current => {}
                _ => best = Some((idx, *out)),
            }
        }

        best.map(|(idx, amount_out)| Quote {
            venue: venue.name().to_string(),
            route: candidates[idx].clone(),
            amount_in,
            amount_out,
        })
    }

    /// Pair reserves oriented (token_in, token_out) on a constant-product venue.
    pub async fn reserves(&self, venue: &Venue, token_in: Address, token_out: Address) -> Option<(u128, u128)> {
        let Venue::ConstantProduct(cp) = venue else {
            return None;
        };
        match self
            .with_retry(|| self.client.pair_reserves(cp.factory, token_in, token_out))
            .await
        {
            Ok(reserves) => reserves,
            Err(QuoteError::NoLiquidity(reason)) => {
                debug!("No reserves on {}: {}", cp.name, reason);
                None
            }
            Err(QuoteError::Rpc(e)) => {
                warn!("⚠️  Reserve read failed on {}: {}", cp.name, e);
                None
            }
        }
    }

    async fn with_retry<T, F, Fut>(&self, mut call: F) -> Result<T, QuoteError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, QuoteError>>,
    {
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(v) => return Ok(v),
                Err(QuoteError::NoLiquidity(reason)) => return Err(QuoteError::NoLiquidity(reason)),
                Err(QuoteError::Rpc(e)) => {
                    self.telemetry.record_fail(self.client.url());
                    if attempt >= self.retry.attempts {
                        return Err(QuoteError::Rpc(e));
                    }
                    debug!("Quote attempt {} failed ({}), retrying", attempt, e);
                    attempt += 1;
                    tokio::time::sleep(self.retry.backoff).await;
                }
            }
        }
    }
}

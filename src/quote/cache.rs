//! Quote Cache
//!
//! Short-TTL memo of quote results keyed by the exact
//! (venue, route, amount_in) triple. Bounds repeated quoter calls inside
//! one scan pass; never consulted by execution-time re-quotes.
//!
//! Author: AI-Generated
//! Created: 2026-02-06

use crate::types::Route;
use alloy::primitives::U256;
use dashmap::DashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct QuoteKey {
    venue: String,
    route: Route,
    amount_in: U256,
}

pub struct QuoteCache {
    entries: DashMap<QuoteKey, (U256, Instant)>,
    ttl: Duration,
}

impl QuoteCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn get(&self, venue: &str, route: &Route, amount_in: U256, now: Instant) -> Option<U256> {
        let key = QuoteKey {
            venue: venue.to_string(),
            route: route.clone(),
            amount_in,
        };
        let entry = self.entries.get(&key)?;
        let (amount_out, stored) = *entry.value();
        if now.saturating_duration_since(stored) < self.ttl {
            Some(amount_out)
        } else {
            None
        }
    }

    pub fn insert(&self, venue: &str, route: &Route, amount_in: U256, amount_out: U256, now: Instant) {
        self.entries.insert(
            QuoteKey {
                venue: venue.to_string(),
                route: route.clone(),
                amount_in,
            },
            (amount_out, now),
        );
    }

    /// Drop expired entries. Returns how many were removed.
    pub fn purge_expired(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, (_, stored)| now.saturating_duration_since(*stored) < self.ttl);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

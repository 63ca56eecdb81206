//! Optimal-Size Solver
//!
//! Closed form for two constant-product pools, and a bounded geometric grid
//! search for anything that needs a quoter.
//!
//! Closed form: both reserve pairs are given as (borrowed reserve, target
//! reserve) on their venue. Buying on A and selling on B composes into one
//! virtual constant-product pool, whose profit-maximising input is
//!
//! ```text
//! amount_in = (√(Rin_a · Rout_b · Rin_b · Rout_a) − Rin_a · Rout_b) / (Rout_a + Rout_b)
//! ```
//!
//! where Rin_* is the borrowed-token reserve and Rout_* the target-token
//! reserve. The computation is exact integer arithmetic in 512 bits (the
//! four-way product of u128 reserves fits), floored to base units.
//!
//! Author: AI-Generated
//! Created: 2026-02-07

use alloy::primitives::{U256, U512};
use std::future::Future;
use tokio::time::Instant;

/// Constant-product output with the standard 0.30% fee (997/1000).
pub fn constant_product_out(amount_in: U256, reserve_in: u128, reserve_out: u128) -> U256 {
    if amount_in.is_zero() || reserve_in == 0 || reserve_out == 0 {
        return U256::ZERO;
    }
    let amount_in_with_fee = U512::from(amount_in) * U512::from(997u64);
    let numerator = amount_in_with_fee * U512::from(reserve_out);
    let denominator = U512::from(reserve_in) * U512::from(1000u64) + amount_in_with_fee;
    narrow(numerator / denominator)
}

/// Profit-maximising borrow size for buy venue `a` and sell venue `b`,
/// each given as (borrowed reserve, target reserve). 0 when there is no
/// exploitable direction.
pub fn optimal_amount_in(a: (u128, u128), b: (u128, u128)) -> U256 {
    let (rin_a, rout_a) = (U512::from(a.0), U512::from(a.1));
    let (rin_b, rout_b) = (U512::from(b.0), U512::from(b.1));

    let root = isqrt(rin_a * rout_b * rin_b * rout_a);
    let subtrahend = rin_a * rout_b;
    if root <= subtrahend {
        return U256::ZERO;
    }
    // Rout_a + Rout_b, not Rin_a + Rin_b: with both pairs oriented
    // (borrowed, target) the composed pool's input reserve scales by the
    // two target-side reserves. The two agree on mirrored pools.
    let denominator = rout_a + rout_b;
    if denominator.is_zero() {
        return U256::ZERO;
    }
    narrow((root - subtrahend) / denominator)
}

/// floor(√n), Newton's method from an over-estimate.
pub fn isqrt(n: U512) -> U512 {
    if n < U512::from(2u64) {
        return n;
    }
    let mut x = U512::from(1u64) << ((n.bit_len() + 1) / 2);
    loop {
        let y = (x + n / x) >> 1;
        if y >= x {
            return x;
        }
        x = y;
    }
}

fn narrow(v: U512) -> U256 {
    let limbs = v.as_limbs();
    if limbs[4..].iter().any(|l| *l != 0) {
        return U256::MAX;
    }
    U256::from_limbs([limbs[0], limbs[1], limbs[2], limbs[3]])
}

/// Geometric size grid: `base, base·f, base·f², …` up to `ceiling`, with a
/// one-time extension of up to `extension_steps` further steps when the best
/// result sits on the largest tested size. The extension never passes
/// `hard_cap`; its last step lands exactly on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridSearch {
    pub base: U256,
    pub ceiling: U256,
    pub hard_cap: U256,
    /// Growth factor in basis points (16000 = ×1.6).
    pub step_bps: u64,
    pub extension_steps: usize,
}

/// Result of one [`GridSearch::search`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridOutcome<T> {
    pub best: Option<(U256, T)>,
    /// Sizes actually evaluated, in order.
    pub evaluated: Vec<U256>,
    /// The deadline stopped the search before it finished.
    pub expired: bool,
}

impl GridSearch {
    fn next(&self, x: U256) -> U256 {
        let grown = x.saturating_mul(U256::from(self.step_bps)) / U256::from(10_000u64);
        if grown <= x {
            x.saturating_add(U256::from(1u64))
        } else {
            grown
        }
    }

    pub fn candidates(&self) -> Vec<U256> {
        let mut sizes = Vec::new();
        if self.base.is_zero() {
            return sizes;
        }
        let limit = self.ceiling.min(self.hard_cap);
        let mut x = self.base;
        while x <= limit {
            sizes.push(x);
            let next = self.next(x);
            if next <= x {
                break;
            }
            x = next;
        }
        sizes
    }

    /// Sizes above `largest`, clamped to the hard cap.
    pub fn extension(&self, largest: U256) -> Vec<U256> {
        let mut sizes = Vec::new();
        let mut x = largest;
        while sizes.len() < self.extension_steps && x < self.hard_cap {
            x = self.next(x).min(self.hard_cap);
            sizes.push(x);
        }
        sizes
    }

    /// Evaluate grid sizes in ascending order until done or `deadline`;
    /// `eval` returns `(net_profit, payload)` or `None` when the size has
    /// no route. Highest net profit wins; ties keep the smaller size.
    pub async fn search<T, F, Fut>(&self, deadline: Instant, mut eval: F) -> GridOutcome<T>
    where
        F: FnMut(U256) -> Fut,
        Fut: Future<Output = Option<(i128, T)>>,
    {
        let mut outcome = GridOutcome {
            best: None,
            evaluated: Vec::new(),
            expired: false,
        };
        let mut best_net = i128::MIN;

        let grid = self.candidates();
        let mut pending = grid.clone();
        let mut extended = false;
        let mut i = 0;
        while i < pending.len() {
            if Instant::now() >= deadline {
                outcome.expired = true;
                break;
            }
            let size = pending[i];
            outcome.evaluated.push(size);
            if let Some((net, payload)) = eval(size).await {
                if outcome.best.is_none() || net > best_net {
                    best_net = net;
                    outcome.best = Some((size, payload));
                }
            }
            i += 1;

            // Best on the edge: look a little further, once.
            if i == pending.len() && !extended {
                extended = true;
                let on_edge = matches!((grid.last(), &outcome.best), (Some(l), Some((at, _))) if at == l);
                if on_edge {
                    pending.extend(self.extension(size));
                }
            }
        }
        outcome
    }
}

//! Opportunity Scanner
//!
//! One pass over every (target token, buy venue, sell venue) combination
//! for a fixed borrowed token. Each combination is sized (closed form when
//! both venues are constant-product, grid search otherwise), priced on both
//! legs and scored net of flash-loan fee and gas.
//!
//! Loop order is target → buy → sell, so a pass cut short by the time budget
//! always drops the same tail of combinations. The budget is also checked
//! between grid sizes, so one slow combination cannot overrun it.
//!
//! Author: AI-Generated
//! Created: 2026-02-08

use super::solver::{optimal_amount_in, GridSearch};
use crate::quote::{QuoteProvider, Venue};
use crate::types::{to_i128, Opportunity, Route, Token, VenueKind};
use alloy::primitives::U256;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Gas units per trade: fixed overhead plus a per-hop cost by venue kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasModel {
    pub overhead: u64,
    pub constant_product_hop: u64,
    pub concentrated_liquidity_hop: u64,
}

impl Default for GasModel {
    fn default() -> Self {
        Self {
            overhead: 250_000,
            constant_product_hop: 110_000,
            concentrated_liquidity_hop: 160_000,
        }
    }
}

impl GasModel {
    fn per_hop(&self, kind: VenueKind) -> u64 {
        match kind {
            VenueKind::ConstantProduct => self.constant_product_hop,
            VenueKind::ConcentratedLiquidity => self.concentrated_liquidity_hop,
        }
    }

    pub fn units(&self, buy: VenueKind, buy_route: &Route, sell: VenueKind, sell_route: &Route) -> u64 {
        self.overhead
            + self.per_hop(buy) * buy_route.hops() as u64
            + self.per_hop(sell) * sell_route.hops() as u64
    }
}

/// Market inputs fixed for the duration of one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanContext {
    /// Wei per gas unit.
    pub gas_price: u128,
    /// Borrowed-token base units per one whole native unit.
    pub native_rate: U256,
    /// 10^native decimals.
    pub native_unit: U256,
}

impl ScanContext {
    /// Gas cost of `units` expressed in borrowed-token base units.
    pub fn gas_cost(&self, units: u64) -> U256 {
        if self.native_unit.is_zero() {
            return U256::ZERO;
        }
        U256::from(units)
            .saturating_mul(U256::from(self.gas_price))
            .saturating_mul(self.native_rate)
            / self.native_unit
    }
}

/// Flash-loan fee on `amount` at `bps`.
pub fn flash_fee(amount: U256, bps: u32) -> U256 {
    amount.saturating_mul(U256::from(bps)) / U256::from(10_000u64)
}

#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub time_budget: Duration,
    /// Borrowed-token base units.
    pub min_net_profit: i128,
    pub multi_hop_only: bool,
    pub top_k: usize,
    pub max_borrow: U256,
    pub grid: GridSearch,
    pub flash_fee_bps: u32,
    pub gas: GasModel,
}

#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    pub best: Option<Opportunity>,
    /// Up to top-K candidates with positive gross profit, best net first.
    pub ranking: Vec<Opportunity>,
    /// Venue-pair combinations visited.
    pub evaluated: usize,
    /// The time budget cut the pass short.
    pub truncated: bool,
    pub elapsed: Duration,
}

pub struct OpportunityScanner {
    settings: ScanSettings,
}

impl OpportunityScanner {
    pub fn new(settings: ScanSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ScanSettings {
        &self.settings
    }

    pub async fn scan(
        &self,
        quotes: &QuoteProvider,
        venues: &[Venue],
        borrowed: &Token,
        targets: &[Token],
        ctx: &ScanContext,
    ) -> ScanReport {
        let started = Instant::now();
        let deadline = started + self.settings.time_budget;
        let mut report = ScanReport::default();
        let mut candidates: Vec<Opportunity> = Vec::new();

        'targets: for target in targets {
            if target.address == borrowed.address {
                continue;
            }
            if Instant::now() >= deadline {
                report.truncated = true;
                break;
            }
            for buy in venues {
                if Instant::now() >= deadline {
                    report.truncated = true;
                    break 'targets;
                }
                for sell in venues {
                    if buy.name() == sell.name() {
                        continue;
                    }
                    if Instant::now() >= deadline {
                        report.truncated = true;
                        break 'targets;
                    }
                    report.evaluated += 1;

                    let (found, expired) = self
                        .evaluate_pair(quotes, buy, sell, borrowed, target, ctx, deadline)
                        .await;
                    if expired {
                        report.truncated = true;
                    }
                    let Some(opp) = found else {
                        if expired {
                            break 'targets;
                        }
                        continue;
                    };
                    if opp.gross_profit <= 0 {
                        debug!("   {} no gross profit", opp.describe());
                        continue;
                    }
                    debug!("   {} gas={} units", opp.describe(), opp.gas_units);

                    if self.qualifies(&opp)
                        && report.best.as_ref().map_or(true, |b| opp.net_profit > b.net_profit)
                    {
                        report.best = Some(opp.clone());
                    }
                    candidates.push(opp);
                    if expired {
                        break 'targets;
                    }
                }
            }
        }

        // stable: equal net profits keep visit order
        candidates.sort_by(|a, b| b.net_profit.cmp(&a.net_profit));
        candidates.truncate(self.settings.top_k);
        report.ranking = candidates;
        report.elapsed = started.elapsed();
        self.log_ranking(&report, borrowed);
        report
    }

    fn qualifies(&self, opp: &Opportunity) -> bool {
        opp.net_profit > 0
            && opp.net_profit >= self.settings.min_net_profit
            && (!self.settings.multi_hop_only || opp.is_multi_hop())
    }

    /// Size and score one venue pair. The flag reports that `deadline`
    /// cut the grid short; the result is then the best size seen so far.
    #[allow(clippy::too_many_arguments)]
    async fn evaluate_pair(
        &self,
        quotes: &QuoteProvider,
        buy: &Venue,
        sell: &Venue,
        borrowed: &Token,
        target: &Token,
        ctx: &ScanContext,
        deadline: Instant,
    ) -> (Option<Opportunity>, bool) {
        let both_cp = buy.kind() == VenueKind::ConstantProduct && sell.kind() == VenueKind::ConstantProduct;
        if both_cp {
            let a = quotes.reserves(buy, borrowed.address, target.address).await;
            let b = quotes.reserves(sell, borrowed.address, target.address).await;
            match (a, b) {
                (Some(a), Some(b)) => {
                    let amount = optimal_amount_in(a, b).min(self.settings.max_borrow);
                    if amount.is_zero() {
                        debug!(
                            "   {}→{} {}/{}: no exploitable direction",
                            borrowed.symbol,
                            target.symbol,
                            buy.name(),
                            sell.name()
                        );
                        return (None, false);
                    }
                    let opp = self.evaluate_at(quotes, buy, sell, borrowed, target, ctx, amount).await;
                    return (opp, false);
                }
                // No direct pair on one side; hub routes may still exist.
                _ => debug!(
                    "   {}→{} {}/{}: no direct reserves, sizing by grid",
                    borrowed.symbol,
                    target.symbol,
                    buy.name(),
                    sell.name()
                ),
            }
        }

        let outcome = self
            .settings
            .grid
            .search(deadline, |amount| async move {
                self.evaluate_at(quotes, buy, sell, borrowed, target, ctx, amount)
                    .await
                    .map(|opp| (opp.net_profit, opp))
            })
            .await;
        if outcome.expired {
            debug!(
                "   {}→{} {}/{}: budget hit after {} sizes",
                borrowed.symbol,
                target.symbol,
                buy.name(),
                sell.name(),
                outcome.evaluated.len()
            );
        }
        (outcome.best.map(|(_, opp)| opp), outcome.expired)
    }

    /// Price both legs at `amount` and score the round trip.
    #[allow(clippy::too_many_arguments)]
    async fn evaluate_at(
        &self,
        quotes: &QuoteProvider,
        buy: &Venue,
        sell: &Venue,
        borrowed: &Token,
        target: &Token,
        ctx: &ScanContext,
        amount: U256,
    ) -> Option<Opportunity> {
        let leg1 = quotes.best_quote(buy, borrowed.address, target.address, amount).await?;
        let leg2 = quotes
            .best_quote(sell, target.address, borrowed.address, leg1.amount_out)
            .await?;

        let gross_profit = to_i128(leg2.amount_out) - to_i128(amount);
        let gas_units = self
            .settings
            .gas
            .units(buy.kind(), &leg1.route, sell.kind(), &leg2.route);
        let net_profit = gross_profit
            .saturating_sub(to_i128(flash_fee(amount, self.settings.flash_fee_bps)))
            .saturating_sub(to_i128(ctx.gas_cost(gas_units)));

        Some(Opportunity {
            borrowed: borrowed.clone(),
            target: target.clone(),
            buy_venue: buy.name().to_string(),
            sell_venue: sell.name().to_string(),
            amount_in: amount,
            buy_route: leg1.route,
            sell_route: leg2.route,
            buy_out: leg1.amount_out,
            sell_out: leg2.amount_out,
            gross_profit,
            net_profit,
            gas_units,
        })
    }

    fn log_ranking(&self, report: &ScanReport, borrowed: &Token) {
        info!(
            "🔎 Scan: {} combos in {}ms{}",
            report.evaluated,
            report.elapsed.as_millis(),
            if report.truncated { " (time budget hit)" } else { "" }
        );
        if report.ranking.is_empty() {
            info!("📊 Top candidates: none with positive gross profit");
            return;
        }
        info!("📊 Top {} candidates ({}):", report.ranking.len(), borrowed.symbol);
        for (i, opp) in report.ranking.iter().enumerate() {
            info!(
                "   #{} {} hops={}/{}",
                i + 1,
                opp.describe(),
                opp.buy_route.hops(),
                opp.sell_route.hops()
            );
        }
        match &report.best {
            Some(best) => info!("🎯 Selected: {}", best.describe()),
            None => info!("No candidate met the minimum net profit"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quote::{ConcentratedLiquidityVenue, ConstantProductVenue, RetryPolicy};
    use crate::rpc::mock::MockChain;
    use crate::rpc::Telemetry;
    use alloy::primitives::Address;
    use std::sync::Arc;

    const URL: &str = "https://a.example";

    fn addr(b: u8) -> Address {
        Address::repeat_byte(b)
    }

    fn token(symbol: &str, b: u8) -> Token {
        Token {
            symbol: symbol.to_string(),
            address: addr(b),
            decimals: 6,
        }
    }

    fn cp(name: &str, router: u8, max_hops: usize) -> Venue {
        Venue::ConstantProduct(ConstantProductVenue {
            name: name.to_string(),
            router: addr(router),
            factory: addr(router + 1),
            max_hops,
        })
    }

    fn cl(name: &str, router: u8, max_hops: usize) -> Venue {
        Venue::ConcentratedLiquidity(ConcentratedLiquidityVenue {
            name: name.to_string(),
            router: addr(router),
            quoter: addr(router + 1),
            max_hops,
        })
    }

    fn settings() -> ScanSettings {
        ScanSettings {
            time_budget: Duration::from_secs(30),
            min_net_profit: 0,
            multi_hop_only: false,
            top_k: 3,
            max_borrow: U256::from(10_000_000u64),
            grid: GridSearch {
                base: U256::from(1_000u64),
                ceiling: U256::from(1_000_000u64),
                hard_cap: U256::from(10_000_000u64),
                step_bps: 16_000,
                extension_steps: 3,
            },
            flash_fee_bps: 9,
            gas: GasModel::default(),
        }
    }

    // gas free: native rate 0 prices gas at nothing
    fn free_gas() -> ScanContext {
        ScanContext {
            gas_price: 30_000_000_000,
            native_rate: U256::ZERO,
            native_unit: U256::from(10u128.pow(18)),
        }
    }

    fn provider(chain: Arc<MockChain>, hubs: Vec<Address>) -> QuoteProvider {
        let telemetry = Arc::new(Telemetry::new(Duration::from_secs(60), None));
        QuoteProvider::new(chain, telemetry, Duration::from_secs(5), RetryPolicy::default(), hubs)
    }

    /// Scenario A reserves: target cheap on A, dear on B.
    fn two_cp_pools(chain: &MockChain, usdc: &Token, wbtc: &Token) {
        chain.add_cp_pool(addr(0x10), addr(0x11), usdc.address, wbtc.address, 1_000_000, 2_000_000);
        chain.add_cp_pool(addr(0x30), addr(0x31), usdc.address, wbtc.address, 2_000_000, 1_000_000);
    }

    #[test]
    fn test_gas_units_by_kind() {
        let gas = GasModel::default();
        let one = Route::constant_product(vec![addr(1), addr(2)]).unwrap();
        let two = Route::concentrated(vec![addr(2), addr(3), addr(1)], vec![500, 3000]).unwrap();
        assert_eq!(
            gas.units(VenueKind::ConstantProduct, &one, VenueKind::ConcentratedLiquidity, &two),
            250_000 + 110_000 + 2 * 160_000
        );
    }

    #[test]
    fn test_gas_cost_in_borrowed_units() {
        // 0.5 USDC per native, 100 gwei, 400k gas = 0.04 native = 0.02 USDC
        let ctx = ScanContext {
            gas_price: 100_000_000_000,
            native_rate: U256::from(500_000u64),
            native_unit: U256::from(10u128.pow(18)),
        };
        assert_eq!(ctx.gas_cost(400_000), U256::from(20_000u64));
        assert_eq!(flash_fee(U256::from(1_000_000u64), 9), U256::from(900u64));
    }

    #[tokio::test]
    async fn test_closed_form_opportunity_selected() {
        let chain = MockChain::shared(URL);
        let (usdc, wbtc) = (token("USDC", 1), token("WBTC", 2));
        two_cp_pools(&chain, &usdc, &wbtc);
        let quotes = provider(chain, vec![]);
        let venues = vec![cp("QuickSwapV2", 0x10, 0), cp("SushiSwapV2", 0x30, 0)];
        let scanner = OpportunityScanner::new(settings());

        let report = scanner.scan(&quotes, &venues, &usdc, &[usdc.clone(), wbtc], &free_gas()).await;
        let best = report.best.expect("opportunity");
        assert_eq!(best.buy_venue, "QuickSwapV2");
        assert_eq!(best.sell_venue, "SushiSwapV2");
        assert_eq!(best.amount_in, U256::from(333_333u64));
        assert!(best.gross_profit > 0);
        // borrowed token is never its own target
        assert_eq!(report.evaluated, 2);
        assert!(!report.truncated);
        assert_eq!(report.ranking.len(), 1);
    }

    #[tokio::test]
    async fn test_identical_reserves_no_opportunity() {
        let chain = MockChain::shared(URL);
        let (usdc, wbtc) = (token("USDC", 1), token("WBTC", 2));
        chain.add_cp_pool(addr(0x10), addr(0x11), usdc.address, wbtc.address, 1_000_000, 2_000_000);
        chain.add_cp_pool(addr(0x30), addr(0x31), usdc.address, wbtc.address, 1_000_000, 2_000_000);
        let quotes = provider(chain, vec![]);
        let venues = vec![cp("QuickSwapV2", 0x10, 0), cp("SushiSwapV2", 0x30, 0)];

        let report = OpportunityScanner::new(settings())
            .scan(&quotes, &venues, &usdc, &[wbtc], &free_gas())
            .await;
        assert!(report.best.is_none());
        assert!(report.ranking.is_empty());
        assert_eq!(report.evaluated, 2);
    }

    #[tokio::test]
    async fn test_gas_cost_exceeds_gross() {
        let chain = MockChain::shared(URL);
        let (usdc, wbtc) = (token("USDC", 1), token("WBTC", 2));
        two_cp_pools(&chain, &usdc, &wbtc);
        let quotes = provider(chain, vec![]);
        let venues = vec![cp("QuickSwapV2", 0x10, 0), cp("SushiSwapV2", 0x30, 0)];
        // 470k gas at 10,000 gwei with 1 USDC per native: 4.7 USDC of gas
        let expensive = ScanContext {
            gas_price: 10_000_000_000_000,
            native_rate: U256::from(1_000_000u64),
            native_unit: U256::from(10u128.pow(18)),
        };

        let report = OpportunityScanner::new(settings())
            .scan(&quotes, &venues, &usdc, &[wbtc], &expensive)
            .await;
        assert!(report.best.is_none());
        // still visible in the ranking
        let top = &report.ranking[0];
        assert!(top.gross_profit > 0);
        assert!(top.net_profit < 0);
    }

    #[tokio::test]
    async fn test_min_net_profit_threshold() {
        let chain = MockChain::shared(URL);
        let (usdc, wbtc) = (token("USDC", 1), token("WBTC", 2));
        two_cp_pools(&chain, &usdc, &wbtc);
        let quotes = provider(chain, vec![]);
        let venues = vec![cp("QuickSwapV2", 0x10, 0), cp("SushiSwapV2", 0x30, 0)];
        let mut s = settings();
        s.min_net_profit = i128::MAX;

        let report = OpportunityScanner::new(s)
            .scan(&quotes, &venues, &usdc, &[wbtc], &free_gas())
            .await;
        assert!(report.best.is_none());
        assert_eq!(report.ranking.len(), 1);
    }

    #[tokio::test]
    async fn test_grid_search_with_cl_venue() {
        let chain = MockChain::shared(URL);
        let (usdc, wbtc) = (token("USDC", 1), token("WBTC", 2));
        chain.add_cp_pool(addr(0x10), addr(0x11), usdc.address, wbtc.address, 1_000_000, 2_000_000);
        chain.add_cl_pool(addr(0x41), usdc.address, wbtc.address, 500, 2_000_000, 1_000_000);
        let quotes = provider(chain, vec![]);
        let venues = vec![cp("QuickSwapV2", 0x10, 0), cl("UniswapV3", 0x40, 0)];

        let report = OpportunityScanner::new(settings())
            .scan(&quotes, &venues, &usdc, &[wbtc], &free_gas())
            .await;
        let best = report.best.expect("opportunity");
        assert_eq!(best.buy_venue, "QuickSwapV2");
        assert_eq!(best.sell_venue, "UniswapV3");
        assert_eq!(best.sell_route.fees(), &[500]);
        // interior optimum on the base * 1.6^k grid
        assert!(settings().grid.candidates().contains(&best.amount_in));
    }

    #[tokio::test]
    async fn test_multi_hop_only_filter() {
        let chain = MockChain::shared(URL);
        let (usdc, wbtc) = (token("USDC", 1), token("WBTC", 2));
        two_cp_pools(&chain, &usdc, &wbtc);
        let quotes = provider(chain, vec![]);
        let venues = vec![cp("QuickSwapV2", 0x10, 0), cp("SushiSwapV2", 0x30, 0)];
        let mut s = settings();
        s.multi_hop_only = true;

        let report = OpportunityScanner::new(s)
            .scan(&quotes, &venues, &usdc, &[wbtc], &free_gas())
            .await;
        // the only profitable candidate is single-hop on both legs
        assert!(report.best.is_none());
        assert_eq!(report.ranking.len(), 1);
    }

    #[tokio::test]
    async fn test_time_budget_truncates() {
        let chain = MockChain::shared(URL);
        let (usdc, wbtc) = (token("USDC", 1), token("WBTC", 2));
        two_cp_pools(&chain, &usdc, &wbtc);
        let quotes = provider(chain.clone(), vec![]);
        let venues = vec![cp("QuickSwapV2", 0x10, 0), cp("SushiSwapV2", 0x30, 0)];
        let mut s = settings();
        s.time_budget = Duration::ZERO;

        let report = OpportunityScanner::new(s)
            .scan(&quotes, &venues, &usdc, &[wbtc], &free_gas())
            .await;
        assert!(report.truncated);
        assert_eq!(report.evaluated, 0);
        assert_eq!(chain.quote_calls(), 0);
    }

    #[tokio::test]
    async fn test_max_borrow_caps_closed_form() {
        let chain = MockChain::shared(URL);
        let (usdc, wbtc) = (token("USDC", 1), token("WBTC", 2));
        two_cp_pools(&chain, &usdc, &wbtc);
        let quotes = provider(chain, vec![]);
        let venues = vec![cp("QuickSwapV2", 0x10, 0), cp("SushiSwapV2", 0x30, 0)];
        let mut s = settings();
        s.max_borrow = U256::from(100_000u64);

        let report = OpportunityScanner::new(s)
            .scan(&quotes, &venues, &usdc, &[wbtc], &free_gas())
            .await;
        assert_eq!(report.best.unwrap().amount_in, U256::from(100_000u64));
    }

    /// Scenario A shape scaled by `k`: profit grows with depth.
    fn scaled_cp_pools(chain: &MockChain, usdc: &Token, target: &Token, k: u128) {
        chain.add_cp_pool(addr(0x10), addr(0x11), usdc.address, target.address, k * 1_000_000, k * 2_000_000);
        chain.add_cp_pool(addr(0x30), addr(0x31), usdc.address, target.address, k * 2_000_000, k * 1_000_000);
    }

    #[tokio::test]
    async fn test_ranking_truncated_to_top_k() {
        let chain = MockChain::shared(URL);
        let usdc = token("USDC", 1);
        let targets: Vec<Token> = (1..=4u8).map(|k| token(&format!("T{}", k), 1 + k)).collect();
        for (k, target) in (1..=4u128).zip(&targets) {
            scaled_cp_pools(&chain, &usdc, target, k);
        }
        let quotes = provider(chain, vec![]);
        let venues = vec![cp("QuickSwapV2", 0x10, 0), cp("SushiSwapV2", 0x30, 0)];
        let mut s = settings();
        s.top_k = 2;

        let report = OpportunityScanner::new(s)
            .scan(&quotes, &venues, &usdc, &targets, &free_gas())
            .await;
        assert_eq!(report.evaluated, 8);
        assert_eq!(report.ranking.len(), 2);
        assert_eq!(report.ranking[0].target.symbol, "T4");
        assert_eq!(report.ranking[1].target.symbol, "T3");
        assert!(report.ranking[0].net_profit > report.ranking[1].net_profit);
        assert_eq!(report.best.unwrap().target.symbol, "T4");
    }

    #[tokio::test]
    async fn test_equal_net_keeps_first_target() {
        let usdc = token("USDC", 1);
        let (a, b) = (token("AAA", 2), token("BBB", 3));
        let venues = vec![cp("QuickSwapV2", 0x10, 0), cp("SushiSwapV2", 0x30, 0)];

        for order in [vec![a.clone(), b.clone()], vec![b.clone(), a.clone()]] {
            let chain = MockChain::shared(URL);
            scaled_cp_pools(&chain, &usdc, &a, 1);
            scaled_cp_pools(&chain, &usdc, &b, 1);
            let quotes = provider(chain, vec![]);

            let report = OpportunityScanner::new(settings())
                .scan(&quotes, &venues, &usdc, &order, &free_gas())
                .await;
            assert_eq!(report.ranking.len(), 2);
            assert_eq!(report.ranking[0].net_profit, report.ranking[1].net_profit);
            assert_eq!(report.ranking[0].target, order[0]);
            assert_eq!(report.best.unwrap().target, order[0]);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_expires_mid_pass() {
        let usdc = token("USDC", 1);
        let targets: Vec<Token> = (1..=3u8).map(|k| token(&format!("T{}", k), 1 + k)).collect();
        let venues = vec![cp("QuickSwapV2", 0x10, 0), cp("SushiSwapV2", 0x30, 0)];
        let mut s = settings();
        s.time_budget = Duration::from_millis(100);

        let mut runs = Vec::new();
        for _ in 0..2 {
            let chain = MockChain::shared(URL);
            for (k, target) in (1..=3u128).zip(&targets) {
                scaled_cp_pools(&chain, &usdc, target, k);
            }
            // two reserve reads then two quotes: 40ms per combination
            chain.set_latency(Duration::from_millis(10));
            let quotes = provider(chain, vec![]);
            let report = OpportunityScanner::new(s.clone())
                .scan(&quotes, &venues, &usdc, &targets, &free_gas())
                .await;
            assert!(report.truncated);
            assert!(report.evaluated > 0 && report.evaluated < 6);
            runs.push((
                report.evaluated,
                report.best.map(|b| (b.target.symbol, b.amount_in, b.net_profit)),
            ));
        }
        assert_eq!(runs[0], runs[1]);
        // T3 is never reached
        assert_eq!(runs[0].1.as_ref().map(|b| b.0.as_str()), Some("T2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_checked_inside_grid() {
        let build = |latency: Duration| {
            let chain = MockChain::shared(URL);
            chain.add_cp_pool(addr(0x10), addr(0x11), addr(1), addr(2), 1_000_000, 2_000_000);
            chain.add_cl_pool(addr(0x41), addr(1), addr(2), 500, 2_000_000, 1_000_000);
            chain.set_latency(latency);
            chain
        };
        let (usdc, wbtc) = (token("USDC", 1), token("WBTC", 2));
        let venues = vec![cp("QuickSwapV2", 0x10, 0), cl("UniswapV3", 0x40, 0)];

        let unbounded = build(Duration::ZERO);
        OpportunityScanner::new(settings())
            .scan(&provider(unbounded.clone(), vec![]), &venues, &usdc, &[wbtc.clone()], &free_gas())
            .await;

        // 20ms per grid size against a 50ms budget
        let slow = build(Duration::from_millis(10));
        let mut s = settings();
        s.time_budget = Duration::from_millis(50);
        let started = Instant::now();
        let report = OpportunityScanner::new(s)
            .scan(&provider(slow.clone(), vec![]), &venues, &usdc, &[wbtc], &free_gas())
            .await;
        assert!(report.truncated);
        assert_eq!(report.evaluated, 1);
        assert!(started.elapsed() < Duration::from_millis(100));
        assert!(slow.quote_calls() * 4 < unbounded.quote_calls());
        // best of the sizes reached so far is still reported
        assert!(!report.ranking.is_empty());
    }

    #[tokio::test]
    async fn test_cp_pair_without_direct_reserves_uses_hub_grid() {
        let chain = MockChain::shared(URL);
        let (usdc, wbtc, wmatic) = (token("USDC", 1), token("WBTC", 2), token("WMATIC", 3));
        chain.add_cp_pool(addr(0x10), addr(0x11), usdc.address, wmatic.address, 1_000_000_000, 1_000_000_000);
        chain.add_cp_pool(addr(0x10), addr(0x11), wmatic.address, wbtc.address, 1_000_000_000, 2_000_000_000);
        chain.add_cp_pool(addr(0x30), addr(0x31), usdc.address, wmatic.address, 1_000_000_000, 1_000_000_000);
        chain.add_cp_pool(addr(0x30), addr(0x31), wmatic.address, wbtc.address, 2_000_000_000, 1_000_000_000);
        let quotes = provider(chain, vec![wmatic.address]);
        let venues = vec![cp("QuickSwapV2", 0x10, 1), cp("SushiSwapV2", 0x30, 1)];

        let report = OpportunityScanner::new(settings())
            .scan(&quotes, &venues, &usdc, &[wbtc], &free_gas())
            .await;
        let best = report.best.expect("hub opportunity");
        assert_eq!(best.buy_venue, "QuickSwapV2");
        assert_eq!(best.buy_route.tokens(), &[usdc.address, wmatic.address, addr(2)]);
        // deep pools: the peak lies past the grid, found by the extension
        assert!(best.amount_in > settings().grid.ceiling);
        assert!(best.amount_in <= settings().max_borrow);
    }
}

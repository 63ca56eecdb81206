//! Flash-Loan Execution Engine
//!
//! Turns a selected opportunity into one atomic transaction against the
//! flash-loan receiver:
//!
//! 1. Re-quote both legs without the cache (selection quotes may be stale)
//! 2. Per-leg minimum-output guards = fresh quote × (1 − slippage)
//! 3. Re-check net profit on the fresh numbers
//! 4. ABI-encode the receiver params (single-hop or multi-hop shape)
//! 5. Nonce from the sequencer, gas limit fixed or estimated ×1.2
//! 6. Submit (unless dry-run) and poll for the receipt
//! 7. On success, report realized P&L from the profit holder's balance
//!    change and the gas actually paid
//!
//! Only a successful receipt advances the nonce. Any failure after step 4
//! resyncs it from the network and is returned to the caller; nothing is
//! retried within the cycle.
//!
//! Author: AI-Generated
//! Created: 2026-02-08

use super::scanner::{flash_fee, ScanContext};
use crate::contracts::{fee_to_u24, ArbParamsV1, ArbParamsV2, IFlashLoanReceiver};
use crate::error::ExecutionError;
use crate::quote::Venue;
use crate::routing::encode_path;
use crate::session::Link;
use crate::types::{to_i128, Opportunity, ReceiptSummary, Route, TxRequest, VenueKind};
use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::sol_types::{SolCall, SolValue};
use serde::Deserialize;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{error, info, warn};

/// Parameter layout the deployed receiver contract decodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiverShape {
    /// Address route arrays, one fee tier per leg.
    SingleHop,
    /// Adds byte-encoded concentrated-liquidity paths per leg.
    MultiHop,
}

#[derive(Debug, Clone)]
pub struct ExecutionSettings {
    pub dry_run: bool,
    pub slippage_bps: u32,
    pub deadline: Duration,
    pub gas_limit: Option<u64>,
    pub receipt_timeout: Duration,
    pub receipt_poll: Duration,
    pub min_net_profit: i128,
    pub flash_fee_bps: u32,
    /// Where profit lands; the receiver contract when unset.
    pub profit_holder: Option<Address>,
}

/// Bookkeeping for a confirmed trade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReport {
    pub receipt: ReceiptSummary,
    /// Net profit from the fresh re-quote, borrowed-token base units.
    pub expected_net: i128,
    /// gas_used × effective_gas_price, native wei.
    pub gas_cost_native: U256,
    /// The same cost in borrowed-token base units at the scan's native rate.
    pub gas_cost_borrowed: U256,
    /// Profit holder's borrowed-token balance change. `None` when either
    /// balance read failed.
    pub realized_profit: Option<i128>,
}

impl ExecutionReport {
    /// Realized profit less the gas actually paid.
    pub fn realized_net(&self) -> Option<i128> {
        self.realized_profit
            .map(|p| p.saturating_sub(to_i128(self.gas_cost_borrowed)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// Nothing built or sent.
    Skipped { reason: String },
    /// Everything but the submission.
    DryRun { nonce: u64, gas_limit: u64, calldata: Bytes },
    Confirmed(ExecutionReport),
}

/// `quote × (10000 − bps) / 10000`
pub fn min_out(quote: U256, slippage_bps: u32) -> U256 {
    quote.saturating_mul(U256::from(10_000u32.saturating_sub(slippage_bps))) / U256::from(10_000u64)
}

pub struct ExecutionEngine {
    settings: ExecutionSettings,
    receiver: Address,
    shape: ReceiverShape,
}

impl ExecutionEngine {
    pub fn new(settings: ExecutionSettings, receiver: Address, shape: ReceiverShape) -> Self {
        if settings.dry_run {
            info!("Executor in DRY RUN mode - transactions will be built but not sent");
        } else {
            warn!("⚠️ Executor in LIVE mode - flash loans will be submitted!");
        }
        Self {
            settings,
            receiver,
            shape,
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.settings.dry_run
    }

    pub async fn execute(
        &self,
        link: &Link,
        venues: &[Venue],
        opp: &Opportunity,
        ctx: &ScanContext,
    ) -> Result<ExecutionOutcome, ExecutionError> {
        let (Some(buy), Some(sell)) = (
            venues.iter().find(|v| v.name() == opp.buy_venue),
            venues.iter().find(|v| v.name() == opp.sell_venue),
        ) else {
            return Ok(self.skip(opp, "venue no longer configured".to_string()));
        };

        let fresh_buy = link.quotes.quote_fresh(buy, &opp.buy_route, opp.amount_in).await;
        let fresh_sell = link.quotes.quote_fresh(sell, &opp.sell_route, fresh_buy).await;
        let min_buy = min_out(fresh_buy, self.settings.slippage_bps);
        let min_sell = min_out(fresh_sell, self.settings.slippage_bps);
        if min_buy.is_zero() || min_sell.is_zero() {
            return Ok(self.skip(
                opp,
                format!("zero output guard (buy={} sell={})", min_buy, min_sell),
            ));
        }

        let fresh_net = (to_i128(fresh_sell) - to_i128(opp.amount_in))
            .saturating_sub(to_i128(flash_fee(opp.amount_in, self.settings.flash_fee_bps)))
            .saturating_sub(to_i128(ctx.gas_cost(opp.gas_units)));
        if fresh_net <= 0 || fresh_net < self.settings.min_net_profit {
            return Ok(self.skip(
                opp,
                format!(
                    "fresh net {} {} below minimum (selected at {})",
                    opp.borrowed.format_signed(fresh_net),
                    opp.borrowed.symbol,
                    opp.borrowed.format_signed(opp.net_profit)
                ),
            ));
        }
        info!(
            "🔁 Re-quoted: buy_out={} sell_out={} net={} {} | guards {} / {}",
            fresh_buy,
            opp.borrowed.format(fresh_sell),
            opp.borrowed.format_signed(fresh_net),
            opp.borrowed.symbol,
            min_buy,
            opp.borrowed.format(min_sell)
        );

        match self
            .build_and_submit(link, buy, sell, opp, ctx, min_buy, min_sell, fresh_net)
            .await
        {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                error!("❌ Execution failed for {}: {}", opp.describe(), e);
                match link.nonce.sync().await {
                    Ok(n) => info!("🔢 Nonce resynced to {} after failure", n),
                    Err(sync_err) => error!("Nonce resync failed: {}", sync_err),
                }
                Err(e)
            }
        }
    }

    fn skip(&self, opp: &Opportunity, reason: String) -> ExecutionOutcome {
        warn!("⏭️  Skipping {}: {}", opp.describe(), reason);
        ExecutionOutcome::Skipped { reason }
    }

    #[allow(clippy::too_many_arguments)]
    async fn build_and_submit(
        &self,
        link: &Link,
        buy: &Venue,
        sell: &Venue,
        opp: &Opportunity,
        ctx: &ScanContext,
        min_buy: U256,
        min_sell: U256,
        expected_net: i128,
    ) -> Result<ExecutionOutcome, ExecutionError> {
        let deadline = chrono::Utc::now().timestamp().max(0) as u64 + self.settings.deadline.as_secs();
        let params = self.encode_params(opp, buy, sell, min_buy, min_sell, deadline)?;
        let calldata: Bytes = IFlashLoanReceiver::initiateFlashLoanCall {
            assets: vec![opp.borrowed.address],
            amounts: vec![opp.amount_in],
            modes: vec![U256::ZERO],
            params,
        }
        .abi_encode()
        .into();

        let nonce = link.nonce.get(false).await?;
        let gas_limit = match self.settings.gas_limit {
            Some(limit) => limit,
            None => {
                let estimate = link.client.estimate_gas(self.receiver, calldata.clone()).await?;
                estimate.saturating_mul(12) / 10
            }
        };

        if self.settings.dry_run {
            info!(
                "🔬 DRY RUN: initiateFlashLoan({} {} of {:?}) buy@{} {:?} fee {:?} sell@{} {:?} fee {:?} \
                 minOut {} / {} deadline {} nonce {} gas {} @ {} wei",
                opp.borrowed.format(opp.amount_in),
                opp.borrowed.symbol,
                opp.borrowed.address,
                buy.name(),
                opp.buy_route.tokens(),
                opp.buy_route.fees(),
                sell.name(),
                opp.sell_route.tokens(),
                opp.sell_route.fees(),
                min_buy,
                min_sell,
                deadline,
                nonce,
                gas_limit,
                ctx.gas_price
            );
            return Ok(ExecutionOutcome::DryRun {
                nonce,
                gas_limit,
                calldata,
            });
        }

        let holder = self.settings.profit_holder.unwrap_or(self.receiver);
        let balance_before = self.holder_balance(link, opp, holder).await;

        let hash = link
            .client
            .send_transaction(TxRequest {
                to: self.receiver,
                data: calldata,
                nonce,
                gas_limit,
                gas_price: ctx.gas_price,
            })
            .await?;
        info!(
            "📤 Submitted flash loan {:?} nonce={} gas={} | {}",
            hash,
            nonce,
            gas_limit,
            opp.describe()
        );

        let receipt = self.wait_for_receipt(link, hash).await?;
        if !receipt.success {
            return Err(ExecutionError::Reverted {
                hash,
                gas_used: receipt.gas_used,
            });
        }
        link.nonce.advance().await;
        info!(
            "✅ Confirmed {:?} gas_used={} effective_price={} wei",
            hash, receipt.gas_used, receipt.effective_gas_price
        );

        let balance_after = self.holder_balance(link, opp, holder).await;
        let gas_cost_native = U256::from(receipt.gas_used).saturating_mul(U256::from(receipt.effective_gas_price));
        let gas_cost_borrowed = if ctx.native_unit.is_zero() {
            U256::ZERO
        } else {
            gas_cost_native.saturating_mul(ctx.native_rate) / ctx.native_unit
        };
        let realized_profit = match (balance_before, balance_after) {
            (Some(before), Some(after)) => Some(to_i128(after) - to_i128(before)),
            _ => None,
        };
        let report = ExecutionReport {
            receipt,
            expected_net,
            gas_cost_native,
            gas_cost_borrowed,
            realized_profit,
        };
        self.log_report(opp, &report);
        Ok(ExecutionOutcome::Confirmed(report))
    }

    async fn holder_balance(&self, link: &Link, opp: &Opportunity, holder: Address) -> Option<U256> {
        match link.client.token_balance(opp.borrowed.address, holder).await {
            Ok(balance) => Some(balance),
            Err(e) => {
                warn!("Could not read {} balance of {:?}: {}", opp.borrowed.symbol, holder, e);
                None
            }
        }
    }

    fn log_report(&self, opp: &Opportunity, report: &ExecutionReport) {
        let symbol = &opp.borrowed.symbol;
        let gas = format!(
            "{} wei (≈{} {})",
            report.gas_cost_native,
            opp.borrowed.format(report.gas_cost_borrowed),
            symbol
        );
        match (report.realized_profit, report.realized_net()) {
            (Some(realized), Some(net)) if net > 0 => info!(
                "💰 Realized {} {} (expected {}) | gas {} | net {} {}",
                opp.borrowed.format_signed(realized),
                symbol,
                opp.borrowed.format_signed(report.expected_net),
                gas,
                opp.borrowed.format_signed(net),
                symbol
            ),
            (Some(realized), Some(net)) => warn!(
                "📉 Realized {} {} (expected {}) | gas {} | net loss {} {}",
                opp.borrowed.format_signed(realized),
                symbol,
                opp.borrowed.format_signed(report.expected_net),
                gas,
                opp.borrowed.format_signed(net),
                symbol
            ),
            _ => info!(
                "Realized P&L unknown (expected {} {}) | gas {}",
                opp.borrowed.format_signed(report.expected_net),
                symbol,
                gas
            ),
        }
    }

    async fn wait_for_receipt(&self, link: &Link, hash: TxHash) -> Result<ReceiptSummary, ExecutionError> {
        let started = Instant::now();
        loop {
            match link.client.receipt(hash).await {
                Ok(Some(receipt)) => return Ok(receipt),
                Ok(None) => {}
                Err(e) => warn!("Receipt poll for {:?} failed: {}", hash, e),
            }
            if started.elapsed() >= self.settings.receipt_timeout {
                return Err(ExecutionError::ReceiptTimeout {
                    hash,
                    waited_secs: started.elapsed().as_secs(),
                });
            }
            sleep(self.settings.receipt_poll).await;
        }
    }

    /// ABI-encoded receiver params for the configured shape.
    pub fn encode_params(
        &self,
        opp: &Opportunity,
        buy: &Venue,
        sell: &Venue,
        min_buy: U256,
        min_sell: U256,
        deadline: u64,
    ) -> Result<Bytes, ExecutionError> {
        let buy_fee = fee_to_u24(leg_fee(buy, &opp.buy_route));
        let sell_fee = fee_to_u24(leg_fee(sell, &opp.sell_route));
        let encoded = match self.shape {
            ReceiverShape::SingleHop => {
                for (venue, route) in [(buy, &opp.buy_route), (sell, &opp.sell_route)] {
                    if venue.kind() == VenueKind::ConcentratedLiquidity && route.is_multi_hop() {
                        return Err(ExecutionError::ShapeMismatch(venue.name().to_string()));
                    }
                }
                ArbParamsV1 {
                    targetToken: opp.target.address,
                    buyRouter: buy.router(),
                    sellRouter: sell.router(),
                    minOutBuy: min_buy,
                    minOutSell: min_sell,
                    deadline: U256::from(deadline),
                    buyFee: buy_fee,
                    sellFee: sell_fee,
                    buyPath: opp.buy_route.tokens().to_vec(),
                    sellPath: opp.sell_route.tokens().to_vec(),
                }
                .abi_encode()
            }
            ReceiverShape::MultiHop => ArbParamsV2 {
                targetToken: opp.target.address,
                buyRouter: buy.router(),
                sellRouter: sell.router(),
                minOutBuy: min_buy,
                minOutSell: min_sell,
                deadline: U256::from(deadline),
                buyFee: buy_fee,
                sellFee: sell_fee,
                buyPath: opp.buy_route.tokens().to_vec(),
                sellPath: opp.sell_route.tokens().to_vec(),
                buyV3Path: cl_path(buy, &opp.buy_route)?,
                sellV3Path: cl_path(sell, &opp.sell_route)?,
            }
            .abi_encode(),
        };
        Ok(encoded.into())
    }
}

/// Fee tier for a single-hop concentrated-liquidity leg, 0 otherwise.
fn leg_fee(venue: &Venue, route: &Route) -> u32 {
    match venue.kind() {
        VenueKind::ConcentratedLiquidity if !route.is_multi_hop() => route.fees().first().copied().unwrap_or(0),
        _ => 0,
    }
}

/// Packed path for a multi-hop concentrated-liquidity leg, empty otherwise.
fn cl_path(venue: &Venue, route: &Route) -> Result<Bytes, ExecutionError> {
    if venue.kind() == VenueKind::ConcentratedLiquidity && route.is_multi_hop() {
        Ok(encode_path(route.tokens(), route.fees())?)
    } else {
        Ok(Bytes::new())
    }
}

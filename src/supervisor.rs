//! Scan Loop Supervisor
//!
//! Single worker: each cycle runs RPC upkeep → balance gate → gas and
//! native price → scan → (stop check) → execute, then sleeps. A failed
//! cycle is logged and the loop carries on after the normal interval.
//!
//! The stop signal is checked at the top of every cycle and once more
//! right before committing to an execution. An execution already in
//! flight always completes; only sleeps are cut short.
//!
//! Author: AI-Generated
//! Created: 2026-02-10

use crate::arbitrage::{ExecutionEngine, ExecutionOutcome, OpportunityScanner, ScanContext};
use crate::error::FailureKind;
use crate::quote::{NativePriceOracle, DEFAULT_ORACLE_TTL};
use crate::rpc::GasOracle;
use crate::session::Session;
use alloy::primitives::U256;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Cooperative cancellation shared by the worker and signal handlers.
#[derive(Clone)]
pub struct StopSignal {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl StopSignal {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx: Arc::new(tx), rx }
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the signal has been triggered.
    pub async fn stopped(&self) {
        let mut rx = self.rx.clone();
        // sender lives in self, so this only returns once set
        let _ = rx.wait_for(|stopped| *stopped).await;
    }

    /// Sleep unless stopped first. True when interrupted by a stop.
    pub async fn sleep(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => self.is_stopped(),
            _ = self.stopped() => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    LowBalance,
    /// No native price, so gas cannot be costed.
    NoPrice,
    NoOpportunity,
    /// Stop arrived between scan and execution.
    Stopped,
    Executed(ExecutionOutcome),
    /// Execution failed (already logged with full context).
    Failed(FailureKind),
}

pub struct Supervisor {
    session: Session,
    scanner: OpportunityScanner,
    executor: ExecutionEngine,
    gas_oracle: GasOracle,
    price_oracle: NativePriceOracle,
    stop: StopSignal,
    cycles: u64,
}

impl Supervisor {
    pub fn new(session: Session, gas_oracle: GasOracle, stop: StopSignal) -> Self {
        let settings = session.settings();
        let scanner = OpportunityScanner::new(settings.scan.clone());
        let executor = ExecutionEngine::new(settings.execution.clone(), settings.receiver, settings.shape);
        let price_oracle = NativePriceOracle::new(settings.native.clone(), settings.borrowed.clone(), DEFAULT_ORACLE_TTL);
        Self {
            session,
            scanner,
            executor,
            gas_oracle,
            price_oracle,
            stop,
            cycles: 0,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Run until stopped (or after one cycle with `once`).
    pub async fn run(&mut self, once: bool) -> Result<()> {
        let interval = self.session.settings().scan_interval;
        let backoff = self.session.settings().low_balance_backoff;
        info!(
            "🚀 Scan loop started: borrow {} | {} targets | {} venues | every {}s",
            self.session.settings().borrowed.symbol,
            self.session.settings().targets.len(),
            self.session.settings().venues.len(),
            interval.as_secs()
        );

        loop {
            if self.stop.is_stopped() {
                info!("🛑 Stop requested");
                break;
            }
            self.cycles += 1;

            let pause = match self.run_cycle().await {
                Ok(CycleOutcome::LowBalance) => backoff,
                Ok(outcome) => {
                    info!("Cycle {} done: {:?}", self.cycles, outcome);
                    interval
                }
                Err(e) => {
                    error!("Cycle {} failed: {:#}", self.cycles, e);
                    interval
                }
            };

            if once || self.stop.sleep(pause).await {
                break;
            }
        }

        self.session.flush_metrics();
        info!("Scan loop stopped after {} cycles", self.cycles);
        Ok(())
    }

    pub async fn run_cycle(&mut self) -> Result<CycleOutcome> {
        self.session
            .maintain(Instant::now())
            .await
            .context("RPC unavailable")?;

        let settings = self.session.settings();
        let link = self.session.link();
        let evicted = link.quotes.cache().purge_expired(Instant::now());
        if evicted > 0 {
            debug!("Quote cache: evicted {} expired entries", evicted);
        }

        let native = &settings.native;
        let balance = link
            .client
            .native_balance(link.client.signer())
            .await
            .context("Balance check failed")?;
        if balance < settings.min_native_balance {
            warn!(
                "💸 Balance {} {} below minimum {}; backing off {}s",
                native.format(balance),
                native.symbol,
                native.format(settings.min_native_balance),
                settings.low_balance_backoff.as_secs()
            );
            return Ok(CycleOutcome::LowBalance);
        }

        let gas_price = self
            .gas_oracle
            .gas_price(link.client.as_ref())
            .await
            .context("Gas price unavailable")?;
        let native_rate = self.price_oracle.rate(&link.quotes, &settings.oracle_venue).await;
        if native_rate.is_zero() {
            warn!(
                "No {}→{} price on {}; skipping scan",
                native.symbol,
                settings.borrowed.symbol,
                settings.oracle_venue.name()
            );
            return Ok(CycleOutcome::NoPrice);
        }
        let ctx = ScanContext {
            gas_price,
            native_rate,
            native_unit: U256::from(10u64).pow(U256::from(native.decimals)),
        };

        let report = self
            .scanner
            .scan(&link.quotes, &settings.venues, &settings.borrowed, &settings.targets, &ctx)
            .await;
        let Some(best) = report.best else {
            return Ok(CycleOutcome::NoOpportunity);
        };

        if self.stop.is_stopped() {
            info!("🛑 Stop requested; not executing {}", best.describe());
            return Ok(CycleOutcome::Stopped);
        }

        match self.executor.execute(link, &settings.venues, &best, &ctx).await {
            Ok(outcome) => Ok(CycleOutcome::Executed(outcome)),
            Err(e) => Ok(CycleOutcome::Failed(e.kind())),
        }
    }
}

//! Configuration
//!
//! Typed TOML file for operating parameters, `.env` for secrets.
//! Parsing rejects unknown keys; `validate()` then resolves symbols,
//! addresses and human-unit amounts into [`Settings`], failing fast on
//! anything inconsistent before the bot touches the network.
//!
//! Author: AI-Generated
//! Created: 2026-02-09

use crate::arbitrage::{ExecutionSettings, GasModel, GridSearch, ReceiverShape, ScanSettings};
use crate::error::ConfigError;
use crate::quote::{ConcentratedLiquidityVenue, ConstantProductVenue, RetryPolicy, Venue};
use crate::routing::MAX_INTERMEDIATE_HOPS;
use crate::rpc::{GasSpeed, HealthPolicy};
use crate::types::{to_i128, Token, VenueKind, MAX_DECIMALS};
use alloy::primitives::{Address, U256};
use anyhow::{Context, Result};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config/flasharb.toml";

/// Top-level TOML file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BotConfig {
    pub network: NetworkConfig,
    #[serde(default)]
    pub rpc_health: RpcHealthConfig,
    #[serde(rename = "token")]
    pub tokens: Vec<TokenConfig>,
    #[serde(rename = "venue")]
    pub venues: Vec<VenueConfig>,
    pub receiver: ReceiverConfig,
    pub scan: ScanConfig,
    #[serde(default)]
    pub gas: GasConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkConfig {
    pub chain_id: u64,
    /// Ranked: the first entry is the preferred endpoint.
    pub endpoints: Vec<String>,
    #[serde(default = "default_rpc_timeout")]
    pub rpc_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RpcHealthConfig {
    #[serde(default = "default_stale_after")]
    pub stale_after_secs: u64,
    #[serde(default = "default_failover_cooldown")]
    pub failover_cooldown_secs: u64,
    #[serde(default = "default_return_to_preferred")]
    pub return_to_preferred_secs: u64,
    #[serde(default = "default_metrics_log")]
    pub metrics_log_secs: u64,
    pub metrics_file: Option<String>,
}

impl Default for RpcHealthConfig {
    fn default() -> Self {
        Self {
            stale_after_secs: default_stale_after(),
            failover_cooldown_secs: default_failover_cooldown(),
            return_to_preferred_secs: default_return_to_preferred(),
            metrics_log_secs: default_metrics_log(),
            metrics_file: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenConfig {
    pub symbol: String,
    pub address: String,
    pub decimals: u8,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VenueConfig {
    pub name: String,
    pub kind: VenueKind,
    pub router: String,
    /// Constant-product only.
    pub factory: Option<String>,
    /// Concentrated-liquidity only.
    pub quoter: Option<String>,
    #[serde(default = "default_max_hops")]
    pub max_hops: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReceiverConfig {
    pub address: String,
    pub shape: ReceiverShape,
    #[serde(default = "default_flash_fee_bps")]
    pub flash_loan_fee_bps: u32,
    /// Account whose borrowed-token balance collects the profit.
    /// Defaults to the receiver contract itself.
    #[serde(default)]
    pub profit_holder: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScanConfig {
    pub borrow_token: String,
    /// Wrapped native asset, used to price gas.
    pub native_token: String,
    /// Target symbols; empty means every configured token but the borrowed one.
    #[serde(default)]
    pub targets: Vec<String>,
    #[serde(default)]
    pub hub_tokens: Vec<String>,
    /// Constant-product venue used as the native price oracle.
    pub oracle_venue: String,
    pub min_net_profit: Decimal,
    pub max_borrow: Decimal,
    pub grid_base: Decimal,
    /// Defaults to half of `max_borrow`, leaving room for the upward extension.
    pub grid_ceiling: Option<Decimal>,
    #[serde(default = "default_grid_factor")]
    pub grid_factor: Decimal,
    #[serde(default = "default_grid_extension_steps")]
    pub grid_extension_steps: usize,
    #[serde(default = "default_time_budget_ms")]
    pub time_budget_ms: u64,
    #[serde(default = "default_scan_interval")]
    pub interval_secs: u64,
    #[serde(default)]
    pub multi_hop_only: bool,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_quote_cache_ttl_ms")]
    pub quote_cache_ttl_ms: u64,
    #[serde(default = "default_quote_attempts")]
    pub quote_attempts: u32,
    #[serde(default = "default_quote_backoff_ms")]
    pub quote_backoff_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GasConfig {
    #[serde(default = "default_gas_overhead")]
    pub overhead: u64,
    #[serde(default = "default_cp_hop_gas")]
    pub constant_product_hop: u64,
    #[serde(default = "default_cl_hop_gas")]
    pub concentrated_liquidity_hop: u64,
    /// Remote gas-tracker endpoint; RPC `eth_gasPrice` when unset.
    pub oracle_url: Option<String>,
    #[serde(default = "default_gas_speed")]
    pub oracle_speed: GasSpeed,
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            overhead: default_gas_overhead(),
            constant_product_hop: default_cp_hop_gas(),
            concentrated_liquidity_hop: default_cl_hop_gas(),
            oracle_url: None,
            oracle_speed: default_gas_speed(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutionConfig {
    #[serde(default = "default_true")]
    pub dry_run: bool,
    #[serde(default = "default_slippage_bps")]
    pub slippage_bps: u32,
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
    /// Fixed gas limit; estimated ×1.2 when unset.
    pub gas_limit: Option<u64>,
    #[serde(default = "default_receipt_timeout")]
    pub receipt_timeout_secs: u64,
    #[serde(default = "default_receipt_poll")]
    pub receipt_poll_secs: u64,
    /// Native units.
    #[serde(default = "default_min_native_balance")]
    pub min_native_balance: Decimal,
    #[serde(default = "default_low_balance_backoff")]
    pub low_balance_backoff_secs: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            dry_run: true,
            slippage_bps: default_slippage_bps(),
            deadline_secs: default_deadline_secs(),
            gas_limit: None,
            receipt_timeout_secs: default_receipt_timeout(),
            receipt_poll_secs: default_receipt_poll(),
            min_native_balance: default_min_native_balance(),
            low_balance_backoff_secs: default_low_balance_backoff(),
        }
    }
}

fn default_rpc_timeout() -> u64 { 10 }
fn default_stale_after() -> u64 { 120 }
fn default_failover_cooldown() -> u64 { 120 }
fn default_return_to_preferred() -> u64 { 600 }
fn default_metrics_log() -> u64 { 60 }
fn default_max_hops() -> usize { 1 }
fn default_flash_fee_bps() -> u32 { 9 }
fn default_grid_factor() -> Decimal { Decimal::new(16, 1) }
fn default_grid_extension_steps() -> usize { 3 }
fn default_time_budget_ms() -> u64 { 8_000 }
fn default_scan_interval() -> u64 { 15 }
fn default_top_k() -> usize { 3 }
fn default_quote_cache_ttl_ms() -> u64 { 5_000 }
fn default_quote_attempts() -> u32 { 2 }
fn default_quote_backoff_ms() -> u64 { 250 }
fn default_gas_overhead() -> u64 { 250_000 }
fn default_cp_hop_gas() -> u64 { 110_000 }
fn default_cl_hop_gas() -> u64 { 160_000 }
fn default_gas_speed() -> GasSpeed { GasSpeed::Propose }
fn default_true() -> bool { true }
fn default_slippage_bps() -> u32 { 50 }
fn default_deadline_secs() -> u64 { 120 }
fn default_receipt_timeout() -> u64 { 150 }
fn default_receipt_poll() -> u64 { 10 }
fn default_min_native_balance() -> Decimal { Decimal::ONE }
fn default_low_balance_backoff() -> u64 { 300 }

/// Validated, typed settings. Everything downstream reads from here.
#[derive(Debug, Clone)]
pub struct Settings {
    pub chain_id: u64,
    pub endpoints: Vec<String>,
    pub rpc_timeout: Duration,
    pub health: HealthPolicy,
    pub metrics_log_every: Duration,
    pub metrics_file: Option<PathBuf>,
    pub borrowed: Token,
    pub native: Token,
    pub targets: Vec<Token>,
    pub hubs: Vec<Address>,
    pub venues: Vec<Venue>,
    pub oracle_venue: Venue,
    pub receiver: Address,
    pub shape: ReceiverShape,
    pub scan: ScanSettings,
    pub execution: ExecutionSettings,
    pub scan_interval: Duration,
    pub quote_cache_ttl: Duration,
    pub retry: RetryPolicy,
    pub gas_oracle_url: Option<String>,
    pub gas_speed: GasSpeed,
    /// Native base units.
    pub min_native_balance: U256,
    pub low_balance_backoff: Duration,
}

/// Secrets from the environment (`.env` is loaded first if present).
#[derive(Clone)]
pub struct Secrets {
    pub private_key: String,
    pub gas_oracle_api_key: Option<String>,
}

impl Secrets {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        let private_key = std::env::var("PRIVATE_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::Missing("PRIVATE_KEY"))?;
        Ok(Self {
            private_key,
            gas_oracle_api_key: std::env::var("GAS_ORACLE_API_KEY").ok().filter(|k| !k.is_empty()),
        })
    }
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("private_key", &"<redacted>")
            .field("gas_oracle_api_key", &self.gas_oracle_api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

fn parse_address(field: &str, raw: &str) -> Result<Address, ConfigError> {
    Address::from_str(raw.trim()).map_err(|e| ConfigError::invalid(field, format!("`{}`: {}", raw, e)))
}

impl BotConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML configuration")
    }

    fn token(&self, tokens: &[Token], symbol: &str) -> Result<Token, ConfigError> {
        tokens
            .iter()
            .find(|t| t.symbol.eq_ignore_ascii_case(symbol))
            .cloned()
            .ok_or_else(|| ConfigError::UnknownToken(symbol.to_string()))
    }

    pub fn validate(&self) -> Result<Settings, ConfigError> {
        if self.network.endpoints.is_empty() {
            return Err(ConfigError::Missing("network.endpoints"));
        }

        let mut tokens = Vec::with_capacity(self.tokens.len());
        let mut seen = HashSet::new();
        for t in &self.tokens {
            if !seen.insert(t.symbol.to_ascii_uppercase()) {
                return Err(ConfigError::invalid("token.symbol", format!("duplicate `{}`", t.symbol)));
            }
            if t.decimals > MAX_DECIMALS {
                return Err(ConfigError::invalid(
                    format!("token.{}.decimals", t.symbol),
                    format!("{} exceeds {}", t.decimals, MAX_DECIMALS),
                ));
            }
            tokens.push(Token {
                symbol: t.symbol.clone(),
                address: parse_address(&format!("token.{}.address", t.symbol), &t.address)?,
                decimals: t.decimals,
            });
        }

        let borrowed = self.token(&tokens, &self.scan.borrow_token)?;
        let native = self.token(&tokens, &self.scan.native_token)?;
        let hubs = self
            .scan
            .hub_tokens
            .iter()
            .map(|s| self.token(&tokens, s).map(|t| t.address))
            .collect::<Result<Vec<_>, _>>()?;
        let targets = if self.scan.targets.is_empty() {
            tokens.iter().filter(|t| t.address != borrowed.address).cloned().collect()
        } else {
            self.scan
                .targets
                .iter()
                .map(|s| self.token(&tokens, s))
                .collect::<Result<Vec<_>, _>>()?
        };

        let venues = self.resolve_venues()?;
        if venues.len() < 2 {
            return Err(ConfigError::invalid("venue", "at least two venues are required"));
        }
        let oracle_venue = venues
            .iter()
            .find(|v| v.name() == self.scan.oracle_venue)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownVenue(self.scan.oracle_venue.clone()))?;
        if oracle_venue.kind() != VenueKind::ConstantProduct {
            return Err(ConfigError::invalid("scan.oracle_venue", "must be a constant_product venue"));
        }

        let shape = self.receiver.shape;
        if shape == ReceiverShape::SingleHop {
            if let Some(v) = venues
                .iter()
                .find(|v| v.kind() == VenueKind::ConcentratedLiquidity && v.max_hops() > 0)
            {
                return Err(ConfigError::ShapeMismatch(v.name().to_string()));
            }
        }
        if self.receiver.flash_loan_fee_bps >= 10_000 {
            return Err(ConfigError::invalid("receiver.flash_loan_fee_bps", "must be below 10000"));
        }
        if self.execution.slippage_bps >= 10_000 {
            return Err(ConfigError::invalid("execution.slippage_bps", "must be below 10000"));
        }
        if self.execution.receipt_poll_secs == 0 {
            return Err(ConfigError::invalid("execution.receipt_poll_secs", "must be positive"));
        }
        if self.scan.top_k == 0 {
            return Err(ConfigError::invalid("scan.top_k", "must be at least 1"));
        }
        if self.scan.quote_attempts == 0 {
            return Err(ConfigError::invalid("scan.quote_attempts", "must be at least 1"));
        }
        let factor = self.scan.grid_factor;
        if factor < Decimal::new(14, 1) || factor > Decimal::new(2, 0) {
            return Err(ConfigError::invalid("scan.grid_factor", format!("{} outside [1.4, 2.0]", factor)));
        }
        let step_bps = (factor * Decimal::from(10_000u32))
            .trunc()
            .to_u64()
            .ok_or_else(|| ConfigError::invalid("scan.grid_factor", "not representable"))?;

        let min_net_profit = to_i128(borrowed.to_base_units(self.scan.min_net_profit)?);
        let max_borrow = borrowed.to_base_units(self.scan.max_borrow)?;
        let grid_base = borrowed.to_base_units(self.scan.grid_base)?;
        if max_borrow.is_zero() {
            return Err(ConfigError::invalid("scan.max_borrow", "must be positive"));
        }
        if grid_base.is_zero() || grid_base > max_borrow {
            return Err(ConfigError::invalid("scan.grid_base", "must be positive and not above max_borrow"));
        }
        let grid_ceiling = match self.scan.grid_ceiling {
            Some(c) => borrowed.to_base_units(c)?,
            None => (max_borrow / U256::from(2u64)).max(grid_base),
        };
        if grid_ceiling < grid_base || grid_ceiling > max_borrow {
            return Err(ConfigError::invalid("scan.grid_ceiling", "must lie between grid_base and max_borrow"));
        }

        let gas = GasModel {
            overhead: self.gas.overhead,
            constant_product_hop: self.gas.constant_product_hop,
            concentrated_liquidity_hop: self.gas.concentrated_liquidity_hop,
        };
        let flash_fee_bps = self.receiver.flash_loan_fee_bps;

        let scan = ScanSettings {
            time_budget: Duration::from_millis(self.scan.time_budget_ms),
            min_net_profit,
            multi_hop_only: self.scan.multi_hop_only,
            top_k: self.scan.top_k,
            max_borrow,
            grid: GridSearch {
                base: grid_base,
                ceiling: grid_ceiling,
                hard_cap: max_borrow,
                step_bps,
                extension_steps: self.scan.grid_extension_steps,
            },
            flash_fee_bps,
            gas,
        };
        let execution = ExecutionSettings {
            dry_run: self.execution.dry_run,
            slippage_bps: self.execution.slippage_bps,
            deadline: Duration::from_secs(self.execution.deadline_secs),
            gas_limit: self.execution.gas_limit,
            receipt_timeout: Duration::from_secs(self.execution.receipt_timeout_secs),
            receipt_poll: Duration::from_secs(self.execution.receipt_poll_secs),
            min_net_profit,
            flash_fee_bps,
            profit_holder: self
                .receiver
                .profit_holder
                .as_deref()
                .map(|raw| parse_address("receiver.profit_holder", raw))
                .transpose()?,
        };

        Ok(Settings {
            chain_id: self.network.chain_id,
            endpoints: self.network.endpoints.clone(),
            rpc_timeout: Duration::from_secs(self.network.rpc_timeout_secs),
            health: HealthPolicy {
                stale_after: Duration::from_secs(self.rpc_health.stale_after_secs),
                failover_cooldown: Duration::from_secs(self.rpc_health.failover_cooldown_secs),
                return_to_preferred: Duration::from_secs(self.rpc_health.return_to_preferred_secs),
            },
            metrics_log_every: Duration::from_secs(self.rpc_health.metrics_log_secs),
            metrics_file: self.rpc_health.metrics_file.as_ref().map(PathBuf::from),
            min_native_balance: native.to_base_units(self.execution.min_native_balance)?,
            borrowed,
            native,
            targets,
            hubs,
            venues,
            oracle_venue,
            receiver: parse_address("receiver.address", &self.receiver.address)?,
            shape,
            scan,
            execution,
            scan_interval: Duration::from_secs(self.scan.interval_secs),
            quote_cache_ttl: Duration::from_millis(self.scan.quote_cache_ttl_ms),
            retry: RetryPolicy {
                attempts: self.scan.quote_attempts,
                backoff: Duration::from_millis(self.scan.quote_backoff_ms),
            },
            gas_oracle_url: self.gas.oracle_url.clone(),
            gas_speed: self.gas.oracle_speed,
            low_balance_backoff: Duration::from_secs(self.execution.low_balance_backoff_secs),
        })
    }

    fn resolve_venues(&self) -> Result<Vec<Venue>, ConfigError> {
        let mut names = HashSet::new();
        let mut venues = Vec::with_capacity(self.venues.len());
        for v in &self.venues {
            if !names.insert(v.name.as_str()) {
                return Err(ConfigError::invalid("venue.name", format!("duplicate `{}`", v.name)));
            }
            if v.max_hops > MAX_INTERMEDIATE_HOPS {
                return Err(ConfigError::invalid(
                    format!("venue.{}.max_hops", v.name),
                    format!("{} exceeds {}", v.max_hops, MAX_INTERMEDIATE_HOPS),
                ));
            }
            let router = parse_address(&format!("venue.{}.router", v.name), &v.router)?;
            let venue = match v.kind {
                VenueKind::ConstantProduct => {
                    let factory = v.factory.as_deref().ok_or_else(|| {
                        ConfigError::invalid(format!("venue.{}.factory", v.name), "required for constant_product")
                    })?;
                    Venue::ConstantProduct(ConstantProductVenue {
                        name: v.name.clone(),
                        router,
                        factory: parse_address(&format!("venue.{}.factory", v.name), factory)?,
                        max_hops: v.max_hops,
                    })
                }
                VenueKind::ConcentratedLiquidity => {
                    let quoter = v.quoter.as_deref().ok_or_else(|| {
                        ConfigError::invalid(format!("venue.{}.quoter", v.name), "required for concentrated_liquidity")
                    })?;
                    Venue::ConcentratedLiquidity(ConcentratedLiquidityVenue {
                        name: v.name.clone(),
                        router,
                        quoter: parse_address(&format!("venue.{}.quoter", v.name), quoter)?,
                        max_hops: v.max_hops,
                    })
                }
            };
            venues.push(venue);
        }
        Ok(venues)
    }
}

//! Core Types
//!
//! Domain types shared across quoting, scanning and execution.
//!
//! Author: AI-Generated
//! Created: 2026-02-03

use crate::error::{ConfigError, RouteError};
use alloy::primitives::{Address, Bytes, TxHash, U256};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

/// ERC20 token, loaded once from config.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token {
    pub symbol: String,
    pub address: Address,
    pub decimals: u8,
}

impl Token {
    /// Human amount -> base units (truncating).
    pub fn to_base_units(&self, amount: Decimal) -> Result<U256, ConfigError> {
        to_base_units(amount, self.decimals)
    }

    /// Base units -> human amount, for logs.
    pub fn format(&self, amount: U256) -> String {
        format_units(amount, self.decimals)
    }

    /// Signed base units (profits) -> human amount, for logs.
    pub fn format_signed(&self, amount: i128) -> String {
        match Decimal::try_from_i128_with_scale(amount, self.decimals as u32) {
            Ok(d) => d.normalize().to_string(),
            Err(_) => format!("{} (raw)", amount),
        }
    }
}

/// Venue kind. Drives quoting strategy and gas-per-hop cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VenueKind {
    ConstantProduct,
    ConcentratedLiquidity,
}

impl fmt::Display for VenueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VenueKind::ConstantProduct => write!(f, "CP"),
            VenueKind::ConcentratedLiquidity => write!(f, "CL"),
        }
    }
}

/// Ordered token route. Concentrated-liquidity routes carry one fee tier
/// per hop; constant-product routes carry none.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Route {
    tokens: Vec<Address>,
    fees: Vec<u32>,
}

impl Route {
    pub fn constant_product(tokens: Vec<Address>) -> Result<Self, RouteError> {
        if tokens.len() < 2 {
            return Err(RouteError::TooShort(tokens.len()));
        }
        Ok(Self { tokens, fees: Vec::new() })
    }

    pub fn concentrated(tokens: Vec<Address>, fees: Vec<u32>) -> Result<Self, RouteError> {
        if tokens.len() < 2 {
            return Err(RouteError::TooShort(tokens.len()));
        }
        if fees.len() != tokens.len() - 1 {
            return Err(RouteError::FeeCount {
                tokens: tokens.len(),
                fees: fees.len(),
            });
        }
        Ok(Self { tokens, fees })
    }

    pub fn tokens(&self) -> &[Address] {
        &self.tokens
    }

    pub fn fees(&self) -> &[u32] {
        &self.fees
    }

    pub fn hops(&self) -> usize {
        self.tokens.len() - 1
    }

    pub fn is_multi_hop(&self) -> bool {
        self.tokens.len() >= 3
    }
}

/// Result of a successful quote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    pub venue: String,
    pub route: Route,
    pub amount_in: U256,
    pub amount_out: U256,
}

/// A sized, scored arbitrage candidate.
#[derive(Debug, Clone)]
pub struct Opportunity {
    pub borrowed: Token,
    pub target: Token,
    pub buy_venue: String,
    pub sell_venue: String,
    pub amount_in: U256,
    pub buy_route: Route,
    pub sell_route: Route,
    pub buy_out: U256,
    pub sell_out: U256,
    pub gross_profit: i128,
    pub net_profit: i128,
    pub gas_units: u64,
}

impl Opportunity {
    pub fn is_multi_hop(&self) -> bool {
        self.buy_route.is_multi_hop() || self.sell_route.is_multi_hop()
    }

    pub fn describe(&self) -> String {
        format!(
            "{}→{}→{} buy@{} sell@{} in={} gross={} net={}",
            self.borrowed.symbol,
            self.target.symbol,
            self.borrowed.symbol,
            self.buy_venue,
            self.sell_venue,
            self.borrowed.format(self.amount_in),
            self.borrowed.format_signed(self.gross_profit),
            self.borrowed.format_signed(self.net_profit),
        )
    }
}

/// Fully-specified legacy transaction handed to the chain client for signing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRequest {
    pub to: Address,
    pub data: Bytes,
    pub nonce: u64,
    pub gas_limit: u64,
    pub gas_price: u128,
}

/// Receipt fields the bot cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiptSummary {
    pub hash: TxHash,
    pub success: bool,
    pub gas_used: u64,
    pub effective_gas_price: u128,
}

/// Saturating U256 -> i128.
pub fn to_i128(v: U256) -> i128 {
    if v > U256::from(i128::MAX as u128) {
        i128::MAX
    } else {
        v.to::<u128>() as i128
    }
}

/// Largest token precision the config layer converts (10^18 fits a u64 scale).
pub const MAX_DECIMALS: u8 = 18;

pub fn to_base_units(amount: Decimal, decimals: u8) -> Result<U256, ConfigError> {
    if amount.is_sign_negative() {
        return Err(ConfigError::invalid("amount", format!("{} is negative", amount)));
    }
    if decimals > MAX_DECIMALS {
        return Err(ConfigError::invalid(
            "decimals",
            format!("{} decimals exceeds the supported {}", decimals, MAX_DECIMALS),
        ));
    }
    let scale = Decimal::from(10u64.pow(decimals as u32));
    let scaled = amount
        .checked_mul(scale)
        .ok_or_else(|| ConfigError::invalid("amount", format!("{} overflows at {} decimals", amount, decimals)))?;
    let raw = scaled
        .trunc()
        .to_u128()
        .ok_or_else(|| ConfigError::invalid("amount", format!("{} not representable", amount)))?;
    Ok(U256::from(raw))
}

pub fn format_units(amount: U256, decimals: u8) -> String {
    if amount > U256::from(i128::MAX as u128) {
        return format!("{} (raw)", amount);
    }
    match Decimal::try_from_i128_with_scale(amount.to::<u128>() as i128, decimals as u32) {
        Ok(d) => d.normalize().to_string(),
        Err(_) => format!("{} (raw)", amount),
    }
}

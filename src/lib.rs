//! Flash-Loan DEX Arbitrage Bot Library
//!
//! Scans constant-product and concentrated-liquidity venues for cross-venue
//! price gaps, sizes each candidate, and executes the best one atomically
//! through a flash-loan receiver contract. RPC access is resilient across a
//! ranked list of endpoints.
//!
//! Author: AI-Generated
//! Created: 2026-02-03

pub mod arbitrage;
pub mod config;
pub mod contracts;
pub mod error;
pub mod nonce;
pub mod quote;
pub mod routing;
pub mod rpc;
pub mod session;
pub mod supervisor;
pub mod types;

// Re-export commonly used types
pub use config::{BotConfig, Secrets, Settings};
pub use error::{ConfigError, ExecutionError, FailureKind, QuoteError, RpcError};
pub use session::{Link, Session};
pub use supervisor::{StopSignal, Supervisor};
pub use types::{Opportunity, Route, Token, VenueKind};

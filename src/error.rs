//! Error types
//!
//! Typed errors at the module seams. Callers branch on the variant
//! (e.g. "no liquidity" vs. an RPC failure) rather than on message text.
//! Orchestration code above these seams uses `anyhow` with context.

use alloy::primitives::TxHash;
use thiserror::Error;

/// Chain-RPC errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RpcError {
    /// Could not build a transport for the endpoint.
    #[error("connect to {url} failed: {reason}")]
    Connect { url: String, reason: String },

    /// Call exceeded the configured RPC timeout.
    #[error("rpc call `{method}` timed out")]
    Timeout { method: &'static str },

    /// The node returned an error or the transport failed mid-call.
    #[error("rpc call `{method}` failed: {reason}")]
    Call { method: &'static str, reason: String },
}

/// Quote-layer errors. Never escape the quote provider.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuoteError {
    /// No pool / reverted quote. Not worth retrying.
    #[error("no liquidity: {0}")]
    NoLiquidity(String),

    /// Network-side failure. Retried, counted against the endpoint.
    #[error(transparent)]
    Rpc(#[from] RpcError),
}

/// Route construction and path codec errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("route needs at least 2 tokens, got {0}")]
    TooShort(usize),

    #[error("route has {tokens} tokens but {fees} fee tiers")]
    FeeCount { tokens: usize, fees: usize },

    #[error("fee tier {0} does not fit in uint24")]
    FeeOverflow(u32),

    #[error("encoded path length {0} is not 20 + 23*n")]
    BadPathLength(usize),
}

/// Execution-engine failures. Each one forces a nonce resync.
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error("transaction {hash} reverted (gas used {gas_used})")]
    Reverted { hash: TxHash, gas_used: u64 },

    #[error("no receipt for {hash} after {waited_secs}s")]
    ReceiptTimeout { hash: TxHash, waited_secs: u64 },

    #[error("route encoding failed: {0}")]
    Route(#[from] RouteError),
    #[error("single-hop receiver cannot carry the multi-hop route on {0}")]
    ShapeMismatch(String),
}

/// Coarse classification of an execution failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Rpc,
    Reverted,
    ReceiptTimeout,
    /// Calldata could not be built; nothing was sent.
    Encoding,
}

impl ExecutionError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ExecutionError::Rpc(_) => FailureKind::Rpc,
            ExecutionError::Reverted { .. } => FailureKind::Reverted,
            ExecutionError::ReceiptTimeout { .. } => FailureKind::ReceiptTimeout,
            ExecutionError::Route(_) | ExecutionError::ShapeMismatch(_) => FailureKind::Encoding,
        }
    }
}

/// Configuration validation errors (fatal at startup).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    Missing(&'static str),

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: String, reason: String },

    #[error("unknown token symbol `{0}`")]
    UnknownToken(String),

    #[error("unknown venue `{0}`")]
    UnknownVenue(String),

    #[error("receiver shape `single_hop` cannot carry multi-hop routes on concentrated-liquidity venue `{0}`")]
    ShapeMismatch(String),
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

//! RPC Module
//!
//! Node access (`ChainClient`), endpoint health and failover, telemetry,
//! and the gas-price oracle.
//!
//! Author: AI-Generated
//! Created: 2026-02-04

pub mod client;
pub mod gas;
pub mod manager;
pub mod metrics;

#[cfg(test)]
pub mod mock;

pub use client::{AlloyClient, AlloyConnector, ChainClient, Connector};
pub use gas::{GasOracle, GasSpeed};
pub use manager::{EndpointManager, Health, HealthPolicy, SwitchOutcome};
pub use metrics::{EndpointMetrics, Telemetry};

//! Arbitrage Module
//!
//! Sizing (closed form and grid search), the opportunity scanner, and the
//! flash-loan execution engine.
//!
//! Author: AI-Generated
//! Created: 2026-02-07
//! Modified: 2026-02-08 - Scanner and flash-loan executor

pub mod executor;
pub mod scanner;
pub mod solver;

pub use executor::{
    min_out, ExecutionEngine, ExecutionOutcome, ExecutionReport, ExecutionSettings, ReceiverShape,
};
pub use scanner::{flash_fee, GasModel, OpportunityScanner, ScanContext, ScanReport, ScanSettings};
pub use solver::{constant_product_out, optimal_amount_in, GridSearch};

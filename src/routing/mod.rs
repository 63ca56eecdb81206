//! Routing Module
//!
//! Route-candidate generation through hub tokens and the byte path codec
//! used by concentrated-liquidity quoters and routers.
//!
//! Author: AI-Generated
//! Created: 2026-02-04

pub mod hubs;
pub mod path;

pub use hubs::{fee_combinations, hub_paths, FEE_TIERS, MAX_INTERMEDIATE_HOPS};
pub use path::{decode_path, encode_path};

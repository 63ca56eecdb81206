//! Gas Price Oracle
//!
//! Remote gas-tracker API first (Etherscan-family `gastracker` response),
//! local `eth_gasPrice` as fallback. The remote call is retried a few times
//! with a fixed delay before falling back.
//!
//! Author: AI-Generated
//! Created: 2026-02-05

use super::client::ChainClient;
use crate::error::RpcError;
use anyhow::{anyhow, Context, Result};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

const GWEI: u64 = 1_000_000_000;

/// Which gas-tracker field to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GasSpeed {
    Safe,
    Propose,
    Fast,
}

#[derive(Debug, Deserialize)]
struct GasTrackerResponse {
    status: String,
    result: GasTrackerResult,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GasTrackerResult {
    safe_gas_price: String,
    propose_gas_price: String,
    fast_gas_price: String,
}

pub struct GasOracle {
    http: reqwest::Client,
    url: Option<String>,
    api_key: Option<String>,
    speed: GasSpeed,
    retries: u32,
    retry_delay: Duration,
}

impl GasOracle {
    pub fn new(url: Option<String>, api_key: Option<String>, speed: GasSpeed, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            http,
            url,
            api_key,
            speed,
            retries: 3,
            retry_delay: Duration::from_secs(2),
        }
    }

    /// RPC-only oracle.
    pub fn rpc_only() -> Self {
        Self::new(None, None, GasSpeed::Fast, Duration::from_secs(10))
    }

    /// Gas price in wei.
    pub async fn gas_price(&self, client: &dyn ChainClient) -> Result<u128, RpcError> {
        if let Some(url) = &self.url {
            for attempt in 1..=self.retries {
                match self.fetch_remote(url).await {
                    Ok(wei) => {
                        debug!("⛽ Gas oracle: {} gwei (remote)", wei / GWEI as u128);
                        return Ok(wei);
                    }
                    Err(e) => {
                        warn!("Gas oracle attempt {}/{} failed: {:#}", attempt, self.retries, e);
                        if attempt < self.retries {
                            tokio::time::sleep(self.retry_delay).await;
                        }
                    }
                }
            }
            warn!("Gas oracle unavailable, falling back to eth_gasPrice");
        }
        client.gas_price().await
    }

    async fn fetch_remote(&self, url: &str) -> Result<u128> {
        let mut request = self.http.get(url);
        if let Some(key) = &self.api_key {
            request = request.query(&[("apikey", key.as_str())]);
        }
        let body: GasTrackerResponse = request
            .send()
            .await
            .context("gas tracker request failed")?
            .error_for_status()
            .context("gas tracker returned error status")?
            .json()
            .await
            .context("gas tracker response was not valid JSON")?;
        parse_gas_tracker(&body, self.speed)
    }
}

fn parse_gas_tracker(body: &GasTrackerResponse, speed: GasSpeed) -> Result<u128> {
    if body.status != "1" {
        return Err(anyhow!("gas tracker status {}", body.status));
    }
    let field = match speed {
        GasSpeed::Safe => &body.result.safe_gas_price,
        GasSpeed::Propose => &body.result.propose_gas_price,
        GasSpeed::Fast => &body.result.fast_gas_price,
    };
    gwei_to_wei(field)
}

fn gwei_to_wei(gwei: &str) -> Result<u128> {
    let value = Decimal::from_str(gwei.trim()).with_context(|| format!("bad gwei value `{}`", gwei))?;
    if value.is_sign_negative() || value.is_zero() {
        return Err(anyhow!("non-positive gas price `{}`", gwei));
    }
    (value * Decimal::from(GWEI))
        .trunc()
        .to_u128()
        .ok_or_else(|| anyhow!("gas price `{}` out of range", gwei))
}

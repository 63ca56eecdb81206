//! RPC Endpoint Manager
//!
//! Keeps one active endpoint among N ranked candidates (index 0 is the
//! preferred one). Each supervisor cycle checks the active endpoint by
//! reading the chain height:
//!
//! - health-check round-trip time feeds the per-endpoint EMA latency
//! - height unchanged for longer than `stale_after` => stale
//! - health-check error => unreachable
//!
//! Either condition triggers a failover attempt, rate-limited by
//! `failover_cooldown` (the cooldown starts at the attempt, successful or
//! not). Candidates are tried in priority order; a candidate becomes active
//! only after it connects, answers the height check, and the caller's
//! `build` step (session link + nonce sync) succeeds against it.
//!
//! Separately, every `return_to_preferred` interval the preferred endpoint is
//! checked while we are away from it, and switched back to when healthy.
//!
//! All time-dependent methods take `now` so the policy is testable.
//!
//! Author: AI-Generated
//! Created: 2026-02-05

use super::client::{ChainClient, Connector};
use super::metrics::Telemetry;
use crate::error::RpcError;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy)]
pub struct HealthPolicy {
    pub stale_after: Duration,
    pub failover_cooldown: Duration,
    pub return_to_preferred: Duration,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            stale_after: Duration::from_secs(120),
            failover_cooldown: Duration::from_secs(120),
            return_to_preferred: Duration::from_secs(600),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Health {
    Healthy { height: u64 },
    Stale { height: u64, unchanged_for: Duration },
    Unreachable(RpcError),
}

impl Health {
    pub fn needs_failover(&self) -> bool {
        !matches!(self, Health::Healthy { .. })
    }
}

#[derive(Debug)]
pub enum SwitchOutcome<T> {
    /// Already on the wanted endpoint.
    NotNeeded,
    /// Inside the cooldown window; nothing checked.
    CoolingDown,
    /// Every candidate failed its height check or build step.
    NoHealthyCandidate,
    Switched { url: String, link: T },
}

pub struct EndpointManager {
    endpoints: Vec<String>,
    active: usize,
    policy: HealthPolicy,
    telemetry: Arc<Telemetry>,
    /// Last observed height and when it last changed.
    height: Option<(u64, Instant)>,
    last_failover_attempt: Option<Instant>,
    last_preferred_check: Option<Instant>,
}

impl EndpointManager {
    pub fn new(endpoints: Vec<String>, policy: HealthPolicy, telemetry: Arc<Telemetry>) -> Self {
        Self {
            endpoints,
            active: 0,
            policy,
            telemetry,
            height: None,
            last_failover_attempt: None,
            last_preferred_check: None,
        }
    }

    pub fn active_url(&self) -> &str {
        self.endpoints.get(self.active).map(String::as_str).unwrap_or("unknown")
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn on_preferred(&self) -> bool {
        self.active == 0
    }

    pub fn telemetry(&self) -> &Arc<Telemetry> {
        &self.telemetry
    }

    /// Startup: activate the first endpoint (in priority order) that checks
    /// healthy and builds. Does not count as a switch.
    pub async fn connect_initial<T, F, Fut>(
        &mut self,
        connector: &dyn Connector,
        now: Instant,
        mut build: F,
    ) -> Result<T, RpcError>
    where
        F: FnMut(Arc<dyn ChainClient>) -> Fut,
        Fut: Future<Output = Result<T, RpcError>>,
    {
        let mut last_err = None;
        for idx in 0..self.endpoints.len() {
            match self.try_endpoint(connector, idx, &mut build).await {
                Ok(link) => {
                    self.active = idx;
                    self.height = None;
                    if idx != 0 {
                        self.last_preferred_check = Some(now);
                    }
                    info!("🔌 Connected to RPC {} (rank {})", self.endpoints[idx], idx);
                    return Ok(link);
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or(RpcError::Connect {
            url: "<none>".to_string(),
            reason: "no endpoints configured".to_string(),
        }))
    }

    /// Check the active client once and classify its health.
    ///
    /// The latency fed into the endpoint's EMA is the round-trip time of
    /// this `eth_blockNumber` call, not the wall-clock gap since the
    /// previous check (that gap is the cycle interval, not the endpoint).
    pub async fn check_health(&mut self, client: &dyn ChainClient, now: Instant) -> Health {
        let url = self.active_url().to_string();
        let started = Instant::now();
        match client.block_number().await {
            Ok(height) => {
                self.telemetry.record_ping(&url, started.elapsed());
                match self.height {
                    Some((last, since)) if last == height => {
                        let unchanged_for = now.saturating_duration_since(since);
                        if unchanged_for > self.policy.stale_after {
                            warn!(
                                "⏸️  RPC {} stale: height {} unchanged for {}s",
                                url,
                                height,
                                unchanged_for.as_secs()
                            );
                            return Health::Stale { height, unchanged_for };
                        }
                        Health::Healthy { height }
                    }
                    _ => {
                        self.height = Some((height, now));
                        Health::Healthy { height }
                    }
                }
            }
            Err(e) => {
                self.telemetry.record_fail(&url);
                self.telemetry.set_connected(&url, false);
                warn!("❌ RPC {} health check failed: {}", url, e);
                Health::Unreachable(e)
            }
        }
    }

    /// Try every non-active candidate in priority order.
    pub async fn failover<T, F, Fut>(&mut self, connector: &dyn Connector, now: Instant, mut build: F) -> SwitchOutcome<T>
    where
        F: FnMut(Arc<dyn ChainClient>) -> Fut,
        Fut: Future<Output = Result<T, RpcError>>,
    {
        if let Some(at) = self.last_failover_attempt {
            if now.saturating_duration_since(at) < self.policy.failover_cooldown {
                debug!("Failover cooling down ({}s since last attempt)", now.saturating_duration_since(at).as_secs());
                return SwitchOutcome::CoolingDown;
            }
        }
        self.last_failover_attempt = Some(now);

        for idx in 0..self.endpoints.len() {
            if idx == self.active {
                continue;
            }
            if let Ok(link) = self.try_endpoint(connector, idx, &mut build).await {
                let from = self.active_url().to_string();
                self.activate(idx, now);
                warn!("🔀 RPC failover: {} -> {}", from, self.endpoints[idx]);
                return SwitchOutcome::Switched {
                    url: self.endpoints[idx].clone(),
                    link,
                };
            }
        }
        warn!("🚫 RPC failover: no healthy candidate, staying on {}", self.active_url());
        SwitchOutcome::NoHealthyCandidate
    }

    /// Periodically move back to the preferred endpoint when it is healthy.
    pub async fn maybe_return_to_preferred<T, F, Fut>(
        &mut self,
        connector: &dyn Connector,
        now: Instant,
        mut build: F,
    ) -> SwitchOutcome<T>
    where
        F: FnMut(Arc<dyn ChainClient>) -> Fut,
        Fut: Future<Output = Result<T, RpcError>>,
    {
        if self.on_preferred() {
            return SwitchOutcome::NotNeeded;
        }
        if let Some(at) = self.last_preferred_check {
            if now.saturating_duration_since(at) < self.policy.return_to_preferred {
                return SwitchOutcome::CoolingDown;
            }
        }
        self.last_preferred_check = Some(now);

        match self.try_endpoint(connector, 0, &mut build).await {
            Ok(link) => {
                let from = self.active_url().to_string();
                self.activate(0, now);
                info!("↩️  RPC back on preferred endpoint: {} -> {}", from, self.endpoints[0]);
                SwitchOutcome::Switched {
                    url: self.endpoints[0].clone(),
                    link,
                }
            }
            Err(_) => SwitchOutcome::NoHealthyCandidate,
        }
    }

    /// connect + height smoke read + caller build step.
    async fn try_endpoint<T, F, Fut>(&self, connector: &dyn Connector, idx: usize, build: &mut F) -> Result<T, RpcError>
    where
        F: FnMut(Arc<dyn ChainClient>) -> Fut,
        Fut: Future<Output = Result<T, RpcError>>,
    {
        let url = &self.endpoints[idx];
        let result = async {
            let client = connector.connect(url).await?;
            let started = Instant::now();
            let height = client.block_number().await?;
            self.telemetry.record_ping(url, started.elapsed());
            debug!("Endpoint {} ok at height {}", url, height);
            build(client).await
        }
        .await;

        if let Err(e) = &result {
            self.telemetry.record_fail(url);
            self.telemetry.set_connected(url, false);
            warn!("Endpoint {} failed: {}", url, e);
        }
        result
    }

    fn activate(&mut self, idx: usize, now: Instant) {
        let leaving_preferred = self.active == 0 && idx != 0;
        self.active = idx;
        self.height = None;
        self.telemetry.record_switch(&self.endpoints[idx]);
        if leaving_preferred {
            self.last_preferred_check = Some(now);
        }
    }
}

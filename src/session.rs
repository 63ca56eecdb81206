//! Session
//!
//! Everything bound to the active RPC endpoint lives in one [`Link`]:
//! the client, the nonce sequencer for the signing account, and the quote
//! provider (with its cache). A failover builds a complete new `Link`
//! against the new endpoint (nonce synced before it is accepted) and swaps
//! it in with a single assignment, so nothing ever observes a client from
//! one endpoint paired with a nonce from another.
//!
//! Author: AI-Generated
//! Created: 2026-02-09

use crate::config::Settings;
use crate::error::RpcError;
use crate::nonce::NonceSequencer;
use crate::quote::{QuoteProvider, RetryPolicy};
use crate::rpc::{ChainClient, Connector, EndpointManager, Health, SwitchOutcome, Telemetry};
use alloy::primitives::Address;
use anyhow::{bail, Context, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Handles bound to one endpoint. Replaced as a unit.
pub struct Link {
    pub client: Arc<dyn ChainClient>,
    pub nonce: NonceSequencer,
    pub quotes: QuoteProvider,
}

impl Link {
    pub fn url(&self) -> &str {
        self.client.url()
    }
}

/// Builds a [`Link`] for a freshly connected client.
pub struct LinkFactory {
    telemetry: Arc<Telemetry>,
    cache_ttl: Duration,
    retry: RetryPolicy,
    hubs: Vec<Address>,
}

impl LinkFactory {
    pub fn new(telemetry: Arc<Telemetry>, cache_ttl: Duration, retry: RetryPolicy, hubs: Vec<Address>) -> Self {
        Self {
            telemetry,
            cache_ttl,
            retry,
            hubs,
        }
    }

    /// Fails if the nonce cannot be read, which keeps the endpoint out.
    pub async fn build(&self, client: Arc<dyn ChainClient>) -> Result<Link, RpcError> {
        let nonce = NonceSequencer::new(client.clone(), client.signer());
        nonce.sync().await?;
        let quotes = QuoteProvider::new(
            client.clone(),
            self.telemetry.clone(),
            self.cache_ttl,
            self.retry,
            self.hubs.clone(),
        );
        Ok(Link { client, nonce, quotes })
    }
}

pub struct Session {
    settings: Arc<Settings>,
    connector: Arc<dyn Connector>,
    manager: EndpointManager,
    factory: LinkFactory,
    link: Link,
}

impl Session {
    /// Connect to the first healthy endpoint and check the receiver is deployed.
    pub async fn open(settings: Arc<Settings>, connector: Arc<dyn Connector>) -> Result<Self> {
        let telemetry = Arc::new(Telemetry::new(settings.metrics_log_every, settings.metrics_file.clone()));
        let mut manager = EndpointManager::new(settings.endpoints.clone(), settings.health, telemetry.clone());
        let factory = LinkFactory::new(telemetry, settings.quote_cache_ttl, settings.retry, settings.hubs.clone());

        let link = manager
            .connect_initial(connector.as_ref(), Instant::now(), |client| factory.build(client))
            .await
            .context("No RPC endpoint reachable")?;
        info!("Signer {:?} on {}", link.client.signer(), link.url());

        let session = Self {
            settings,
            connector,
            manager,
            factory,
            link,
        };
        session.verify_receiver().await?;
        Ok(session)
    }

    pub fn link(&self) -> &Link {
        &self.link
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn active_url(&self) -> &str {
        self.manager.active_url()
    }

    pub fn telemetry(&self) -> &Arc<Telemetry> {
        self.manager.telemetry()
    }

    async fn verify_receiver(&self) -> Result<()> {
        let receiver = self.settings.receiver;
        let deployed = self
            .link
            .client
            .has_code(receiver)
            .await
            .context("Failed to read receiver code")?;
        if !deployed {
            bail!("No contract code at flash-loan receiver {:?}", receiver);
        }
        info!("Receiver {:?} verified ({:?} params)", receiver, self.settings.shape);
        Ok(())
    }

    /// Per-cycle RPC upkeep: health check, failover, return-to-preferred,
    /// telemetry. Errors only when the active endpoint is unreachable and
    /// no replacement could be installed.
    pub async fn maintain(&mut self, now: Instant) -> Result<(), RpcError> {
        let health = self.manager.check_health(self.link.client.as_ref(), now).await;
        if health.needs_failover() {
            let factory = &self.factory;
            let outcome = self
                .manager
                .failover(self.connector.as_ref(), now, |client| factory.build(client))
                .await;
            match outcome {
                SwitchOutcome::Switched { url, link } => self.install(url, link),
                _ => {
                    if let Health::Unreachable(e) = health {
                        return Err(e);
                    }
                }
            }
        }

        let factory = &self.factory;
        let outcome = self
            .manager
            .maybe_return_to_preferred(self.connector.as_ref(), now, |client| factory.build(client))
            .await;
        if let SwitchOutcome::Switched { url, link } = outcome {
            self.install(url, link);
        }

        self.manager.telemetry().log_if_due(self.manager.active_url(), now);
        Ok(())
    }

    fn install(&mut self, url: String, link: Link) {
        warn!("🔄 Session rebound: {} -> {}", self.link.url(), url);
        self.link = link;
    }

    /// Final telemetry snapshot (shutdown).
    pub fn flush_metrics(&self) {
        if let Err(e) = self.telemetry().persist(self.active_url()) {
            warn!("Failed to persist RPC metrics: {:#}", e);
        }
    }
}

//! Nonce Sequencer
//!
//! One counter per signing account. `sync` reads the pending transaction
//! count from the node and overwrites the local value (the only way the
//! value can go down). `advance` is a local +1 and is called only after a
//! confirmed successful receipt.
//!
//! Author: AI-Generated
//! Created: 2026-02-05

use crate::error::RpcError;
use crate::rpc::ChainClient;
use alloy::primitives::Address;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

pub struct NonceSequencer {
    client: Arc<dyn ChainClient>,
    account: Address,
    value: Mutex<Option<u64>>,
}

impl NonceSequencer {
    pub fn new(client: Arc<dyn ChainClient>, account: Address) -> Self {
        Self {
            client,
            account,
            value: Mutex::new(None),
        }
    }

    pub fn account(&self) -> Address {
        self.account
    }

    /// Authoritative network read.
    pub async fn sync(&self) -> Result<u64, RpcError> {
        let mut guard = self.value.lock().await;
        let network = self.client.transaction_count(self.account).await?;
        if *guard != Some(network) {
            info!("🔢 Nonce sync for {:?}: {:?} -> {}", self.account, *guard, network);
        }
        *guard = Some(network);
        Ok(network)
    }

    /// Current value; syncs first when `refresh` is set or nothing is cached yet.
    pub async fn get(&self, refresh: bool) -> Result<u64, RpcError> {
        if !refresh {
            if let Some(v) = *self.value.lock().await {
                return Ok(v);
            }
        }
        self.sync().await
    }

    /// Local increment after a confirmed success. No-op before the first sync.
    pub async fn advance(&self) -> Option<u64> {
        let mut guard = self.value.lock().await;
        let next = guard.map(|v| v + 1);
        if next.is_some() {
            *guard = next;
            debug!("Nonce advanced to {:?}", next);
        }
        next
    }

    /// Cached value without touching the network.
    pub async fn peek(&self) -> Option<u64> {
        *self.value.lock().await
    }
}

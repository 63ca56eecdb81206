//! Scripted in-memory chain for tests.
//!
//! Constant-product pools price with the 997/1000 rule; concentrated-liquidity
//! pools are approximated with the same curve at their fee tier, which is
//! enough to exercise routing, sizing and execution without a node.

use super::client::{ChainClient, Connector};
use crate::error::{QuoteError, RpcError};
use crate::routing::decode_path;
use crate::types::{ReceiptSummary, TxRequest};
use alloy::primitives::{Address, Bytes, TxHash, U256};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptMode {
    Success,
    Revert,
    Never,
}

pub use crate::arbitrage::solver::constant_product_out as cp_amount_out;

fn fee_amount_out(amount_in: U256, reserve_in: u128, reserve_out: u128, keep: u64, scale: u64) -> U256 {
    if amount_in.is_zero() || reserve_in == 0 || reserve_out == 0 {
        return U256::ZERO;
    }
    let with_fee = amount_in * U256::from(keep);
    let numerator = with_fee * U256::from(reserve_out);
    let denominator = U256::from(reserve_in) * U256::from(scale) + with_fee;
    numerator / denominator
}

pub struct MockChain {
    url: String,
    signer: Address,
    pub height: AtomicU64,
    pub reachable: AtomicBool,
    pub balance: Mutex<U256>,
    pub gas_price: Mutex<u128>,
    pub network_nonce: AtomicU64,
    pub gas_estimate: AtomicU64,
    pub fail_send: AtomicBool,
    pub receipt_mode: Mutex<ReceiptMode>,
    pub quote_failures: AtomicUsize,
    pub quote_calls: AtomicUsize,
    pub sent: Mutex<Vec<TxRequest>>,
    /// Delay before every quoting call and height read answers.
    pub latency: Mutex<Duration>,
    /// Token balance credited to (token, holder) when a transaction lands.
    pub settlement: Mutex<Option<(Address, Address, U256)>>,
    token_balances: Mutex<HashMap<(Address, Address), U256>>,
    code: Mutex<HashSet<Address>>,
    factories: Mutex<HashMap<Address, Address>>,
    cp_pools: Mutex<HashMap<(Address, Address, Address), (u128, u128)>>,
    cl_pools: Mutex<HashMap<(Address, Address, Address, u32), (u128, u128)>>,
}

impl MockChain {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            signer: Address::repeat_byte(0xee),
            height: AtomicU64::new(1_000),
            reachable: AtomicBool::new(true),
            balance: Mutex::new(U256::from(100u128 * 10u128.pow(18))),
            gas_price: Mutex::new(30_000_000_000),
            network_nonce: AtomicU64::new(7),
            gas_estimate: AtomicU64::new(400_000),
            fail_send: AtomicBool::new(false),
            receipt_mode: Mutex::new(ReceiptMode::Success),
            quote_failures: AtomicUsize::new(0),
            quote_calls: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
            latency: Mutex::new(Duration::ZERO),
            settlement: Mutex::new(None),
            token_balances: Mutex::new(HashMap::new()),
            code: Mutex::new(HashSet::new()),
            factories: Mutex::new(HashMap::new()),
            cp_pools: Mutex::new(HashMap::new()),
            cl_pools: Mutex::new(HashMap::new()),
        }
    }

    pub fn shared(url: &str) -> Arc<Self> {
        Arc::new(Self::new(url))
    }

    pub fn add_code(&self, at: Address) {
        self.code.lock().unwrap().insert(at);
    }

    pub fn add_cp_pool(&self, router: Address, factory: Address, a: Address, b: Address, ra: u128, rb: u128) {
        self.factories.lock().unwrap().insert(factory, router);
        let mut pools = self.cp_pools.lock().unwrap();
        pools.insert((router, a, b), (ra, rb));
        pools.insert((router, b, a), (rb, ra));
    }

    pub fn add_cl_pool(&self, quoter: Address, a: Address, b: Address, fee: u32, ra: u128, rb: u128) {
        let mut pools = self.cl_pools.lock().unwrap();
        pools.insert((quoter, a, b, fee), (ra, rb));
        pools.insert((quoter, b, a, fee), (rb, ra));
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = latency;
    }

    pub fn set_token_balance(&self, token: Address, holder: Address, amount: U256) {
        self.token_balances.lock().unwrap().insert((token, holder), amount);
    }

    pub fn token_balance_of(&self, token: Address, holder: Address) -> U256 {
        self.token_balances
            .lock()
            .unwrap()
            .get(&(token, holder))
            .copied()
            .unwrap_or_default()
    }

    async fn pause(&self) {
        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    pub fn set_gas_price(&self, wei: u128) {
        *self.gas_price.lock().unwrap() = wei;
    }

    pub fn set_receipt_mode(&self, mode: ReceiptMode) {
        *self.receipt_mode.lock().unwrap() = mode;
    }

    pub fn quote_calls(&self) -> usize {
        self.quote_calls.load(Ordering::SeqCst)
    }

    fn check_reachable(&self, method: &'static str) -> Result<(), RpcError> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RpcError::Call {
                method,
                reason: "connection refused".to_string(),
            })
        }
    }

    fn begin_quote(&self, method: &'static str) -> Result<(), QuoteError> {
        self.quote_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reachable(method)?;
        let pending = self.quote_failures.load(Ordering::SeqCst);
        if pending > 0 {
            self.quote_failures.store(pending - 1, Ordering::SeqCst);
            return Err(QuoteError::Rpc(RpcError::Call {
                method,
                reason: "injected failure".to_string(),
            }));
        }
        Ok(())
    }

    fn cl_hop(&self, quoter: Address, a: Address, b: Address, fee: u32, amount: U256) -> Result<U256, QuoteError> {
        let pools = self.cl_pools.lock().unwrap();
        let (ra, rb) = pools
            .get(&(quoter, a, b, fee))
            .copied()
            .ok_or_else(|| QuoteError::NoLiquidity(format!("no pool {:?}/{:?}@{}", a, b, fee)))?;
        Ok(fee_amount_out(amount, ra, rb, 1_000_000 - fee as u64, 1_000_000))
    }
}

#[async_trait]
impl ChainClient for MockChain {
    fn url(&self) -> &str {
        &self.url
    }

    fn signer(&self) -> Address {
        self.signer
    }

    async fn block_number(&self) -> Result<u64, RpcError> {
        self.pause().await;
        self.check_reachable("eth_blockNumber")?;
        Ok(self.height.load(Ordering::SeqCst))
    }

    async fn native_balance(&self, _who: Address) -> Result<U256, RpcError> {
        self.check_reachable("eth_getBalance")?;
        Ok(*self.balance.lock().unwrap())
    }

    async fn gas_price(&self) -> Result<u128, RpcError> {
        self.check_reachable("eth_gasPrice")?;
        Ok(*self.gas_price.lock().unwrap())
    }

    async fn transaction_count(&self, _who: Address) -> Result<u64, RpcError> {
        self.check_reachable("eth_getTransactionCount")?;
        Ok(self.network_nonce.load(Ordering::SeqCst))
    }

    async fn has_code(&self, at: Address) -> Result<bool, RpcError> {
        self.check_reachable("eth_getCode")?;
        Ok(self.code.lock().unwrap().contains(&at))
    }

    async fn token_balance(&self, token: Address, who: Address) -> Result<U256, RpcError> {
        self.check_reachable("balanceOf")?;
        Ok(self.token_balance_of(token, who))
    }

    async fn amounts_out(&self, router: Address, amount_in: U256, path: &[Address]) -> Result<U256, QuoteError> {
        self.pause().await;
        self.begin_quote("getAmountsOut")?;
        let pools = self.cp_pools.lock().unwrap();
        let mut amount = amount_in;
        for hop in path.windows(2) {
            let (ra, rb) = pools
                .get(&(router, hop[0], hop[1]))
                .copied()
                .ok_or_else(|| QuoteError::NoLiquidity("no pair".to_string()))?;
            amount = cp_amount_out(amount, ra, rb);
        }
        Ok(amount)
    }

    async fn pair_reserves(
        &self,
        factory: Address,
        token_in: Address,
        token_out: Address,
    ) -> Result<Option<(u128, u128)>, QuoteError> {
        self.pause().await;
        self.begin_quote("getReserves")?;
        let Some(router) = self.factories.lock().unwrap().get(&factory).copied() else {
            return Ok(None);
        };
        Ok(self.cp_pools.lock().unwrap().get(&(router, token_in, token_out)).copied())
    }

    async fn quote_exact_input_single(
        &self,
        quoter: Address,
        token_in: Address,
        token_out: Address,
        fee: u32,
        amount_in: U256,
    ) -> Result<U256, QuoteError> {
        self.pause().await;
        self.begin_quote("quoteExactInputSingle")?;
        self.cl_hop(quoter, token_in, token_out, fee, amount_in)
    }

    async fn quote_exact_input(&self, quoter: Address, path: Bytes, amount_in: U256) -> Result<U256, QuoteError> {
        self.pause().await;
        self.begin_quote("quoteExactInput")?;
        let (tokens, fees) = decode_path(&path).map_err(|e| QuoteError::NoLiquidity(e.to_string()))?;
        let mut amount = amount_in;
        for (i, fee) in fees.iter().enumerate() {
            amount = self.cl_hop(quoter, tokens[i], tokens[i + 1], *fee, amount)?;
        }
        Ok(amount)
    }

    async fn estimate_gas(&self, _to: Address, _data: Bytes) -> Result<u64, RpcError> {
        self.check_reachable("eth_estimateGas")?;
        Ok(self.gas_estimate.load(Ordering::SeqCst))
    }

    async fn send_transaction(&self, tx: TxRequest) -> Result<TxHash, RpcError> {
        self.check_reachable("eth_sendRawTransaction")?;
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(RpcError::Call {
                method: "eth_sendRawTransaction",
                reason: "nonce too low".to_string(),
            });
        }
        let hash = TxHash::with_last_byte(tx.nonce as u8);
        self.network_nonce.fetch_add(1, Ordering::SeqCst);
        if *self.receipt_mode.lock().unwrap() == ReceiptMode::Success {
            if let Some((token, holder, credit)) = *self.settlement.lock().unwrap() {
                let mut balances = self.token_balances.lock().unwrap();
                let entry = balances.entry((token, holder)).or_default();
                *entry = entry.saturating_add(credit);
            }
        }
        self.sent.lock().unwrap().push(tx);
        Ok(hash)
    }

    async fn receipt(&self, hash: TxHash) -> Result<Option<ReceiptSummary>, RpcError> {
        self.check_reachable("eth_getTransactionReceipt")?;
        let summary = |success| ReceiptSummary {
            hash,
            success,
            gas_used: 350_000,
            effective_gas_price: 30_000_000_000,
        };
        Ok(match *self.receipt_mode.lock().unwrap() {
            ReceiptMode::Success => Some(summary(true)),
            ReceiptMode::Revert => Some(summary(false)),
            ReceiptMode::Never => None,
        })
    }
}

/// Hands out pre-registered mock chains by URL; unknown URLs refuse.
#[derive(Default)]
pub struct MockConnector {
    chains: HashMap<String, Arc<MockChain>>,
    pub attempts: Mutex<Vec<String>>,
}

impl MockConnector {
    pub fn with(mut self, chain: Arc<MockChain>) -> Self {
        self.chains.insert(chain.url().to_string(), chain);
        self
    }

    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, url: &str) -> Result<Arc<dyn ChainClient>, RpcError> {
        self.attempts.lock().unwrap().push(url.to_string());
        match self.chains.get(url) {
            Some(chain) => Ok(chain.clone() as Arc<dyn ChainClient>),
            None => Err(RpcError::Connect {
                url: url.to_string(),
                reason: "unknown endpoint".to_string(),
            }),
        }
    }
}

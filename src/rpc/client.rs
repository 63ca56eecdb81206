//! Chain Client
//!
//! `ChainClient` is the only surface the rest of the bot uses to talk to a
//! node: chain reads, venue quoting calls, and signed submission. The
//! alloy-backed implementation binds contract instances per call against a
//! type-erased provider, so swapping the client swaps every binding with it.
//!
//! Author: AI-Generated
//! Created: 2026-02-04

use crate::contracts::{fee_to_u24, IERC20, IQuoter, IUniswapV2Factory, IUniswapV2Pair, IUniswapV2Router02};
use crate::error::{QuoteError, RpcError};
use crate::types::{ReceiptSummary, TxRequest};
use alloy::network::{EthereumWallet, ReceiptResponse, TransactionBuilder};
use alloy::primitives::aliases::U160;
use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use std::fmt::Display;
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Node access used by quoting, scanning, execution and health probing.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Endpoint URL this client is bound to.
    fn url(&self) -> &str;

    /// Address of the signing account.
    fn signer(&self) -> Address;

    async fn block_number(&self) -> Result<u64, RpcError>;
    async fn native_balance(&self, who: Address) -> Result<U256, RpcError>;
    async fn gas_price(&self) -> Result<u128, RpcError>;
    /// Pending-inclusive transaction count (next usable nonce).
    async fn transaction_count(&self, who: Address) -> Result<u64, RpcError>;
    async fn has_code(&self, at: Address) -> Result<bool, RpcError>;
    /// ERC20 `balanceOf`.
    async fn token_balance(&self, token: Address, who: Address) -> Result<U256, RpcError>;

    /// Router `getAmountsOut`; returns the final hop's output.
    async fn amounts_out(&self, router: Address, amount_in: U256, path: &[Address]) -> Result<U256, QuoteError>;

    /// Pair reserves oriented as (reserve of `token_in`, reserve of `token_out`).
    /// `None` when the factory has no pair.
    async fn pair_reserves(
        &self,
        factory: Address,
        token_in: Address,
        token_out: Address,
    ) -> Result<Option<(u128, u128)>, QuoteError>;

    async fn quote_exact_input_single(
        &self,
        quoter: Address,
        token_in: Address,
        token_out: Address,
        fee: u32,
        amount_in: U256,
    ) -> Result<U256, QuoteError>;

    async fn quote_exact_input(&self, quoter: Address, path: Bytes, amount_in: U256) -> Result<U256, QuoteError>;

    async fn estimate_gas(&self, to: Address, data: Bytes) -> Result<u64, RpcError>;

    /// Sign with the bound account and broadcast.
    async fn send_transaction(&self, tx: TxRequest) -> Result<TxHash, RpcError>;

    async fn receipt(&self, hash: TxHash) -> Result<Option<ReceiptSummary>, RpcError>;
}

/// Builds clients for endpoint URLs. Failover and return-to-preferred
/// go through this so they can be exercised without a network.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Arc<dyn ChainClient>, RpcError>;
}

/// alloy provider + local signer.
pub struct AlloyClient {
    url: String,
    signer: Address,
    chain_id: u64,
    timeout: Duration,
    provider: DynProvider,
}

impl AlloyClient {
    pub async fn connect(
        url: &str,
        signer: PrivateKeySigner,
        chain_id: u64,
        timeout: Duration,
    ) -> Result<Self, RpcError> {
        let address = signer.address();
        let wallet = EthereumWallet::from(signer);
        let provider = ProviderBuilder::new()
            .disable_recommended_fillers()
            .wallet(wallet)
            .connect(url)
            .await
            .map_err(|e| RpcError::Connect {
                url: url.to_string(),
                reason: e.to_string(),
            })?
            .erased();

        Ok(Self {
            url: url.to_string(),
            signer: address,
            chain_id,
            timeout,
            provider,
        })
    }

    async fn timed<T, E, F>(&self, method: &'static str, fut: F) -> Result<T, RpcError>
    where
        E: Display,
        F: IntoFuture<Output = Result<T, E>>,
    {
        match tokio::time::timeout(self.timeout, fut.into_future()).await {
            Ok(Ok(v)) => Ok(v),
            Ok(Err(e)) => Err(RpcError::Call {
                method,
                reason: e.to_string(),
            }),
            Err(_) => Err(RpcError::Timeout { method }),
        }
    }

    async fn timed_call<T, F>(&self, method: &'static str, fut: F) -> Result<T, QuoteError>
    where
        F: IntoFuture<Output = Result<T, alloy::contract::Error>>,
    {
        match tokio::time::timeout(self.timeout, fut.into_future()).await {
            Ok(Ok(v)) => Ok(v),
            Ok(Err(e)) => Err(classify_call_error(method, e)),
            Err(_) => Err(QuoteError::Rpc(RpcError::Timeout { method })),
        }
    }
}

/// Revert / empty return means the pool is absent or cannot fill the amount.
/// Anything else is the endpoint's fault.
fn classify_call_error(method: &'static str, err: alloy::contract::Error) -> QuoteError {
    use alloy::contract::Error as CallError;

    if err.as_revert_data().is_some() || matches!(err, CallError::ZeroData(..)) {
        return QuoteError::NoLiquidity(format!("{}: {}", method, err));
    }
    if let CallError::TransportError(ref transport) = err {
        let reverted = transport
            .as_error_resp()
            .is_some_and(|payload| payload.code == 3 || payload.message.contains("revert"));
        if reverted {
            return QuoteError::NoLiquidity(format!("{}: {}", method, err));
        }
    }
    QuoteError::Rpc(RpcError::Call {
        method,
        reason: err.to_string(),
    })
}

#[async_trait]
impl ChainClient for AlloyClient {
    fn url(&self) -> &str {
        &self.url
    }

    fn signer(&self) -> Address {
        self.signer
    }

    async fn block_number(&self) -> Result<u64, RpcError> {
        self.timed("eth_blockNumber", self.provider.get_block_number()).await
    }

    async fn native_balance(&self, who: Address) -> Result<U256, RpcError> {
        self.timed("eth_getBalance", self.provider.get_balance(who))
            .await
    }

    async fn gas_price(&self) -> Result<u128, RpcError> {
        self.timed("eth_gasPrice", self.provider.get_gas_price()).await
    }

    async fn transaction_count(&self, who: Address) -> Result<u64, RpcError> {
        self.timed(
            "eth_getTransactionCount",
            self.provider.get_transaction_count(who).pending(),
        )
        .await
    }

    async fn has_code(&self, at: Address) -> Result<bool, RpcError> {
        let code = self
            .timed("eth_getCode", self.provider.get_code_at(at))
            .await?;
        Ok(!code.is_empty())
    }

    async fn token_balance(&self, token: Address, who: Address) -> Result<U256, RpcError> {
        let token = IERC20::new(token, &self.provider);
        let call = token.balanceOf(who);
        self.timed("balanceOf", call.call()).await
    }

    async fn amounts_out(&self, router: Address, amount_in: U256, path: &[Address]) -> Result<U256, QuoteError> {
        let router = IUniswapV2Router02::new(router, &self.provider);
        let call = router.getAmountsOut(amount_in, path.to_vec());
        let amounts = self.timed_call("getAmountsOut", call.call()).await?;
        amounts
            .last()
            .copied()
            .ok_or_else(|| QuoteError::NoLiquidity("getAmountsOut: empty result".to_string()))
    }

    async fn pair_reserves(
        &self,
        factory: Address,
        token_in: Address,
        token_out: Address,
    ) -> Result<Option<(u128, u128)>, QuoteError> {
        let factory = IUniswapV2Factory::new(factory, &self.provider);
        let pair_call = factory.getPair(token_in, token_out);
        let pair_address = self.timed_call("getPair", pair_call.call()).await?;
        if pair_address == Address::ZERO {
            debug!("No pair for {:?}/{:?}", token_in, token_out);
            return Ok(None);
        }

        let pair = IUniswapV2Pair::new(pair_address, &self.provider);
        let reserves_call = pair.getReserves();
        let token0_call = pair.token0();
        let reserves = self.timed_call("getReserves", reserves_call.call()).await?;
        let token0 = self.timed_call("token0", token0_call.call()).await?;

        let r0 = reserves.reserve0.to::<u128>();
        let r1 = reserves.reserve1.to::<u128>();
        if token0 == token_in {
            Ok(Some((r0, r1)))
        } else {
            Ok(Some((r1, r0)))
        }
    }

    async fn quote_exact_input_single(
        &self,
        quoter: Address,
        token_in: Address,
        token_out: Address,
        fee: u32,
        amount_in: U256,
    ) -> Result<U256, QuoteError> {
        let quoter = IQuoter::new(quoter, &self.provider);
        let call = quoter.quoteExactInputSingle(token_in, token_out, fee_to_u24(fee), amount_in, U160::ZERO);
        self.timed_call("quoteExactInputSingle", call.call()).await
    }

    async fn quote_exact_input(&self, quoter: Address, path: Bytes, amount_in: U256) -> Result<U256, QuoteError> {
        let quoter = IQuoter::new(quoter, &self.provider);
        let call = quoter.quoteExactInput(path, amount_in);
        self.timed_call("quoteExactInput", call.call()).await
    }

    async fn estimate_gas(&self, to: Address, data: Bytes) -> Result<u64, RpcError> {
        let tx = TransactionRequest::default()
            .with_from(self.signer)
            .with_to(to)
            .with_input(data);
        self.timed("eth_estimateGas", self.provider.estimate_gas(tx))
            .await
    }

    async fn send_transaction(&self, tx: TxRequest) -> Result<TxHash, RpcError> {
        let request = TransactionRequest::default()
            .with_from(self.signer)
            .with_to(tx.to)
            .with_input(tx.data)
            .with_nonce(tx.nonce)
            .with_gas_limit(tx.gas_limit)
            .with_gas_price(tx.gas_price)
            .with_chain_id(self.chain_id);
        let pending = self
            .timed("eth_sendRawTransaction", self.provider.send_transaction(request))
            .await?;
        Ok(*pending.tx_hash())
    }

    async fn receipt(&self, hash: TxHash) -> Result<Option<ReceiptSummary>, RpcError> {
        let receipt = self
            .timed(
                "eth_getTransactionReceipt",
                self.provider.get_transaction_receipt(hash),
            )
            .await?;
        Ok(receipt.map(|r| ReceiptSummary {
            hash,
            success: r.status(),
            gas_used: r.gas_used,
            effective_gas_price: r.effective_gas_price,
        }))
    }
}

/// Connects alloy clients with a shared signing key.
pub struct AlloyConnector {
    signer: PrivateKeySigner,
    chain_id: u64,
    timeout: Duration,
}

impl AlloyConnector {
    pub fn new(signer: PrivateKeySigner, chain_id: u64, timeout: Duration) -> Self {
        Self {
            signer,
            chain_id,
            timeout,
        }
    }
}

#[async_trait]
impl Connector for AlloyConnector {
    async fn connect(&self, url: &str) -> Result<Arc<dyn ChainClient>, RpcError> {
        let client = AlloyClient::connect(url, self.signer.clone(), self.chain_id, self.timeout).await?;
        Ok(Arc::new(client))
    }
}

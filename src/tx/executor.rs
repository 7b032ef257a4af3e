//! Contract-write primitive.
//!
//! [`TxExecutor`] is the seam between the queue and the chain. The
//! production implementation, [`RpcTxExecutor`], signs legacy (EIP-155)
//! transactions locally and submits them over any [`Transport`].
//!
//! # Receipt handling
//!
//! The realtime send method may answer with the full receipt. When the
//! node answers with a bare hash instead, the receipt is polled until it
//! appears or the receipt timeout elapses.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use alloy::consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::Encodable2718;
use alloy::network::TxSignerSync;
use alloy::primitives::{Address, B256, Bytes, TxKind, U64, U128, U256};
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, trace, warn};

use crate::contract::revert_from_rpc;
use crate::error::{Error, Result};
use crate::transport::{Transport, request_as};

// ============================================================================
// Constants
// ============================================================================

/// Default interval between receipt polls.
pub const DEFAULT_RECEIPT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Default time to wait for a receipt.
pub const DEFAULT_RECEIPT_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// TxRequest
// ============================================================================

/// A contract call to be signed and submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRequest {
    /// Target contract.
    pub to: Address,
    /// ABI-encoded calldata.
    pub input: Bytes,
    /// Value in wei.
    pub value: U256,
    /// Gas limit; estimated when absent.
    pub gas_limit: Option<u64>,
    /// Gas price in wei; fetched when absent.
    pub gas_price: Option<u128>,
    /// Nonce; fetched from the pending state when absent.
    pub nonce: Option<u64>,
}

impl TxRequest {
    /// Creates a zero-value call with everything else resolved at send time.
    #[must_use]
    pub fn call(to: Address, input: impl Into<Bytes>) -> Self {
        Self {
            to,
            input: input.into(),
            value: U256::ZERO,
            gas_limit: None,
            gas_price: None,
            nonce: None,
        }
    }

    /// Sets the value in wei.
    #[must_use]
    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    /// Sets an explicit gas limit.
    #[must_use]
    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = Some(gas_limit);
        self
    }

    /// Sets an explicit gas price in wei.
    #[must_use]
    pub fn with_gas_price(mut self, gas_price: u128) -> Self {
        self.gas_price = Some(gas_price);
        self
    }

    /// Sets an explicit nonce.
    #[must_use]
    pub fn with_nonce(mut self, nonce: u64) -> Self {
        self.nonce = Some(nonce);
        self
    }
}

// ============================================================================
// TransactionReceipt
// ============================================================================

/// The receipt fields this client relies on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    /// Transaction hash.
    pub transaction_hash: B256,
    /// `1` on success, `0` on revert.
    #[serde(default)]
    pub status: Option<U64>,
    /// Gas consumed.
    pub gas_used: U64,
    /// Price actually paid per gas unit, when reported.
    #[serde(default)]
    pub effective_gas_price: Option<U128>,
    /// Including block, when reported.
    #[serde(default)]
    pub block_number: Option<U64>,
    /// Raw log objects.
    #[serde(default)]
    pub logs: Vec<Value>,
}

impl TransactionReceipt {
    /// Returns `false` only for an explicit failed status.
    #[inline]
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.status.is_none_or(|status| !status.is_zero())
    }

    /// Returns the gas consumed.
    #[inline]
    #[must_use]
    pub fn gas_used(&self) -> u64 {
        self.gas_used.to::<u64>()
    }
}

// ============================================================================
// TxOutcome
// ============================================================================

/// A completed queue entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutcome {
    /// Receipt returned by the executor.
    pub receipt: TransactionReceipt,
    /// Gas price the transaction was sent with.
    pub gas_price: u128,
    /// Gas used times gas price, in wei.
    pub estimated_cost: U256,
}

impl TxOutcome {
    /// Builds the outcome for `receipt` sent at `gas_price`.
    #[must_use]
    pub fn new(receipt: TransactionReceipt, gas_price: u128) -> Self {
        let estimated_cost = U256::from(receipt.gas_used()) * U256::from(gas_price);
        Self {
            receipt,
            gas_price,
            estimated_cost,
        }
    }

    /// Returns the transaction hash.
    #[inline]
    #[must_use]
    pub fn tx_hash(&self) -> B256 {
        self.receipt.transaction_hash
    }
}

// ============================================================================
// TxExecutor
// ============================================================================

/// Executes one transaction to completion.
#[async_trait]
pub trait TxExecutor: Send + Sync + 'static {
    /// Returns the current network gas price in wei.
    async fn gas_price(&self) -> Result<u128>;

    /// Signs, submits and waits for the receipt of `tx`.
    async fn execute(&self, tx: &TxRequest, gas_price: u128) -> Result<TransactionReceipt>;
}

// ============================================================================
// RpcTxExecutor
// ============================================================================

/// [`TxExecutor`] that signs locally and submits over a [`Transport`].
pub struct RpcTxExecutor<T> {
    transport: T,
    signer: PrivateKeySigner,
    chain_id: u64,
    receipt_poll_interval: Duration,
    receipt_timeout: Duration,
}

impl<T: Transport> RpcTxExecutor<T> {
    /// Creates an executor with default receipt polling.
    #[must_use]
    pub fn new(transport: T, signer: PrivateKeySigner, chain_id: u64) -> Self {
        Self {
            transport,
            signer,
            chain_id,
            receipt_poll_interval: DEFAULT_RECEIPT_POLL_INTERVAL,
            receipt_timeout: DEFAULT_RECEIPT_TIMEOUT,
        }
    }

    /// Overrides receipt polling.
    #[must_use]
    pub fn with_receipt_polling(mut self, interval: Duration, timeout: Duration) -> Self {
        self.receipt_poll_interval = interval;
        self.receipt_timeout = timeout;
        self
    }

    /// Returns the sender address.
    #[inline]
    #[must_use]
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Returns the chain id transactions are signed for.
    #[inline]
    #[must_use]
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn resolve_nonce(&self, tx: &TxRequest) -> Result<u64> {
        if let Some(nonce) = tx.nonce {
            return Ok(nonce);
        }

        let nonce: U64 = request_as(
            &self.transport,
            "eth_getTransactionCount",
            json!([self.address(), "pending"]),
        )
        .await?;
        Ok(nonce.to::<u64>())
    }

    async fn resolve_gas_limit(&self, tx: &TxRequest) -> Result<u64> {
        if let Some(gas_limit) = tx.gas_limit {
            return Ok(gas_limit);
        }

        let gas: U64 = request_as(
            &self.transport,
            "eth_estimateGas",
            json!([{
                "from": self.address(),
                "to": tx.to,
                "data": tx.input,
                "value": tx.value,
            }]),
        )
        .await
        .map_err(revert_from_rpc)?;
        Ok(gas.to::<u64>())
    }

    /// Builds and signs the raw transaction bytes.
    fn sign(&self, tx: &TxRequest, nonce: u64, gas_limit: u64, gas_price: u128) -> Result<(B256, Bytes)> {
        let mut legacy = TxLegacy {
            chain_id: Some(self.chain_id),
            nonce,
            gas_price,
            gas_limit,
            to: TxKind::Call(tx.to),
            value: tx.value,
            input: tx.input.clone(),
        };

        let signature = self
            .signer
            .sign_transaction_sync(&mut legacy)
            .map_err(Error::signing)?;
        let signed = legacy.into_signed(signature);
        let tx_hash = *signed.hash();
        let raw = TxEnvelope::from(signed).encoded_2718();

        Ok((tx_hash, Bytes::from(raw)))
    }

    /// Polls for the receipt of `tx_hash`.
    async fn wait_for_receipt(&self, tx_hash: B256) -> Result<TransactionReceipt> {
        let poll = async {
            loop {
                let receipt: Option<TransactionReceipt> = request_as(
                    &self.transport,
                    "eth_getTransactionReceipt",
                    json!([tx_hash]),
                )
                .await?;

                if let Some(receipt) = receipt {
                    return Ok::<_, Error>(receipt);
                }

                trace!(%tx_hash, "Receipt not yet available");
                sleep(self.receipt_poll_interval).await;
            }
        };

        timeout(self.receipt_timeout, poll).await.map_err(|_| {
            warn!(%tx_hash, "Timed out waiting for receipt");
            Error::receipt_timeout(tx_hash, self.receipt_timeout.as_millis() as u64)
        })?
    }
}

#[async_trait]
impl<T: Transport + 'static> TxExecutor for RpcTxExecutor<T> {
    async fn gas_price(&self) -> Result<u128> {
        let price: U128 = request_as(&self.transport, "eth_gasPrice", json!([])).await?;
        Ok(price.to::<u128>())
    }

    async fn execute(&self, tx: &TxRequest, gas_price: u128) -> Result<TransactionReceipt> {
        let nonce = self.resolve_nonce(tx).await?;
        let gas_limit = self.resolve_gas_limit(tx).await?;
        let (tx_hash, raw) = self.sign(tx, nonce, gas_limit, gas_price)?;

        debug!(%tx_hash, to = %tx.to, nonce, gas_limit, gas_price, "Submitting transaction");

        let result = self
            .transport
            .request("eth_sendRawTransaction", json!([raw]))
            .await
            .map_err(revert_from_rpc)?;

        let receipt = match result {
            Value::Object(_) => serde_json::from_value::<TransactionReceipt>(result)?,
            Value::String(_) => {
                let returned: B256 = serde_json::from_value(result)?;
                if returned != tx_hash {
                    warn!(expected = %tx_hash, %returned, "Node returned a different hash");
                }
                self.wait_for_receipt(returned).await?
            }
            other => {
                return Err(Error::protocol(format!(
                    "unexpected send result: {other}"
                )));
            }
        };

        if !receipt.succeeded() {
            warn!(tx_hash = %receipt.transaction_hash, "Transaction reverted");
            return Err(Error::TransactionReverted {
                tx_hash: receipt.transaction_hash,
            });
        }

        info!(
            tx_hash = %receipt.transaction_hash,
            gas_used = receipt.gas_used(),
            "Transaction confirmed"
        );
        Ok(receipt)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted transport for executor tests.

    use std::collections::VecDeque;

    use parking_lot::Mutex;

    use super::*;

    /// Answers each method from a per-method script and records every call.
    #[derive(Default)]
    pub(crate) struct ScriptedTransport {
        replies: Mutex<Vec<(String, VecDeque<Result<Value>>)>>,
        calls: Mutex<Vec<(String, Value)>>,
    }

    impl ScriptedTransport {
        /// Queues a reply for `method`.
        pub(crate) fn on(&self, method: &str, reply: Result<Value>) {
            let mut replies = self.replies.lock();
            match replies.iter_mut().find(|(m, _)| m == method) {
                Some((_, queue)) => queue.push_back(reply),
                None => replies.push((method.to_string(), VecDeque::from([reply]))),
            }
        }

        /// Returns every recorded call.
        pub(crate) fn calls(&self) -> Vec<(String, Value)> {
            self.calls.lock().clone()
        }

        /// Returns the methods called, in order.
        pub(crate) fn methods(&self) -> Vec<String> {
            self.calls.lock().iter().map(|(m, _)| m.clone()).collect()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn request(&self, method: &str, params: Value) -> Result<Value> {
            self.calls.lock().push((method.to_string(), params));
            let mut replies = self.replies.lock();
            let queue = replies
                .iter_mut()
                .find(|(m, _)| m == method)
                .map(|(_, queue)| queue);
            match queue.and_then(VecDeque::pop_front) {
                Some(reply) => reply,
                None => Err(Error::rpc(-32601, format!("no script for {method}"), None)),
            }
        }
    }
}

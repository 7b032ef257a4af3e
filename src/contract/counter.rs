//! Counter contract bindings.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol;
use alloy::sol_types::SolCall;
use serde_json::json;
use tracing::debug;

use crate::error::{Error, Result};
use crate::transport::{Transport, request_as};
use crate::tx::{TxOutcome, TxQueue, TxRequest};

use super::revert::revert_from_rpc;

// ============================================================================
// ABI
// ============================================================================

sol! {
    /// Counter contract interface.
    interface ICounter {
        function number() external view returns (uint256);
        function lastCaller() external view returns (address);
        function increment() external;
        function setNumber(uint256 newNumber) external;
    }
}

// ============================================================================
// CounterContract
// ============================================================================

/// Typed handle to a deployed counter.
///
/// Reads go straight to the node with `eth_call`; writes are submitted
/// through the shared [`TxQueue`] and need one attached.
#[derive(Clone)]
pub struct CounterContract {
    address: Address,
    transport: Arc<dyn Transport>,
    queue: Option<Arc<TxQueue>>,
}

impl CounterContract {
    /// Binds a read-only counter deployed at `address`.
    #[must_use]
    pub fn new(address: Address, transport: Arc<dyn Transport>) -> Self {
        Self {
            address,
            transport,
            queue: None,
        }
    }

    /// Attaches the queue used for writes.
    #[must_use]
    pub fn with_queue(mut self, queue: Arc<TxQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Returns `true` if writes are possible.
    #[inline]
    #[must_use]
    pub fn is_writable(&self) -> bool {
        self.queue.is_some()
    }

    /// Returns the contract address.
    #[inline]
    #[must_use]
    pub fn address(&self) -> Address {
        self.address
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Returns the current count.
    ///
    /// # Errors
    ///
    /// Transport errors, [`Error::ContractRevert`] or [`Error::Abi`].
    pub async fn number(&self) -> Result<U256> {
        self.call(ICounter::numberCall {}).await
    }

    /// Returns the last account that changed the count.
    ///
    /// # Errors
    ///
    /// Transport errors, [`Error::ContractRevert`] or [`Error::Abi`].
    pub async fn last_caller(&self) -> Result<Address> {
        self.call(ICounter::lastCallerCall {}).await
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Builds the `increment()` transaction without submitting it.
    #[must_use]
    pub fn increment_tx(&self) -> TxRequest {
        TxRequest::call(self.address, ICounter::incrementCall {}.abi_encode())
    }

    /// Builds the `setNumber(value)` transaction without submitting it.
    #[must_use]
    pub fn set_number_tx(&self, value: U256) -> TxRequest {
        TxRequest::call(
            self.address,
            ICounter::setNumberCall { newNumber: value }.abi_encode(),
        )
    }

    /// Increments the count.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] without a queue, otherwise any error from the
    /// queue or the executor.
    pub async fn increment(&self) -> Result<TxOutcome> {
        self.submit(self.increment_tx()).await
    }

    /// Sets the count to `value`.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] without a queue, otherwise any error from the
    /// queue or the executor.
    pub async fn set_number(&self, value: U256) -> Result<TxOutcome> {
        self.submit(self.set_number_tx(value)).await
    }

    /// Submits a prepared transaction through the queue.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] without a queue, otherwise any error from the
    /// queue or the executor.
    pub async fn submit(&self, tx: TxRequest) -> Result<TxOutcome> {
        let queue = self.queue.as_ref().ok_or_else(|| {
            Error::config(
                "Counter writes need a signer. Use .private_key() on the client builder.",
            )
        })?;
        queue.submit(tx).await
    }

    /// Runs a read-only call at the latest block.
    async fn call<C: SolCall>(&self, call: C) -> Result<C::Return> {
        let data = Bytes::from(call.abi_encode());
        debug!(to = %self.address, function = C::SIGNATURE, "eth_call");

        let output: Bytes = request_as(
            self.transport.as_ref(),
            "eth_call",
            json!([{ "to": self.address, "data": data }, "latest"]),
        )
        .await
        .map_err(revert_from_rpc)?;

        C::abi_decode_returns(&output).map_err(Error::abi)
    }
}

// ============================================================================
// Tests
// ============================================================================

//! Application context.
//!
//! A [`Client`] owns one of each moving part and hands out typed access to
//! them. Nothing is global: two clients never share a socket or a queue.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use alloy::primitives::{Address, U64};
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::contract::CounterContract;
use crate::error::{Error, Result};
use crate::feed::EventFeed;
use crate::transport::{
    Connector, FallbackTransport, HttpTransport, Transport, TungsteniteConnector, WsTransport,
    request_as,
};
use crate::tx::{RpcTxExecutor, TxQueue};

use super::builder::{ClientBuilder, ClientConfig};

// ============================================================================
// Types
// ============================================================================

/// Shared inner state for the client.
struct ClientInner {
    config: ClientConfig,
    reads: FallbackTransport,
    queue: Option<Arc<TxQueue>>,
    feed: EventFeed,
}

// ============================================================================
// Client
// ============================================================================

/// Counter dApp client.
///
/// # Example
///
/// ```no_run
/// use megaeth_counter_client::Client;
///
/// # async fn example() -> megaeth_counter_client::Result<()> {
/// let config = Client::builder()
///     .ws_url("wss://carrot.megaeth.com/ws")
///     .counter_address("0x5fbdb2315678afecb367f032d93f642f64180aa3")
///     .build()?;
/// let client = Client::new(config)?;
///
/// let count = client.counter()?.number().await?;
/// println!("count = {count}");
///
/// client.shutdown().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("ws_url", &self.inner.config.ws_url.as_str())
            .field("chain_id", &self.inner.config.chain_id)
            .field("state", &self.inner.reads.ws().state())
            .field("http_fallback", &self.inner.reads.http().is_some())
            .field("writable", &self.inner.queue.is_some())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Client - Construction
// ============================================================================

impl Client {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Creates a client from a validated configuration.
    ///
    /// Must be called from within a tokio runtime when a signer is
    /// configured, since the transaction worker is spawned here.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the HTTP fallback client cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::with_connector(config, Arc::new(TungsteniteConnector))
    }

    /// Creates a client whose sockets come from `connector`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the HTTP fallback client cannot be built.
    pub fn with_connector(config: ClientConfig, connector: Arc<dyn Connector>) -> Result<Self> {
        let ws = WsTransport::with_connector(
            config.ws_url.as_str(),
            Arc::clone(&connector),
            config.ws,
        );

        let http = config
            .http_url
            .clone()
            .map(|url| HttpTransport::with_timeout(url, config.ws.request_timeout))
            .transpose()?;

        let queue = config.signer.clone().map(|signer| {
            let executor = RpcTxExecutor::new(ws.clone(), signer, config.chain_id)
                .with_receipt_polling(config.receipt_poll_interval, config.receipt_timeout);
            Arc::new(TxQueue::new(Arc::new(executor)))
        });

        let feed = EventFeed::with_connector(
            config.ws_url.as_str(),
            connector,
            config.feed_params.clone(),
        );

        info!(
            url = %config.ws_url,
            chain_id = config.chain_id,
            writable = queue.is_some(),
            "Client created"
        );

        Ok(Self {
            inner: Arc::new(ClientInner {
                config,
                reads: FallbackTransport::new(ws, http),
                queue,
                feed,
            }),
        })
    }
}

// ============================================================================
// Client - Accessors
// ============================================================================

impl Client {
    /// Returns the configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Returns the WebSocket transport.
    #[inline]
    #[must_use]
    pub fn transport(&self) -> &WsTransport {
        self.inner.reads.ws()
    }

    /// Returns the HTTP fallback transport, if configured.
    #[inline]
    #[must_use]
    pub fn http(&self) -> Option<&HttpTransport> {
        self.inner.reads.http()
    }

    /// Returns the transaction queue, if a signer is configured.
    #[inline]
    #[must_use]
    pub fn queue(&self) -> Option<&Arc<TxQueue>> {
        self.inner.queue.as_ref()
    }

    /// Returns the push-event feed.
    #[inline]
    #[must_use]
    pub fn feed(&self) -> &EventFeed {
        &self.inner.feed
    }

    /// Returns the sender address, if a signer is configured.
    #[must_use]
    pub fn sender(&self) -> Option<Address> {
        self.inner.config.signer.as_ref().map(|s| s.address())
    }

    /// Returns a handle to the configured counter contract.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if no counter address is configured.
    pub fn counter(&self) -> Result<CounterContract> {
        let address = self.inner.config.counter_address.ok_or_else(|| {
            Error::config(
                "Counter address is not configured. Use .counter_address() or .deployments().",
            )
        })?;
        Ok(self.counter_at(address))
    }

    /// Returns a handle to a counter deployed at `address`.
    ///
    /// Reads fall back to HTTP when configured; writes go through the queue.
    #[must_use]
    pub fn counter_at(&self, address: Address) -> CounterContract {
        let transport: Arc<dyn Transport> = Arc::new(self.inner.reads.clone());
        let contract = CounterContract::new(address, transport);

        match &self.inner.queue {
            Some(queue) => contract.with_queue(Arc::clone(queue)),
            None => contract,
        }
    }
}

// ============================================================================
// Client - Operations
// ============================================================================

impl Client {
    /// Sends a raw JSON-RPC request.
    ///
    /// Goes over the WebSocket; on a connection error it is retried over
    /// the HTTP fallback if one is configured. Raw transaction sends are
    /// never retried.
    ///
    /// # Errors
    ///
    /// Any transport error.
    pub async fn request(&self, method: &str, params: Value) -> Result<Value> {
        self.inner.reads.request(method, params).await
    }

    /// Checks that the node serves the configured chain.
    ///
    /// # Errors
    ///
    /// Transport errors, or [`Error::Config`] on a chain id mismatch.
    pub async fn verify_chain_id(&self) -> Result<u64> {
        let reported: U64 = request_as(&self.inner.reads, "eth_chainId", json!([])).await?;
        let reported = reported.to::<u64>();
        let expected = self.inner.config.chain_id;

        if reported != expected {
            return Err(Error::config(format!(
                "Node reports chain id {reported}, but the client is configured for {expected}."
            )));
        }

        debug!(chain_id = reported, "Chain id verified");
        Ok(reported)
    }

    /// Stops the queue, closes the feed and closes the transport.
    ///
    /// Queued writes are cancelled; a write already executing finishes
    /// first.
    pub async fn shutdown(&self) {
        if let Some(queue) = &self.inner.queue {
            queue.shutdown().await;
        }
        self.inner.feed.shutdown().await;
        self.inner.reads.ws().close();

        info!(url = %self.inner.config.ws_url, "Client shut down");
    }
}

// ============================================================================
// Tests
// ============================================================================

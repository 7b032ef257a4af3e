//! MegaETH counter client - realtime JSON-RPC access to a counter dApp.
//!
//! This library talks to a low-latency EVM chain over a persistent
//! WebSocket, submits state-changing calls through a strictly ordered
//! queue, and fans push events out to any number of listeners.
//!
//! # Architecture
//!
//! ```text
//! application
//!   │ reads                 │ writes                  │ listeners
//!   ▼                       ▼                         ▼
//! CounterContract ──► TxQueue ──► RpcTxExecutor    EventFeed
//!   │                             │                   │
//!   └──────────► WsTransport ◄────┘                   │ own socket
//!                 │ method mapping, id correlation,   │
//!                 │ reconnect with linear backoff     │
//!                 ▼                                   ▼
//!                           chain node
//! ```
//!
//! Key design principles:
//!
//! - One [`Client`] owns every moving part; there is no global state
//! - Responses are matched to requests by id only
//! - Writes execute one at a time in submission order
//! - Only the physical socket is ever retried, never a request
//!
//! # Quick Start
//!
//! ```no_run
//! use megaeth_counter_client::{Client, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Client::builder()
//!         .ws_url("wss://carrot.megaeth.com/ws")
//!         .private_key(std::env::var("PRIVATE_KEY").unwrap_or_default())
//!         .counter_address("0x5fbdb2315678afecb367f032d93f642f64180aa3")
//!         .build()?;
//!     let client = Client::new(config)?;
//!
//!     let counter = client.counter()?;
//!     let outcome = counter.increment().await?;
//!     println!("cost: {} wei", outcome.estimated_cost);
//!     println!("count: {}", counter.number().await?);
//!
//!     client.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | [`Client`] context and [`ClientBuilder`] |
//! | [`contract`] | Counter bindings and revert decoding |
//! | [`deployments`] | Deployment log scraping |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`feed`] | Push-event fan-out |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | JSON-RPC message types and method mapping |
//! | [`transport`] | WebSocket and HTTP transports |
//! | [`tx`] | Transaction executor and queue |

// ============================================================================
// Modules
// ============================================================================

/// Client context and configuration.
///
/// Use [`Client::builder()`] to configure a client.
pub mod client;

/// Counter contract bindings and revert decoding.
pub mod contract;

/// Deployed contract addresses.
pub mod deployments;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Push-event fan-out.
pub mod feed;

/// Type-safe identifiers.
pub mod identifiers;

/// JSON-RPC message types.
pub mod protocol;

/// JSON-RPC transports.
pub mod transport;

/// Transaction submission.
pub mod tx;

// ============================================================================
// Re-exports
// ============================================================================

// Client types
pub use client::{Client, ClientBuilder, ClientConfig};

// Contract types
pub use contract::{CounterContract, decode_revert};

// Deployment types
pub use deployments::Deployments;

// Error types
pub use error::{Error, Result};

// Feed types
pub use feed::{EventFeed, LogListener};

// Identifier types
pub use identifiers::{ListenerId, RequestId, SubscriptionId};

// Protocol types
pub use protocol::{LogEvent, map_method};

// Transport types
pub use transport::{
    ConnectionState, FallbackTransport, HttpTransport, Transport, WsConfig, WsTransport,
};

// Transaction types
pub use tx::{TransactionReceipt, TxExecutor, TxOutcome, TxQueue, TxRequest};

//! JSON-RPC transport layer.
//!
//! This module moves JSON-RPC envelopes between the client and the chain
//! node. All transports apply the outbound method mapping before dispatch.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐                              ┌─────────────────┐
//! │  Client (Rust)   │         WebSocket            │  Chain node     │
//! │                  │◄────────────────────────────►│                 │
//! │  WsTransport     │   request/response by id     │  realtime RPC   │
//! │  → Connection    │                              │                 │
//! │                  │         HTTP (fallback)      │                 │
//! │  HttpTransport   │─────────────────────────────►│                 │
//! └──────────────────┘                              └─────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | Per-socket event loop |
//! | `fallback` | WebSocket first, HTTP for reads on connection errors |
//! | `http` | HTTP fallback transport |
//! | `socket` | Frame types and socket connectors |
//! | `ws` | Reconnecting WebSocket transport |

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::Result;

// ============================================================================
// Submodules
// ============================================================================

/// Per-socket event loop.
pub(crate) mod connection;

/// WebSocket transport with HTTP fallback for reads.
pub mod fallback;

/// HTTP fallback transport.
pub mod http;

/// Frame types and socket connectors.
pub mod socket;

/// Reconnecting WebSocket transport.
pub mod ws;

// ============================================================================
// Re-exports
// ============================================================================

pub use fallback::FallbackTransport;
pub use http::HttpTransport;
pub use socket::{Connector, Frame, Socket, TungsteniteConnector};
pub use ws::{ConnectionState, WsConfig, WsTransport};

// ============================================================================
// Transport
// ============================================================================

/// Request/response call interface shared by all transports.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `method` with positional `params` and returns the raw result.
    async fn request(&self, method: &str, params: Value) -> Result<Value>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        (**self).request(method, params).await
    }
}

/// Sends a request and deserializes the result.
///
/// # Errors
///
/// Transport errors, or [`crate::Error::Json`] if the result has an
/// unexpected shape.
pub async fn request_as<T, R>(transport: &T, method: &str, params: Value) -> Result<R>
where
    T: Transport + ?Sized,
    R: DeserializeOwned,
{
    let value = transport.request(method, params).await?;
    Ok(serde_json::from_value(value)?)
}

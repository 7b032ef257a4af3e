//! Error types for the counter client.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use megaeth_counter_client::{Client, Result};
//!
//! async fn example(client: &Client) -> Result<()> {
//!     let outcome = client.counter()?.increment().await?;
//!     println!("spent {} wei", outcome.estimated_cost);
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Connection | [`Error::Connection`], [`Error::ConnectionClosed`], [`Error::HttpStatus`] |
//! | Protocol | [`Error::Protocol`], [`Error::Rpc`] |
//! | Execution | [`Error::RequestTimeout`], [`Error::ReceiptTimeout`] |
//! | Contract | [`Error::ContractRevert`], [`Error::TransactionReverted`], [`Error::Abi`], [`Error::Signing`] |
//! | Queue | [`Error::Cancelled`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`], [`Error::Http`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use alloy::primitives::B256;
use serde_json::Value;
use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::RequestId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when client configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// WebSocket connection failed.
    ///
    /// Returned when the socket cannot be opened or a frame cannot be sent.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Connection closed while a request was pending.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Non-success HTTP status from the fallback transport.
    #[error("HTTP request failed with status {status}")]
    HttpStatus {
        /// HTTP status code.
        status: u16,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Protocol violation or unexpected response shape.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    /// JSON-RPC error object returned by the node.
    #[error("RPC error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code.
        code: i64,
        /// Error message from the node.
        message: String,
        /// Optional error data (revert payload for `eth_call`).
        data: Option<Value>,
    },

    // ========================================================================
    // Execution Errors
    // ========================================================================
    /// Request timeout.
    ///
    /// Returned when no response with a matching id arrives in time.
    #[error("Request {request_id} timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// The request ID that timed out.
        request_id: RequestId,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Transaction was accepted but no receipt appeared in time.
    #[error("No receipt for {tx_hash} after {timeout_ms}ms")]
    ReceiptTimeout {
        /// Hash of the submitted transaction.
        tx_hash: B256,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // Contract Errors
    // ========================================================================
    /// Call reverted; the reason is already decoded to text.
    #[error("Contract reverted: {reason}")]
    ContractRevert {
        /// Decoded revert reason.
        reason: String,
    },

    /// Mined transaction has a failed status.
    #[error("Transaction {tx_hash} reverted")]
    TransactionReverted {
        /// Hash of the reverted transaction.
        tx_hash: B256,
    },

    /// ABI encoding or decoding failed.
    #[error("ABI error: {message}")]
    Abi {
        /// Description of the ABI failure.
        message: String,
    },

    /// Transaction signing failed.
    #[error("Signing failed: {message}")]
    Signing {
        /// Description of the signing failure.
        message: String,
    },

    // ========================================================================
    // Queue Errors
    // ========================================================================
    /// Queued transaction was cancelled before execution.
    #[error("Transaction cancelled: queue shut down")]
    Cancelled,

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// HTTP client error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates an RPC error from a JSON-RPC error object.
    #[inline]
    pub fn rpc(code: i64, message: impl Into<String>, data: Option<Value>) -> Self {
        Self::Rpc {
            code,
            message: message.into(),
            data,
        }
    }

    /// Creates a request timeout error.
    #[inline]
    pub fn request_timeout(request_id: RequestId, timeout_ms: u64) -> Self {
        Self::RequestTimeout {
            request_id,
            timeout_ms,
        }
    }

    /// Creates a receipt timeout error.
    #[inline]
    pub fn receipt_timeout(tx_hash: B256, timeout_ms: u64) -> Self {
        Self::ReceiptTimeout {
            tx_hash,
            timeout_ms,
        }
    }

    /// Creates a contract revert error.
    #[inline]
    pub fn contract_revert(reason: impl Into<String>) -> Self {
        Self::ContractRevert {
            reason: reason.into(),
        }
    }

    /// Creates a signing error.
    #[inline]
    pub fn signing(message: impl ToString) -> Self {
        Self::Signing {
            message: message.to_string(),
        }
    }

    /// Creates an ABI error.
    #[inline]
    pub fn abi(message: impl ToString) -> Self {
        Self::Abi {
            message: message.to_string(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::RequestTimeout { .. } | Self::ReceiptTimeout { .. }
        )
    }

    /// Returns `true` if this is a transport-level error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionClosed
                | Self::HttpStatus { .. }
                | Self::WebSocket(_)
                | Self::Http(_)
        )
    }

    /// Returns `true` if this is a contract-level error.
    #[inline]
    #[must_use]
    pub fn is_contract_error(&self) -> bool {
        matches!(
            self,
            Self::ContractRevert { .. } | Self::TransactionReverted { .. }
        )
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors may succeed when the caller reissues the request.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::RequestTimeout { .. } | Self::ConnectionClosed | Self::Connection { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

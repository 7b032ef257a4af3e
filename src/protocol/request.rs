//! Request and Response message types.
//!
//! Defines the JSON-RPC 2.0 envelopes exchanged with the node.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::RequestId;

// ============================================================================
// Constants
// ============================================================================

/// JSON-RPC protocol version tag.
pub const JSONRPC_VERSION: &str = "2.0";

// ============================================================================
// Request
// ============================================================================

/// A JSON-RPC request from client to node.
///
/// # Format
///
/// ```json
/// {
///   "jsonrpc": "2.0",
///   "method": "eth_call",
///   "params": [ ... ],
///   "id": 1
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    /// Protocol version, always `"2.0"`.
    pub jsonrpc: &'static str,

    /// Method name as it goes on the wire (already mapped).
    pub method: String,

    /// Positional parameters.
    pub params: Value,

    /// Correlation id.
    pub id: RequestId,
}

impl Request {
    /// Creates a new request.
    #[inline]
    #[must_use]
    pub fn new(id: RequestId, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method: method.into(),
            params,
            id,
        }
    }
}

// ============================================================================
// Response
// ============================================================================

/// A JSON-RPC response from node to client.
///
/// # Format
///
/// Success:
/// ```json
/// { "jsonrpc": "2.0", "id": 1, "result": "0x2a" }
/// ```
///
/// Error:
/// ```json
/// { "jsonrpc": "2.0", "id": 1, "error": { "code": 3, "message": "execution reverted", "data": "0x08c3..." } }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Response {
    /// Matches the request `id`.
    pub id: RequestId,

    /// Result data (if success).
    #[serde(default)]
    pub result: Option<Value>,

    /// Error object (if error).
    #[serde(default)]
    pub error: Option<RpcErrorObject>,
}

impl Response {
    /// Returns `true` if this is an error response.
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Extracts the result value, returning error if response was error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rpc`] carrying the node's error object.
    pub fn into_result(self) -> Result<Value> {
        match self.error {
            Some(err) => Err(err.into()),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

// ============================================================================
// RpcErrorObject
// ============================================================================

/// JSON-RPC error object.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RpcErrorObject {
    /// Error code.
    pub code: i64,

    /// Error message.
    #[serde(default)]
    pub message: String,

    /// Optional payload, e.g. revert data.
    #[serde(default)]
    pub data: Option<Value>,
}

impl From<RpcErrorObject> for Error {
    fn from(err: RpcErrorObject) -> Self {
        Error::rpc(err.code, err.message, err.data)
    }
}

// ============================================================================
// Tests
// ============================================================================

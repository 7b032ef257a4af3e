//! Outbound RPC method mapping.
//!
//! The realtime chain accepts signed transactions under its own method name
//! and answers with the receipt instead of a bare hash. Every other method
//! is standard Ethereum JSON-RPC and passes through untouched.

// ============================================================================
// Imports
// ============================================================================

use std::borrow::Cow;

use serde_json::Value;

// ============================================================================
// Constants
// ============================================================================

/// Standard raw transaction submission method.
pub const SEND_RAW_TRANSACTION: &str = "eth_sendRawTransaction";

/// Chain-specific replacement for [`SEND_RAW_TRANSACTION`].
pub const REALTIME_SEND_RAW_TRANSACTION: &str = "realtime_sendRawTransaction";

// ============================================================================
// Mapping
// ============================================================================

/// Returns the method name to put on the wire.
#[inline]
#[must_use]
pub fn map_method(method: &str) -> Cow<'_, str> {
    match method {
        SEND_RAW_TRANSACTION => Cow::Borrowed(REALTIME_SEND_RAW_TRANSACTION),
        other => Cow::Borrowed(other),
    }
}

/// Maps a method/params pair; params are returned unchanged.
#[inline]
#[must_use]
pub fn map_call(method: &str, params: Value) -> (Cow<'_, str>, Value) {
    (map_method(method), params)
}

// ============================================================================
// Tests
// ============================================================================

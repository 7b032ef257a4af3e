//! Revert data decoding.
//!
//! Turns raw revert bytes into a human-readable reason:
//!
//! | Payload | Reason |
//! |---------|--------|
//! | `Error(string)` | the embedded message |
//! | `Panic(uint256)` | `panic code 0x.. (meaning)` |
//! | other selector | `unknown error selector 0x........` |
//! | under four bytes | `empty revert data` |

// ============================================================================
// Imports
// ============================================================================

use alloy::hex;
use alloy::primitives::U256;
use alloy::sol_types::{Panic, Revert, SolError};
use serde_json::Value;

use crate::error::Error;

// ============================================================================
// Constants
// ============================================================================

/// Reason returned when there is no selector to inspect.
pub const EMPTY_REVERT_DATA: &str = "empty revert data";

/// Well-known `Panic(uint256)` codes.
const PANIC_CODES: &[(u64, &str)] = &[
    (0x00, "generic compiler panic"),
    (0x01, "assertion failed"),
    (0x11, "arithmetic underflow or overflow"),
    (0x12, "division or modulo by zero"),
    (0x21, "invalid enum value"),
    (0x22, "invalid storage byte array encoding"),
    (0x31, "pop on empty array"),
    (0x32, "array index out of bounds"),
    (0x41, "out of memory"),
    (0x51, "call to uninitialized internal function"),
];

// ============================================================================
// Decoding
// ============================================================================

/// Decodes revert data into a readable reason.
#[must_use]
pub fn decode_revert(data: &[u8]) -> String {
    let Some(selector) = data.get(..4) else {
        return EMPTY_REVERT_DATA.to_string();
    };

    if selector == Revert::SELECTOR {
        if let Ok(revert) = Revert::abi_decode(data) {
            return revert.reason;
        }
    } else if selector == Panic::SELECTOR
        && let Ok(panic) = Panic::abi_decode(data)
    {
        return describe_panic(panic.code);
    }

    format!("unknown error selector 0x{}", hex::encode(selector))
}

/// Formats a panic code with its meaning.
fn describe_panic(code: U256) -> String {
    let meaning = PANIC_CODES
        .iter()
        .find(|(known, _)| U256::from(*known) == code)
        .map_or("unknown panic", |(_, meaning)| *meaning);

    format!("panic code 0x{code:x} ({meaning})")
}

/// Maps an RPC error carrying hex revert data to [`Error::ContractRevert`].
///
/// Any other error is returned unchanged.
#[must_use]
pub fn revert_from_rpc(error: Error) -> Error {
    if let Error::Rpc {
        data: Some(Value::String(ref data)),
        ..
    } = error
        && let Ok(bytes) = hex::decode(data)
    {
        return Error::contract_revert(decode_revert(&bytes));
    }

    error
}

// ============================================================================
// Tests
// ============================================================================

//! JSON-RPC protocol message types.
//!
//! This module defines the wire format spoken with the chain node.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `Request` | Client → Node | Method call |
//! | `Response` | Node → Client | Result or error, matched by id |
//! | `Notification` | Node → Client | Subscription push, no id |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `event` | Incoming message classification and log events |
//! | `method` | Outbound method name mapping |
//! | `request` | Request and Response types |

// ============================================================================
// Submodules
// ============================================================================

/// Incoming message classification and log events.
pub mod event;

/// Outbound method name mapping.
pub mod method;

/// Request and Response message types.
pub mod request;

// ============================================================================
// Re-exports
// ============================================================================

pub use event::{IncomingMessage, LogEvent, Notification, NotificationParams};
pub use method::{map_call, map_method};
pub use request::{JSONRPC_VERSION, Request, Response, RpcErrorObject};

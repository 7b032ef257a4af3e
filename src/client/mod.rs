//! Client context and configuration.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Client`] | Owns the transport, queue and feed |
//! | [`ClientBuilder`] | Fluent configuration builder |
//! | [`ClientConfig`] | Validated configuration |

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder for client configuration.
pub mod builder;

/// Core client implementation.
pub mod core;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::{ClientBuilder, ClientConfig};
pub use core::Client;

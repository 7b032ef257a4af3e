//! Contract bindings.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `counter` | Counter ABI and typed handle |
//! | `revert` | Revert data decoding |

// ============================================================================
// Submodules
// ============================================================================

/// Counter ABI and typed handle.
pub mod counter;

/// Revert data decoding.
pub mod revert;

// ============================================================================
// Re-exports
// ============================================================================

pub use counter::{CounterContract, ICounter};
pub use revert::{EMPTY_REVERT_DATA, decode_revert, revert_from_rpc};

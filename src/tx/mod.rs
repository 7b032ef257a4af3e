//! Transaction submission.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `executor` | Signing, submission and receipt retrieval |
//! | `queue` | Single-worker FIFO queue |

// ============================================================================
// Submodules
// ============================================================================

/// Signing, submission and receipt retrieval.
pub mod executor;

/// Single-worker FIFO queue.
pub mod queue;

// ============================================================================
// Re-exports
// ============================================================================

pub use executor::{
    DEFAULT_RECEIPT_POLL_INTERVAL, DEFAULT_RECEIPT_TIMEOUT, RpcTxExecutor, TransactionReceipt,
    TxExecutor, TxOutcome, TxRequest,
};
pub use queue::TxQueue;

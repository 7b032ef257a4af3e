//! Serialized transaction submission.
//!
//! A single worker task owns the executor and drains entries strictly in
//! submission order, so nonces handed out by the node never race.
//!
//! # Lifecycle
//!
//! ```text
//! submit ──► channel ──► worker ──► gas price ──► execute ──► reply
//!                          ▲
//! shutdown ────────────────┘  queued entries rejected with Cancelled
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;
use tokio::sync::{Notify, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

use super::executor::{TxExecutor, TxOutcome, TxRequest};

// ============================================================================
// Types
// ============================================================================

/// One queued transaction and its reply channel.
struct QueueEntry {
    tx: TxRequest,
    reply: oneshot::Sender<Result<TxOutcome>>,
}

/// State shared between handles and the worker.
#[derive(Default)]
struct QueueShared {
    closed: AtomicBool,
    queued: AtomicUsize,
    shutdown: Notify,
}

// ============================================================================
// TxQueue
// ============================================================================

/// FIFO transaction queue with one dedicated worker.
pub struct TxQueue {
    sender: mpsc::UnboundedSender<QueueEntry>,
    shared: Arc<QueueShared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl TxQueue {
    /// Creates the queue and spawns its worker.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn new(executor: Arc<dyn TxExecutor>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let shared = Arc::new(QueueShared::default());

        let worker = tokio::spawn(run_worker(executor, receiver, Arc::clone(&shared)));

        Self {
            sender,
            shared,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Returns the number of entries waiting behind the worker.
    #[inline]
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.shared.queued.load(Ordering::SeqCst)
    }

    /// Returns `true` once [`shutdown`](Self::shutdown) has been called.
    #[inline]
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// Enqueues `tx` and returns a future resolving to its outcome.
    ///
    /// The entry is enqueued before this returns, so execution order
    /// follows call order even if the futures are polled out of order.
    ///
    /// # Errors
    ///
    /// The future yields [`Error::Cancelled`] if the queue is shut down
    /// before the entry runs, or the executor's error if it fails.
    pub fn submit(&self, tx: TxRequest) -> impl Future<Output = Result<TxOutcome>> + Send + 'static {
        let enqueued = self.enqueue(tx);
        async move {
            let reply = enqueued?;
            reply.await.map_err(|_| Error::Cancelled)?
        }
    }

    fn enqueue(&self, tx: TxRequest) -> Result<oneshot::Receiver<Result<TxOutcome>>> {
        if self.is_shutdown() {
            return Err(Error::Cancelled);
        }

        let (reply, receiver) = oneshot::channel();
        self.shared.queued.fetch_add(1, Ordering::SeqCst);

        if self.sender.send(QueueEntry { tx, reply }).is_err() {
            self.shared.queued.fetch_sub(1, Ordering::SeqCst);
            return Err(Error::Cancelled);
        }

        debug!(queued = self.pending_len(), "Transaction enqueued");
        Ok(receiver)
    }

    /// Stops the queue.
    ///
    /// Entries still waiting are rejected with [`Error::Cancelled`]; an
    /// entry already executing runs to completion. Returns once the worker
    /// has stopped.
    pub async fn shutdown(&self) {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.shared.shutdown.notify_one();

        let worker = self.worker.lock().take();
        if let Some(worker) = worker
            && let Err(e) = worker.await
        {
            warn!(error = %e, "Transaction worker ended abnormally");
        }
    }
}

impl Drop for TxQueue {
    fn drop(&mut self) {
        self.shared.closed.store(true, Ordering::SeqCst);
        self.shared.shutdown.notify_one();
    }
}

// ============================================================================
// Worker
// ============================================================================

/// Drains the queue one entry at a time until shutdown.
async fn run_worker(
    executor: Arc<dyn TxExecutor>,
    mut receiver: mpsc::UnboundedReceiver<QueueEntry>,
    shared: Arc<QueueShared>,
) {
    debug!("Transaction worker started");

    loop {
        let entry = tokio::select! {
            biased;

            () = shared.shutdown.notified() => break,

            entry = receiver.recv() => match entry {
                Some(entry) => entry,
                None => break,
            },
        };

        shared.queued.fetch_sub(1, Ordering::SeqCst);

        let result = execute_entry(executor.as_ref(), &entry.tx).await;
        if let Err(e) = &result {
            warn!(to = %entry.tx.to, error = %e, "Queued transaction failed");
        }
        let _ = entry.reply.send(result);
    }

    receiver.close();
    let mut cancelled = 0usize;
    while let Ok(entry) = receiver.try_recv() {
        shared.queued.fetch_sub(1, Ordering::SeqCst);
        let _ = entry.reply.send(Err(Error::Cancelled));
        cancelled += 1;
    }

    info!(cancelled, "Transaction worker stopped");
}

/// Runs one entry: resolve gas price, execute, attach cost.
async fn execute_entry(executor: &dyn TxExecutor, tx: &TxRequest) -> Result<TxOutcome> {
    let gas_price = match tx.gas_price {
        Some(price) => price,
        None => executor.gas_price().await?,
    };

    let receipt = executor.execute(tx, gas_price).await?;
    let outcome = TxOutcome::new(receipt, gas_price);

    debug!(
        tx_hash = %outcome.tx_hash(),
        gas_price,
        cost = %outcome.estimated_cost,
        "Queued transaction executed"
    );
    Ok(outcome)
}

// ============================================================================
// Tests
// ============================================================================

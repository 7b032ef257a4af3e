//! Reconnecting WebSocket JSON-RPC transport.
//!
//! # Connection State Machine
//!
//! ```text
//!            request()                open ok
//!  Absent ─────────────► Connecting ─────────► Open
//!    ▲  ▲                   │ open failed       │ close() │ remote close
//!    │  └───────────────────┘                   ▼         │
//!    │              socket loop ended        Closing      │
//!    └──────────────────────────────────────────┴─────────┘
//! ```
//!
//! Abnormal closes (any code other than 1000, or a failed open) schedule one
//! reconnect after `attempt * base_delay` while the retry budget lasts. A
//! successful open resets the attempt counter; [`WsTransport::close`] pins
//! it at the ceiling.
//!
//! Every close rejects all pending requests. They are never retried; the
//! caller must reissue.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::{IdSequence, RequestId};
use crate::protocol::{IncomingMessage, Request, map_call};

use super::Transport;
use super::connection::{Connection, ConnectionHandler};
use super::socket::{Connector, NORMAL_CLOSURE, TungsteniteConnector};

// ============================================================================
// Constants
// ============================================================================

/// Default timeout for a single request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of automatic reconnect attempts.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Default base delay; attempt `n` waits `n * base`.
pub const DEFAULT_RECONNECT_BASE_DELAY: Duration = Duration::from_secs(1);

// ============================================================================
// Types
// ============================================================================

/// Map of request IDs to response channels.
type PendingMap = FxHashMap<RequestId, oneshot::Sender<Result<Value>>>;

/// Waiters sharing one in-flight connection attempt.
type Waiters = Vec<oneshot::Sender<Result<Connection>>>;

// ============================================================================
// WsConfig
// ============================================================================

/// Timing and retry settings for [`WsTransport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WsConfig {
    /// Maximum wait for a matching response.
    pub request_timeout: Duration,
    /// Automatic reconnect budget.
    pub max_reconnect_attempts: u32,
    /// Base reconnect delay.
    pub reconnect_base_delay: Duration,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            reconnect_base_delay: DEFAULT_RECONNECT_BASE_DELAY,
        }
    }
}

// ============================================================================
// ConnectionState
// ============================================================================

/// Observable state of the physical connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No socket.
    Absent,
    /// Socket open in progress.
    Connecting,
    /// Socket open.
    Open,
    /// Normal close sent, waiting for the loop to end.
    Closing,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Absent => "absent",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
        };
        f.write_str(name)
    }
}

/// Internal link state; mirrors [`ConnectionState`] with payloads.
enum Link {
    Absent,
    Connecting { generation: u64, waiters: Waiters },
    Open(Connection),
    Closing(Connection),
}

impl Link {
    fn state(&self) -> ConnectionState {
        match self {
            Self::Absent => ConnectionState::Absent,
            Self::Connecting { .. } => ConnectionState::Connecting,
            Self::Open(_) => ConnectionState::Open,
            Self::Closing(_) => ConnectionState::Closing,
        }
    }
}

// ============================================================================
// Shared
// ============================================================================

/// State shared between the transport handle, socket loops and timers.
struct Shared {
    url: String,
    connector: Arc<dyn Connector>,
    config: WsConfig,
    ids: IdSequence,
    pending: Mutex<PendingMap>,
    link: Mutex<Link>,
    attempts: AtomicU32,
    generation: AtomicU64,
    reconnect_task: Mutex<Option<JoinHandle<()>>>,
}

// ============================================================================
// WsTransport
// ============================================================================

/// JSON-RPC transport over one persistent, reconnecting WebSocket.
///
/// # Thread Safety
///
/// `WsTransport` is `Send + Sync` and cheap to clone; clones share the
/// same socket, id counter and pending map.
///
/// # Example
///
/// ```no_run
/// use megaeth_counter_client::transport::WsTransport;
/// use serde_json::json;
///
/// # async fn example() -> megaeth_counter_client::Result<()> {
/// let transport = WsTransport::new("wss://carrot.megaeth.com/ws");
/// let block = transport.request("eth_blockNumber", json!([])).await?;
/// println!("head: {block}");
/// transport.close();
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct WsTransport {
    shared: Arc<Shared>,
}

impl WsTransport {
    /// Creates a transport with the default connector and settings.
    ///
    /// No socket is opened until the first request.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_connector(url, Arc::new(TungsteniteConnector), WsConfig::default())
    }

    /// Creates a transport with a custom connector and settings.
    #[must_use]
    pub fn with_connector(
        url: impl Into<String>,
        connector: Arc<dyn Connector>,
        config: WsConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                url: url.into(),
                connector,
                config,
                ids: IdSequence::new(),
                pending: Mutex::new(PendingMap::default()),
                link: Mutex::new(Link::Absent),
                attempts: AtomicU32::new(0),
                generation: AtomicU64::new(0),
                reconnect_task: Mutex::new(None),
            }),
        }
    }

    /// Returns the endpoint URL.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &str {
        &self.shared.url
    }

    /// Returns the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.shared.link.lock().state()
    }

    /// Returns the number of requests awaiting a response.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.shared.pending.lock().len()
    }

    /// Returns the current reconnect attempt counter.
    #[inline]
    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.shared.attempts.load(Ordering::SeqCst)
    }

    /// Sends a request and waits for the matching response.
    ///
    /// # Errors
    ///
    /// - [`Error::Connection`] if the socket cannot be opened
    /// - [`Error::RequestTimeout`] if no response arrives in time
    /// - [`Error::ConnectionClosed`] if the socket closes first
    /// - [`Error::Rpc`] if the node answers with an error object
    pub async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let connection = self.shared.ensure_connection().await?;

        let id = self.shared.ids.next_id();
        let (wire_method, params) = map_call(method, params);
        let json = serde_json::to_string(&Request::new(id, wire_method, params))?;

        let (response_tx, response_rx) = oneshot::channel();
        self.shared.pending.lock().insert(id, response_tx);

        if let Err(e) = connection.send_text(json) {
            self.shared.pending.lock().remove(&id);
            return Err(e);
        }

        trace!(%id, method, "Request sent");

        let request_timeout = self.shared.config.request_timeout;
        match timeout(request_timeout, response_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::ConnectionClosed),
            Err(_) => {
                self.shared.pending.lock().remove(&id);
                debug!(%id, method, "Request timed out");
                Err(Error::request_timeout(id, request_timeout.as_millis() as u64))
            }
        }
    }

    /// Closes the socket and suppresses automatic reconnects.
    ///
    /// Every pending request is rejected with [`Error::ConnectionClosed`].
    /// A later [`request`](Self::request) opens a fresh socket.
    pub fn close(&self) {
        let shared = &self.shared;

        shared
            .attempts
            .store(shared.config.max_reconnect_attempts, Ordering::SeqCst);

        if let Some(task) = shared.reconnect_task.lock().take() {
            task.abort();
        }

        let waiters = {
            let mut link = shared.link.lock();
            match std::mem::replace(&mut *link, Link::Absent) {
                Link::Open(connection) => {
                    connection.close();
                    *link = Link::Closing(connection);
                    Vec::new()
                }
                Link::Connecting { waiters, .. } => waiters,
                other => {
                    *link = other;
                    Vec::new()
                }
            }
        };

        for waiter in waiters {
            let _ = waiter.send(Err(Error::ConnectionClosed));
        }

        shared.fail_pending();
        info!(url = %shared.url, "Transport closed");
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        WsTransport::request(self, method, params).await
    }
}

// ============================================================================
// Shared - Connection Management
// ============================================================================

impl Shared {
    /// Returns the open connection, joining or starting an attempt.
    async fn ensure_connection(self: &Arc<Self>) -> Result<Connection> {
        let ready_rx = {
            let mut link = self.link.lock();
            let (ready_tx, ready_rx) = oneshot::channel();

            match &mut *link {
                Link::Open(connection) => return Ok(connection.clone()),
                Link::Connecting { waiters, .. } => waiters.push(ready_tx),
                Link::Absent | Link::Closing(_) => {
                    let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
                    *link = Link::Connecting {
                        generation,
                        waiters: vec![ready_tx],
                    };
                    tokio::spawn(Arc::clone(self).open(generation));
                }
            }

            ready_rx
        };

        ready_rx.await.map_err(|_| Error::ConnectionClosed)?
    }

    /// Performs one connection attempt and resolves its waiters.
    async fn open(self: Arc<Self>, generation: u64) {
        debug!(url = %self.url, generation, "Opening WebSocket");

        let result = self.connector.connect(&self.url).await;

        let mut link = self.link.lock();
        let current = matches!(&*link, Link::Connecting { generation: g, .. } if *g == generation);

        if !current {
            drop(link);
            debug!(generation, "Connection attempt abandoned");
            if let Ok(socket) = result {
                Connection::spawn(socket, generation, Weak::<Self>::new()).close();
            }
            return;
        }

        let Link::Connecting { waiters, .. } = std::mem::replace(&mut *link, Link::Absent) else {
            return;
        };

        match result {
            Ok(socket) => {
                let connection = Connection::spawn(socket, generation, Arc::downgrade(&self));
                *link = Link::Open(connection.clone());
                drop(link);

                self.attempts.store(0, Ordering::SeqCst);
                info!(url = %self.url, generation, "WebSocket open");

                for waiter in waiters {
                    let _ = waiter.send(Ok(connection.clone()));
                }
            }
            Err(e) => {
                drop(link);
                warn!(url = %self.url, generation, error = %e, "WebSocket open failed");

                let message = e.to_string();
                for waiter in waiters {
                    let _ = waiter.send(Err(Error::connection(message.clone())));
                }

                self.schedule_reconnect();
            }
        }
    }

    /// Schedules one reconnect if the budget allows.
    fn schedule_reconnect(self: &Arc<Self>) {
        let max = self.config.max_reconnect_attempts;
        let attempt = match self
            .attempts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < max).then_some(n + 1)
            }) {
            Ok(previous) => previous + 1,
            Err(_) => {
                warn!(url = %self.url, max, "Reconnect budget exhausted");
                return;
            }
        };

        let delay = self.config.reconnect_base_delay * attempt;
        info!(url = %self.url, attempt, delay_ms = delay.as_millis() as u64, "Scheduling reconnect");

        let weak = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            sleep(delay).await;

            let Some(shared) = weak.upgrade() else {
                return;
            };

            shared.reconnect_task.lock().take();

            if let Err(e) = shared.ensure_connection().await {
                debug!(attempt, error = %e, "Reconnect attempt failed");
            }
        });

        if let Some(previous) = self.reconnect_task.lock().replace(task) {
            previous.abort();
        }
    }

    /// Rejects every pending request with [`Error::ConnectionClosed`].
    fn fail_pending(&self) {
        let pending: Vec<_> = self.pending.lock().drain().collect();
        let count = pending.len();

        for (_, tx) in pending {
            let _ = tx.send(Err(Error::ConnectionClosed));
        }

        if count > 0 {
            debug!(count, "Failed pending requests on close");
        }
    }
}

// ============================================================================
// Shared - Socket Events
// ============================================================================

impl ConnectionHandler for Shared {
    fn on_text(&self, _generation: u64, text: &str) {
        match IncomingMessage::parse(text) {
            Ok(IncomingMessage::Response(response)) => {
                let id = response.id;
                let tx = self.pending.lock().remove(&id);

                match tx {
                    Some(tx) => {
                        let _ = tx.send(response.into_result());
                    }
                    None => debug!(%id, "Response for unknown request"),
                }
            }

            Ok(IncomingMessage::Notification(notification)) => {
                trace!(method = %notification.method, "Ignoring push notification on request socket");
            }

            Ok(IncomingMessage::Unknown(value)) => {
                warn!(message = %value, "Unrecognized message");
            }

            Err(e) => {
                warn!(error = %e, text, "Failed to parse incoming message");
            }
        }
    }

    fn on_closed(self: Arc<Self>, generation: u64, code: u16) {
        {
            let mut link = self.link.lock();
            let current = match &*link {
                Link::Open(connection) | Link::Closing(connection) => {
                    connection.generation() == generation
                }
                _ => false,
            };

            if !current {
                debug!(generation, code, "Stale connection closed");
                return;
            }

            *link = Link::Absent;
        }

        info!(url = %self.url, generation, code, "WebSocket closed");
        self.fail_pending();

        if code != NORMAL_CLOSURE {
            self.schedule_reconnect();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

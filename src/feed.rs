//! Subscription fan-out.
//!
//! One shared push connection feeds any number of independent listeners.
//!
//! # Lifecycle
//!
//! | Event | Effect |
//! |-------|--------|
//! | first listener added | socket opened, subscribe message sent |
//! | push message | every log delivered to every listener |
//! | last listener removed | socket closed |
//! | socket lost | connected flag cleared, no automatic reconnect |
//!
//! The feed is live-from-now: nothing is replayed after a reconnect. The
//! subscribe message is reissued every time the socket is (re)opened, so
//! the first `subscribe` after a loss restores delivery.
//!
//! # Example
//!
//! ```no_run
//! use megaeth_counter_client::feed::EventFeed;
//!
//! # async fn example() -> megaeth_counter_client::Result<()> {
//! let feed = EventFeed::new("wss://carrot.megaeth.com/ws");
//! let id = feed
//!     .subscribe(|event| println!("log from {}", event.address))
//!     .await?;
//! // ...
//! feed.unsubscribe(id).await;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::{Value, json};
use tracing::{debug, info, trace, warn};

use crate::error::Result;
use crate::identifiers::{IdSequence, ListenerId, SubscriptionId};
use crate::protocol::{IncomingMessage, LogEvent, Request};
use crate::transport::connection::{Connection, ConnectionHandler};
use crate::transport::socket::{Connector, TungsteniteConnector};

// ============================================================================
// Constants
// ============================================================================

/// Subscribe method sent on every (re)open.
const SUBSCRIBE_METHOD: &str = "eth_subscribe";

/// Default subscription parameters.
#[must_use]
pub fn default_subscription_params() -> Value {
    json!(["miniBlocks"])
}

// ============================================================================
// Types
// ============================================================================

/// Listener callback.
///
/// Called once per log event. A panicking listener is isolated from the
/// others.
pub type LogListener = Arc<dyn Fn(&LogEvent) + Send + Sync>;

// ============================================================================
// EventFeed
// ============================================================================

/// Shared push-feed connection with many listeners.
#[derive(Clone)]
pub struct EventFeed {
    inner: Arc<FeedInner>,
}

struct FeedInner {
    url: String,
    connector: Arc<dyn Connector>,
    subscribe_params: Value,
    ids: IdSequence,
    next_listener: AtomicU64,
    listeners: Mutex<FxHashMap<ListenerId, LogListener>>,
    /// Serializes open/close so concurrent subscribers share one socket.
    link: tokio::sync::Mutex<Option<Connection>>,
    /// Generation of the socket currently considered live.
    generation: AtomicU64,
    connected: AtomicBool,
    subscription: Mutex<Option<SubscriptionId>>,
}

impl EventFeed {
    /// Creates a feed with the default connector and subscription params.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_connector(url, Arc::new(TungsteniteConnector), default_subscription_params())
    }

    /// Creates a feed with a custom connector and subscription params.
    #[must_use]
    pub fn with_connector(
        url: impl Into<String>,
        connector: Arc<dyn Connector>,
        subscribe_params: Value,
    ) -> Self {
        Self {
            inner: Arc::new(FeedInner {
                url: url.into(),
                connector,
                subscribe_params,
                ids: IdSequence::new(),
                next_listener: AtomicU64::new(0),
                listeners: Mutex::new(FxHashMap::default()),
                link: tokio::sync::Mutex::new(None),
                generation: AtomicU64::new(0),
                connected: AtomicBool::new(false),
                subscription: Mutex::new(None),
            }),
        }
    }

    /// Returns the number of registered listeners.
    #[inline]
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }

    /// Returns `true` while the shared socket is up.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    /// Returns the node-assigned id of the current subscription, if acked.
    #[must_use]
    pub fn subscription_id(&self) -> Option<SubscriptionId> {
        self.inner.subscription.lock().clone()
    }

    /// Registers a listener, opening the shared socket if needed.
    ///
    /// # Errors
    ///
    /// Returns the connector's error if the socket cannot be opened; the
    /// listener is not registered in that case.
    pub async fn subscribe<F>(&self, listener: F) -> Result<ListenerId>
    where
        F: Fn(&LogEvent) + Send + Sync + 'static,
    {
        let id = ListenerId::new(self.inner.next_listener.fetch_add(1, Ordering::Relaxed) + 1);
        self.inner.listeners.lock().insert(id, Arc::new(listener));

        let mut link = self.inner.link.lock().await;
        if link.is_some() && self.is_connected() {
            debug!(%id, "Listener added to live feed");
            return Ok(id);
        }

        match self.inner.open().await {
            Ok(connection) => {
                *link = Some(connection);
                debug!(%id, "Listener added, feed opened");
                Ok(id)
            }
            Err(e) => {
                self.inner.listeners.lock().remove(&id);
                warn!(url = %self.inner.url, error = %e, "Failed to open feed");
                Err(e)
            }
        }
    }

    /// Removes a listener; removing the last one closes the socket.
    ///
    /// Returns `false` if the listener was not registered.
    pub async fn unsubscribe(&self, id: ListenerId) -> bool {
        if self.inner.listeners.lock().remove(&id).is_none() {
            return false;
        }

        let mut link = self.inner.link.lock().await;
        if self.inner.listeners.lock().is_empty() {
            self.inner.teardown(link.take());
        }

        debug!(%id, "Listener removed");
        true
    }

    /// Removes every listener and closes the socket.
    pub async fn shutdown(&self) {
        let mut link = self.inner.link.lock().await;
        self.inner.listeners.lock().clear();
        self.inner.teardown(link.take());
    }
}

// ============================================================================
// FeedInner - Connection Management
// ============================================================================

impl FeedInner {
    /// Opens a socket and issues the subscribe message.
    async fn open(self: &Arc<Self>) -> Result<Connection> {
        let socket = self.connector.connect(&self.url).await?;

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.subscription.lock().take();
        self.connected.store(true, Ordering::SeqCst);

        let connection = Connection::spawn(socket, generation, Arc::downgrade(self));

        let request = Request::new(
            self.ids.next_id(),
            SUBSCRIBE_METHOD,
            self.subscribe_params.clone(),
        );
        if let Err(e) = serde_json::to_string(&request)
            .map_err(Into::into)
            .and_then(|json| connection.send_text(json))
        {
            self.connected.store(false, Ordering::SeqCst);
            connection.close();
            return Err(e);
        }

        info!(url = %self.url, generation, "Feed connected");
        Ok(connection)
    }

    /// Closes the current socket, if any.
    fn teardown(&self, connection: Option<Connection>) {
        self.connected.store(false, Ordering::SeqCst);
        self.subscription.lock().take();

        if let Some(connection) = connection {
            connection.close();
            info!(url = %self.url, generation = connection.generation(), "Feed closed");
        }
    }

    /// Delivers one notification's logs to every listener.
    fn dispatch(&self, events: Vec<LogEvent>) {
        if events.is_empty() {
            return;
        }

        let listeners: Vec<(ListenerId, LogListener)> = self
            .listeners
            .lock()
            .iter()
            .map(|(id, listener)| (*id, Arc::clone(listener)))
            .collect();

        for event in &events {
            for (id, listener) in &listeners {
                if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                    warn!(%id, address = %event.address, "Feed listener panicked");
                }
            }
        }

        trace!(
            events = events.len(),
            listeners = listeners.len(),
            "Feed events delivered"
        );
    }
}

// ============================================================================
// FeedInner - Socket Events
// ============================================================================

impl ConnectionHandler for FeedInner {
    fn on_text(&self, generation: u64, text: &str) {
        if generation != self.generation.load(Ordering::SeqCst) {
            return;
        }

        match IncomingMessage::parse(text) {
            Ok(IncomingMessage::Notification(notification)) => {
                self.dispatch(notification.log_events());
            }

            Ok(IncomingMessage::Response(response)) => match response.into_result() {
                Ok(Value::String(id)) => {
                    debug!(subscription = %id, "Subscription acknowledged");
                    *self.subscription.lock() = Some(SubscriptionId::new(id));
                }
                Ok(other) => debug!(result = %other, "Unexpected subscribe result"),
                Err(e) => warn!(error = %e, "Subscribe request rejected"),
            },

            Ok(IncomingMessage::Unknown(value)) => {
                warn!(message = %value, "Unrecognized feed message");
            }

            Err(e) => warn!(error = %e, "Failed to parse feed message"),
        }
    }

    fn on_closed(self: Arc<Self>, generation: u64, code: u16) {
        if generation != self.generation.load(Ordering::SeqCst) {
            return;
        }

        if self.connected.swap(false, Ordering::SeqCst) {
            warn!(url = %self.url, generation, code, "Feed connection lost");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::sync::mpsc;

    use crate::transport::socket::NORMAL_CLOSURE;
    use crate::transport::socket::testing::{FakeConnector, FakeServer};

    const ADDRESS: &str = "0x5fbdb2315678afecb367f032d93f642f64180aa3";

    fn feed(connector: &FakeConnector) -> EventFeed {
        EventFeed::with_connector(
            "ws://fake",
            Arc::new(connector.clone()),
            default_subscription_params(),
        )
    }

    fn push(server: &FakeServer, data: &[&str]) {
        let logs: Vec<Value> = data
            .iter()
            .map(|d| json!({"address": ADDRESS, "topics": [], "data": d}))
            .collect();
        server.send_text(
            json!({
                "jsonrpc": "2.0",
                "method": "eth_subscription",
                "params": {"subscription": "0xfeed", "result": {"logs": logs}}
            })
            .to_string(),
        );
    }

    fn channel_listener() -> (
        impl Fn(&LogEvent) + Send + Sync + 'static,
        mpsc::UnboundedReceiver<LogEvent>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            move |event: &LogEvent| {
                let _ = tx.send(event.clone());
            },
            rx,
        )
    }

    #[tokio::test]
    async fn test_first_subscriber_opens_and_subscribes() {
        let (connector, mut servers) = FakeConnector::new();
        let feed = feed(&connector);
        assert!(!feed.is_connected());

        let (listener, _rx) = channel_listener();
        feed.subscribe(listener).await.expect("subscribe");

        let mut server = servers.recv().await.expect("server");
        let request = server.recv_json().await;
        assert_eq!(request["method"], "eth_subscribe");
        assert_eq!(request["params"], json!(["miniBlocks"]));
        assert!(feed.is_connected());

        server.reply(&request["id"], json!("0xfeed"));
        let (listener, mut rx) = channel_listener();
        feed.subscribe(listener).await.expect("subscribe");
        push(&server, &["0x01"]);
        rx.recv().await.expect("event");

        assert_eq!(connector.open_count(), 1);
        assert_eq!(feed.listener_count(), 2);
        assert_eq!(feed.subscription_id(), Some(SubscriptionId::new("0xfeed")));
    }

    #[tokio::test]
    async fn test_every_listener_gets_every_log() {
        let (connector, mut servers) = FakeConnector::new();
        let feed = feed(&connector);

        let (first, mut first_rx) = channel_listener();
        let (second, mut second_rx) = channel_listener();
        feed.subscribe(first).await.expect("subscribe");
        feed.subscribe(second).await.expect("subscribe");

        let mut server = servers.recv().await.expect("server");
        let _ = server.recv_json().await;
        push(&server, &["0x01", "0x02"]);

        for rx in [&mut first_rx, &mut second_rx] {
            let a = rx.recv().await.expect("first log");
            let b = rx.recv().await.expect("second log");
            assert_eq!(&a.data[..], &[0x01]);
            assert_eq!(&b.data[..], &[0x02]);
            assert_eq!(a.subscription.as_str(), "0xfeed");
            assert_eq!(a.address.to_string().to_lowercase(), ADDRESS);
        }
    }

    #[tokio::test]
    async fn test_panicking_listener_is_isolated() {
        let (connector, mut servers) = FakeConnector::new();
        let feed = feed(&connector);

        feed.subscribe(|_event: &LogEvent| panic!("listener bug"))
            .await
            .expect("subscribe");
        let (healthy, mut rx) = channel_listener();
        feed.subscribe(healthy).await.expect("subscribe");

        let mut server = servers.recv().await.expect("server");
        let _ = server.recv_json().await;
        push(&server, &["0x01", "0x02"]);

        assert_eq!(&rx.recv().await.expect("log").data[..], &[0x01]);
        assert_eq!(&rx.recv().await.expect("log").data[..], &[0x02]);
        assert!(feed.is_connected());
    }

    #[tokio::test]
    async fn test_last_unsubscribe_closes_and_resubscribe_reopens() {
        let (connector, mut servers) = FakeConnector::new();
        let feed = feed(&connector);

        let (a, _a_rx) = channel_listener();
        let (b, _b_rx) = channel_listener();
        let id_a = feed.subscribe(a).await.expect("subscribe");
        let id_b = feed.subscribe(b).await.expect("subscribe");
        let mut server = servers.recv().await.expect("server");
        let _ = server.recv_json().await;

        assert!(feed.unsubscribe(id_a).await);
        assert!(feed.is_connected());

        assert!(feed.unsubscribe(id_b).await);
        assert!(!feed.is_connected());
        assert_eq!(server.recv_close().await, Some(NORMAL_CLOSURE));
        assert!(!feed.unsubscribe(id_b).await);

        let (c, mut c_rx) = channel_listener();
        feed.subscribe(c).await.expect("subscribe");
        assert_eq!(connector.open_count(), 2);

        let mut server = servers.recv().await.expect("server");
        assert_eq!(server.recv_json().await["method"], "eth_subscribe");
        push(&server, &["0x03"]);
        assert_eq!(&c_rx.recv().await.expect("log").data[..], &[0x03]);
    }

    #[tokio::test]
    async fn test_connection_loss_clears_flag_and_next_subscribe_reopens() {
        let (connector, mut servers) = FakeConnector::new();
        let feed = feed(&connector);

        let (a, _a_rx) = channel_listener();
        feed.subscribe(a).await.expect("subscribe");
        let mut server = servers.recv().await.expect("server");
        let _ = server.recv_json().await;

        server.drop_link();
        while feed.is_connected() {
            tokio::task::yield_now().await;
        }
        assert_eq!(connector.open_count(), 1);

        let (b, _b_rx) = channel_listener();
        feed.subscribe(b).await.expect("subscribe");
        assert!(feed.is_connected());
        assert_eq!(connector.open_count(), 2);

        let mut server = servers.recv().await.expect("server");
        assert_eq!(server.recv_json().await["method"], "eth_subscribe");
    }

    #[tokio::test]
    async fn test_failed_open_does_not_register_listener() {
        let (connector, _servers) = FakeConnector::new();
        connector.refuse(true);
        let feed = feed(&connector);

        let (a, _rx) = channel_listener();
        assert!(feed.subscribe(a).await.is_err());
        assert_eq!(feed.listener_count(), 0);
        assert!(!feed.is_connected());
    }
}

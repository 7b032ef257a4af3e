//! Socket abstraction over WebSocket frames.
//!
//! The transport and the feed only see text frames and close frames.
//! A [`Connector`] turns a URL into a [`Socket`]; the production connector
//! is backed by `tokio-tungstenite`, tests plug in an in-memory one.

// ============================================================================
// Imports
// ============================================================================

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::future;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::Utf8Bytes;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::debug;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Close code for a deliberate, clean shutdown.
pub const NORMAL_CLOSURE: u16 = 1000;

/// Close frame received without a status code.
pub const NO_STATUS_RECEIVED: u16 = 1005;

/// Connection dropped without a close frame.
pub const ABNORMAL_CLOSURE: u16 = 1006;

// ============================================================================
// Frame
// ============================================================================

/// A WebSocket frame as seen by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// UTF-8 text payload.
    Text(String),
    /// Close frame with optional status code.
    Close(Option<u16>),
}

impl Frame {
    /// Converts to a tungstenite message.
    fn into_message(self) -> Message {
        match self {
            Frame::Text(text) => Message::Text(text.into()),
            Frame::Close(code) => Message::Close(code.map(|code| CloseFrame {
                code: CloseCode::from(code),
                reason: Utf8Bytes::from_static(""),
            })),
        }
    }

    /// Converts from a tungstenite message; ping/pong/binary are dropped.
    fn from_message(message: std::result::Result<Message, WsError>) -> Option<Result<Self>> {
        match message {
            Ok(Message::Text(text)) => Some(Ok(Frame::Text(text.as_str().to_owned()))),
            Ok(Message::Close(frame)) => Some(Ok(Frame::Close(frame.map(|f| u16::from(f.code))))),
            Ok(_) => None,
            Err(e) => Some(Err(Error::from(e))),
        }
    }
}

// ============================================================================
// Socket
// ============================================================================

/// Outgoing half of a socket.
pub type FrameSink = Pin<Box<dyn Sink<Frame, Error = Error> + Send>>;

/// Incoming half of a socket.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Frame>> + Send>>;

/// An open socket split into its two halves.
pub struct Socket {
    /// Frames to the node.
    pub sink: FrameSink,
    /// Frames from the node.
    pub stream: FrameStream,
}

impl Socket {
    /// Creates a socket from its halves.
    #[must_use]
    pub fn new(sink: FrameSink, stream: FrameStream) -> Self {
        Self { sink, stream }
    }
}

// ============================================================================
// Connector
// ============================================================================

/// Opens sockets.
///
/// Each call to [`Connector::connect`] opens one new physical connection.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Opens a socket to `url`.
    async fn connect(&self, url: &str) -> Result<Socket>;
}

/// Production connector backed by `tokio-tungstenite`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TungsteniteConnector;

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn connect(&self, url: &str) -> Result<Socket> {
        let (ws_stream, response) = connect_async(url)
            .await
            .map_err(|e| Error::connection(format!("{url}: {e}")))?;

        debug!(url, status = %response.status(), "WebSocket handshake completed");

        let (ws_write, ws_read) = ws_stream.split();

        let sink = ws_write
            .sink_map_err(Error::from)
            .with(|frame: Frame| future::ready(Ok::<_, Error>(frame.into_message())));
        let stream = ws_read.filter_map(|message| future::ready(Frame::from_message(message)));

        Ok(Socket::new(Box::pin(sink), Box::pin(stream)))
    }
}

// ============================================================================
// Test Support
// ============================================================================

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory connector for transport and feed tests.

    use std::sync::Arc;

    use futures_util::{sink, stream};
    use parking_lot::Mutex;
    use serde_json::{Value, json};
    use tokio::sync::{Notify, mpsc};
    use tokio::time::Instant;

    use super::*;

    /// Server end of a fake socket.
    pub(crate) struct FakeServer {
        /// Frames written by the client.
        pub from_client: mpsc::UnboundedReceiver<Frame>,
        /// Frames delivered to the client.
        pub to_client: Option<mpsc::UnboundedSender<Result<Frame>>>,
    }

    impl FakeServer {
        /// Waits for the next text frame and parses it as JSON.
        pub(crate) async fn recv_json(&mut self) -> Value {
            loop {
                match self.from_client.recv().await {
                    Some(Frame::Text(text)) => {
                        return serde_json::from_str(&text).expect("client sent valid JSON");
                    }
                    Some(Frame::Close(_)) => continue,
                    None => panic!("client closed the socket"),
                }
            }
        }

        /// Waits for the client's close frame, returning its code.
        pub(crate) async fn recv_close(&mut self) -> Option<u16> {
            loop {
                match self.from_client.recv().await {
                    Some(Frame::Close(code)) => return code,
                    Some(Frame::Text(_)) => continue,
                    None => return None,
                }
            }
        }

        /// Sends a raw text frame.
        pub(crate) fn send_text(&self, text: impl Into<String>) {
            if let Some(tx) = &self.to_client {
                let _ = tx.send(Ok(Frame::Text(text.into())));
            }
        }

        /// Sends a JSON-RPC success response.
        pub(crate) fn reply(&self, id: &Value, result: Value) {
            self.send_text(json!({"jsonrpc": "2.0", "id": id, "result": result}).to_string());
        }

        /// Sends a close frame with `code`.
        pub(crate) fn close(&mut self, code: u16) {
            if let Some(tx) = self.to_client.take() {
                let _ = tx.send(Ok(Frame::Close(Some(code))));
            }
        }

        /// Drops the connection without a close frame.
        pub(crate) fn drop_link(&mut self) {
            self.to_client = None;
        }
    }

    #[derive(Default)]
    struct FakeState {
        opens: Vec<Instant>,
        refuse: bool,
        gate: Option<Arc<Notify>>,
    }

    /// Connector that hands server ends to the test.
    #[derive(Clone)]
    pub(crate) struct FakeConnector {
        state: Arc<Mutex<FakeState>>,
        servers: mpsc::UnboundedSender<FakeServer>,
    }

    impl FakeConnector {
        pub(crate) fn new() -> (Self, mpsc::UnboundedReceiver<FakeServer>) {
            let (servers, rx) = mpsc::unbounded_channel();
            let connector = Self {
                state: Arc::new(Mutex::new(FakeState::default())),
                servers,
            };
            (connector, rx)
        }

        /// Makes every subsequent connect fail.
        pub(crate) fn refuse(&self, refuse: bool) {
            self.state.lock().refuse = refuse;
        }

        /// Makes every subsequent connect wait until the returned gate is
        /// notified.
        pub(crate) fn hold(&self) -> Arc<Notify> {
            let gate = Arc::new(Notify::new());
            self.state.lock().gate = Some(Arc::clone(&gate));
            gate
        }

        /// Number of connect calls so far.
        pub(crate) fn open_count(&self) -> usize {
            self.state.lock().opens.len()
        }

        /// Instants of every connect call.
        pub(crate) fn open_times(&self) -> Vec<Instant> {
            self.state.lock().opens.clone()
        }
    }

    #[async_trait]
    impl Connector for FakeConnector {
        async fn connect(&self, _url: &str) -> Result<Socket> {
            let gate = {
                let mut state = self.state.lock();
                state.opens.push(Instant::now());
                if state.refuse {
                    return Err(Error::connection("connection refused"));
                }
                state.gate.take()
            };
            if let Some(gate) = gate {
                gate.notified().await;
            }

            let (client_tx, from_client) = mpsc::unbounded_channel::<Frame>();
            let (to_client, client_rx) = mpsc::unbounded_channel::<Result<Frame>>();

            let sink = sink::unfold(client_tx, |tx, frame: Frame| async move {
                tx.send(frame).map_err(|_| Error::ConnectionClosed)?;
                Ok::<_, Error>(tx)
            });
            let stream = stream::unfold(client_rx, |mut rx| async move {
                rx.recv().await.map(|item| (item, rx))
            });

            let _ = self.servers.send(FakeServer {
                from_client,
                to_client: Some(to_client),
            });

            Ok(Socket::new(Box::pin(sink), Box::pin(stream)))
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

//! Per-socket event loop.
//!
//! Each open [`Socket`] gets one tokio task that owns both halves:
//!
//! - Outgoing text frames queued through [`Connection::send_text`]
//! - Incoming text frames handed to a [`ConnectionHandler`]
//! - A close code reported exactly once when the loop ends
//!
//! The loop holds only a weak reference to its handler so that dropping
//! the owner of a connection shuts the socket down.

// ============================================================================
// Imports
// ============================================================================

use std::sync::{Arc, Weak};

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, trace, warn};

use crate::error::{Error, Result};

use super::socket::{ABNORMAL_CLOSURE, Frame, NO_STATUS_RECEIVED, NORMAL_CLOSURE, Socket};

// ============================================================================
// ConnectionHandler
// ============================================================================

/// Receives socket activity from the event loop.
pub(crate) trait ConnectionHandler: Send + Sync + 'static {
    /// Called for each incoming text frame.
    fn on_text(&self, generation: u64, text: &str);

    /// Called once when the loop ends, with the effective close code.
    fn on_closed(self: Arc<Self>, generation: u64, code: u16);
}

// ============================================================================
// ConnectionCommand
// ============================================================================

/// Internal commands for the event loop.
enum ConnectionCommand {
    /// Send a text frame.
    Send(String),
    /// Close with the normal-closure code.
    Shutdown,
}

// ============================================================================
// Connection
// ============================================================================

/// Handle to one open socket.
///
/// Cloning shares the same underlying loop.
#[derive(Clone)]
pub(crate) struct Connection {
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
    /// Identifies this physical connection among successive ones.
    generation: u64,
}

impl Connection {
    /// Spawns the event loop for `socket`.
    pub(crate) fn spawn<H: ConnectionHandler>(
        socket: Socket,
        generation: u64,
        handler: Weak<H>,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        tokio::spawn(Self::run_event_loop(socket, generation, command_rx, handler));

        Self {
            command_tx,
            generation,
        }
    }

    /// Returns the generation number.
    #[inline]
    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    /// Queues a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the loop has already ended.
    pub(crate) fn send_text(&self, text: String) -> Result<()> {
        self.command_tx
            .send(ConnectionCommand::Send(text))
            .map_err(|_| Error::ConnectionClosed)
    }

    /// Asks the loop to close with the normal-closure code.
    pub(crate) fn close(&self) {
        let _ = self.command_tx.send(ConnectionCommand::Shutdown);
    }

    /// Event loop that handles socket I/O.
    async fn run_event_loop<H: ConnectionHandler>(
        socket: Socket,
        generation: u64,
        mut command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
        handler: Weak<H>,
    ) {
        let Socket {
            mut sink,
            mut stream,
        } = socket;

        let code = loop {
            tokio::select! {
                // Incoming frames from the node
                frame = stream.next() => {
                    match frame {
                        Some(Ok(Frame::Text(text))) => {
                            let Some(handler) = handler.upgrade() else {
                                break NORMAL_CLOSURE;
                            };
                            handler.on_text(generation, &text);
                        }

                        Some(Ok(Frame::Close(code))) => {
                            debug!(generation, ?code, "WebSocket closed by remote");
                            break code.unwrap_or(NO_STATUS_RECEIVED);
                        }

                        Some(Err(e)) => {
                            error!(generation, error = %e, "WebSocket error");
                            break ABNORMAL_CLOSURE;
                        }

                        None => {
                            debug!(generation, "WebSocket stream ended");
                            break ABNORMAL_CLOSURE;
                        }
                    }
                }

                // Commands from the owner
                command = command_rx.recv() => {
                    match command {
                        Some(ConnectionCommand::Send(text)) => {
                            if let Err(e) = sink.send(Frame::Text(text)).await {
                                warn!(generation, error = %e, "Failed to send frame");
                                break ABNORMAL_CLOSURE;
                            }
                            trace!(generation, "Frame sent");
                        }

                        Some(ConnectionCommand::Shutdown) => {
                            debug!(generation, "Shutdown command received");
                            let _ = sink.send(Frame::Close(Some(NORMAL_CLOSURE))).await;
                            let _ = sink.close().await;
                            break NORMAL_CLOSURE;
                        }

                        None => {
                            debug!(generation, "Command channel closed");
                            let _ = sink.send(Frame::Close(Some(NORMAL_CLOSURE))).await;
                            let _ = sink.close().await;
                            break NORMAL_CLOSURE;
                        }
                    }
                }
            }
        };

        if let Some(handler) = handler.upgrade() {
            handler.on_closed(generation, code);
        }

        debug!(generation, code, "Event loop terminated");
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use parking_lot::Mutex;
    use tokio::sync::Notify;

    use crate::transport::socket::Connector;
    use crate::transport::socket::testing::FakeConnector;

    #[derive(Default)]
    struct Recorder {
        texts: Mutex<Vec<String>>,
        closed: Mutex<Option<(u64, u16)>>,
        notify: Notify,
    }

    impl ConnectionHandler for Recorder {
        fn on_text(&self, _generation: u64, text: &str) {
            self.texts.lock().push(text.to_owned());
            self.notify.notify_one();
        }

        fn on_closed(self: Arc<Self>, generation: u64, code: u16) {
            *self.closed.lock() = Some((generation, code));
            self.notify.notify_one();
        }
    }

    #[tokio::test]
    async fn test_frames_flow_both_ways() {
        let (connector, mut servers) = FakeConnector::new();
        let socket = connector.connect("ws://fake").await.expect("connect");
        let mut server = servers.recv().await.expect("server");

        let recorder = Arc::new(Recorder::default());
        let connection = Connection::spawn(socket, 3, Arc::downgrade(&recorder));
        assert_eq!(connection.generation(), 3);

        connection.send_text(r#"{"ping":1}"#.into()).expect("send");
        assert_eq!(server.recv_json().await["ping"], 1);

        server.send_text("hello");
        recorder.notify.notified().await;
        assert_eq!(recorder.texts.lock().as_slice(), ["hello".to_string()]);
    }

    #[tokio::test]
    async fn test_remote_close_reports_code() {
        let (connector, mut servers) = FakeConnector::new();
        let socket = connector.connect("ws://fake").await.expect("connect");
        let mut server = servers.recv().await.expect("server");

        let recorder = Arc::new(Recorder::default());
        let _connection = Connection::spawn(socket, 1, Arc::downgrade(&recorder));

        server.close(4000);
        recorder.notify.notified().await;
        assert_eq!(*recorder.closed.lock(), Some((1, 4000)));
    }

    #[tokio::test]
    async fn test_dropped_link_is_abnormal() {
        let (connector, mut servers) = FakeConnector::new();
        let socket = connector.connect("ws://fake").await.expect("connect");
        let mut server = servers.recv().await.expect("server");

        let recorder = Arc::new(Recorder::default());
        let _connection = Connection::spawn(socket, 1, Arc::downgrade(&recorder));

        server.drop_link();
        recorder.notify.notified().await;
        assert_eq!(*recorder.closed.lock(), Some((1, ABNORMAL_CLOSURE)));
    }

    #[tokio::test]
    async fn test_shutdown_sends_normal_close() {
        let (connector, mut servers) = FakeConnector::new();
        let socket = connector.connect("ws://fake").await.expect("connect");
        let mut server = servers.recv().await.expect("server");

        let recorder = Arc::new(Recorder::default());
        let connection = Connection::spawn(socket, 1, Arc::downgrade(&recorder));

        connection.close();
        assert_eq!(server.recv_close().await, Some(NORMAL_CLOSURE));
        recorder.notify.notified().await;
        assert_eq!(*recorder.closed.lock(), Some((1, NORMAL_CLOSURE)));
        assert!(connection.send_text("late".into()).is_err());
    }
}

//! WebSocket transport with an HTTP fallback for reads.
//!
//! Requests go over the socket first. When that fails at the transport
//! level and an HTTP endpoint is configured, the request is reissued over
//! HTTP. Raw transaction sends never fall back: they stay on the socket so
//! the transaction queue keeps a single ordered path to the node.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::error::Result;
use crate::protocol::method::SEND_RAW_TRANSACTION;

use super::{HttpTransport, Transport, WsTransport};

// ============================================================================
// FallbackTransport
// ============================================================================

/// [`WsTransport`] first, [`HttpTransport`] on connection errors.
#[derive(Clone)]
pub struct FallbackTransport {
    ws: WsTransport,
    http: Option<Arc<HttpTransport>>,
}

impl fmt::Debug for FallbackTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallbackTransport")
            .field("ws_url", &self.ws.url())
            .field("http_url", &self.http.as_ref().map(|http| http.url().as_str()))
            .finish()
    }
}

impl FallbackTransport {
    /// Creates a transport; without `http` it behaves exactly like `ws`.
    #[must_use]
    pub fn new(ws: WsTransport, http: Option<HttpTransport>) -> Self {
        Self {
            ws,
            http: http.map(Arc::new),
        }
    }

    /// Returns the primary WebSocket transport.
    #[inline]
    #[must_use]
    pub fn ws(&self) -> &WsTransport {
        &self.ws
    }

    /// Returns the HTTP fallback, if configured.
    #[inline]
    #[must_use]
    pub fn http(&self) -> Option<&HttpTransport> {
        self.http.as_deref()
    }
}

#[async_trait]
impl Transport for FallbackTransport {
    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let Some(http) = &self.http else {
            return self.ws.request(method, params).await;
        };
        if method == SEND_RAW_TRANSACTION {
            return self.ws.request(method, params).await;
        }

        match self.ws.request(method, params.clone()).await {
            Err(e) if e.is_connection_error() => {
                debug!(method, error = %e, url = %http.url(), "WebSocket failed, retrying over HTTP");
                http.request(method, params).await
            }
            other => other,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

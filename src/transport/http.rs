//! HTTP fallback transport.
//!
//! Posts the same JSON-RPC envelopes as [`super::WsTransport`], one request
//! per HTTP call. The method mapping applies here too.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde_json::Value;
use tracing::{debug, trace};
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::IdSequence;
use crate::protocol::{Request, Response, map_call};

use super::Transport;
use super::ws::DEFAULT_REQUEST_TIMEOUT;

// ============================================================================
// HttpTransport
// ============================================================================

/// JSON-RPC over plain HTTP POST.
#[derive(Debug)]
pub struct HttpTransport {
    client: HttpClient,
    url: Url,
    ids: IdSequence,
}

impl HttpTransport {
    /// Creates a transport with the default request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the HTTP client cannot be built.
    pub fn new(url: Url) -> Result<Self> {
        Self::with_timeout(url, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Creates a transport with a custom request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the HTTP client cannot be built.
    pub fn with_timeout(url: Url, request_timeout: Duration) -> Result<Self> {
        let client = HttpClient::builder().timeout(request_timeout).build()?;
        Ok(Self::with_client(client, url))
    }

    /// Creates a transport around an existing HTTP client.
    #[must_use]
    pub fn with_client(client: HttpClient, url: Url) -> Self {
        Self {
            client,
            url,
            ids: IdSequence::new(),
        }
    }

    /// Returns the endpoint URL.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.ids.next_id();
        let (wire_method, params) = map_call(method, params);
        let request = Request::new(id, wire_method, params);

        trace!(%id, method, url = %self.url, "HTTP request");

        let http_response = self
            .client
            .post(self.url.clone())
            .json(&request)
            .send()
            .await?;

        let status = http_response.status();
        if !status.is_success() {
            debug!(%id, method, status = status.as_u16(), "HTTP request failed");
            return Err(Error::HttpStatus {
                status: status.as_u16(),
            });
        }

        let response: Response = http_response.json().await?;
        if response.id != id {
            return Err(Error::protocol(format!(
                "response id {} does not match request id {id}",
                response.id
            )));
        }

        response.into_result()
    }
}

// ============================================================================
// Test Support
// ============================================================================

#[cfg(test)]
pub(crate) mod testing {
    //! One-shot HTTP server for transport and client tests.

    use serde_json::Value;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;
    use url::Url;

    /// Serves exactly one HTTP request and hands its body to the test.
    pub(crate) async fn serve_once(
        status_line: &'static str,
        body: impl Fn(&Value) -> String + Send + 'static,
    ) -> (Url, oneshot::Receiver<Value>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let (body_tx, body_rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.expect("accept");
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];

            let request_body = loop {
                let n = stream.read(&mut chunk).await.expect("read");
                assert!(n > 0, "client hung up early");
                buf.extend_from_slice(&chunk[..n]);

                let text = String::from_utf8_lossy(&buf).to_string();
                let Some(split) = text.find("\r\n\r\n") else {
                    continue;
                };
                let length = text[..split]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buf.len() >= split + 4 + length {
                    break serde_json::from_slice::<Value>(&buf[split + 4..split + 4 + length])
                        .expect("json body");
                }
            };

            let payload = body(&request_body);
            let response = format!(
                "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{payload}",
                payload.len()
            );
            stream.write_all(response.as_bytes()).await.expect("write");
            let _ = body_tx.send(request_body);
        });

        let url = Url::parse(&format!("http://{addr}/")).expect("url");
        (url, body_rx)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use super::testing::serve_once;

    #[tokio::test]
    async fn test_success_result_and_mapping() {
        let (url, body_rx) = serve_once("200 OK", |req| {
            json!({"jsonrpc": "2.0", "id": req["id"], "result": {"status": "0x1"}}).to_string()
        })
        .await;

        let transport = HttpTransport::new(url).expect("client");
        let result = transport
            .request("eth_sendRawTransaction", json!(["0xf86c"]))
            .await
            .expect("ok");

        assert_eq!(result, json!({"status": "0x1"}));

        let sent = body_rx.await.expect("body");
        assert_eq!(sent["method"], "realtime_sendRawTransaction");
        assert_eq!(sent["params"], json!(["0xf86c"]));
        assert_eq!(sent["jsonrpc"], "2.0");
    }

    #[tokio::test]
    async fn test_non_success_status() {
        let (url, _body_rx) = serve_once("503 Service Unavailable", |_| "{}".to_string()).await;

        let transport = HttpTransport::new(url).expect("client");
        let err = transport
            .request("eth_blockNumber", json!([]))
            .await
            .expect_err("status error");

        assert!(matches!(err, Error::HttpStatus { status: 503 }));
        assert!(err.is_connection_error());
    }

    #[tokio::test]
    async fn test_rpc_error_object() {
        let (url, _body_rx) = serve_once("200 OK", |req| {
            json!({
                "jsonrpc": "2.0",
                "id": req["id"],
                "error": {"code": -32601, "message": "method not found"}
            })
            .to_string()
        })
        .await;

        let transport = HttpTransport::new(url).expect("client");
        let err = transport
            .request("eth_unknown", json!([]))
            .await
            .expect_err("rpc error");

        assert!(matches!(err, Error::Rpc { code: -32601, .. }));
    }
}

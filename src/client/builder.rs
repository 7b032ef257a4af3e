//! Builder pattern for client configuration.
//!
//! Provides a fluent API producing a validated [`ClientConfig`].
//!
//! # Example
//!
//! ```no_run
//! use megaeth_counter_client::Client;
//!
//! # async fn example() -> megaeth_counter_client::Result<()> {
//! let config = Client::builder()
//!     .ws_url("wss://carrot.megaeth.com/ws")
//!     .private_key("0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80")
//!     .counter_address("0x5fbdb2315678afecb367f032d93f642f64180aa3")
//!     .build()?;
//!
//! let client = Client::new(config)?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::time::Duration;

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use serde_json::Value;
use url::Url;

use crate::deployments::{DEFAULT_CHAIN_ID, Deployments};
use crate::error::{Error, Result};
use crate::feed::default_subscription_params;
use crate::transport::WsConfig;
use crate::tx::{DEFAULT_RECEIPT_POLL_INTERVAL, DEFAULT_RECEIPT_TIMEOUT};

// ============================================================================
// ClientConfig
// ============================================================================

/// Validated client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket endpoint (`ws` or `wss`).
    pub ws_url: Url,
    /// Optional HTTP endpoint (`http` or `https`).
    pub http_url: Option<Url>,
    /// Chain id transactions are signed for.
    pub chain_id: u64,
    /// Local signer; writes are disabled without one.
    pub signer: Option<PrivateKeySigner>,
    /// Counter contract address.
    pub counter_address: Option<Address>,
    /// WebSocket transport settings.
    pub ws: WsConfig,
    /// Parameters of the feed's subscribe message.
    pub feed_params: Value,
    /// Interval between receipt polls.
    pub receipt_poll_interval: Duration,
    /// Maximum wait for a receipt.
    pub receipt_timeout: Duration,
}

// ============================================================================
// ClientBuilder
// ============================================================================

/// Builder for a [`ClientConfig`].
///
/// Use [`Client::builder()`](super::Client::builder) to create one.
#[derive(Default, Clone)]
pub struct ClientBuilder {
    ws_url: Option<String>,
    http_url: Option<String>,
    chain_id: Option<u64>,
    private_key: Option<String>,
    counter_address: Option<String>,
    request_timeout: Option<Duration>,
    max_reconnect_attempts: Option<u32>,
    reconnect_base_delay: Option<Duration>,
    feed_params: Option<Value>,
    receipt_poll_interval: Option<Duration>,
    receipt_timeout: Option<Duration>,
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("ws_url", &self.ws_url)
            .field("http_url", &self.http_url)
            .field("chain_id", &self.chain_id)
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("counter_address", &self.counter_address)
            .field("request_timeout", &self.request_timeout)
            .field("max_reconnect_attempts", &self.max_reconnect_attempts)
            .field("reconnect_base_delay", &self.reconnect_base_delay)
            .field("feed_params", &self.feed_params)
            .field("receipt_poll_interval", &self.receipt_poll_interval)
            .field("receipt_timeout", &self.receipt_timeout)
            .finish()
    }
}

impl ClientBuilder {
    /// Creates a builder with nothing set.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the WebSocket endpoint. Required.
    #[inline]
    #[must_use]
    pub fn ws_url(mut self, url: impl Into<String>) -> Self {
        self.ws_url = Some(url.into());
        self
    }

    /// Sets the HTTP fallback endpoint.
    #[inline]
    #[must_use]
    pub fn http_url(mut self, url: impl Into<String>) -> Self {
        self.http_url = Some(url.into());
        self
    }

    /// Sets the chain id. Defaults to 6342.
    #[inline]
    #[must_use]
    pub fn chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = Some(chain_id);
        self
    }

    /// Sets the hex-encoded signing key.
    #[inline]
    #[must_use]
    pub fn private_key(mut self, key: impl Into<String>) -> Self {
        self.private_key = Some(key.into());
        self
    }

    /// Sets the counter contract address.
    #[inline]
    #[must_use]
    pub fn counter_address(mut self, address: impl Into<String>) -> Self {
        self.counter_address = Some(address.into());
        self
    }

    /// Seeds chain id and counter address from a deployments file.
    ///
    /// Values set explicitly take precedence.
    #[must_use]
    pub fn deployments(mut self, deployments: &Deployments) -> Self {
        self.chain_id.get_or_insert(deployments.chain_id);
        if self.counter_address.is_none() {
            self.counter_address = deployments.get("counter").map(|a| a.to_string());
        }
        self
    }

    /// Sets the per-request timeout. Defaults to 30 seconds.
    #[inline]
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Sets the automatic reconnect budget. Defaults to 5.
    #[inline]
    #[must_use]
    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = Some(attempts);
        self
    }

    /// Sets the base reconnect delay. Defaults to 1 second.
    #[inline]
    #[must_use]
    pub fn reconnect_base_delay(mut self, delay: Duration) -> Self {
        self.reconnect_base_delay = Some(delay);
        self
    }

    /// Sets the feed's subscribe parameters. Defaults to `["miniBlocks"]`.
    #[inline]
    #[must_use]
    pub fn feed_params(mut self, params: Value) -> Self {
        self.feed_params = Some(params);
        self
    }

    /// Sets receipt polling for nodes that answer sends with a bare hash.
    #[inline]
    #[must_use]
    pub fn receipt_polling(mut self, interval: Duration, timeout: Duration) -> Self {
        self.receipt_poll_interval = Some(interval);
        self.receipt_timeout = Some(timeout);
        self
    }

    /// Validates and builds the configuration.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] naming the offending setting.
    pub fn build(self) -> Result<ClientConfig> {
        let ws_url = self.validate_ws_url()?;
        let http_url = self.validate_http_url()?;
        let signer = self.validate_private_key()?;
        let counter_address = self.validate_counter_address()?;
        let ws = self.validate_ws_config()?;

        let receipt_poll_interval = self
            .receipt_poll_interval
            .unwrap_or(DEFAULT_RECEIPT_POLL_INTERVAL);
        if receipt_poll_interval.is_zero() {
            return Err(Error::config("Receipt poll interval must be greater than zero."));
        }

        Ok(ClientConfig {
            ws_url,
            http_url,
            chain_id: self.chain_id.unwrap_or(DEFAULT_CHAIN_ID),
            signer,
            counter_address,
            ws,
            feed_params: self.feed_params.unwrap_or_else(default_subscription_params),
            receipt_poll_interval,
            receipt_timeout: self.receipt_timeout.unwrap_or(DEFAULT_RECEIPT_TIMEOUT),
        })
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ClientBuilder {
    fn validate_ws_url(&self) -> Result<Url> {
        let raw = self.ws_url.as_deref().ok_or_else(|| {
            Error::config(
                "WebSocket URL is required. Use .ws_url() to set it.\n\
                 Example: Client::builder().ws_url(\"wss://carrot.megaeth.com/ws\")",
            )
        })?;

        parse_url(raw, "WebSocket", &["ws", "wss"])
    }

    fn validate_http_url(&self) -> Result<Option<Url>> {
        self.http_url
            .as_deref()
            .map(|raw| parse_url(raw, "HTTP", &["http", "https"]))
            .transpose()
    }

    fn validate_private_key(&self) -> Result<Option<PrivateKeySigner>> {
        let Some(key) = self.private_key.as_deref() else {
            return Ok(None);
        };

        // The key itself never goes into the message.
        key.trim()
            .parse::<PrivateKeySigner>()
            .map(Some)
            .map_err(|_| Error::config("Invalid private key: expected 32 bytes of hex."))
    }

    fn validate_counter_address(&self) -> Result<Option<Address>> {
        let Some(raw) = self.counter_address.as_deref() else {
            return Ok(None);
        };

        raw.trim().parse::<Address>().map(Some).map_err(|e| {
            Error::config(format!(
                "Invalid counter address '{raw}': {e}\n\
                 Expected a 0x-prefixed 20-byte hex address."
            ))
        })
    }

    fn validate_ws_config(&self) -> Result<WsConfig> {
        let defaults = WsConfig::default();
        let request_timeout = self.request_timeout.unwrap_or(defaults.request_timeout);
        if request_timeout.is_zero() {
            return Err(Error::config("Request timeout must be greater than zero."));
        }

        Ok(WsConfig {
            request_timeout,
            max_reconnect_attempts: self
                .max_reconnect_attempts
                .unwrap_or(defaults.max_reconnect_attempts),
            reconnect_base_delay: self
                .reconnect_base_delay
                .unwrap_or(defaults.reconnect_base_delay),
        })
    }
}

/// Parses `raw` and checks its scheme.
fn parse_url(raw: &str, kind: &str, schemes: &[&str]) -> Result<Url> {
    let url = Url::parse(raw)
        .map_err(|e| Error::config(format!("Invalid {kind} URL '{raw}': {e}")))?;

    if !schemes.contains(&url.scheme()) {
        return Err(Error::config(format!(
            "{kind} URL '{raw}' must use one of: {}",
            schemes.join(", ")
        )));
    }

    Ok(url)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use alloy::primitives::address;
    use serde_json::json;

    const KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn test_new_creates_empty_builder() {
        let builder = ClientBuilder::new();
        assert!(builder.ws_url.is_none());
        assert!(builder.private_key.is_none());
    }

    #[test]
    fn test_defaults() {
        let config = ClientBuilder::new()
            .ws_url("wss://carrot.megaeth.com/ws")
            .build()
            .expect("config");

        assert_eq!(config.chain_id, DEFAULT_CHAIN_ID);
        assert_eq!(config.ws.request_timeout, Duration::from_secs(30));
        assert_eq!(config.ws.max_reconnect_attempts, 5);
        assert_eq!(config.ws.reconnect_base_delay, Duration::from_secs(1));
        assert_eq!(config.feed_params, json!(["miniBlocks"]));
        assert!(config.signer.is_none());
        assert!(config.http_url.is_none());
    }

    #[test]
    fn test_build_fails_without_ws_url() {
        let err = ClientBuilder::new().build().expect_err("missing url");
        assert!(matches!(err, Error::Config { .. }));
        assert!(err.to_string().contains("ws_url"));
    }

    #[test]
    fn test_rejects_wrong_schemes() {
        let err = ClientBuilder::new()
            .ws_url("https://carrot.megaeth.com/rpc")
            .build()
            .expect_err("http ws url");
        assert!(err.to_string().contains("ws, wss"));

        let err = ClientBuilder::new()
            .ws_url("ws://localhost:8546")
            .http_url("ftp://localhost")
            .build()
            .expect_err("ftp http url");
        assert!(err.to_string().contains("http, https"));
    }

    #[test]
    fn test_private_key_parsed_and_not_echoed() {
        let config = ClientBuilder::new()
            .ws_url("ws://localhost:8546")
            .private_key(KEY)
            .build()
            .expect("config");
        assert_eq!(
            config.signer.expect("signer").address(),
            address!("f39fd6e51aad88f6f4ce6ab8827279cfffb92266")
        );

        let err = ClientBuilder::new()
            .ws_url("ws://localhost:8546")
            .private_key("0xnotakey")
            .build()
            .expect_err("bad key");
        assert!(!err.to_string().contains("notakey"));
    }

    #[test]
    fn test_debug_redacts_private_key() {
        let builder = ClientBuilder::new()
            .ws_url("ws://localhost:8546")
            .private_key(KEY);

        let rendered = format!("{builder:?}");
        assert!(!rendered.contains(&KEY[2..]));
        assert!(rendered.contains("<redacted>"));
        assert!(rendered.contains("ws://localhost:8546"));

        let config = builder.build().expect("config");
        assert!(!format!("{config:?}").contains(&KEY[2..]));
    }

    #[test]
    fn test_invalid_counter_address() {
        let err = ClientBuilder::new()
            .ws_url("ws://localhost:8546")
            .counter_address("0x1234")
            .build()
            .expect_err("bad address");
        assert!(err.to_string().contains("0x1234"));
    }

    #[test]
    fn test_zero_timeouts_rejected() {
        assert!(
            ClientBuilder::new()
                .ws_url("ws://localhost:8546")
                .request_timeout(Duration::ZERO)
                .build()
                .is_err()
        );
        assert!(
            ClientBuilder::new()
                .ws_url("ws://localhost:8546")
                .receipt_polling(Duration::ZERO, Duration::from_secs(1))
                .build()
                .is_err()
        );
    }

    #[test]
    fn test_deployments_seed_but_do_not_override() {
        let mut deployments = Deployments::new(31337, "Anvil");
        deployments.contracts.insert(
            "counter".into(),
            address!("5fbdb2315678afecb367f032d93f642f64180aa3"),
        );

        let seeded = ClientBuilder::new()
            .ws_url("ws://localhost:8546")
            .deployments(&deployments)
            .build()
            .expect("seeded");
        assert_eq!(seeded.chain_id, 31337);
        assert_eq!(
            seeded.counter_address,
            Some(address!("5fbdb2315678afecb367f032d93f642f64180aa3"))
        );

        let explicit = ClientBuilder::new()
            .ws_url("ws://localhost:8546")
            .chain_id(1)
            .deployments(&deployments)
            .build()
            .expect("explicit");
        assert_eq!(explicit.chain_id, 1);
    }

    #[test]
    fn test_builder_is_clone() {
        let builder = ClientBuilder::new().ws_url("ws://localhost:8546");
        let cloned = builder.clone();
        assert_eq!(builder.ws_url, cloned.ws_url);
    }
}

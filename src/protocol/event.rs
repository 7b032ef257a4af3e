//! Incoming message and push notification types.
//!
//! Every text frame from the node is classified into an [`IncomingMessage`]:
//!
//! | Shape | Variant |
//! |-------|---------|
//! | has `id` and `result` or `error`, no `method` | [`IncomingMessage::Response`] |
//! | no `id`, has `method` | [`IncomingMessage::Notification`] |
//! | anything else | [`IncomingMessage::Unknown`] |
//!
//! A frame with both `id` and `method` is a server-initiated request and is
//! never treated as a response.
//!
//! Notifications carry `params.result.logs[]`, flattened into [`LogEvent`]s.

// ============================================================================
// Imports
// ============================================================================

use alloy::primitives::{Address, B256, Bytes};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::error::Result;
use crate::identifiers::SubscriptionId;

use super::Response;

// ============================================================================
// IncomingMessage
// ============================================================================

/// A classified frame received from the node.
#[derive(Debug, Clone)]
pub enum IncomingMessage {
    /// Response to a request, correlated by id.
    Response(Response),

    /// Push notification for a subscription.
    Notification(Notification),

    /// Valid JSON of an unrecognized shape.
    Unknown(Value),
}

impl IncomingMessage {
    /// Parses a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Json`] if the frame is not valid JSON.
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        Ok(Self::from_value(value))
    }

    /// Classifies an already-parsed JSON value.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        let has_id = value.get("id").is_some_and(|id| !id.is_null());
        let has_method = value.get("method").is_some_and(Value::is_string);
        let has_outcome = value.get("result").is_some() || value.get("error").is_some();

        if !has_id && has_method {
            return match serde_json::from_value::<Notification>(value.clone()) {
                Ok(notification) => Self::Notification(notification),
                Err(_) => Self::Unknown(value),
            };
        }

        if has_id && !has_method && has_outcome {
            return match serde_json::from_value::<Response>(value.clone()) {
                Ok(response) => Self::Response(response),
                Err(_) => Self::Unknown(value),
            };
        }

        Self::Unknown(value)
    }
}

// ============================================================================
// Notification
// ============================================================================

/// A subscription push message.
///
/// # Format
///
/// ```json
/// {
///   "jsonrpc": "2.0",
///   "method": "eth_subscription",
///   "params": {
///     "subscription": "0x1",
///     "result": { "logs": [ { "address": "0x..", "topics": [..], "data": "0x.." } ] }
///   }
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Notification {
    /// Notification method, usually `eth_subscription`.
    pub method: String,

    /// Subscription payload.
    pub params: NotificationParams,
}

/// Payload of a [`Notification`].
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationParams {
    /// Node-assigned subscription id.
    pub subscription: SubscriptionId,

    /// Opaque result object.
    #[serde(default)]
    pub result: Value,
}

/// Raw log entry as it appears on the wire.
#[derive(Debug, Clone, Deserialize)]
struct RawLog {
    address: Address,
    #[serde(default)]
    topics: Vec<B256>,
    #[serde(default)]
    data: Bytes,
}

impl Notification {
    /// Returns the subscription id.
    #[inline]
    #[must_use]
    pub fn subscription(&self) -> &SubscriptionId {
        &self.params.subscription
    }

    /// Flattens `params.result.logs[]` into log events.
    ///
    /// Malformed entries are skipped with a warning.
    #[must_use]
    pub fn log_events(&self) -> Vec<LogEvent> {
        let Some(logs) = self.params.result.get("logs").and_then(Value::as_array) else {
            return Vec::new();
        };

        logs.iter()
            .filter_map(|raw| match serde_json::from_value::<RawLog>(raw.clone()) {
                Ok(log) => Some(LogEvent {
                    address: log.address,
                    topics: log.topics,
                    data: log.data,
                    subscription: self.params.subscription.clone(),
                }),
                Err(e) => {
                    warn!(error = %e, "Skipping malformed log entry");
                    None
                }
            })
            .collect()
    }
}

// ============================================================================
// LogEvent
// ============================================================================

/// A normalized log record delivered to feed listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    /// Emitting contract.
    pub address: Address,
    /// Indexed topics.
    pub topics: Vec<B256>,
    /// Raw non-indexed payload.
    pub data: Bytes,
    /// Subscription that delivered the log.
    pub subscription: SubscriptionId,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const NOTIFICATION: &str = r#"{
        "jsonrpc": "2.0",
        "method": "eth_subscription",
        "params": {
            "subscription": "0x9ce59a13059e417087c02d3236a0b1cc",
            "result": {
                "logs": [
                    {
                        "address": "0x5fbdb2315678afecb367f032d93f642f64180aa3",
                        "topics": ["0x0000000000000000000000000000000000000000000000000000000000000001"],
                        "data": "0x2a"
                    },
                    { "address": "not-an-address" },
                    {
                        "address": "0x5fbdb2315678afecb367f032d93f642f64180aa3",
                        "topics": [],
                        "data": "0x"
                    }
                ]
            }
        }
    }"#;

    #[test]
    fn test_classifies_response() {
        let msg = IncomingMessage::parse(r#"{"jsonrpc":"2.0","id":4,"result":"0x1"}"#)
            .expect("parse");
        assert!(matches!(msg, IncomingMessage::Response(r) if r.id.as_u64() == 4));
    }

    #[test]
    fn test_classifies_notification() {
        let msg = IncomingMessage::parse(NOTIFICATION).expect("parse");
        let IncomingMessage::Notification(notification) = msg else {
            panic!("expected notification");
        };
        assert_eq!(notification.method, "eth_subscription");
        assert_eq!(
            notification.subscription().as_str(),
            "0x9ce59a13059e417087c02d3236a0b1cc"
        );
    }

    #[test]
    fn test_null_id_with_method_is_notification() {
        let msg = IncomingMessage::from_value(json!({
            "id": null,
            "method": "eth_subscription",
            "params": {"subscription": "0x1", "result": {}}
        }));
        assert!(matches!(msg, IncomingMessage::Notification(_)));
    }

    #[test]
    fn test_server_request_is_not_a_response() {
        let msg = IncomingMessage::from_value(json!({
            "jsonrpc": "2.0",
            "id": 4,
            "method": "net_ping",
            "params": []
        }));
        assert!(matches!(msg, IncomingMessage::Unknown(_)));
    }

    #[test]
    fn test_id_without_outcome_is_unknown() {
        let msg = IncomingMessage::from_value(json!({"jsonrpc": "2.0", "id": 4}));
        assert!(matches!(msg, IncomingMessage::Unknown(_)));

        let msg = IncomingMessage::from_value(json!({"jsonrpc": "2.0", "id": 4, "result": null}));
        assert!(matches!(msg, IncomingMessage::Response(_)));
    }

    #[test]
    fn test_unknown_shape() {
        let msg = IncomingMessage::from_value(json!({"hello": "world"}));
        assert!(matches!(msg, IncomingMessage::Unknown(_)));
    }

    #[test]
    fn test_invalid_json_is_error() {
        assert!(IncomingMessage::parse("{not json").is_err());
    }

    #[test]
    fn test_log_events_skip_malformed() {
        let IncomingMessage::Notification(notification) =
            IncomingMessage::parse(NOTIFICATION).expect("parse")
        else {
            panic!("expected notification");
        };

        let events = notification.log_events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].topics.len(), 1);
        assert_eq!(events[0].data.as_ref(), &[0x2a]);
        assert!(events[1].data.is_empty());
        assert_eq!(events[1].subscription, *notification.subscription());
    }

    #[test]
    fn test_log_events_without_logs() {
        let msg = IncomingMessage::from_value(json!({
            "method": "eth_subscription",
            "params": {"subscription": "0x1", "result": {"number": "0x10"}}
        }));
        let IncomingMessage::Notification(notification) = msg else {
            panic!("expected notification");
        };
        assert!(notification.log_events().is_empty());
    }
}

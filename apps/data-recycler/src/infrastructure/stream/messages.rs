//! Stream Wire Message Types
//!
//! Wire format for the recycled feed, emulating the real market-data
//! socket's protocol so unmodified client libraries work unchanged.
//!
//! # Message Types
//!
//! ## Control messages (server -> client, JSON arrays)
//! - `Success`: connection and authentication acknowledgements
//! - `Error`: error response with code and message
//! - `SubscriptionAck`: subscription confirmation
//!
//! ## Data messages (server -> client)
//! - One JSON array per tick, one element per active symbol:
//!
//! ```json
//! [{"S":"AAPL","t":"2024-01-02T14:30:00Z","o":150.25,"h":151.5,"l":149.75,"c":150.75,"v":1000000}]
//! ```
//!
//! The `S` field carries the *requested* symbol name even when the OHLCV
//! values come from a proxy symbol, and `t` is the wall clock at emission
//! time, not the bar's historical timestamp.
//!
//! ## Client requests (client -> server, single JSON objects)
//! - `{"action":"auth","key":...,"secret":...}`
//! - `{"action":"subscribe","bars":[...]}` / `{"action":"unsubscribe",...}`

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// =============================================================================
// Error Codes
// =============================================================================

/// Client sent malformed JSON or an unknown action.
pub const CODE_INVALID_SYNTAX: i32 = 400;

/// Client tried to subscribe before authenticating.
pub const CODE_NOT_AUTHENTICATED: i32 = 401;

/// Client failed to complete the handshake in time.
pub const CODE_AUTH_TIMEOUT: i32 = 404;

// =============================================================================
// Control Messages
// =============================================================================

/// Success acknowledgement sent on connect and after authentication.
///
/// # Wire Format (JSON)
/// ```json
/// {"T": "success", "msg": "connected"}
/// {"T": "success", "msg": "authenticated"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessMessage {
    /// Message type (always "success").
    #[serde(rename = "T")]
    pub msg_type: String,

    /// Success kind: "connected" or "authenticated".
    pub msg: SuccessKind,
}

/// Kind of success message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuccessKind {
    /// Initial connection established.
    Connected,
    /// Authentication successful.
    Authenticated,
}

impl SuccessMessage {
    /// Build a success message of the given kind.
    #[must_use]
    pub fn new(kind: SuccessKind) -> Self {
        Self {
            msg_type: "success".to_string(),
            msg: kind,
        }
    }
}

/// Error message with code and description.
///
/// # Wire Format (JSON)
/// ```json
/// {"T": "error", "code": 401, "msg": "not authenticated"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    /// Message type (always "error").
    #[serde(rename = "T")]
    pub msg_type: String,

    /// Error code.
    pub code: i32,

    /// Error message.
    pub msg: String,
}

impl ErrorMessage {
    /// Build an error message.
    #[must_use]
    pub fn new(code: i32, msg: &str) -> Self {
        Self {
            msg_type: "error".to_string(),
            code,
            msg: msg.to_string(),
        }
    }
}

/// Subscription confirmation, echoing the active bar subscriptions.
///
/// # Wire Format (JSON)
/// ```json
/// {"T": "subscription", "bars": ["AAPL", "PDFS"]}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionAck {
    /// Message type (always "subscription").
    #[serde(rename = "T")]
    pub msg_type: String,

    /// Subscribed bar symbols.
    #[serde(default)]
    pub bars: Vec<String>,
}

impl SubscriptionAck {
    /// Build a subscription acknowledgement.
    #[must_use]
    pub fn new(bars: Vec<String>) -> Self {
        Self {
            msg_type: "subscription".to_string(),
            bars,
        }
    }
}

// =============================================================================
// Client Requests (Client -> Server)
// =============================================================================

/// Requests a client may send during and after the handshake.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ClientRequest {
    /// Authentication request. Credentials are acknowledged, not verified;
    /// the recycler emulates the feed's handshake, it does not gate access.
    Auth {
        /// API key (ignored).
        #[serde(default)]
        key: String,
        /// API secret (ignored).
        #[serde(default)]
        secret: String,
    },
    /// Subscribe to bar symbols.
    Subscribe {
        /// Requested bar symbols.
        #[serde(default)]
        bars: Vec<String>,
    },
    /// Unsubscribe from bar symbols.
    Unsubscribe {
        /// Symbols to remove.
        #[serde(default)]
        bars: Vec<String>,
    },
}

// =============================================================================
// Data Messages
// =============================================================================

/// One per-symbol snapshot within a tick.
///
/// Prices serialize as JSON numbers to match the source feed, and `t` is
/// the wall clock at emission time so downstream consumers see "live" data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickBar {
    /// Requested symbol name (even when the values are proxied).
    #[serde(rename = "S")]
    pub symbol: String,

    /// Wall-clock timestamp at emission.
    #[serde(rename = "t")]
    pub timestamp: DateTime<Utc>,

    /// Open price.
    #[serde(rename = "o", with = "rust_decimal::serde::float")]
    pub open: Decimal,

    /// High price.
    #[serde(rename = "h", with = "rust_decimal::serde::float")]
    pub high: Decimal,

    /// Low price.
    #[serde(rename = "l", with = "rust_decimal::serde::float")]
    pub low: Decimal,

    /// Close price.
    #[serde(rename = "c", with = "rust_decimal::serde::float")]
    pub close: Decimal,

    /// Volume (shares).
    #[serde(rename = "v")]
    pub volume: i64,
}

// =============================================================================
// Emission
// =============================================================================

/// Malformed data prevented serializing part of a tick.
///
/// Recovered locally: the affected symbol (or tick) is skipped and logged;
/// the sequencer continues with the next tick.
#[derive(Debug, thiserror::Error)]
#[error("tick encoding failed: {0}")]
pub struct EmissionError(#[from] pub serde_json::Error);

/// Encode a control message as a single-element JSON array frame.
///
/// # Errors
///
/// Returns an `EmissionError` if serialization fails.
pub fn control_frame<T: Serialize>(msg: &T) -> Result<String, EmissionError> {
    Ok(serde_json::to_string(&[msg])?)
}

/// Encode a tick as a JSON array of per-symbol snapshots.
///
/// A snapshot that fails to serialize is skipped (logged by the caller via
/// the per-element errors); `None` means no element survived and the tick
/// should be skipped entirely.
#[must_use]
pub fn encode_tick(bars: &[TickBar]) -> (Option<String>, Vec<EmissionError>) {
    let mut values = Vec::with_capacity(bars.len());
    let mut errors = Vec::new();

    for bar in bars {
        match serde_json::to_value(bar) {
            Ok(value) => values.push(value),
            Err(e) => errors.push(EmissionError(e)),
        }
    }

    if values.is_empty() {
        return (None, errors);
    }

    match serde_json::to_string(&values) {
        Ok(text) => (Some(text), errors),
        Err(e) => {
            errors.push(EmissionError(e));
            (None, errors)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn connected_frame_shape() {
        let frame = control_frame(&SuccessMessage::new(SuccessKind::Connected)).unwrap();
        assert_eq!(frame, r#"[{"T":"success","msg":"connected"}]"#);
    }

    #[test]
    fn authenticated_frame_shape() {
        let frame = control_frame(&SuccessMessage::new(SuccessKind::Authenticated)).unwrap();
        assert_eq!(frame, r#"[{"T":"success","msg":"authenticated"}]"#);
    }

    #[test]
    fn error_frame_shape() {
        let frame = control_frame(&ErrorMessage::new(CODE_NOT_AUTHENTICATED, "not authenticated"))
            .unwrap();
        assert_eq!(frame, r#"[{"T":"error","code":401,"msg":"not authenticated"}]"#);
    }

    #[test]
    fn subscription_ack_shape() {
        let ack = SubscriptionAck::new(vec!["AAPL".to_string(), "PDFS".to_string()]);
        let frame = control_frame(&ack).unwrap();
        assert_eq!(frame, r#"[{"T":"subscription","bars":["AAPL","PDFS"]}]"#);
    }

    #[test]
    fn deserialize_auth_request() {
        let req: ClientRequest =
            serde_json::from_str(r#"{"action":"auth","key":"k","secret":"s"}"#).unwrap();
        assert!(matches!(req, ClientRequest::Auth { .. }));
    }

    #[test]
    fn deserialize_subscribe_request() {
        let req: ClientRequest =
            serde_json::from_str(r#"{"action":"subscribe","bars":["AAPL","ROG"]}"#).unwrap();
        match req {
            ClientRequest::Subscribe { bars } => assert_eq!(bars, vec!["AAPL", "ROG"]),
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[test]
    fn deserialize_unknown_action_fails() {
        let result = serde_json::from_str::<ClientRequest>(r#"{"action":"listen"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn tick_bar_wire_fields() {
        let bar = TickBar {
            symbol: "AAPL".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 14, 30, 0).unwrap(),
            open: Decimal::new(15025, 2),
            high: Decimal::new(1515, 1),
            low: Decimal::new(14975, 2),
            close: Decimal::new(15075, 2),
            volume: 1_000_000,
        };
        let json = serde_json::to_value(&bar).unwrap();

        assert_eq!(json["S"], "AAPL");
        assert_eq!(json["o"], 150.25);
        assert_eq!(json["h"], 151.5);
        assert_eq!(json["l"], 149.75);
        assert_eq!(json["c"], 150.75);
        assert_eq!(json["v"], 1_000_000);
        assert!(json["t"].is_string());
    }

    #[test]
    fn encode_tick_produces_array_per_symbol() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 14, 30, 0).unwrap();
        let bars: Vec<TickBar> = ["AAPL", "PDFS"]
            .iter()
            .map(|sym| TickBar {
                symbol: (*sym).to_string(),
                timestamp: ts,
                open: Decimal::new(100, 0),
                high: Decimal::new(101, 0),
                low: Decimal::new(99, 0),
                close: Decimal::new(100, 0),
                volume: 10,
            })
            .collect();

        let (encoded, errors) = encode_tick(&bars);
        assert!(errors.is_empty());

        let value: serde_json::Value = serde_json::from_str(&encoded.unwrap()).unwrap();
        let elements = value.as_array().unwrap();
        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0]["S"], "AAPL");
        assert_eq!(elements[1]["S"], "PDFS");
    }

    #[test]
    fn encode_empty_tick_is_none() {
        let (encoded, errors) = encode_tick(&[]);
        assert!(encoded.is_none());
        assert!(errors.is_empty());
    }
}

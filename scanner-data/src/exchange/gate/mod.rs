use self::channel::GateChannel;
use crate::subscription::Subscription;
use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Gate.io channel names.
pub mod channel;

/// Order book update payload.
pub mod book;

/// 24h spot ticker REST records and client.
pub mod ticker;

/// Gate.io WebSocket subscribe request, sent once when a connection becomes ready.
///
/// Example:
/// ```json
/// {
///   "time": 1700000000000,
///   "channel": "spot.order_book_update",
///   "event": "subscribe",
///   "payload": ["BTC_USDT", "100ms"]
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct GateSubscribeRequest {
    pub time: i64,
    pub channel: String,
    pub event: String,
    pub payload: Vec<String>,
}

impl GateSubscribeRequest {
    pub fn new(subscription: &Subscription, time: i64) -> Self {
        let mut payload = vec![subscription.symbol.exchange_pair()];
        payload.extend(subscription.interval.iter().cloned());

        Self {
            time,
            channel: GateChannel::from(subscription.kind).as_ref().to_string(),
            event: "subscribe".to_string(),
            payload,
        }
    }
}

impl From<&Subscription> for GateSubscribeRequest {
    fn from(subscription: &Subscription) -> Self {
        Self::new(subscription, Utc::now().timestamp_millis())
    }
}

/// Gate.io WebSocket message wrapper.
#[derive(Clone, Debug, PartialEq)]
pub enum GateMessage {
    /// Subscription acknowledgement, error frame, or anything without an update body.
    Ignore,
    /// Data frame carrying an update body.
    Update(Value),
}

impl<'de> Deserialize<'de> for GateMessage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;

        if value.get("error").is_some_and(|error| !error.is_null()) {
            return Ok(GateMessage::Ignore);
        }

        if let Some(update) = value.get("update").filter(|update| !update.is_null()) {
            return Ok(GateMessage::Update(update.clone()));
        }

        // Live v4 frames carry the body under "result" with event "update"
        let is_update_event = value.get("event").and_then(Value::as_str) == Some("update");
        match value.get("result") {
            Some(result) if is_update_event && !result.is_null() => {
                Ok(GateMessage::Update(result.clone()))
            }
            _ => Ok(GateMessage::Ignore),
        }
    }
}

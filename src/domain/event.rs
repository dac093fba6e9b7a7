//! Events pushed to subscribers.
//!
//! An [`Event`] is an immutable `{type, payload, timestamp}` value produced
//! by application code. The gateway never inspects the payload; it only
//! flattens it into the JSON body subscribers receive:
//!
//! ```text
//! data: {"type":"updated","documentId":"42","timestamp":"2026-01-01T00:00:00.000Z"}
//!
//! ```
//!
//! Encoding happens once per publish via [`Event::encode`]; the resulting
//! [`EncodedEvent`] is cheap to clone and is what connection sinks carry.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

use crate::error::GatewayError;

/// Event type of the handshake sent once to every new connection.
pub const HANDSHAKE_EVENT_TYPE: &str = "connected";

/// An application event destined for one or more channels.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    event_type: String,
    payload: Value,
    timestamp: DateTime<Utc>,
}

impl Event {
    /// Creates an event stamped with the current time.
    ///
    /// `payload` is usually a JSON object whose fields are merged into the
    /// wire body next to `type`. Any other non-null value is carried under a
    /// `data` key.
    #[must_use]
    pub fn new(event_type: impl Into<String>, payload: Value) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
            timestamp: Utc::now(),
        }
    }

    /// The `{type: "connected", timestamp}` handshake.
    #[must_use]
    pub fn handshake() -> Self {
        Self::new(HANDSHAKE_EVENT_TYPE, Value::Null)
    }

    /// Builds an event from a JSON object carrying a string `type` field.
    ///
    /// All other fields become the payload.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidEvent`] if `value` is not an object or
    /// lacks a non-empty string `type`.
    pub fn from_json(value: Value) -> Result<Self, GatewayError> {
        let Value::Object(mut fields) = value else {
            return Err(GatewayError::InvalidEvent(
                "event must be a JSON object".to_string(),
            ));
        };
        let event_type = match fields.remove("type") {
            Some(Value::String(t)) if !t.is_empty() => t,
            _ => {
                return Err(GatewayError::InvalidEvent(
                    "event requires a non-empty string `type`".to_string(),
                ));
            }
        };
        Ok(Self::new(event_type, Value::Object(fields)))
    }

    /// Overrides the timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Returns the event type discriminator.
    #[must_use]
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Returns the raw payload.
    #[must_use]
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Returns `true` for the connection handshake.
    #[must_use]
    pub fn is_handshake(&self) -> bool {
        self.event_type == HANDSHAKE_EVENT_TYPE
    }

    /// Flattens the event into its `{type, ...payload, timestamp}` body.
    ///
    /// Payload fields are spread over `type`, so a payload `type` field
    /// replaces [`Event::event_type`] on the wire. A `timestamp` field in the
    /// payload likewise takes precedence over the event's own timestamp.
    #[must_use]
    pub fn to_body(&self) -> Value {
        let mut body = Map::new();
        body.insert("type".to_string(), Value::String(self.event_type.clone()));
        match &self.payload {
            Value::Object(fields) => {
                body.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            Value::Null => {}
            other => {
                body.insert("data".to_string(), other.clone());
            }
        }
        body.entry("timestamp").or_insert_with(|| {
            Value::String(self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true))
        });
        Value::Object(body)
    }

    /// Serializes the body once for delivery.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`serde_json::Error`] if serialization fails.
    pub fn encode(&self) -> Result<EncodedEvent, serde_json::Error> {
        let body = self.to_body();
        let event_type = body
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or(self.event_type.as_str());
        Ok(EncodedEvent {
            event_type: Arc::from(event_type),
            body: Arc::from(serde_json::to_string(&body)?),
        })
    }
}

/// A serialized event shared between all recipients of one publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedEvent {
    event_type: Arc<str>,
    body: Arc<str>,
}

impl EncodedEvent {
    /// Returns the `type` written on the wire.
    #[must_use]
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Returns the JSON body written after the `data:` prefix.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }
}

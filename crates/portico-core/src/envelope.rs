// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Message envelope and its JSON wire form.
//
// Wire shapes:
//
//   host → content   { "channel": "notify-from-host:<action>", "payload": ..., "timestamp": ... }
//   content → host   { "channel": "request-to-host:<action>", "payload": ...,
//                      "correlationId"?: ..., "timestamp": ..., "securityToken": ... }
//
// Replies to correlated requests use the fixed action `bridgeResponse` and
// carry a `Reply` as their payload.
//
// Decoding is deliberately soft: the same transport also carries unrelated
// application messages, so anything that is not a bridge envelope comes back
// as a `DecodeError` for the caller to ignore.

use serde::de::Deserializer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::error::Result;

/// Channel prefix for content → host messages.
pub const TO_HOST_PREFIX: &str = "request-to-host:";

/// Channel prefix for host → content messages.
pub const FROM_HOST_PREFIX: &str = "notify-from-host:";

/// Reserved action carrying a `Reply` in either direction.
pub const RESPONSE_ACTION: &str = "bridgeResponse";

/// Which way a message travels across the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Content surface → host application.
    ToHost,
    /// Host application → content surface.
    FromHost,
}

impl Direction {
    pub fn prefix(self) -> &'static str {
        match self {
            Direction::ToHost => TO_HOST_PREFIX,
            Direction::FromHost => FROM_HOST_PREFIX,
        }
    }

    /// Build the direction-prefixed channel name for `action`.
    pub fn channel(self, action: &str) -> String {
        format!("{}{action}", self.prefix())
    }

    fn split_channel(channel: &str) -> std::result::Result<(Self, &str), DecodeError> {
        let (direction, action) = if let Some(action) = channel.strip_prefix(TO_HOST_PREFIX) {
            (Direction::ToHost, action)
        } else if let Some(action) = channel.strip_prefix(FROM_HOST_PREFIX) {
            (Direction::FromHost, action)
        } else {
            return Err(DecodeError::UnknownChannel);
        };
        if action.is_empty() {
            return Err(DecodeError::EmptyAction);
        }
        Ok((direction, action))
    }
}

/// Why a raw string is not a bridge message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("not valid JSON")]
    NotJson,
    #[error("envelope has the wrong shape: {0}")]
    Malformed(String),
    #[error("channel has no recognised direction prefix")]
    UnknownChannel,
    #[error("channel names no action")]
    EmptyAction,
}

/// The unit exchanged in both directions.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub direction: Direction,
    pub action: String,
    /// Absent payloads decode to an empty object.
    pub payload: Value,
    /// Present when the sender expects exactly one reply.
    pub correlation_id: Option<String>,
    /// Milliseconds since the Unix epoch, set by the sender.
    pub timestamp: i64,
    /// Only meaningful on content → host messages.
    pub security_token: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireOut<'a> {
    channel: String,
    payload: &'a Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    correlation_id: Option<&'a str>,
    timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    security_token: Option<&'a str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireIn {
    channel: String,
    #[serde(default = "empty_payload")]
    payload: Value,
    #[serde(default)]
    correlation_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    timestamp: i64,
    #[serde(default)]
    security_token: Option<String>,
}

fn empty_payload() -> Value {
    Value::Object(Map::new())
}

/// JS senders occasionally produce fractional timestamps; truncate them.
fn lenient_timestamp<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or_default(),
        _ => 0,
    })
}

/// Current wall-clock time in milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl Message {
    pub fn new(direction: Direction, action: impl Into<String>, payload: Value) -> Self {
        Self {
            direction,
            action: action.into(),
            payload,
            correlation_id: None,
            timestamp: now_millis(),
            security_token: None,
        }
    }

    /// A content → host message.
    pub fn to_host(action: impl Into<String>, payload: Value) -> Self {
        Self::new(Direction::ToHost, action, payload)
    }

    /// A host → content message.
    pub fn from_host(action: impl Into<String>, payload: Value) -> Self {
        Self::new(Direction::FromHost, action, payload)
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.security_token = Some(token.into());
        self
    }

    pub fn channel(&self) -> String {
        self.direction.channel(&self.action)
    }

    /// Whether this message carries a `Reply`.
    pub fn is_reply(&self) -> bool {
        self.action == RESPONSE_ACTION
    }

    /// Serialize to the JSON wire form. Host → content messages never carry
    /// a security token, even if one was set.
    pub fn encode(&self) -> Result<String> {
        let security_token = match self.direction {
            Direction::ToHost => self.security_token.as_deref(),
            Direction::FromHost => None,
        };
        let wire = WireOut {
            channel: self.channel(),
            payload: &self.payload,
            correlation_id: self.correlation_id.as_deref(),
            timestamp: self.timestamp,
            security_token,
        };
        Ok(serde_json::to_string(&wire)?)
    }

    /// Parse a raw transport string.
    pub fn decode(raw: &str) -> std::result::Result<Self, DecodeError> {
        let value: Value = serde_json::from_str(raw).map_err(|_| DecodeError::NotJson)?;
        // Derived struct deserializers also accept positional arrays.
        if !value.is_object() {
            return Err(DecodeError::Malformed("envelope is not an object".into()));
        }
        let wire =
            WireIn::deserialize(value).map_err(|e| DecodeError::Malformed(e.to_string()))?;
        let (direction, action) = Direction::split_channel(&wire.channel)?;
        Ok(Self {
            direction,
            action: action.to_owned(),
            payload: wire.payload,
            correlation_id: wire.correlation_id,
            timestamp: wire.timestamp,
            security_token: wire.security_token,
        })
    }
}

/// Convenience wrapper over [`Message::encode`].
pub fn encode(
    direction: Direction,
    action: &str,
    payload: Value,
    correlation_id: Option<&str>,
) -> Result<String> {
    let mut message = Message::new(direction, action, payload);
    message.correlation_id = correlation_id.map(str::to_owned);
    message.encode()
}

/// Convenience wrapper over [`Message::decode`].
pub fn decode(raw: &str) -> std::result::Result<Message, DecodeError> {
    Message::decode(raw)
}

/// Payload of a `bridgeResponse` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub correlation_id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Reply {
    pub fn success(correlation_id: impl Into<String>, data: Value) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(correlation_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }

    pub fn from_result(
        correlation_id: impl Into<String>,
        result: std::result::Result<Value, String>,
    ) -> Self {
        match result {
            Ok(data) => Self::success(correlation_id, data),
            Err(error) => Self::failure(correlation_id, error),
        }
    }

    /// Extract a reply from a `bridgeResponse` payload.
    pub fn from_payload(payload: &Value) -> Option<Self> {
        Self::deserialize(payload).ok()
    }

    pub fn into_result(self) -> std::result::Result<Value, String> {
        if self.success {
            Ok(self.data.unwrap_or(Value::Null))
        } else {
            Err(self.error.unwrap_or_else(|| "Unknown error".into()))
        }
    }

    /// Wrap this reply in a `bridgeResponse` message.
    pub fn into_message(self, direction: Direction) -> Result<Message> {
        Ok(Message::new(
            direction,
            RESPONSE_ACTION,
            serde_json::to_value(self)?,
        ))
    }
}

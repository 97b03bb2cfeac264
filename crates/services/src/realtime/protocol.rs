//! Frames are JSON objects `{ "type": <event>, "data": <payload> }` in both
//! directions.

use bson::oid::ObjectId;
use serde::Serialize;
use thiserror::Error;

pub mod events {
    pub const CONNECTED: &str = "connected";
    pub const ORDER_NEW: &str = "order:new";
    pub const ORDER_UPDATED: &str = "order:updated";
    pub const NOTIFICATION_NEW: &str = "notification:new";
    pub const TOPIC_JOIN: &str = "topic:join";
    pub const TOPIC_LEAVE: &str = "topic:leave";
    pub const TOPIC_JOINED: &str = "topic:joined";
    pub const TOPIC_LEFT: &str = "topic:left";
    pub const PING: &str = "ping";
    pub const PONG: &str = "pong";
    pub const ERROR: &str = "error";
    pub const DISCONNECT: &str = "disconnect";
}

/// Why a channel stopped. Sent to the peer in the `disconnect` frame when the
/// server is the one closing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    ClientClosed,
    HeartbeatTimeout,
    TransportError,
    ServerShutdown,
    DeliveryFailed,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::ClientClosed => "client_closed",
            CloseReason::HeartbeatTimeout => "heartbeat_timeout",
            CloseReason::TransportError => "transport_error",
            CloseReason::ServerShutdown => "server_shutdown",
            CloseReason::DeliveryFailed => "delivery_failed",
        }
    }
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the registry hands to a channel's writer task.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// A serialized frame, ready to write.
    Event(String),
    /// Ask the writer to say goodbye and stop.
    Close(CloseReason),
}

pub fn frame(event: &str, data: &serde_json::Value) -> String {
    serde_json::json!({ "type": event, "data": data }).to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    JoinTopic(ObjectId),
    LeaveTopic(ObjectId),
    Ping,
    Pong,
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Malformed frame: {0}")]
    Malformed(String),
    #[error("Unknown message type: {0}")]
    UnknownType(String),
    #[error("Missing or invalid topic_id")]
    InvalidTopic,
}

impl ProtocolError {
    pub fn code(&self) -> &'static str {
        match self {
            ProtocolError::Malformed(_) => "MALFORMED",
            ProtocolError::UnknownType(_) => "UNKNOWN_TYPE",
            ProtocolError::InvalidTopic => "INVALID_TOPIC",
        }
    }
}

impl ClientMessage {
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let parsed: serde_json::Value =
            serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))?;

        let msg_type = parsed
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or_else(|| ProtocolError::Malformed("missing type".to_string()))?;
        let data = parsed.get("data");

        match msg_type {
            events::TOPIC_JOIN => Ok(ClientMessage::JoinTopic(topic_id(data)?)),
            events::TOPIC_LEAVE => Ok(ClientMessage::LeaveTopic(topic_id(data)?)),
            events::PING => Ok(ClientMessage::Ping),
            events::PONG => Ok(ClientMessage::Pong),
            other => Err(ProtocolError::UnknownType(other.to_string())),
        }
    }
}

fn topic_id(data: Option<&serde_json::Value>) -> Result<ObjectId, ProtocolError> {
    data.and_then(|d| d.get("topic_id"))
        .and_then(|t| t.as_str())
        .and_then(|s| ObjectId::parse_str(s).ok())
        .ok_or(ProtocolError::InvalidTopic)
}

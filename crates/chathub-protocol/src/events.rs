//! Event types for the chathub protocol.
//!
//! Events are adjacently tagged: the `event` field names the event and the
//! `data` field carries its payload. Unit events omit `data`.

use serde::{Deserialize, Serialize};

/// Delivery scope of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    /// Sent to every member of a room.
    #[serde(rename = "cong-khai")]
    Broadcast,
    /// Sent to a single recipient and echoed to the sender.
    #[serde(rename = "rieng")]
    Direct,
}

/// A chat message as delivered to clients and kept in history.
///
/// Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Monotonic message identifier.
    pub id: u64,
    /// Display name of the sender.
    #[serde(rename = "nguoiGui")]
    pub sender: String,
    /// Message body.
    #[serde(rename = "noidung")]
    pub body: String,
    /// Broadcast or direct.
    #[serde(rename = "loai")]
    pub scope: Scope,
    /// Room the message was broadcast to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    /// Wall-clock send time, `HH:MM:SS`.
    #[serde(rename = "thoigian")]
    pub sent_at: String,
}

/// Payload of a direct message request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectPayload {
    /// Display name of the recipient.
    #[serde(rename = "den")]
    pub to: String,
    /// Message body, validated by the hub.
    #[serde(rename = "noidung", default)]
    pub body: Option<serde_json::Value>,
}

/// Events sent from a client to the hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    /// Broadcast a message to the sender's room.
    ///
    /// The payload is kept untyped so non-textual input reaches the
    /// validator instead of failing to decode.
    #[serde(rename = "gui-tin-nhan")]
    SendMessage(Option<serde_json::Value>),

    /// Send a message to a single recipient.
    #[serde(rename = "gui-rieng")]
    SendDirect(DirectPayload),

    /// Move to another room.
    #[serde(rename = "join-room")]
    JoinRoom(String),

    /// The sender is typing.
    #[serde(rename = "dang-nhap-tin")]
    Typing,

    /// Echo of a `ping-check` timestamp.
    #[serde(rename = "pong-check")]
    PongCheck(u64),
}

impl ClientEvent {
    /// Wire name of the event.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::SendMessage(_) => "gui-tin-nhan",
            ClientEvent::SendDirect(_) => "gui-rieng",
            ClientEvent::JoinRoom(_) => "join-room",
            ClientEvent::Typing => "dang-nhap-tin",
            ClientEvent::PongCheck(_) => "pong-check",
        }
    }

    /// Create a broadcast message event.
    #[must_use]
    pub fn send_message(text: impl Into<String>) -> Self {
        ClientEvent::SendMessage(Some(serde_json::Value::String(text.into())))
    }

    /// Create a direct message event.
    #[must_use]
    pub fn send_direct(to: impl Into<String>, text: impl Into<String>) -> Self {
        ClientEvent::SendDirect(DirectPayload {
            to: to.into(),
            body: Some(serde_json::Value::String(text.into())),
        })
    }
}

/// Events sent from the hub to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// A delivered chat message.
    #[serde(rename = "nhan-tin-nhan")]
    Message(ChatMessage),

    /// Recent messages of a room, oldest first.
    #[serde(rename = "lich-su-tin-nhan")]
    History(Vec<ChatMessage>),

    /// Display names of every connected session, in connection order.
    #[serde(rename = "danh-sach-online")]
    OnlineList(Vec<String>),

    /// Join, leave and room-change notices.
    #[serde(rename = "thong-bao")]
    Notice(String),

    /// Validation, rate-limit and routing errors.
    #[serde(rename = "loi")]
    Error(String),

    /// Liveness probe carrying the hub's wall-clock time in milliseconds.
    #[serde(rename = "ping-check")]
    PingCheck(u64),

    /// Display name of a room member who is typing.
    #[serde(rename = "typing")]
    Typing(String),
}

impl ServerEvent {
    /// Wire name of the event.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Message(_) => "nhan-tin-nhan",
            ServerEvent::History(_) => "lich-su-tin-nhan",
            ServerEvent::OnlineList(_) => "danh-sach-online",
            ServerEvent::Notice(_) => "thong-bao",
            ServerEvent::Error(_) => "loi",
            ServerEvent::PingCheck(_) => "ping-check",
            ServerEvent::Typing(_) => "typing",
        }
    }
}

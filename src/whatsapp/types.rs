//! Event and payload types exchanged with the WhatsApp client.
//!
//! Field names follow the Baileys JSON shape (`remoteJid`, `fromMe`,
//! `extendedTextMessage`, ...) so payloads can be passed through verbatim.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Conversation identifier reserved for status updates.
pub const STATUS_BROADCAST_JID: &str = "status@broadcast";

/// Identifies a single message inside a conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageKey {
    /// Conversation the message belongs to.
    #[serde(default)]
    pub remote_jid: Option<String>,

    /// Whether the message was sent by this account.
    #[serde(default)]
    pub from_me: bool,

    /// Message id.
    #[serde(default)]
    pub id: Option<String>,

    /// Sender inside a group or broadcast.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant: Option<String>,
}

/// Text carried by an extended (quoted, link-preview, ...) message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtendedText {
    #[serde(default)]
    pub text: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Message payload. Unknown message types are kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageContent {
    /// Plain conversational body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extended_text_message: Option<ExtendedText>,

    /// Image attachment, kept opaque for the media download.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_message: Option<Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A message exactly as delivered in a `messages.upsert` batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMessage {
    #[serde(default)]
    pub key: MessageKey,

    #[serde(default)]
    pub message: Option<MessageContent>,

    /// Seconds since the epoch, as a number or a numeric string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_timestamp: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_name: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RawMessage {
    /// Returns the message timestamp in seconds, if present and numeric.
    #[must_use]
    pub fn timestamp_secs(&self) -> Option<i64> {
        match self.message_timestamp.as_ref()? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

/// Kind of a `messages.upsert` batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertKind {
    /// New messages received live.
    Notify,
    /// Messages replayed from history sync.
    Append,
}

/// A batch of new or synced messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagesUpsert {
    #[serde(rename = "upsertType")]
    pub kind: UpsertKind,

    #[serde(default)]
    pub messages: Vec<RawMessage>,
}

/// Connection phase reported by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionPhase {
    Connecting,
    Open,
    Close,
}

/// Status code explaining why a connection closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DisconnectReason(pub u16);

impl DisconnectReason {
    pub const CONNECTION_LOST: Self = Self(408);
    pub const LOGGED_OUT: Self = Self(401);
    pub const CONNECTION_CLOSED: Self = Self(428);
    pub const CONNECTION_REPLACED: Self = Self(440);
    pub const BAD_SESSION: Self = Self(500);
    pub const RESTART_REQUIRED: Self = Self(515);

    /// The server revoked the session; only re-pairing recovers from this.
    #[must_use]
    pub fn is_logged_out(self) -> bool {
        self == Self::LOGGED_OUT
    }

    /// Human-readable name of the reason.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self.0 {
            401 => "logged out",
            408 => "connection lost",
            428 => "connection closed",
            440 => "connection replaced",
            500 => "bad session",
            515 => "restart required",
            _ => "unknown",
        }
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.0)
    }
}

/// Details of the last disconnect.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastDisconnect {
    #[serde(default)]
    pub status_code: Option<DisconnectReason>,

    #[serde(default)]
    pub message: Option<String>,
}

/// A `connection.update` event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionUpdate {
    #[serde(default)]
    pub connection: Option<ConnectionPhase>,

    #[serde(default)]
    pub last_disconnect: Option<LastDisconnect>,

    /// Pairing challenge to show the operator.
    #[serde(default)]
    pub qr: Option<String>,
}

impl ConnectionUpdate {
    /// Builds a `close` update with the given reason.
    #[must_use]
    pub fn closed(reason: DisconnectReason, message: impl Into<String>) -> Self {
        Self {
            connection: Some(ConnectionPhase::Close),
            last_disconnect: Some(LastDisconnect {
                status_code: Some(reason),
                message: Some(message.into()),
            }),
            qr: None,
        }
    }

    /// Returns the disconnect status code, if any.
    #[must_use]
    pub fn disconnect_reason(&self) -> Option<DisconnectReason> {
        self.last_disconnect.as_ref()?.status_code
    }
}

/// Events delivered by a connected session, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    ConnectionUpdate(ConnectionUpdate),
    MessagesUpsert(MessagesUpsert),
    /// Fresh credentials to hand to the persistence hook.
    CredsUpdate(Value),
}

/// Content of an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundPayload {
    Text { text: String },
    /// Emoji attached to an existing message.
    Reaction { emoji: String, key: MessageKey },
    /// Image bytes to send back as a sticker.
    Sticker { data: Vec<u8> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_upsert_batch() {
        let json = r#"{
            "upsertType": "notify",
            "messages": [{
                "key": {"remoteJid": "123@s.whatsapp.net", "fromMe": false, "id": "ABC"},
                "message": {"conversation": "Hello"},
                "messageTimestamp": 1700000000,
                "pushName": "Sam"
            }]
        }"#;
        let upsert: MessagesUpsert = serde_json::from_str(json).unwrap();
        assert_eq!(upsert.kind, UpsertKind::Notify);
        let msg = &upsert.messages[0];
        assert_eq!(msg.key.remote_jid.as_deref(), Some("123@s.whatsapp.net"));
        assert_eq!(
            msg.message.as_ref().unwrap().conversation.as_deref(),
            Some("Hello")
        );
        assert_eq!(msg.timestamp_secs(), Some(1_700_000_000));
    }

    #[test]
    fn test_timestamp_as_string() {
        let msg: RawMessage =
            serde_json::from_str(r#"{"key": {}, "messageTimestamp": "1700000001"}"#).unwrap();
        assert_eq!(msg.timestamp_secs(), Some(1_700_000_001));
    }

    #[test]
    fn test_unknown_message_fields_survive() {
        let json = r#"{
            "key": {"remoteJid": "1@s.whatsapp.net", "id": "X"},
            "message": {
                "imageMessage": {"url": "https://mmg", "mediaKey": "k", "caption": "!sticker"},
                "messageContextInfo": {"deviceListMetadata": {}}
            }
        }"#;
        let msg: RawMessage = serde_json::from_str(json).unwrap();
        let content = msg.message.as_ref().unwrap();
        assert!(content.image_message.is_some());
        assert!(content.extra.contains_key("messageContextInfo"));

        let back = serde_json::to_value(&msg).unwrap();
        assert_eq!(back["message"]["imageMessage"]["mediaKey"], "k");
    }

    #[test]
    fn test_parse_connection_update() {
        let json = r#"{"connection": "close", "lastDisconnect": {"statusCode": 401}}"#;
        let update: ConnectionUpdate = serde_json::from_str(json).unwrap();
        assert_eq!(update.connection, Some(ConnectionPhase::Close));
        assert!(update.disconnect_reason().unwrap().is_logged_out());
    }

    #[test]
    fn test_disconnect_reason_display() {
        assert_eq!(
            DisconnectReason::RESTART_REQUIRED.to_string(),
            "restart required (515)"
        );
        assert_eq!(DisconnectReason(999).name(), "unknown");
    }
}

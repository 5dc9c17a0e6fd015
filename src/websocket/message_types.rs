use crate::models::MessageStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Inbound WebSocket events from client to server
///
/// Wire shape: `{"event": "send-message", "data": {"toUserId": ..., "message": ...}}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    #[serde(rename_all = "camelCase")]
    SendMessage { to_user_id: Uuid, message: String },

    #[serde(rename_all = "camelCase")]
    ReadReceipt { message_id: Uuid },

    #[serde(rename_all = "camelCase")]
    TypingStart { to_user_id: Uuid },

    #[serde(rename_all = "camelCase")]
    TypingStop { to_user_id: Uuid },

    #[serde(rename_all = "camelCase")]
    DeleteForMe { message_id: Uuid },

    #[serde(rename_all = "camelCase")]
    Unsend { message_id: Uuid },
}

impl ClientEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            ClientEvent::SendMessage { .. } => "send-message",
            ClientEvent::ReadReceipt { .. } => "read-receipt",
            ClientEvent::TypingStart { .. } => "typing-start",
            ClientEvent::TypingStop { .. } => "typing-stop",
            ClientEvent::DeleteForMe { .. } => "delete-for-me",
            ClientEvent::Unsend { .. } => "unsend",
        }
    }
}

/// Outbound WebSocket events from server to client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    #[serde(rename_all = "camelCase")]
    MessageDelivered {
        id: Uuid,
        from_user_id: Uuid,
        message: String,
        status: MessageStatus,
        created_at: DateTime<Utc>,
    },

    #[serde(rename_all = "camelCase")]
    MessageStatus {
        message_id: Uuid,
        status: MessageStatus,
    },

    #[serde(rename_all = "camelCase")]
    TypingStart { from_user_id: Uuid },

    #[serde(rename_all = "camelCase")]
    TypingStop { from_user_id: Uuid },

    #[serde(rename_all = "camelCase")]
    MessageDeletedForMe { message_id: Uuid },

    #[serde(rename_all = "camelCase")]
    MessageUnsent { message_id: Uuid },

    /// Refreshed per-sender unread counts for the receiving user
    UnreadCounts { counts: HashMap<Uuid, i64> },

    Error(String),
}

impl ServerEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            ServerEvent::MessageDelivered { .. } => "message-delivered",
            ServerEvent::MessageStatus { .. } => "message-status",
            ServerEvent::TypingStart { .. } => "typing-start",
            ServerEvent::TypingStop { .. } => "typing-stop",
            ServerEvent::MessageDeletedForMe { .. } => "message-deleted-for-me",
            ServerEvent::MessageUnsent { .. } => "message-unsent",
            ServerEvent::UnreadCounts { .. } => "unread-counts",
            ServerEvent::Error(_) => "error",
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

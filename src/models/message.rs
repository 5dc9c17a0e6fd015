use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Delivery lifecycle of a direct message.
///
/// Variants are declared in lifecycle order; `Ord` follows that order and the
/// Postgres enum `message_status` is declared the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageStatus {
    Sent,
    Delivered,
    Read,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Sent => "SENT",
            MessageStatus::Delivered => "DELIVERED",
            MessageStatus::Read => "READ",
        }
    }

    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "SENT" => Some(MessageStatus::Sent),
            "DELIVERED" => Some(MessageStatus::Delivered),
            "READ" => Some(MessageStatus::Read),
            _ => None,
        }
    }

    /// Forward-only transition: `None` when `target` is not ahead of `self`
    pub fn advance_to(self, target: MessageStatus) -> Option<MessageStatus> {
        (target > self).then_some(target)
    }
}

/// Message row
///
/// `deleted_for` behaves as a grow-only set of viewers the message is hidden
/// for; the row itself is never removed by chat operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub content: String,
    pub status: MessageStatus,
    pub created_at: DateTime<Utc>,
    pub deleted_for: Vec<Uuid>,
}

impl Message {
    pub fn new(sender_id: Uuid, receiver_id: Uuid, content: String, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender_id,
            receiver_id,
            content,
            status: MessageStatus::Sent,
            created_at,
            deleted_for: Vec::new(),
        }
    }

    pub fn involves(&self, user_id: Uuid) -> bool {
        self.sender_id == user_id || self.receiver_id == user_id
    }

    pub fn is_between(&self, user_a: Uuid, user_b: Uuid) -> bool {
        (self.sender_id == user_a && self.receiver_id == user_b)
            || (self.sender_id == user_b && self.receiver_id == user_a)
    }

    /// The other participant, as seen from `user_id`
    pub fn counterpart(&self, user_id: Uuid) -> Option<Uuid> {
        if self.sender_id == user_id {
            Some(self.receiver_id)
        } else if self.receiver_id == user_id {
            Some(self.sender_id)
        } else {
            None
        }
    }

    pub fn is_visible_to(&self, viewer: Uuid) -> bool {
        !self.deleted_for.contains(&viewer)
    }

    /// Set union; returns true when the set grew
    pub fn hide_for(&mut self, viewers: &[Uuid]) -> bool {
        let before = self.deleted_for.len();
        for viewer in viewers {
            if !self.deleted_for.contains(viewer) {
                self.deleted_for.push(*viewer);
            }
        }
        self.deleted_for.len() != before
    }
}

/// Conversation list entry, derived per counterpart on demand
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationView {
    pub other_user_id: Uuid,
    pub last_message: Message,
    pub unread_count: i64,
}

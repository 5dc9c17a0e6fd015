//! # Message Store
//!
//! Direct-message persistence and the read-side aggregates built on it.
//!
//! ## Delivery state machine
//!
//! `SENT -> DELIVERED -> READ`. Transitions are forward-only; re-applying a
//! transition at or behind the current state is a no-op, not an error.
//!
//! ## Visibility
//!
//! `delete_for_user` and `unsend` only grow `deleted_for`. `history` returns
//! hidden rows too; callers filter with `Message::is_visible_to` when they
//! present the page.
//!
//! ## Unread aggregates
//!
//! `unread_counts` counts SENT and DELIVERED rows per sender while
//! `conversations` counts DELIVERED rows only. Clients depend on both
//! numbers as they are, so the two definitions are kept apart.

use crate::error::{AppError, AppResult};
use crate::models::{ConversationView, Message, MessageStatus};
use crate::services::message_repository::MessageRepository;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Hands out strictly increasing timestamps (microsecond resolution, the
/// precision of `timestamptz`)
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last_micros: AtomicI64,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> DateTime<Utc> {
        let wall = Utc::now().timestamp_micros();
        let previous = self
            .last_micros
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(wall.max(last + 1))
            })
            .unwrap_or(wall);
        let micros = wall.max(previous + 1);
        DateTime::<Utc>::from_timestamp_micros(micros).unwrap_or_else(Utc::now)
    }
}

pub struct MessageStore {
    repo: Arc<dyn MessageRepository>,
    clock: MonotonicClock,
}

impl MessageStore {
    pub fn new(repo: Arc<dyn MessageRepository>) -> Self {
        Self {
            repo,
            clock: MonotonicClock::new(),
        }
    }

    /// Persist a new message in state SENT
    pub async fn create(
        &self,
        sender_id: Uuid,
        receiver_id: Uuid,
        content: &str,
    ) -> AppResult<Message> {
        if content.is_empty() {
            return Err(AppError::BadRequest(
                "Message content cannot be empty".to_string(),
            ));
        }

        let message = Message::new(sender_id, receiver_id, content.to_string(), self.clock.now());
        self.repo.insert(&message).await?;

        tracing::debug!(
            message_id = %message.id,
            sender_id = %sender_id,
            receiver_id = %receiver_id,
            "message persisted"
        );
        Ok(message)
    }

    pub async fn find(&self, id: Uuid) -> AppResult<Message> {
        self.repo.find(id).await?.ok_or(AppError::NotFound)
    }

    pub async fn mark_delivered(&self, id: Uuid) -> AppResult<Message> {
        self.advance(id, MessageStatus::Delivered).await
    }

    pub async fn mark_read(&self, id: Uuid) -> AppResult<Message> {
        self.advance(id, MessageStatus::Read).await
    }

    async fn advance(&self, id: Uuid, target: MessageStatus) -> AppResult<Message> {
        let message = self
            .repo
            .advance_status(id, target)
            .await?
            .ok_or(AppError::NotFound)?;

        tracing::debug!(
            message_id = %id,
            target = target.as_str(),
            status = message.status.as_str(),
            "status transition applied"
        );
        Ok(message)
    }

    /// Conversation page between two users, oldest first.
    ///
    /// `before` is a keyset cursor: only messages strictly older than the
    /// cursor message are returned. The cursor must belong to the pair.
    pub async fn history(
        &self,
        user_a: Uuid,
        user_b: Uuid,
        limit: i64,
        before: Option<Uuid>,
    ) -> AppResult<Vec<Message>> {
        if limit <= 0 {
            return Ok(Vec::new());
        }

        let cutoff = match before {
            Some(cursor_id) => {
                let cursor = self.find(cursor_id).await?;
                if !cursor.is_between(user_a, user_b) {
                    return Err(AppError::NotFound);
                }
                Some(cursor.created_at)
            }
            None => None,
        };

        let mut page = self.repo.page_between(user_a, user_b, limit, cutoff).await?;
        page.reverse();
        Ok(page)
    }

    /// Received messages not yet READ (SENT or DELIVERED), per sender
    pub async fn unread_counts(&self, user_id: Uuid) -> AppResult<HashMap<Uuid, i64>> {
        self.repo
            .count_received_by_sender(user_id, &[MessageStatus::Sent, MessageStatus::Delivered])
            .await
    }

    /// One entry per counterpart with the latest message visible to
    /// `user_id`; newest conversation first
    pub async fn conversations(&self, user_id: Uuid) -> AppResult<Vec<ConversationView>> {
        let messages = self.repo.involving(user_id).await?;
        let delivered = self
            .repo
            .count_received_by_sender(user_id, &[MessageStatus::Delivered])
            .await?;

        let mut seen = HashSet::new();
        let mut views = Vec::new();
        for message in messages {
            if !message.is_visible_to(user_id) {
                continue;
            }
            let Some(other_user_id) = message.counterpart(user_id) else {
                continue;
            };
            if !seen.insert(other_user_id) {
                continue;
            }

            views.push(ConversationView {
                other_user_id,
                unread_count: delivered.get(&other_user_id).copied().unwrap_or(0),
                last_message: message,
            });
        }
        Ok(views)
    }

    /// Hide a message for one viewer; idempotent
    pub async fn delete_for_user(&self, id: Uuid, user_id: Uuid) -> AppResult<Message> {
        self.repo
            .hide_for(id, &[user_id])
            .await?
            .ok_or(AppError::NotFound)
    }

    /// Hide a message for both participants. Only the sender may unsend;
    /// status and the row itself are left untouched.
    pub async fn unsend(&self, id: Uuid, requester_id: Uuid) -> AppResult<Message> {
        let message = self.find(id).await?;
        if message.sender_id != requester_id {
            tracing::warn!(
                message_id = %id,
                requester_id = %requester_id,
                "unsend rejected: requester is not the sender"
            );
            return Err(AppError::Forbidden);
        }

        self.repo
            .hide_for(id, &[message.sender_id, message.receiver_id])
            .await?
            .ok_or(AppError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::message_repository::InMemoryMessageRepository;

    fn store() -> (MessageStore, Arc<InMemoryMessageRepository>) {
        let repo = Arc::new(InMemoryMessageRepository::new());
        (MessageStore::new(repo.clone()), repo)
    }

    #[test]
    fn test_clock_is_strictly_increasing() {
        let clock = MonotonicClock::new();
        let mut last = clock.now();
        for _ in 0..1000 {
            let next = clock.now();
            assert!(next > last);
            last = next;
        }
    }

    #[tokio::test]
    async fn test_create_starts_as_sent() {
        let (store, _) = store();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        let m = store.create(a, b, "hi").await.unwrap();
        assert_eq!(m.status, MessageStatus::Sent);
        assert_eq!(m.sender_id, a);
        assert_eq!(m.receiver_id, b);
        assert!(m.deleted_for.is_empty());
    }

    #[tokio::test]
    async fn test_create_rejects_empty_content() {
        let (store, repo) = store();
        let result = store.create(Uuid::new_v4(), Uuid::new_v4(), "").await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
        assert!(repo.is_empty().await);
    }

    #[tokio::test]
    async fn test_create_keeps_whitespace_only_content() {
        let (store, _) = store();
        let m = store.create(Uuid::new_v4(), Uuid::new_v4(), "   ").await.unwrap();
        assert_eq!(store.find(m.id).await.unwrap().content, "   ");
    }

    #[tokio::test]
    async fn test_create_surfaces_persistence_error() {
        let (store, repo) = store();
        repo.set_unavailable(true);
        let result = store.create(Uuid::new_v4(), Uuid::new_v4(), "hi").await;
        assert!(matches!(result, Err(AppError::Persistence(_))));
    }

    #[tokio::test]
    async fn test_transitions_are_forward_only_and_idempotent() {
        let (store, _) = store();
        let m = store.create(Uuid::new_v4(), Uuid::new_v4(), "hi").await.unwrap();

        assert_eq!(store.mark_delivered(m.id).await.unwrap().status, MessageStatus::Delivered);
        assert_eq!(store.mark_delivered(m.id).await.unwrap().status, MessageStatus::Delivered);
        assert_eq!(store.mark_read(m.id).await.unwrap().status, MessageStatus::Read);
        assert_eq!(store.mark_delivered(m.id).await.unwrap().status, MessageStatus::Read);
        assert_eq!(store.mark_read(m.id).await.unwrap().status, MessageStatus::Read);
    }

    #[tokio::test]
    async fn test_transitions_on_unknown_id_fail() {
        let (store, _) = store();
        assert_eq!(store.mark_delivered(Uuid::new_v4()).await, Err(AppError::NotFound));
        assert_eq!(store.mark_read(Uuid::new_v4()).await, Err(AppError::NotFound));
    }

    #[tokio::test]
    async fn test_history_is_oldest_first_with_keyset_cursor() {
        let (store, _) = store();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        let mut ids = Vec::new();
        for i in 0..5 {
            let (from, to) = if i % 2 == 0 { (a, b) } else { (b, a) };
            ids.push(store.create(from, to, &format!("m{i}")).await.unwrap().id);
        }
        store.create(a, Uuid::new_v4(), "elsewhere").await.unwrap();

        let latest: Vec<Uuid> = store.history(a, b, 2, None).await.unwrap().iter().map(|m| m.id).collect();
        assert_eq!(latest, vec![ids[3], ids[4]]);

        let before_third: Vec<Uuid> = store
            .history(a, b, 2, Some(ids[2]))
            .await
            .unwrap()
            .iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(before_third, vec![ids[0], ids[1]]);

        assert!(store.history(b, a, 10, Some(ids[0])).await.unwrap().is_empty());
        assert!(store.history(a, b, 0, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_history_cursor_must_exist_and_belong_to_pair() {
        let (store, _) = store();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let foreign = store.create(a, c, "x").await.unwrap();

        assert_eq!(store.history(a, b, 10, Some(Uuid::new_v4())).await, Err(AppError::NotFound));
        assert_eq!(store.history(a, b, 10, Some(foreign.id)).await, Err(AppError::NotFound));
    }

    #[tokio::test]
    async fn test_history_keeps_hidden_messages() {
        let (store, _) = store();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let m = store.create(a, b, "hi").await.unwrap();
        store.delete_for_user(m.id, b).await.unwrap();

        let page = store.history(b, a, 10, None).await.unwrap();
        assert_eq!(page.len(), 1);
        assert!(!page[0].is_visible_to(b));
    }

    #[tokio::test]
    async fn test_unread_and_conversation_counts_differ() {
        let (store, _) = store();
        let (me, friend) = (Uuid::new_v4(), Uuid::new_v4());

        let sent_only = store.create(friend, me, "one").await.unwrap();
        let delivered = store.create(friend, me, "two").await.unwrap();
        store.mark_delivered(delivered.id).await.unwrap();
        let read = store.create(friend, me, "three").await.unwrap();
        store.mark_read(read.id).await.unwrap();

        let unread = store.unread_counts(me).await.unwrap();
        assert_eq!(unread.get(&friend), Some(&2));

        let conversations = store.conversations(me).await.unwrap();
        assert_eq!(conversations.len(), 1);
        assert_eq!(conversations[0].other_user_id, friend);
        assert_eq!(conversations[0].unread_count, 1);
        assert_eq!(conversations[0].last_message.id, read.id);

        store.mark_read(sent_only.id).await.unwrap();
        assert_eq!(store.unread_counts(me).await.unwrap().get(&friend), Some(&1));
    }

    #[tokio::test]
    async fn test_conversations_newest_first_one_per_counterpart() {
        let (store, _) = store();
        let (me, x, y) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        store.create(me, x, "to x").await.unwrap();
        store.create(y, me, "from y").await.unwrap();
        let latest_x = store.create(x, me, "from x").await.unwrap();

        let views = store.conversations(me).await.unwrap();
        let others: Vec<Uuid> = views.iter().map(|v| v.other_user_id).collect();
        assert_eq!(others, vec![x, y]);
        assert_eq!(views[0].last_message.id, latest_x.id);
    }

    #[tokio::test]
    async fn test_conversations_skip_hidden_latest_message() {
        let (store, _) = store();
        let (me, x) = (Uuid::new_v4(), Uuid::new_v4());

        let older = store.create(x, me, "older").await.unwrap();
        let newer = store.create(x, me, "newer").await.unwrap();
        store.delete_for_user(newer.id, me).await.unwrap();

        let views = store.conversations(me).await.unwrap();
        assert_eq!(views[0].last_message.id, older.id);

        let theirs = store.conversations(x).await.unwrap();
        assert_eq!(theirs[0].last_message.id, newer.id);
    }

    #[tokio::test]
    async fn test_delete_for_user_is_idempotent() {
        let (store, _) = store();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let m = store.create(a, b, "hi").await.unwrap();

        let once = store.delete_for_user(m.id, b).await.unwrap();
        let twice = store.delete_for_user(m.id, b).await.unwrap();
        assert_eq!(once.deleted_for, twice.deleted_for);
        assert_eq!(twice.deleted_for, vec![b]);

        assert_eq!(store.delete_for_user(Uuid::new_v4(), b).await, Err(AppError::NotFound));
    }

    #[tokio::test]
    async fn test_unsend_by_sender_hides_for_both() {
        let (store, _) = store();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let m = store.create(a, b, "oops").await.unwrap();
        store.mark_delivered(m.id).await.unwrap();

        let unsent = store.unsend(m.id, a).await.unwrap();
        assert!(!unsent.is_visible_to(a));
        assert!(!unsent.is_visible_to(b));
        assert_eq!(unsent.status, MessageStatus::Delivered);
        assert_eq!(store.find(m.id).await.unwrap().content, "oops");
    }

    #[tokio::test]
    async fn test_unsend_by_non_sender_is_forbidden_and_changes_nothing() {
        let (store, _) = store();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let m = store.create(a, b, "hi").await.unwrap();
        store.delete_for_user(m.id, b).await.unwrap();
        let before = store.find(m.id).await.unwrap();

        assert_eq!(store.unsend(m.id, b).await, Err(AppError::Forbidden));
        assert_eq!(store.unsend(m.id, Uuid::new_v4()).await, Err(AppError::Forbidden));

        let after = store.find(m.id).await.unwrap();
        assert_eq!(after.status, before.status);
        assert_eq!(after.deleted_for, before.deleted_for);
    }

    #[tokio::test]
    async fn test_unsend_keeps_existing_hides() {
        let (store, _) = store();
        let (a, b, stranger) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let m = store.create(a, b, "hi").await.unwrap();
        store.delete_for_user(m.id, stranger).await.unwrap();

        let unsent = store.unsend(m.id, a).await.unwrap();
        assert!(unsent.deleted_for.contains(&stranger));
        assert!(unsent.deleted_for.contains(&a));
        assert!(unsent.deleted_for.contains(&b));
    }
}

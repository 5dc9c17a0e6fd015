//! Storage seam for messages.
//!
//! `MessageStore` owns the chat rules; repositories only persist rows and
//! answer predicate queries. Two implementations exist: PostgreSQL
//! (`PgMessageRepository`) and the in-memory arena below.

use crate::error::{AppError, AppResult};
use crate::models::{Message, MessageStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn insert(&self, message: &Message) -> AppResult<()>;

    async fn find(&self, id: Uuid) -> AppResult<Option<Message>>;

    /// Move `status` forward to `target` if it is behind it.
    ///
    /// Returns the stored row after the call, or `None` if `id` is unknown.
    async fn advance_status(&self, id: Uuid, target: MessageStatus) -> AppResult<Option<Message>>;

    /// Union `viewers` into `deleted_for`.
    ///
    /// Returns the stored row after the call, or `None` if `id` is unknown.
    async fn hide_for(&self, id: Uuid, viewers: &[Uuid]) -> AppResult<Option<Message>>;

    /// Messages between the pair in either direction, newest first, at most
    /// `limit`, optionally restricted to `created_at < before`.
    async fn page_between(
        &self,
        user_a: Uuid,
        user_b: Uuid,
        limit: i64,
        before: Option<DateTime<Utc>>,
    ) -> AppResult<Vec<Message>>;

    /// Every message sent or received by `user_id`, newest first
    async fn involving(&self, user_id: Uuid) -> AppResult<Vec<Message>>;

    /// Count messages received by `receiver_id` whose status is in
    /// `statuses`, grouped by sender
    async fn count_received_by_sender(
        &self,
        receiver_id: Uuid,
        statuses: &[MessageStatus],
    ) -> AppResult<HashMap<Uuid, i64>>;
}

#[derive(Default)]
struct Arena {
    messages: Vec<Message>,
    index: HashMap<Uuid, usize>,
    // slot -> viewers the message is hidden for
    hidden: HashMap<usize, Vec<Uuid>>,
}

impl Arena {
    fn materialize(&self, slot: usize) -> Message {
        let mut message = self.messages[slot].clone();
        message.deleted_for = self.hidden.get(&slot).cloned().unwrap_or_default();
        message
    }

    fn newest_first(&self, filter: impl Fn(&Message) -> bool) -> Vec<usize> {
        let mut slots: Vec<usize> = (0..self.messages.len())
            .filter(|slot| filter(&self.messages[*slot]))
            .collect();
        slots.sort_by(|a, b| {
            self.messages[*b]
                .created_at
                .cmp(&self.messages[*a].created_at)
        });
        slots
    }
}

/// Process-local message storage: an arena of rows addressed by id plus a
/// side table of per-viewer hide flags
#[derive(Default)]
pub struct InMemoryMessageRepository {
    arena: RwLock<Arena>,
    unavailable: AtomicBool,
}

impl InMemoryMessageRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with `Persistence` until switched back
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.arena.read().await.messages.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn check_available(&self) -> AppResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::Persistence("repository unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn insert(&self, message: &Message) -> AppResult<()> {
        self.check_available()?;
        let mut arena = self.arena.write().await;
        if arena.index.contains_key(&message.id) {
            return Err(AppError::Persistence(format!(
                "duplicate message id {}",
                message.id
            )));
        }

        let slot = arena.messages.len();
        let mut row = message.clone();
        let hidden = std::mem::take(&mut row.deleted_for);
        arena.messages.push(row);
        arena.index.insert(message.id, slot);
        if !hidden.is_empty() {
            arena.hidden.insert(slot, hidden);
        }
        Ok(())
    }

    async fn find(&self, id: Uuid) -> AppResult<Option<Message>> {
        self.check_available()?;
        let arena = self.arena.read().await;
        Ok(arena.index.get(&id).map(|slot| arena.materialize(*slot)))
    }

    async fn advance_status(&self, id: Uuid, target: MessageStatus) -> AppResult<Option<Message>> {
        self.check_available()?;
        let mut arena = self.arena.write().await;
        let Some(slot) = arena.index.get(&id).copied() else {
            return Ok(None);
        };

        let row = &mut arena.messages[slot];
        if let Some(next) = row.status.advance_to(target) {
            row.status = next;
        }
        Ok(Some(arena.materialize(slot)))
    }

    async fn hide_for(&self, id: Uuid, viewers: &[Uuid]) -> AppResult<Option<Message>> {
        self.check_available()?;
        let mut arena = self.arena.write().await;
        let Some(slot) = arena.index.get(&id).copied() else {
            return Ok(None);
        };

        let mut message = arena.materialize(slot);
        if message.hide_for(viewers) {
            arena.hidden.insert(slot, message.deleted_for.clone());
        }
        Ok(Some(message))
    }

    async fn page_between(
        &self,
        user_a: Uuid,
        user_b: Uuid,
        limit: i64,
        before: Option<DateTime<Utc>>,
    ) -> AppResult<Vec<Message>> {
        self.check_available()?;
        let arena = self.arena.read().await;
        let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);

        Ok(arena
            .newest_first(move |m| {
                m.is_between(user_a, user_b) && before.map_or(true, |cutoff| m.created_at < cutoff)
            })
            .into_iter()
            .take(limit)
            .map(|slot| arena.materialize(slot))
            .collect())
    }

    async fn involving(&self, user_id: Uuid) -> AppResult<Vec<Message>> {
        self.check_available()?;
        let arena = self.arena.read().await;
        Ok(arena
            .newest_first(move |m| m.involves(user_id))
            .into_iter()
            .map(|slot| arena.materialize(slot))
            .collect())
    }

    async fn count_received_by_sender(
        &self,
        receiver_id: Uuid,
        statuses: &[MessageStatus],
    ) -> AppResult<HashMap<Uuid, i64>> {
        self.check_available()?;
        let arena = self.arena.read().await;
        let mut counts = HashMap::new();
        for message in arena
            .messages
            .iter()
            .filter(|m| m.receiver_id == receiver_id && statuses.contains(&m.status))
        {
            *counts.entry(message.sender_id).or_insert(0) += 1;
        }
        Ok(counts)
    }
}

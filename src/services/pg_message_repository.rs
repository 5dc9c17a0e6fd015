use crate::error::{AppError, AppResult};
use crate::models::{Message, MessageStatus};
use crate::services::message_repository::MessageRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;
use std::collections::HashMap;
use tokio_postgres::Row;
use uuid::Uuid;

const MESSAGE_COLUMNS: &str =
    "id, sender_id, receiver_id, content, status::text AS status, created_at, deleted_for";

fn row_to_message(row: &Row) -> AppResult<Message> {
    let status: String = row.get("status");
    let status = MessageStatus::from_db(&status)
        .ok_or_else(|| AppError::Persistence(format!("unknown message status {status}")))?;

    Ok(Message {
        id: row.get("id"),
        sender_id: row.get("sender_id"),
        receiver_id: row.get("receiver_id"),
        content: row.get("content"),
        status,
        created_at: row.get("created_at"),
        deleted_for: row.get("deleted_for"),
    })
}

/// PostgreSQL-backed message storage
#[derive(Clone)]
pub struct PgMessageRepository {
    db: Pool,
}

impl PgMessageRepository {
    pub fn new(db: Pool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn insert(&self, message: &Message) -> AppResult<()> {
        let client = self.db.get().await?;
        client
            .execute(
                r#"
                INSERT INTO messages (id, sender_id, receiver_id, content, status, created_at, deleted_for)
                VALUES ($1, $2, $3, $4, $5::text::message_status, $6, $7)
                "#,
                &[
                    &message.id,
                    &message.sender_id,
                    &message.receiver_id,
                    &message.content,
                    &message.status.as_str(),
                    &message.created_at,
                    &message.deleted_for,
                ],
            )
            .await?;
        Ok(())
    }

    async fn find(&self, id: Uuid) -> AppResult<Option<Message>> {
        let client = self.db.get().await?;
        let row = client
            .query_opt(
                &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = $1"),
                &[&id],
            )
            .await?;
        row.as_ref().map(row_to_message).transpose()
    }

    async fn advance_status(&self, id: Uuid, target: MessageStatus) -> AppResult<Option<Message>> {
        // Enum order is SENT < DELIVERED < READ, so the guard is forward-only
        let updated = {
            let client = self.db.get().await?;
            client
                .query_opt(
                    &format!(
                        r#"
                        UPDATE messages
                        SET status = $2::text::message_status
                        WHERE id = $1 AND status < $2::text::message_status
                        RETURNING {MESSAGE_COLUMNS}
                        "#
                    ),
                    &[&id, &target.as_str()],
                )
                .await?
        };

        match updated {
            Some(row) => row_to_message(&row).map(Some),
            None => self.find(id).await,
        }
    }

    async fn hide_for(&self, id: Uuid, viewers: &[Uuid]) -> AppResult<Option<Message>> {
        let client = self.db.get().await?;
        let viewers = viewers.to_vec();
        let row = client
            .query_opt(
                &format!(
                    r#"
                    UPDATE messages
                    SET deleted_for = ARRAY(
                        SELECT v
                        FROM unnest(deleted_for || $2::uuid[]) WITH ORDINALITY AS t(v, n)
                        GROUP BY v
                        ORDER BY min(n)
                    )
                    WHERE id = $1
                    RETURNING {MESSAGE_COLUMNS}
                    "#
                ),
                &[&id, &viewers],
            )
            .await?;
        row.as_ref().map(row_to_message).transpose()
    }

    async fn page_between(
        &self,
        user_a: Uuid,
        user_b: Uuid,
        limit: i64,
        before: Option<DateTime<Utc>>,
    ) -> AppResult<Vec<Message>> {
        let client = self.db.get().await?;
        let rows = client
            .query(
                &format!(
                    r#"
                    SELECT {MESSAGE_COLUMNS}
                    FROM messages
                    WHERE ((sender_id = $1 AND receiver_id = $2)
                        OR (sender_id = $2 AND receiver_id = $1))
                      AND ($3::timestamptz IS NULL OR created_at < $3)
                    ORDER BY created_at DESC
                    LIMIT $4
                    "#
                ),
                &[&user_a, &user_b, &before, &limit],
            )
            .await?;
        rows.iter().map(row_to_message).collect()
    }

    async fn involving(&self, user_id: Uuid) -> AppResult<Vec<Message>> {
        let client = self.db.get().await?;
        let rows = client
            .query(
                &format!(
                    r#"
                    SELECT {MESSAGE_COLUMNS}
                    FROM messages
                    WHERE sender_id = $1 OR receiver_id = $1
                    ORDER BY created_at DESC
                    "#
                ),
                &[&user_id],
            )
            .await?;
        rows.iter().map(row_to_message).collect()
    }

    async fn count_received_by_sender(
        &self,
        receiver_id: Uuid,
        statuses: &[MessageStatus],
    ) -> AppResult<HashMap<Uuid, i64>> {
        let client = self.db.get().await?;
        let names: Vec<&str> = statuses.iter().map(MessageStatus::as_str).collect();
        let rows = client
            .query(
                r#"
                SELECT sender_id, COUNT(*) AS unread
                FROM messages
                WHERE receiver_id = $1 AND status::text = ANY($2::text[])
                GROUP BY sender_id
                "#,
                &[&receiver_id, &names],
            )
            .await?;

        Ok(rows
            .iter()
            .map(|row| (row.get::<_, Uuid>("sender_id"), row.get::<_, i64>("unread")))
            .collect())
    }
}

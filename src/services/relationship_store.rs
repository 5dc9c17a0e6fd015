//! Read-only access to the follow graph.
//!
//! Follow edges are owned by the social graph; this service only asks
//! whether an ACCEPTED edge exists between two users and who a user is
//! connected to.

use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use deadpool_postgres::Pool;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

#[async_trait]
pub trait RelationshipStore: Send + Sync {
    /// True iff an ACCEPTED follow exists between the pair in either direction
    async fn has_accepted_edge(&self, user_a: Uuid, user_b: Uuid) -> AppResult<bool>;

    /// Every user connected to `user_id` by an ACCEPTED follow in either
    /// direction
    async fn accepted_partners(&self, user_id: Uuid) -> AppResult<Vec<Uuid>>;
}

fn unavailable(e: impl std::fmt::Display) -> AppError {
    AppError::ServiceUnavailable(format!("relationship store: {e}"))
}

/// Relationship store backed by the `follows` table
#[derive(Clone)]
pub struct PgRelationshipStore {
    db: Pool,
}

impl PgRelationshipStore {
    pub fn new(db: Pool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RelationshipStore for PgRelationshipStore {
    async fn has_accepted_edge(&self, user_a: Uuid, user_b: Uuid) -> AppResult<bool> {
        let client = self.db.get().await.map_err(unavailable)?;
        let row = client
            .query_one(
                r#"
                SELECT EXISTS(
                    SELECT 1 FROM follows
                    WHERE status = 'ACCEPTED'
                      AND ((follower_id = $1 AND following_id = $2)
                        OR (follower_id = $2 AND following_id = $1))
                ) AS accepted
                "#,
                &[&user_a, &user_b],
            )
            .await
            .map_err(unavailable)?;
        Ok(row.get("accepted"))
    }

    async fn accepted_partners(&self, user_id: Uuid) -> AppResult<Vec<Uuid>> {
        let client = self.db.get().await.map_err(unavailable)?;
        let rows = client
            .query(
                r#"
                SELECT following_id AS partner_id FROM follows
                WHERE follower_id = $1 AND status = 'ACCEPTED'
                UNION
                SELECT follower_id AS partner_id FROM follows
                WHERE following_id = $1 AND status = 'ACCEPTED'
                "#,
                &[&user_id],
            )
            .await
            .map_err(unavailable)?;
        Ok(rows.iter().map(|row| row.get("partner_id")).collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum FollowStatus {
    Pending,
    Accepted,
}

/// Process-local follow graph
#[derive(Default)]
pub struct InMemoryRelationshipStore {
    // (follower, following, status)
    edges: RwLock<HashSet<(Uuid, Uuid, FollowStatus)>>,
    unavailable: AtomicBool,
}

impl InMemoryRelationshipStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn accept(&self, follower_id: Uuid, following_id: Uuid) {
        let mut edges = self.edges.write().await;
        edges.remove(&(follower_id, following_id, FollowStatus::Pending));
        edges.insert((follower_id, following_id, FollowStatus::Accepted));
    }

    pub async fn request(&self, follower_id: Uuid, following_id: Uuid) {
        let mut edges = self.edges.write().await;
        if !edges.contains(&(follower_id, following_id, FollowStatus::Accepted)) {
            edges.insert((follower_id, following_id, FollowStatus::Pending));
        }
    }

    pub async fn remove(&self, follower_id: Uuid, following_id: Uuid) {
        self.edges
            .write()
            .await
            .retain(|(from, to, _)| !(*from == follower_id && *to == following_id));
    }

    /// Make every lookup fail with `ServiceUnavailable` until switched back
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> AppResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(unavailable("offline"));
        }
        Ok(())
    }
}

#[async_trait]
impl RelationshipStore for InMemoryRelationshipStore {
    async fn has_accepted_edge(&self, user_a: Uuid, user_b: Uuid) -> AppResult<bool> {
        self.check_available()?;
        let edges = self.edges.read().await;
        Ok(edges.contains(&(user_a, user_b, FollowStatus::Accepted))
            || edges.contains(&(user_b, user_a, FollowStatus::Accepted)))
    }

    async fn accepted_partners(&self, user_id: Uuid) -> AppResult<Vec<Uuid>> {
        self.check_available()?;
        let edges = self.edges.read().await;
        let mut partners: Vec<Uuid> = edges
            .iter()
            .filter(|(_, _, status)| *status == FollowStatus::Accepted)
            .filter_map(|(from, to, _)| {
                if *from == user_id {
                    Some(*to)
                } else if *to == user_id {
                    Some(*from)
                } else {
                    None
                }
            })
            .collect();
        partners.sort();
        partners.dedup();
        Ok(partners)
    }
}

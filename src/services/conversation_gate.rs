use crate::error::{AppError, AppResult};
use crate::services::relationship_store::RelationshipStore;
use std::sync::Arc;
use uuid::Uuid;

/// Decides whether two users may exchange messages.
///
/// Fails closed: a relationship store error is a deny.
#[derive(Clone)]
pub struct ConversationGate {
    relationships: Arc<dyn RelationshipStore>,
}

impl ConversationGate {
    pub fn new(relationships: Arc<dyn RelationshipStore>) -> Self {
        Self { relationships }
    }

    pub async fn can_converse(&self, user_a: Uuid, user_b: Uuid) -> bool {
        match self.relationships.has_accepted_edge(user_a, user_b).await {
            Ok(allowed) => allowed,
            Err(e) => {
                tracing::warn!(
                    user_a = %user_a,
                    user_b = %user_b,
                    error = %e,
                    "relationship lookup failed, denying conversation"
                );
                false
            }
        }
    }

    pub async fn authorize(&self, user_a: Uuid, user_b: Uuid) -> AppResult<()> {
        if self.can_converse(user_a, user_b).await {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }

    /// Users `user_id` may converse with
    pub async fn partners(&self, user_id: Uuid) -> AppResult<Vec<Uuid>> {
        self.relationships.accepted_partners(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::relationship_store::InMemoryRelationshipStore;

    #[tokio::test]
    async fn test_gate_follows_accepted_edges() {
        let store = Arc::new(InMemoryRelationshipStore::new());
        let gate = ConversationGate::new(store.clone());
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        store.accept(b, a).await;
        store.request(a, c).await;

        assert!(gate.can_converse(a, b).await);
        assert!(!gate.can_converse(a, c).await);
        assert_eq!(gate.authorize(c, a).await, Err(AppError::Forbidden));
        assert_eq!(gate.partners(a).await.unwrap(), vec![b]);
    }

    #[tokio::test]
    async fn test_gate_fails_closed() {
        let store = Arc::new(InMemoryRelationshipStore::new());
        let gate = ConversationGate::new(store.clone());
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        store.accept(a, b).await;
        store.set_unavailable(true);

        assert!(!gate.can_converse(a, b).await);
        assert_eq!(gate.authorize(a, b).await, Err(AppError::Forbidden));
    }
}

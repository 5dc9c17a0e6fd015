use super::{ChannelHandle, ChannelId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Who is reachable right now, and through which connection.
///
/// One channel per user; the latest connect wins. State is process-local
/// and starts empty.
#[derive(Default, Clone)]
pub struct PresenceRegistry {
    // user_id -> current channel
    inner: Arc<RwLock<HashMap<Uuid, ChannelHandle>>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `channel` for `user_id`, replacing any previous channel.
    ///
    /// Returns the id of the replaced channel, if any.
    pub async fn set_online(&self, user_id: Uuid, channel: ChannelHandle) -> Option<ChannelId> {
        let channel_id = channel.id();
        let replaced = self.inner.write().await.insert(user_id, channel);
        let replaced = replaced.map(|old| old.id());

        tracing::info!(
            user_id = %user_id,
            channel_id = %channel_id,
            replaced = replaced.is_some(),
            "user online"
        );
        replaced
    }

    /// Remove whatever channel `user_id` has
    pub async fn set_offline(&self, user_id: Uuid) -> bool {
        let removed = self.inner.write().await.remove(&user_id).is_some();
        if removed {
            tracing::info!(user_id = %user_id, "user offline");
        }
        removed
    }

    /// Remove the entry for `user_id` only if it still points at
    /// `channel_id`. A late disconnect from a replaced connection leaves
    /// the newer entry alone.
    pub async fn release(&self, user_id: Uuid, channel_id: ChannelId) -> bool {
        let mut guard = self.inner.write().await;
        match guard.get(&user_id) {
            Some(current) if current.id() == channel_id => {
                guard.remove(&user_id);
                tracing::info!(user_id = %user_id, channel_id = %channel_id, "user offline");
                true
            }
            Some(current) => {
                tracing::debug!(
                    user_id = %user_id,
                    stale_channel = %channel_id,
                    current_channel = %current.id(),
                    "ignoring disconnect from replaced channel"
                );
                false
            }
            None => false,
        }
    }

    pub async fn channel_of(&self, user_id: Uuid) -> Option<ChannelHandle> {
        self.inner.read().await.get(&user_id).cloned()
    }

    pub async fn is_online(&self, user_id: Uuid) -> bool {
        self.inner.read().await.contains_key(&user_id)
    }

    /// Snapshot of the users currently online
    pub async fn list_online(&self) -> Vec<Uuid> {
        self.inner.read().await.keys().copied().collect()
    }

    pub async fn online_count(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Push a frame to every live channel. Channels whose connection is
    /// gone are dropped from the registry.
    pub async fn broadcast(&self, frame: &str) -> usize {
        let mut guard = self.inner.write().await;
        let before = guard.len();
        guard.retain(|_, channel| channel.send(frame.to_string()));
        let after = guard.len();

        if before != after {
            tracing::debug!(
                "Broadcast: {} dead channels cleaned up, {} active",
                before - after,
                after
            );
        }
        after
    }
}

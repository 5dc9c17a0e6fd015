use super::gateway::ChatGateway;
use super::message_types::ClientEvent;
use super::{ChannelHandle, ChannelId};
use crate::error::{AppError, AppResult};
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tokio::task::JoinHandle;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated { user_id: Uuid },
    Closed,
}

/// Per-connection protocol state.
///
/// Starts `Unauthenticated`; a verified token moves it to `Authenticated`,
/// anything else closes it. Closing releases the presence entry this
/// connection registered.
pub struct ClientSession {
    gateway: Arc<ChatGateway>,
    channel: ChannelHandle,
    state: SessionState,
}

impl ClientSession {
    pub fn new(gateway: Arc<ChatGateway>, channel: ChannelHandle) -> Self {
        Self {
            gateway,
            channel,
            state: SessionState::Unauthenticated,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn user_id(&self) -> Option<Uuid> {
        match self.state {
            SessionState::Authenticated { user_id } => Some(user_id),
            _ => None,
        }
    }

    pub fn channel_id(&self) -> ChannelId {
        self.channel.id()
    }

    pub async fn authenticate(&mut self, token: Option<&str>) -> AppResult<Uuid> {
        if self.state != SessionState::Unauthenticated {
            return Err(AppError::Unauthorized);
        }

        match self.gateway.connect(token, self.channel.clone()).await {
            Ok(user_id) => {
                self.state = SessionState::Authenticated { user_id };
                Ok(user_id)
            }
            Err(e) => {
                tracing::info!(channel_id = %self.channel.id(), "connection rejected: {}", e);
                self.state = SessionState::Closed;
                Err(AppError::Unauthorized)
            }
        }
    }

    /// Handle one inbound text frame. Malformed frames and frames received
    /// outside the `Authenticated` state are dropped.
    pub async fn handle_text(&self, text: &str) {
        let Some(user_id) = self.user_id() else {
            tracing::debug!(channel_id = %self.channel.id(), "frame ignored: not authenticated");
            return;
        };

        match serde_json::from_str::<ClientEvent>(text) {
            Ok(event) => self.gateway.handle_event(user_id, &self.channel, event).await,
            Err(e) => {
                tracing::warn!(user_id = %user_id, "Failed to parse WS message: {}", e);
            }
        }
    }

    pub async fn close(&mut self) {
        if let SessionState::Authenticated { user_id } = self.state {
            self.gateway.disconnect(user_id, self.channel.id()).await;
        }
        self.state = SessionState::Closed;
    }

    /// Run the session on its own task. Frames pushed into the returned
    /// sender are handled one at a time in arrival order; dropping the
    /// sender closes the session once the queue is drained.
    pub fn spawn_worker(mut self) -> (UnboundedSender<String>, JoinHandle<()>) {
        let (tx, mut rx) = unbounded_channel::<String>();
        let handle = tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                self.handle_text(&frame).await;
            }
            self.close().await;
        });
        (tx, handle)
    }
}

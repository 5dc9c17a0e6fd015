//! # Chat Gateway
//!
//! Shared dispatcher behind every live connection. It authenticates
//! connections, keeps presence in sync with the connection lifecycle and
//! routes inbound events through the conversation gate and message store.
//!
//! ## Event scope
//!
//! - Failures go to the initiating connection only, as an `error` event.
//! - `message-status` after a read receipt and `message-unsent` go to every
//!   connected channel.
//! - Everything else is addressed to one channel.
//!
//! ## Send ordering
//!
//! For one `send-message` the recipient's `message-delivered` is queued
//! before anything tied to that message is queued for the sender.

use super::message_types::{ClientEvent, ServerEvent};
use super::presence::PresenceRegistry;
use super::{ChannelHandle, ChannelId};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::TokenVerifier;
use crate::models::MessageStatus;
use crate::services::{ConversationGate, MessageStore};
use std::sync::Arc;
use uuid::Uuid;

pub struct ChatGateway {
    presence: PresenceRegistry,
    gate: ConversationGate,
    store: Arc<MessageStore>,
    verifier: Arc<dyn TokenVerifier>,
}

fn emit(channel: &ChannelHandle, event: &ServerEvent) -> bool {
    match event.to_json() {
        Ok(frame) => channel.send(frame),
        Err(e) => {
            tracing::error!(event = event.event_type(), error = %e, "failed to serialize event");
            false
        }
    }
}

impl ChatGateway {
    pub fn new(
        presence: PresenceRegistry,
        gate: ConversationGate,
        store: Arc<MessageStore>,
        verifier: Arc<dyn TokenVerifier>,
    ) -> Self {
        Self {
            presence,
            gate,
            store,
            verifier,
        }
    }

    pub fn presence(&self) -> &PresenceRegistry {
        &self.presence
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    pub fn gate(&self) -> &ConversationGate {
        &self.gate
    }

    /// Verify the presented token and register `channel` as the user's
    /// live connection
    pub async fn connect(&self, token: Option<&str>, channel: ChannelHandle) -> AppResult<Uuid> {
        let token = token.ok_or(AppError::Unauthorized)?;
        let user_id = self.verifier.verify(token).await?;
        self.presence.set_online(user_id, channel).await;
        Ok(user_id)
    }

    /// Drop the presence entry if it still belongs to `channel_id`
    pub async fn disconnect(&self, user_id: Uuid, channel_id: ChannelId) {
        self.presence.release(user_id, channel_id).await;
    }

    /// Process one inbound event from `user_id` arriving on `origin`.
    ///
    /// Failures are reported to `origin` and never propagate further.
    pub async fn handle_event(&self, user_id: Uuid, origin: &ChannelHandle, event: ClientEvent) {
        let event_type = event.event_type();
        let result = match event {
            ClientEvent::SendMessage {
                to_user_id,
                message,
            } => self.send_message(user_id, origin, to_user_id, &message).await,
            ClientEvent::ReadReceipt { message_id } => self.read_receipt(message_id).await,
            ClientEvent::TypingStart { to_user_id } => {
                self.typing(user_id, to_user_id, ServerEvent::TypingStart { from_user_id: user_id })
                    .await
            }
            ClientEvent::TypingStop { to_user_id } => {
                self.typing(user_id, to_user_id, ServerEvent::TypingStop { from_user_id: user_id })
                    .await
            }
            ClientEvent::DeleteForMe { message_id } => {
                self.delete_for_me(user_id, origin, message_id).await
            }
            ClientEvent::Unsend { message_id } => self.unsend(user_id, message_id).await,
        };

        if let Err(e) = result {
            match &e {
                AppError::Persistence(_) | AppError::ServiceUnavailable(_) => tracing::error!(
                    user_id = %user_id,
                    event = event_type,
                    error = %e,
                    "event failed"
                ),
                _ => tracing::debug!(
                    user_id = %user_id,
                    event = event_type,
                    error = %e,
                    "event rejected"
                ),
            }
            emit(origin, &ServerEvent::Error(e.client_message()));
        }
    }

    async fn send_message(
        &self,
        sender_id: Uuid,
        origin: &ChannelHandle,
        to_user_id: Uuid,
        content: &str,
    ) -> AppResult<()> {
        if !self.gate.can_converse(sender_id, to_user_id).await {
            tracing::info!(
                sender_id = %sender_id,
                receiver_id = %to_user_id,
                "conversation denied"
            );
            return Err(AppError::Forbidden);
        }

        let Some(recipient) = self.presence.channel_of(to_user_id).await else {
            tracing::info!(
                sender_id = %sender_id,
                receiver_id = %to_user_id,
                "recipient offline, message dropped"
            );
            return Err(AppError::Unreachable);
        };

        let message = self.store.create(sender_id, to_user_id, content).await?;

        let delivered = ServerEvent::MessageDelivered {
            id: message.id,
            from_user_id: sender_id,
            message: message.content.clone(),
            status: MessageStatus::Delivered,
            created_at: message.created_at,
        };
        if !emit(&recipient, &delivered) {
            tracing::info!(
                message_id = %message.id,
                receiver_id = %to_user_id,
                channel_id = %recipient.id(),
                "recipient channel closed before delivery"
            );
            return Err(AppError::Unreachable);
        }

        let message = self.store.mark_delivered(message.id).await?;

        let recipient_counts = self.store.unread_counts(to_user_id).await?;
        emit(&recipient, &ServerEvent::UnreadCounts { counts: recipient_counts });

        let sender_counts = self.store.unread_counts(sender_id).await?;
        emit(origin, &ServerEvent::UnreadCounts { counts: sender_counts });

        emit(
            origin,
            &ServerEvent::MessageStatus {
                message_id: message.id,
                status: message.status,
            },
        );
        Ok(())
    }

    async fn read_receipt(&self, message_id: Uuid) -> AppResult<()> {
        let message = self.store.mark_read(message_id).await?;
        self.broadcast(&ServerEvent::MessageStatus {
            message_id: message.id,
            status: message.status,
        })
        .await;
        Ok(())
    }

    async fn typing(&self, user_id: Uuid, to_user_id: Uuid, indicator: ServerEvent) -> AppResult<()> {
        self.gate.authorize(user_id, to_user_id).await?;
        if let Some(recipient) = self.presence.channel_of(to_user_id).await {
            emit(&recipient, &indicator);
        }
        Ok(())
    }

    async fn delete_for_me(
        &self,
        user_id: Uuid,
        origin: &ChannelHandle,
        message_id: Uuid,
    ) -> AppResult<()> {
        self.store.delete_for_user(message_id, user_id).await?;
        emit(origin, &ServerEvent::MessageDeletedForMe { message_id });
        Ok(())
    }

    async fn unsend(&self, user_id: Uuid, message_id: Uuid) -> AppResult<()> {
        self.store.unsend(message_id, user_id).await?;
        self.broadcast(&ServerEvent::MessageUnsent { message_id }).await;
        Ok(())
    }

    async fn broadcast(&self, event: &ServerEvent) {
        match event.to_json() {
            Ok(frame) => {
                self.presence.broadcast(&frame).await;
            }
            Err(e) => {
                tracing::error!(event = event.event_type(), error = %e, "failed to serialize event")
            }
        }
    }
}

use crate::{
    config::Config,
    middleware::auth::TokenVerifier,
    services::{ConversationGate, MessageStore},
    websocket::{ChatGateway, PresenceRegistry},
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub gateway: Arc<ChatGateway>,
    pub verifier: Arc<dyn TokenVerifier>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        presence: PresenceRegistry,
        gate: ConversationGate,
        store: Arc<MessageStore>,
        verifier: Arc<dyn TokenVerifier>,
    ) -> Self {
        let gateway = Arc::new(ChatGateway::new(presence, gate, store, verifier.clone()));
        Self {
            config,
            gateway,
            verifier,
        }
    }

    pub fn presence(&self) -> &PresenceRegistry {
        self.gateway.presence()
    }

    pub fn store(&self) -> &MessageStore {
        self.gateway.store()
    }

    pub fn gate(&self) -> &ConversationGate {
        self.gateway.gate()
    }
}

//! Shared harness: in-memory stores, HS256 tokens, sessions wired to a
//! gateway exactly as the WebSocket route wires them.

#![allow(dead_code)]

use direct_chat_service::config::{Config, HistoryConfig, JwtKeySource, WsConfig};
use direct_chat_service::middleware::auth::JwtTokenVerifier;
use direct_chat_service::services::{
    ConversationGate, InMemoryMessageRepository, InMemoryRelationshipStore, MessageStore,
};
use direct_chat_service::state::AppState;
use direct_chat_service::websocket::{
    ChannelHandle, ClientSession, PresenceRegistry, ServerEvent,
};
use jwt_security::JwtIssuer;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

pub const SECRET: &str = "integration-test-secret-with-32-plus-bytes";

pub struct Harness {
    pub state: AppState,
    pub relationships: Arc<InMemoryRelationshipStore>,
    pub repo: Arc<InMemoryMessageRepository>,
    issuer: JwtIssuer,
}

impl Harness {
    pub fn new() -> Self {
        let config = Arc::new(Config {
            database_url: String::new(),
            db_max_connections: 1,
            port: 0,
            jwt: JwtKeySource::Secret(SECRET.to_string()),
            history: HistoryConfig::default(),
            ws: WsConfig::default(),
        });

        let relationships = Arc::new(InMemoryRelationshipStore::new());
        let repo = Arc::new(InMemoryMessageRepository::new());
        let verifier = Arc::new(
            JwtTokenVerifier::from_key_source(&config.jwt).expect("verifier from test secret"),
        );

        let state = AppState::new(
            config,
            PresenceRegistry::new(),
            ConversationGate::new(relationships.clone()),
            Arc::new(MessageStore::new(repo.clone())),
            verifier,
        );

        Self {
            state,
            relationships,
            repo,
            issuer: JwtIssuer::from_secret(SECRET).expect("issuer from test secret"),
        }
    }

    pub fn token(&self, user_id: Uuid) -> String {
        self.issuer
            .generate_access_token(user_id, None)
            .expect("issue token")
    }

    /// Open and authenticate a connection for `user_id`
    pub async fn connect(&self, user_id: Uuid) -> Client {
        let (channel, rx) = ChannelHandle::open();
        let mut session = ClientSession::new(self.state.gateway.clone(), channel);
        session
            .authenticate(Some(self.token(user_id).as_str()))
            .await
            .expect("authenticate");
        Client {
            user_id,
            session,
            rx,
        }
    }

    pub async fn befriend(&self, a: Uuid, b: Uuid) {
        self.relationships.accept(a, b).await;
    }
}

pub struct Client {
    pub user_id: Uuid,
    pub session: ClientSession,
    pub rx: UnboundedReceiver<String>,
}

impl Client {
    pub async fn emit(&self, frame: Value) {
        self.session.handle_text(&frame.to_string()).await;
    }

    pub async fn send_message(&self, to: Uuid, text: &str) {
        self.emit(serde_json::json!({
            "event": "send-message",
            "data": { "toUserId": to, "message": text }
        }))
        .await;
    }

    /// Every event queued for this connection so far
    pub fn drain(&mut self) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(frame) = self.rx.try_recv() {
            events.push(serde_json::from_str(&frame).expect("server frame is a ServerEvent"));
        }
        events
    }
}

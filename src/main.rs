use actix_web::{web, App, HttpServer};
use direct_chat_service::{
    config, db, error, logging,
    middleware::auth::JwtTokenVerifier,
    routes,
    services::{ConversationGate, MessageStore, PgMessageRepository, PgRelationshipStore},
    state::AppState,
    websocket::PresenceRegistry,
};
use std::sync::Arc;

#[actix_web::main]
async fn main() -> Result<(), error::AppError> {
    logging::init_tracing();
    let cfg = Arc::new(config::Config::from_env()?);

    let db = db::init_pool(&cfg).await?;

    let verifier = Arc::new(JwtTokenVerifier::from_key_source(&cfg.jwt)?);
    let store = Arc::new(MessageStore::new(Arc::new(PgMessageRepository::new(db.clone()))));
    let gate = ConversationGate::new(Arc::new(PgRelationshipStore::new(db)));

    let state = AppState::new(cfg.clone(), PresenceRegistry::new(), gate, store, verifier);

    let bind_addr = format!("0.0.0.0:{}", cfg.port);
    tracing::info!(%bind_addr, "starting direct-chat-service");

    HttpServer::new(move || {
        let cors = actix_cors::Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .wrap(cors)
            .app_data(web::Data::new(state.clone()))
            .configure(routes::configure)
    })
    .bind(&bind_addr)
    .map_err(|e| error::AppError::StartServer(format!("bind: {e}")))?
    .run()
    .await
    .map_err(|e| error::AppError::StartServer(format!("server: {e}")))
}

pub mod chat;
pub mod wsroute;

use actix_web::{web, HttpResponse};

async fn health() -> HttpResponse {
    HttpResponse::Ok().body("OK")
}

/// Register every route of the service. Fixed `/chat/*` paths go before
/// the `/chat/{user_id}` history route.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(chat::get_unread_counts)
        .service(chat::get_conversations)
        .service(chat::get_partners)
        .service(chat::get_online_partners)
        .service(chat::get_history)
        .service(wsroute::ws_handler)
        .route("/health", web::get().to(health));
}

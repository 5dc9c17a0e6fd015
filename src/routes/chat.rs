use crate::error::AppError;
use crate::middleware::guards::AuthenticatedUser;
use crate::models::Message;
use crate::state::AppState;
use actix_web::{get, web, HttpResponse};
use serde::Deserialize;
use std::collections::HashSet;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
    pub before: Option<Uuid>,
}

/// Unread messages per sender
/// GET /chat/unread
#[get("/chat/unread")]
pub async fn get_unread_counts(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let counts = state.store().unread_counts(user.id).await?;
    Ok(HttpResponse::Ok().json(counts))
}

/// Conversation list, newest first
/// GET /chat/conversations
#[get("/chat/conversations")]
pub async fn get_conversations(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let conversations = state.store().conversations(user.id).await?;
    Ok(HttpResponse::Ok().json(conversations))
}

/// Users the caller may converse with
/// GET /chat/partners
#[get("/chat/partners")]
pub async fn get_partners(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let partners = state.gate().partners(user.id).await?;
    Ok(HttpResponse::Ok().json(partners))
}

/// Partners that are online right now
/// GET /chat/online
#[get("/chat/online")]
pub async fn get_online_partners(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let partners: HashSet<Uuid> = state.gate().partners(user.id).await?.into_iter().collect();
    let online: Vec<Uuid> = state
        .presence()
        .list_online()
        .await
        .into_iter()
        .filter(|id| partners.contains(id))
        .collect();
    Ok(HttpResponse::Ok().json(online))
}

/// Conversation history with one user, oldest first
/// GET /chat/{user_id}?limit=&before=
#[get("/chat/{user_id}")]
pub async fn get_history(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<Uuid>,
    query: web::Query<HistoryQuery>,
) -> Result<HttpResponse, AppError> {
    let other_user_id = path.into_inner();
    state.gate().authorize(user.id, other_user_id).await?;

    let limit = state.config.history.clamp_limit(query.limit);
    let messages: Vec<Message> = state
        .store()
        .history(user.id, other_user_id, limit, query.before)
        .await?
        .into_iter()
        .filter(|m| m.is_visible_to(user.id))
        .collect();

    Ok(HttpResponse::Ok().json(messages))
}

//! Direct messaging endpoints.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use livenest_common::AppResult;
use livenest_core::{ConversationSummary, Cursor, MessageInput};
use livenest_db::entities::message;
use serde::Deserialize;

use crate::{
    extractors::AuthUser,
    middleware::AppState,
    response::{ApiResponse, Created},
};

/// Start-conversation request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartConversationRequest {
    pub user_id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ConversationQuery {
    pub limit: Option<u64>,
}

async fn list(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ConversationQuery>,
) -> AppResult<ApiResponse<Vec<ConversationSummary>>> {
    let conversations = state
        .messaging_service
        .list_conversations(&auth.viewer(), query.limit)
        .await?;
    Ok(ApiResponse::ok(conversations))
}

/// Open the conversation with a user, creating it on first contact.
async fn start(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(req): Json<StartConversationRequest>,
) -> AppResult<ApiResponse<ConversationSummary>> {
    let conversation = state
        .messaging_service
        .start_conversation(&auth.viewer(), &req.user_id)
        .await?;
    Ok(ApiResponse::ok(conversation))
}

async fn messages(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
    Query(cursor): Query<Cursor>,
) -> AppResult<ApiResponse<Vec<message::Model>>> {
    let messages = state
        .messaging_service
        .messages(&auth.viewer(), &conversation_id, &cursor)
        .await?;
    Ok(ApiResponse::ok(messages))
}

async fn send(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
    Json(req): Json<MessageInput>,
) -> AppResult<Created<message::Model>> {
    let message = state
        .messaging_service
        .send(&auth.viewer(), &conversation_id, req)
        .await?;
    Ok(ApiResponse::created(message))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(start))
        .route("/{id}/messages", get(messages).post(send))
}

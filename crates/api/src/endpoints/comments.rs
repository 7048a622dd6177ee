//! Comment endpoints.

use axum::{
    Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::patch,
};
use livenest_common::AppResult;
use livenest_core::{CommentInput, CommentView};

use crate::{
    extractors::AuthUser,
    middleware::AppState,
    response::{ApiResponse, no_content},
};

async fn edit(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(comment_id): Path<String>,
    Json(req): Json<CommentInput>,
) -> AppResult<ApiResponse<CommentView>> {
    let comment = state
        .comment_service
        .edit(&auth.viewer(), &comment_id, req)
        .await?;
    Ok(ApiResponse::ok(comment))
}

async fn delete(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(comment_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    state
        .comment_service
        .delete(&auth.viewer(), &comment_id)
        .await?;
    Ok(no_content())
}

pub fn router() -> Router<AppState> {
    Router::new().route("/{id}", patch(edit).delete(delete))
}

//! Post endpoints.

use axum::{
    Json, Router,
    extract::{Multipart, Path, State},
    response::IntoResponse,
    routing::{get, post},
};
use livenest_common::AppResult;
use livenest_core::{
    CommentInput, CommentView, CreatePostInput, FeedPost, FullPost, LikeState, MediaUpload,
    ReportInput, UpdatePostInput,
};
use super::admin::ReportResponse;
use crate::{
    extractors::{AuthUser, next_field, read_text, read_upload},
    middleware::AppState,
    response::{ApiResponse, Created, no_content},
};

/// Create a post from a multipart form.
///
/// Parts: `text`, any number of `tags` (each may hold a comma-separated
/// list) and any number of `media` files.
async fn create(
    auth: AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Created<FeedPost>> {
    let mut input = CreatePostInput::default();
    let mut media: Vec<MediaUpload> = Vec::new();

    while let Some(field) = next_field(&mut multipart).await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("text") => {
                let text = read_text(field).await?;
                input.text = (!text.trim().is_empty()).then_some(text);
            }
            Some("tags") => {
                let raw = read_text(field).await?;
                input.tags.extend(raw.split(',').map(str::to_string));
            }
            Some("media" | "file") => media.push(read_upload(field).await?),
            _ => {}
        }
    }

    let post = state
        .post_service
        .create(&auth.viewer(), input, media)
        .await?;
    Ok(ApiResponse::created(post))
}

async fn show(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<ApiResponse<FullPost>> {
    let post = state.post_service.get(&auth.viewer(), &post_id).await?;
    Ok(ApiResponse::ok(post))
}

async fn update(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    Json(req): Json<UpdatePostInput>,
) -> AppResult<ApiResponse<FeedPost>> {
    let post = state
        .post_service
        .update(&auth.viewer(), &post_id, req)
        .await?;
    Ok(ApiResponse::ok(post))
}

async fn delete(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    state.post_service.delete(&auth.viewer(), &post_id).await?;
    Ok(no_content())
}

/// Like, or unlike when already liked.
async fn toggle_like(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<ApiResponse<LikeState>> {
    let result = state
        .like_service
        .toggle_like(&auth.viewer(), &post_id)
        .await?;
    Ok(ApiResponse::ok(result))
}

async fn list_comments(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<ApiResponse<Vec<CommentView>>> {
    let comments = state
        .comment_service
        .list(&auth.viewer(), &post_id)
        .await?;
    Ok(ApiResponse::ok(comments))
}

async fn add_comment(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    Json(req): Json<CommentInput>,
) -> AppResult<Created<CommentView>> {
    let comment = state
        .comment_service
        .add(&auth.viewer(), &post_id, req)
        .await?;
    Ok(ApiResponse::created(comment))
}

async fn report(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    Json(req): Json<ReportInput>,
) -> AppResult<Created<ReportResponse>> {
    let report = state
        .moderation_service
        .report(&auth.viewer(), &post_id, req)
        .await?;
    Ok(ApiResponse::created(report.into()))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create))
        .route("/{id}", get(show).patch(update).delete(delete))
        .route("/{id}/like", post(toggle_like))
        .route("/{id}/comments", get(list_comments).post(add_comment))
        .route("/{id}/report", post(report))
}

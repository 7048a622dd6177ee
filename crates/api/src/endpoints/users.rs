//! User endpoints.

use axum::{
    Json, Router,
    extract::{Multipart, Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
};
use livenest_common::{AppError, AppResult};
use livenest_core::{AuthorSummary, Cursor, FeedPost, FollowState, Page, UpdateProfileInput, UserProfile};
use livenest_db::entities::user;

use crate::{
    extractors::{AuthUser, next_field, read_upload},
    middleware::AppState,
    response::{ApiResponse, no_content},
};

/// The signed-in account, including private fields.
async fn me(AuthUser(user): AuthUser) -> ApiResponse<user::Model> {
    ApiResponse::ok(user)
}

async fn update_me(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<UpdateProfileInput>,
) -> AppResult<ApiResponse<user::Model>> {
    let updated = state.user_service.update_profile(&user.id, req).await?;
    Ok(ApiResponse::ok(updated))
}

async fn delete_me(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    state.user_service.delete_account(&user.id).await?;
    Ok(no_content())
}

/// Replace the avatar with the `file` part of a multipart form.
async fn update_avatar(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<ApiResponse<user::Model>> {
    let mut upload = None;

    while let Some(field) = next_field(&mut multipart).await? {
        if field.name() == Some("file") {
            upload = Some(read_upload(field).await?);
        }
    }

    let upload =
        upload.ok_or_else(|| AppError::InvalidOperation("Missing file part".to_string()))?;
    let updated = state
        .user_service
        .update_avatar(&user.id, &upload.data, &upload.content_type)
        .await?;

    Ok(ApiResponse::ok(updated))
}

async fn show(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<ApiResponse<UserProfile>> {
    let profile = state.user_service.get_profile(&user.id, &user_id).await?;
    Ok(ApiResponse::ok(profile))
}

async fn followers(
    AuthUser(_user): AuthUser,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(cursor): Query<Cursor>,
) -> AppResult<ApiResponse<Vec<AuthorSummary>>> {
    let users = state.user_service.followers(&user_id, &cursor).await?;
    Ok(ApiResponse::ok(users))
}

async fn following(
    AuthUser(_user): AuthUser,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(cursor): Query<Cursor>,
) -> AppResult<ApiResponse<Vec<AuthorSummary>>> {
    let users = state.user_service.following(&user_id, &cursor).await?;
    Ok(ApiResponse::ok(users))
}

async fn posts(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(page): Query<Page>,
) -> AppResult<ApiResponse<Vec<FeedPost>>> {
    let posts = state
        .post_service
        .list_by_user(&auth.viewer(), &user_id, page)
        .await?;
    Ok(ApiResponse::ok(posts))
}

/// Follow, or unfollow when already following.
async fn toggle_follow(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<ApiResponse<FollowState>> {
    let result = state
        .following_service
        .toggle_follow(&auth.viewer(), &user_id)
        .await?;
    Ok(ApiResponse::ok(result))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/me", get(me).patch(update_me).delete(delete_me))
        .route("/me/avatar", post(update_avatar))
        .route("/{id}", get(show))
        .route("/{id}/followers", get(followers))
        .route("/{id}/following", get(following))
        .route("/{id}/posts", get(posts))
        .route("/{id}/follow", post(toggle_follow))
}

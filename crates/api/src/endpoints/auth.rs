//! Authentication endpoints.

use axum::{Json, Router, extract::State, response::IntoResponse, routing::post};
use livenest_common::AppResult;
use livenest_core::{AuthSession, LoginInput, RegisterInput, ResetPasswordInput};
use serde::Deserialize;

use crate::{
    middleware::AppState,
    response::{ApiResponse, Created, no_content},
};

/// Password reset request.
#[derive(Debug, Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

/// Create a new account and sign in.
async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterInput>,
) -> AppResult<Created<AuthSession>> {
    let session = state.user_service.register(req).await?;
    Ok(ApiResponse::created(session))
}

/// Sign in with username or email.
async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginInput>,
) -> AppResult<ApiResponse<AuthSession>> {
    let session = state.user_service.login(req).await?;
    Ok(ApiResponse::ok(session))
}

/// Mail a reset token. Always succeeds for well-formed requests.
async fn request_password_reset(
    State(state): State<AppState>,
    Json(req): Json<PasswordResetRequest>,
) -> AppResult<impl IntoResponse> {
    state
        .user_service
        .request_password_reset(&req.email)
        .await?;
    Ok(no_content())
}

/// Set a new password with a reset token.
async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordInput>,
) -> AppResult<impl IntoResponse> {
    state.user_service.reset_password(req).await?;
    Ok(no_content())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/password-reset", post(request_password_reset))
        .route("/password-reset/confirm", post(reset_password))
}

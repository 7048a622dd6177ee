//! Admin/Moderation endpoints.

use axum::{
    Router,
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{delete, get, post},
};
use livenest_common::{AppError, AppResult};
use livenest_core::{Page, UserPage};
use livenest_db::entities::{report, user};
use serde::{Deserialize, Serialize};

use crate::{
    extractors::AuthUser,
    middleware::AppState,
    response::{ApiResponse, no_content},
};

/// Report response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportResponse {
    pub id: String,
    pub post_id: String,
    pub reporter_id: String,
    pub reason: String,
    pub is_reviewed: bool,
    pub created_at: String,
    pub reviewed_at: Option<String>,
}

impl From<report::Model> for ReportResponse {
    fn from(report: report::Model) -> Self {
        Self {
            id: report.id,
            post_id: report.post_id,
            reporter_id: report.reporter_id,
            reason: report.reason,
            is_reviewed: report.is_reviewed,
            created_at: report.created_at.to_rfc3339(),
            reviewed_at: report.reviewed_at.map(|t| t.to_rfc3339()),
        }
    }
}

/// Report listing query.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportQuery {
    #[serde(default)]
    pub include_reviewed: bool,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

async fn list_reports(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> AppResult<ApiResponse<Vec<ReportResponse>>> {
    let page = Page {
        limit: query.limit,
        offset: query.offset,
    };
    let reports = state
        .moderation_service
        .list_reports(&auth.viewer(), query.include_reviewed, page)
        .await?;

    Ok(ApiResponse::ok(
        reports.into_iter().map(ReportResponse::from).collect(),
    ))
}

async fn review_report(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(report_id): Path<String>,
) -> AppResult<ApiResponse<ReportResponse>> {
    let report = state
        .moderation_service
        .mark_reviewed(&auth.viewer(), &report_id)
        .await?;
    Ok(ApiResponse::ok(report.into()))
}

async fn delete_report(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(report_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    state
        .moderation_service
        .delete_report(&auth.viewer(), &report_id)
        .await?;
    Ok(no_content())
}

async fn list_users(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(page): Query<Page>,
) -> AppResult<ApiResponse<UserPage>> {
    let users = state
        .moderation_service
        .list_users(&auth.viewer(), page)
        .await?;
    Ok(ApiResponse::ok(users))
}

async fn block_user(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<ApiResponse<user::Model>> {
    let user = state
        .moderation_service
        .block_user(&auth.viewer(), &user_id)
        .await?;
    Ok(ApiResponse::ok(user))
}

async fn unblock_user(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<ApiResponse<user::Model>> {
    let user = state
        .moderation_service
        .unblock_user(&auth.viewer(), &user_id)
        .await?;
    Ok(ApiResponse::ok(user))
}

/// Remove any post. Same soft delete authors use.
async fn delete_post(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let viewer = auth.viewer();
    if !viewer.is_admin {
        return Err(AppError::Forbidden("Admin access required".to_string()));
    }

    state.post_service.delete(&viewer, &post_id).await?;
    tracing::info!(admin = %viewer.id, post_id = %post_id, "Admin removed post");
    Ok(no_content())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/reports", get(list_reports))
        .route("/reports/{id}/review", post(review_report))
        .route("/reports/{id}", delete(delete_report))
        .route("/users", get(list_users))
        .route("/users/{id}/block", post(block_user))
        .route("/users/{id}/unblock", post(unblock_user))
        .route("/posts/{id}", delete(delete_post))
}

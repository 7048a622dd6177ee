//! Premium subscription endpoints.

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::{get, post},
};
use livenest_common::AppResult;
use livenest_core::PaymentOrder;
use livenest_db::entities::subscription::{self, SubscriptionPlan, SubscriptionStatus};
use serde::{Deserialize, Serialize};

use crate::{
    extractors::AuthUser,
    middleware::AppState,
    response::{ApiResponse, Created},
};

/// Subscription response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionResponse {
    pub id: String,
    pub plan: SubscriptionPlan,
    pub status: SubscriptionStatus,
    pub is_active: bool,
    pub price_cents: i64,
    pub currency: String,
    pub start_date: String,
    pub end_date: Option<String>,
}

impl From<subscription::Model> for SubscriptionResponse {
    fn from(sub: subscription::Model) -> Self {
        Self {
            id: sub.id,
            plan: sub.plan,
            status: sub.status,
            is_active: sub.is_active,
            price_cents: sub.price_cents,
            currency: sub.currency,
            start_date: sub.start_date.to_rfc3339(),
            end_date: sub.end_date.map(|t| t.to_rfc3339()),
        }
    }
}

/// Capture request, sent after the buyer approved the order.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureRequest {
    pub order_ref: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<u64>,
}

async fn checkout(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<Created<PaymentOrder>> {
    let order = state.subscription_service.checkout(&user.id).await?;
    Ok(ApiResponse::created(order))
}

async fn capture(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<CaptureRequest>,
) -> AppResult<ApiResponse<SubscriptionResponse>> {
    let sub = state
        .subscription_service
        .capture(&user.id, req.order_ref.trim())
        .await?;
    Ok(ApiResponse::ok(sub.into()))
}

/// The active subscription, or `null`.
async fn current(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Option<SubscriptionResponse>>> {
    let sub = state.subscription_service.current(&user.id).await?;
    Ok(ApiResponse::ok(sub.map(Into::into)))
}

async fn cancel(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<SubscriptionResponse>> {
    let sub = state.subscription_service.cancel(&user.id).await?;
    Ok(ApiResponse::ok(sub.into()))
}

async fn history(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> AppResult<ApiResponse<Vec<SubscriptionResponse>>> {
    let subs = state
        .subscription_service
        .history(&user.id, query.limit)
        .await?;
    Ok(ApiResponse::ok(subs.into_iter().map(Into::into).collect()))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/checkout", post(checkout))
        .route("/capture", post(capture))
        .route("/current", get(current))
        .route("/cancel", post(cancel))
        .route("/history", get(history))
}

//! Personalized feed endpoint.

use axum::{
    Router,
    extract::{Query, State},
    routing::get,
};
use livenest_common::AppResult;
use livenest_core::Feed;
use serde::Deserialize;

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

#[derive(Debug, Default, Deserialize)]
pub struct FeedQuery {
    pub limit: Option<u64>,
}

async fn feed(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
) -> AppResult<ApiResponse<Feed>> {
    let feed = state
        .feed_service
        .get_feed(&auth.viewer(), query.limit)
        .await?;
    Ok(ApiResponse::ok(feed))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(feed))
}

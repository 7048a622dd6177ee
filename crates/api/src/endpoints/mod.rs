//! API endpoints.

mod admin;
mod auth;
mod comments;
mod conversations;
mod feed;
mod posts;
mod subscriptions;
mod users;

use axum::Router;

use crate::middleware::AppState;
use crate::sse;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/users", users::router())
        .nest("/feed", feed::router())
        .nest("/posts", posts::router())
        .nest("/comments", comments::router())
        .nest("/admin", admin::router())
        .nest("/subscriptions", subscriptions::router())
        .nest("/conversations", conversations::router())
        .nest("/streaming/sse", sse::router())
}

//! HTTP API layer for LiveNest.
//!
//! A thin JSON wrapper over the core services:
//!
//! - **Endpoints**: accounts, posts, comments, feed, moderation, subscriptions, messaging
//! - **Extractors**: the authenticated user and its [`Viewer`](livenest_core::Viewer)
//! - **Middleware**: bearer-token authentication
//! - **Streaming**: Server-Sent Events for the user's real-time channel
//!
//! Built on Axum 0.8.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;
pub mod sse;

use axum::{Router, middleware::from_fn_with_state};

pub use endpoints::router;
pub use middleware::{AppState, Collaborators, auth_middleware};

/// The API router with authentication applied and state attached.
pub fn app(state: AppState) -> Router {
    router()
        .layer(from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}

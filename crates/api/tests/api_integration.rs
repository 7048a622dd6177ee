//! API integration tests.
//!
//! These drive the full router, auth middleware included, against a mock
//! database.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::redundant_clone)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use chrono::{Duration, Utc};
use livenest_api::{AppState, Collaborators, app};
use livenest_common::{AppResult, LocalStorage, config::SubscriptionConfig};
use livenest_core::{
    Claims, CredentialService, JwtTokenService, TokenPurpose, TokenService,
};
use livenest_db::entities::user;
use livenest_realtime::Broadcaster;
use sea_orm::{DatabaseBackend, DbErr, MockDatabase};
use serde_json::Value;
use tower::ServiceExt;

const SECRET: &str = "integration-test-secret";

/// Stores passwords as-is so tests skip the Argon2 cost.
struct PlainCredentials;

#[async_trait]
impl CredentialService for PlainCredentials {
    async fn hash(&self, password: &str) -> AppResult<String> {
        Ok(format!("plain:{password}"))
    }

    async fn verify(&self, password: &str, digest: &str) -> AppResult<bool> {
        Ok(digest == format!("plain:{password}"))
    }
}

fn test_user(id: &str, username: &str) -> user::Model {
    user::Model {
        id: id.to_string(),
        username: username.to_string(),
        username_lower: username.to_lowercase(),
        email: format!("{username}@example.com"),
        password_hash: "plain:password123".to_string(),
        name: None,
        bio: None,
        avatar_url: None,
        avatar_id: None,
        role: user::UserRole::User,
        is_premium: false,
        is_blocked: false,
        is_deleted: false,
        created_at: Utc::now().fixed_offset(),
        updated_at: None,
    }
}

fn create_test_router(db: MockDatabase) -> Router {
    let broadcaster = Broadcaster::new();
    let storage_dir = std::env::temp_dir().join("livenest-api-tests");

    let state = AppState::new(
        Arc::new(db.into_connection()),
        Collaborators {
            credentials: Arc::new(PlainCredentials),
            tokens: Arc::new(JwtTokenService::new(SECRET).unwrap()),
            storage: Arc::new(LocalStorage::new(
                storage_dir,
                "http://localhost/files".to_string(),
            )),
            mail: None,
            gateway: None,
            publisher: Arc::new(broadcaster.clone()),
            broadcaster,
            plan: SubscriptionConfig::default(),
            access_token_ttl: Duration::hours(1),
            reset_token_ttl: Duration::minutes(15),
        },
    );

    app(state)
}

fn empty_db() -> MockDatabase {
    MockDatabase::new(DatabaseBackend::Postgres)
}

/// A database whose first query resolves the bearer token's user.
fn db_with_viewer(viewer: user::Model) -> MockDatabase {
    empty_db().append_query_results([vec![viewer]])
}

fn access_token(user_id: &str) -> String {
    JwtTokenService::new(SECRET)
        .unwrap()
        .issue(
            Claims::new(user_id, "user", TokenPurpose::Access),
            Duration::hours(1),
        )
        .unwrap()
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .method(method)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn authed(method: &str, uri: &str, user_id: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .method(method)
        .header(header::AUTHORIZATION, format!("Bearer {}", access_token(user_id)))
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_unknown_endpoint_returns_404() {
    let app = create_test_router(empty_db());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/nonexistent/endpoint")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_feed_requires_token() {
    let app = create_test_router(empty_db());

    let response = app
        .oneshot(Request::builder().uri("/feed").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_garbage_token_is_treated_as_anonymous() {
    let app = create_test_router(empty_db());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/feed")
                .header(header::AUTHORIZATION, "Bearer not-a-jwt")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_with_invalid_json_returns_error() {
    let app = create_test_router(empty_db());

    let response = app
        .oneshot(json_request("POST", "/auth/register", "invalid json"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_register_rejects_short_password() {
    let app = create_test_router(empty_db());

    let response = app
        .oneshot(json_request(
            "POST",
            "/auth/register",
            r#"{"username":"alice","email":"alice@example.com","password":"short"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"]["kind"], "INVALID_OPERATION");
}

#[tokio::test]
async fn test_register_returns_session() {
    let db = empty_db()
        // username lookup, email lookup, insert
        .append_query_results([Vec::<user::Model>::new()])
        .append_query_results([Vec::<user::Model>::new()])
        .append_query_results([vec![test_user("u1", "alice")]]);
    let app = create_test_router(db);

    let response = app
        .oneshot(json_request(
            "POST",
            "/auth/register",
            r#"{"username":"alice","email":"alice@example.com","password":"password123"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert!(body["data"]["token"].as_str().is_some_and(|t| !t.is_empty()));
    assert_eq!(body["data"]["user"]["username"], "alice");
    assert!(body["data"]["user"].get("password_hash").is_none());
}

#[tokio::test]
async fn test_register_taken_username_conflicts() {
    let db = empty_db().append_query_results([vec![test_user("u1", "alice")]]);
    let app = create_test_router(db);

    let response = app
        .oneshot(json_request(
            "POST",
            "/auth/register",
            r#"{"username":"Alice","email":"other@example.com","password":"password123"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_login_unknown_user_is_unauthorized() {
    let db = empty_db().append_query_results([Vec::<user::Model>::new()]);
    let app = create_test_router(db);

    let response = app
        .oneshot(json_request(
            "POST",
            "/auth/login",
            r#"{"identifier":"nobody","password":"password123"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_returns_token() {
    let db = empty_db().append_query_results([vec![test_user("u1", "alice")]]);
    let app = create_test_router(db);

    let response = app
        .oneshot(json_request(
            "POST",
            "/auth/login",
            r#"{"identifier":"alice@example.com","password":"password123"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["user"]["id"], "u1");
}

#[tokio::test]
async fn test_me_returns_token_owner() {
    let app = create_test_router(db_with_viewer(test_user("u1", "alice")));

    let response = app.oneshot(authed("GET", "/users/me", "u1")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["username"], "alice");
}

#[tokio::test]
async fn test_self_follow_is_rejected() {
    let app = create_test_router(db_with_viewer(test_user("u1", "alice")));

    let response = app
        .oneshot(authed("POST", "/users/u1/follow", "u1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "INVALID_OPERATION");
}

#[tokio::test]
async fn test_blocked_user_is_refused() {
    let mut blocked = test_user("u1", "alice");
    blocked.is_blocked = true;
    let app = create_test_router(db_with_viewer(blocked));

    let response = app.oneshot(authed("GET", "/feed", "u1")).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_store_failure_during_auth_is_bad_gateway() {
    let db = empty_db().append_query_errors([DbErr::Custom("connection refused".to_string())]);
    let app = create_test_router(db);

    let response = app.oneshot(authed("GET", "/feed", "u1")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = body_json(response).await;
    assert_eq!(body["error"]["kind"], "UPSTREAM_FAILURE");
}

#[tokio::test]
async fn test_admin_routes_forbid_regular_users() {
    let app = create_test_router(db_with_viewer(test_user("u1", "alice")));

    let response = app
        .oneshot(authed("GET", "/admin/reports", "u1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_sse_stream_opens_for_user() {
    let app = create_test_router(db_with_viewer(test_user("u1", "alice")));

    let response = app
        .oneshot(authed("GET", "/streaming/sse", "u1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert!(content_type.contains("text/event-stream"));
}

//! Application state and authentication middleware.

#![allow(missing_docs)]

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Duration;
use livenest_common::{AppError, MediaStore, config::SubscriptionConfig};
use livenest_core::{
    CommentService, CredentialServiceRef, EventPublisherService, FeedService, FollowingService,
    LikeService, MailServiceRef, MessagingService, ModerationService, PaymentGatewayRef,
    PostPresenter, PostService, SubscriptionService, TokenServiceRef, UserService,
};
use livenest_db::repositories::{
    CommentRepository, ConversationRepository, FollowingRepository, MessageRepository,
    PostLikeRepository, PostRepository, ReportRepository, SubscriptionRepository, UserRepository,
};
use livenest_realtime::Broadcaster;
use sea_orm::DatabaseConnection;

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub user_service: UserService,
    pub following_service: FollowingService,
    pub like_service: LikeService,
    pub feed_service: FeedService,
    pub post_service: PostService,
    pub comment_service: CommentService,
    pub moderation_service: ModerationService,
    pub subscription_service: SubscriptionService,
    pub messaging_service: MessagingService,
    /// Local fan-out that SSE connections subscribe to
    pub broadcaster: Broadcaster,
}

/// External collaborators the services are wired with.
pub struct Collaborators {
    pub credentials: CredentialServiceRef,
    pub tokens: TokenServiceRef,
    pub storage: Arc<dyn MediaStore>,
    pub mail: Option<MailServiceRef>,
    pub gateway: Option<PaymentGatewayRef>,
    /// Where services publish events; the broadcaster itself, or Redis
    pub publisher: EventPublisherService,
    pub broadcaster: Broadcaster,
    pub plan: SubscriptionConfig,
    pub access_token_ttl: Duration,
    pub reset_token_ttl: Duration,
}

impl AppState {
    /// Build every repository and service on one connection.
    #[must_use]
    pub fn new(db: Arc<DatabaseConnection>, deps: Collaborators) -> Self {
        let user_repo = UserRepository::new(Arc::clone(&db));
        let following_repo = FollowingRepository::new(Arc::clone(&db));
        let post_repo = PostRepository::new(Arc::clone(&db));
        let like_repo = PostLikeRepository::new(Arc::clone(&db));
        let comment_repo = CommentRepository::new(Arc::clone(&db));
        let report_repo = ReportRepository::new(Arc::clone(&db));
        let subscription_repo = SubscriptionRepository::new(Arc::clone(&db));
        let conversation_repo = ConversationRepository::new(Arc::clone(&db));
        let message_repo = MessageRepository::new(db);

        let presenter = PostPresenter::new(user_repo.clone(), like_repo.clone());

        let mut user_service = UserService::new(
            user_repo.clone(),
            following_repo.clone(),
            post_repo.clone(),
            deps.credentials,
            deps.tokens,
            deps.storage.clone(),
        );
        user_service.set_token_ttls(deps.access_token_ttl, deps.reset_token_ttl);
        if let Some(mail) = deps.mail {
            user_service.set_mail_service(mail);
        }

        let mut following_service = FollowingService::new(following_repo.clone());
        following_service.set_event_publisher(deps.publisher.clone());

        let like_service = LikeService::new(post_repo.clone(), like_repo);
        let feed_service =
            FeedService::new(following_repo, post_repo.clone(), presenter.clone());
        let post_service = PostService::new(
            post_repo.clone(),
            comment_repo.clone(),
            user_repo.clone(),
            presenter.clone(),
            deps.storage,
        );
        let comment_service = CommentService::new(comment_repo, post_repo.clone(), presenter);
        let moderation_service = ModerationService::new(report_repo, post_repo, user_repo.clone());

        let mut subscription_service = SubscriptionService::new(subscription_repo, deps.plan);
        subscription_service.set_event_publisher(deps.publisher.clone());
        if let Some(gateway) = deps.gateway {
            subscription_service.set_gateway(gateway);
        }

        let mut messaging_service =
            MessagingService::new(conversation_repo, message_repo, user_repo);
        messaging_service.set_event_publisher(deps.publisher);

        Self {
            user_service,
            following_service,
            like_service,
            feed_service,
            post_service,
            comment_service,
            moderation_service,
            subscription_service,
            messaging_service,
            broadcaster: deps.broadcaster,
        }
    }
}

/// Authentication middleware.
///
/// A valid bearer token puts the user into the request extensions. Missing or
/// invalid tokens pass through anonymously; handlers that need a user reject
/// with 401. Blocked accounts and store failures are returned as-is.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(auth_header) = req.headers().get(header::AUTHORIZATION)
        && let Ok(auth_str) = auth_header.to_str()
        && let Some(token) = auth_str.strip_prefix("Bearer ")
    {
        match state.user_service.authenticate(token.trim()).await {
            Ok(user) => {
                req.extensions_mut().insert(user);
            }
            Err(AppError::Unauthorized) => {
                tracing::debug!("Ignoring invalid bearer token");
            }
            Err(e) => return e.into_response(),
        }
    }

    next.run(req).await
}

//! Business logic services.

#![allow(missing_docs)]

pub mod comment;
pub mod credentials;
pub mod event_publisher;
pub mod feed;
pub mod following;
pub mod like;
pub mod mail;
pub mod messaging;
pub mod moderation;
pub mod pagination;
pub mod payment;
pub mod post;
pub mod presenter;
pub mod subscription;
pub mod token;
pub mod user;
pub mod visibility;

pub use comment::{CommentInput, CommentService};
pub use credentials::{Argon2Credentials, CredentialService, CredentialServiceRef};
pub use event_publisher::{
    EventPublisher, EventPublisherService, NoOpEventPublisher, events, publish_best_effort,
    user_channel,
};
pub use feed::{Feed, FeedService, FeedSource};
pub use following::{FollowState, FollowingService};
pub use like::{LikeService, LikeState};
pub use mail::{MailService, MailServiceRef, NoOpMailer, SmtpMailer};
pub use messaging::{ConversationSummary, MessageInput, MessagingService};
pub use moderation::{ModerationService, ReportInput, UserPage};
pub use pagination::{Cursor, Page};
pub use payment::{
    CapturedOrder, OrderMetadata, PayPalGateway, PaymentGateway, PaymentGatewayRef, PaymentOrder,
};
pub use post::{CreatePostInput, FullPost, MediaUpload, PostService, UpdatePostInput};
pub use presenter::{AuthorSummary, CommentView, FeedPost, PostPresenter};
pub use subscription::SubscriptionService;
pub use token::{Claims, JwtTokenService, TokenPurpose, TokenService, TokenServiceRef};
pub use user::{
    AuthSession, LoginInput, RegisterInput, ResetPasswordInput, UpdateProfileInput, UserProfile,
    UserService,
};
pub use visibility::{Viewer, can_view};

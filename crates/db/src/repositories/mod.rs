//! Database repositories.

mod comment;
mod conversation;
mod following;
mod message;
mod post;
mod post_like;
mod report;
mod subscription;
mod user;

pub use comment::CommentRepository;
pub use conversation::ConversationRepository;
pub use following::FollowingRepository;
pub use message::MessageRepository;
pub use post::PostRepository;
pub use post_like::PostLikeRepository;
pub use report::ReportRepository;
pub use subscription::SubscriptionRepository;
pub use user::UserRepository;

//! Database entities.

pub mod comment;
pub mod conversation;
pub mod following;
pub mod message;
pub mod post;
pub mod post_like;
pub mod report;
pub mod subscription;
pub mod user;

pub use comment::Entity as Comment;
pub use conversation::Entity as Conversation;
pub use following::Entity as Following;
pub use message::Entity as Message;
pub use post::Entity as Post;
pub use post_like::Entity as PostLike;
pub use report::Entity as Report;
pub use subscription::Entity as Subscription;
pub use user::Entity as User;

//! Database integration tests.
//!
//! These tests require a running `PostgreSQL` instance.
//! Run with: `cargo test --test db_integration -- --ignored`
//!
//! Environment variables:
//!   `TEST_DB_HOST` (default: localhost)
//!   `TEST_DB_PORT` (default: 5433)
//!   `TEST_DB_USER` (default: `livenest_test`)
//!   `TEST_DB_PASSWORD` (default: `livenest_test`)

#![allow(clippy::unwrap_used)]

use std::collections::BTreeSet;

use chrono::Utc;
use livenest_common::IdGenerator;
use livenest_db::entities::{post, user};
use livenest_db::repositories::{
    FollowingRepository, PostLikeRepository, PostRepository, UserRepository,
};
use livenest_db::test_utils::TestDatabase;
use sea_orm::Set;
use serde_json::json;

async fn insert_user(repo: &UserRepository, username: &str) -> user::Model {
    let now = Utc::now().fixed_offset();
    repo.create(user::ActiveModel {
        id: Set(IdGenerator::new().generate()),
        username: Set(username.to_string()),
        username_lower: Set(username.to_lowercase()),
        email: Set(format!("{}@example.com", username.to_lowercase())),
        password_hash: Set("hash".to_string()),
        name: Set(None),
        bio: Set(None),
        avatar_url: Set(None),
        avatar_id: Set(None),
        role: Set(user::UserRole::User),
        is_premium: Set(false),
        is_blocked: Set(false),
        is_deleted: Set(false),
        created_at: Set(now),
        updated_at: Set(None),
    })
    .await
    .unwrap()
}

async fn insert_post(repo: &PostRepository, user_id: &str, tags: &[&str]) -> post::Model {
    insert_post_with(repo, user_id, tags, false).await
}

async fn insert_post_with(
    repo: &PostRepository,
    user_id: &str,
    tags: &[&str],
    is_deleted: bool,
) -> post::Model {
    let now = Utc::now().fixed_offset();
    repo.create(post::ActiveModel {
        id: Set(IdGenerator::new().generate()),
        user_id: Set(user_id.to_string()),
        text: Set("hello".to_string()),
        media: Set(json!([])),
        tags: Set(json!(tags)),
        is_deleted: Set(is_deleted),
        created_at: Set(now),
        updated_at: Set(now),
    })
    .await
    .unwrap()
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_follow_toggle_keeps_edge_symmetric() {
    let db = TestDatabase::create_unique().await.unwrap();
    let conn = db.connection();
    let users = UserRepository::new(conn.clone());
    let following = FollowingRepository::new(conn);

    let a = insert_user(&users, "alice").await;
    let b = insert_user(&users, "bob").await;
    let ids = IdGenerator::new();

    assert!(following.toggle(ids.generate(), &a.id, &b.id).await.unwrap());
    assert!(following.following_ids(&a.id).await.unwrap().contains(&b.id));
    let followers: Vec<String> = following
        .find_followers(&b.id, 10, None)
        .await
        .unwrap()
        .into_iter()
        .map(|f| f.follower_id)
        .collect();
    assert_eq!(followers, vec![a.id.clone()]);

    assert!(!following.toggle(ids.generate(), &a.id, &b.id).await.unwrap());
    assert_eq!(following.count_following(&a.id).await.unwrap(), 0);
    assert_eq!(following.count_followers(&b.id).await.unwrap(), 0);

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_concurrent_like_toggles_do_not_lose_updates() {
    let db = TestDatabase::create_unique().await.unwrap();
    let conn = db.connection();
    let users = UserRepository::new(conn.clone());
    let posts = PostRepository::new(conn.clone());
    let likes = PostLikeRepository::new(conn);

    let author = insert_user(&users, "author").await;
    let target = insert_post(&posts, &author.id, &[]).await;

    let mut likers = Vec::new();
    for i in 0..8 {
        likers.push(insert_user(&users, &format!("liker{i}")).await);
    }

    let handles: Vec<_> = likers
        .iter()
        .map(|liker| {
            let likes = likes.clone();
            let user_id = liker.id.clone();
            let post_id = target.id.clone();
            tokio::spawn(async move {
                likes
                    .toggle(IdGenerator::new().generate(), &user_id, &post_id)
                    .await
            })
        })
        .collect();
    for handle in handles {
        assert!(handle.await.unwrap().unwrap());
    }

    assert_eq!(likes.count_by_post(&target.id).await.unwrap(), 8);

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_tag_intersection_excludes_own_posts() {
    let db = TestDatabase::create_unique().await.unwrap();
    let conn = db.connection();
    let users = UserRepository::new(conn.clone());
    let posts = PostRepository::new(conn);

    let a = insert_user(&users, "alice").await;
    let c = insert_user(&users, "carol").await;
    insert_post(&posts, &a.id, &["music"]).await;
    let theirs = insert_post(&posts, &c.id, &["music", "jazz"]).await;
    insert_post(&posts, &c.id, &["cooking"]).await;

    let tags = posts.tags_of_user(&a.id).await.unwrap();
    assert_eq!(tags, BTreeSet::from(["music".to_string()]));

    let found = posts.find_by_any_tag(&tags, &a.id, 20).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, theirs.id);

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_feed_queries_skip_deleted_posts() {
    let db = TestDatabase::create_unique().await.unwrap();
    let conn = db.connection();
    let users = UserRepository::new(conn.clone());
    let posts = PostRepository::new(conn);

    let a = insert_user(&users, "alice").await;
    let c = insert_user(&users, "carol").await;
    insert_post(&posts, &a.id, &["music"]).await;
    insert_post_with(&posts, &a.id, &["secret"], true).await;
    let live = insert_post(&posts, &c.id, &["music"]).await;
    insert_post_with(&posts, &c.id, &["music"], true).await;

    // Tags from a deleted post do not count toward interests
    let tags = posts.tags_of_user(&a.id).await.unwrap();
    assert_eq!(tags, BTreeSet::from(["music".to_string()]));

    let by_author = posts
        .find_by_authors(std::slice::from_ref(&c.id), 20)
        .await
        .unwrap();
    assert_eq!(by_author.len(), 1);
    assert_eq!(by_author[0].id, live.id);

    let by_tag = posts.find_by_any_tag(&tags, &a.id, 20).await.unwrap();
    assert_eq!(by_tag.len(), 1);
    assert_eq!(by_tag[0].id, live.id);

    let recent = posts.find_recent_excluding(&a.id, 20).await.unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].id, live.id);

    assert_eq!(posts.count_by_user(&c.id).await.unwrap(), 1);

    db.drop_database().await.unwrap();
}

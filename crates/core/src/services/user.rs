//! User service.

use std::sync::{Arc, LazyLock};

use chrono::{DateTime, Duration, FixedOffset, Utc};
use livenest_common::{
    AppError, AppResult, IdGenerator, MediaStore, storage::is_supported_media,
};
use livenest_db::{
    entities::user,
    repositories::{FollowingRepository, PostRepository, UserRepository},
};
use regex::Regex;
use sea_orm::{IntoActiveModel, Set};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::services::credentials::CredentialServiceRef;
use crate::services::mail::MailServiceRef;
use crate::services::pagination::Cursor;
use crate::services::presenter::AuthorSummary;
use crate::services::token::{Claims, TokenPurpose, TokenServiceRef, credential_fingerprint};

#[allow(clippy::unwrap_used)]
static USERNAME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+$").unwrap());

const AVATAR_FOLDER: &str = "avatars";

/// Input for registering a new user.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterInput {
    #[validate(length(min = 3, max = 30))]
    pub username: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

/// Input for logging in with a username or email.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginInput {
    #[validate(length(min = 1, max = 320))]
    pub identifier: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

/// Input for updating profile fields. Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateProfileInput {
    #[validate(length(max = 50))]
    pub name: Option<String>,
    #[validate(length(max = 500))]
    pub bio: Option<String>,
}

/// Input for completing a password reset.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordInput {
    pub token: String,
    #[validate(length(min = 8, max = 128))]
    pub new_password: String,
}

/// A signed-in user and their access token.
#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub token: String,
    pub user: user::Model,
}

/// Public profile of a user.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    pub name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub role: user::UserRole,
    pub is_premium: bool,
    pub followers_count: u64,
    pub following_count: u64,
    pub posts_count: u64,
    /// Whether the viewer follows this user
    pub is_following: bool,
    pub created_at: DateTime<FixedOffset>,
}

/// User service for business logic.
#[derive(Clone)]
pub struct UserService {
    user_repo: UserRepository,
    following_repo: FollowingRepository,
    post_repo: PostRepository,
    credentials: CredentialServiceRef,
    tokens: TokenServiceRef,
    storage: Arc<dyn MediaStore>,
    mail: Option<MailServiceRef>,
    access_ttl: Duration,
    reset_ttl: Duration,
    id_gen: IdGenerator,
}

impl UserService {
    /// Create a new user service.
    #[must_use]
    pub fn new(
        user_repo: UserRepository,
        following_repo: FollowingRepository,
        post_repo: PostRepository,
        credentials: CredentialServiceRef,
        tokens: TokenServiceRef,
        storage: Arc<dyn MediaStore>,
    ) -> Self {
        Self {
            user_repo,
            following_repo,
            post_repo,
            credentials,
            tokens,
            storage,
            mail: None,
            access_ttl: Duration::days(7),
            reset_ttl: Duration::minutes(15),
            id_gen: IdGenerator::new(),
        }
    }

    /// Set the mail service.
    pub fn set_mail_service(&mut self, mail: MailServiceRef) {
        self.mail = Some(mail);
    }

    /// Set access and password-reset token lifetimes.
    pub fn set_token_ttls(&mut self, access: Duration, reset: Duration) {
        self.access_ttl = access;
        self.reset_ttl = reset;
    }

    /// Register a new account and sign it in.
    pub async fn register(&self, input: RegisterInput) -> AppResult<AuthSession> {
        input.validate()?;
        if !USERNAME_RE.is_match(&input.username) {
            return Err(AppError::Validation(
                "Username may only contain letters, digits and underscores".to_string(),
            ));
        }

        if self.user_repo.find_by_username(&input.username).await?.is_some() {
            return Err(AppError::Conflict("Username already taken".to_string()));
        }
        let email = input.email.trim().to_lowercase();
        if self.user_repo.find_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        let password_hash = self.credentials.hash(&input.password).await?;

        let model = user::ActiveModel {
            id: Set(self.id_gen.generate()),
            username: Set(input.username.clone()),
            username_lower: Set(input.username.to_lowercase()),
            email: Set(email),
            password_hash: Set(password_hash),
            name: Set(None),
            bio: Set(None),
            avatar_url: Set(None),
            avatar_id: Set(None),
            role: Set(user::UserRole::User),
            is_premium: Set(false),
            is_blocked: Set(false),
            is_deleted: Set(false),
            created_at: Set(Utc::now().fixed_offset()),
            updated_at: Set(None),
        };

        // Two registrations can race past the lookups above; the unique
        // indexes settle it.
        let user = self
            .user_repo
            .create(model)
            .await
            .map_err(|e| match e {
                AppError::Database(msg) if msg.contains("duplicate key") => {
                    AppError::Conflict("Username or email already registered".to_string())
                }
                other => other,
            })?;

        tracing::info!(user_id = %user.id, username = %user.username, "Registered user");

        self.send_mail(
            &user.email,
            "Welcome to LiveNest",
            &format!("Hi {}, your LiveNest account is ready.", user.username),
        )
        .await;

        let token = self.issue_access_token(&user)?;
        Ok(AuthSession { token, user })
    }

    /// Sign in with a username or email and password.
    pub async fn login(&self, input: LoginInput) -> AppResult<AuthSession> {
        input.validate()?;

        let user = self
            .user_repo
            .find_by_login(input.identifier.trim())
            .await?
            .ok_or(AppError::Unauthorized)?;

        if !self
            .credentials
            .verify(&input.password, &user.password_hash)
            .await?
        {
            return Err(AppError::Unauthorized);
        }

        if user.is_deleted {
            return Err(AppError::Forbidden("Account has been deleted".to_string()));
        }
        if user.is_blocked {
            return Err(AppError::Forbidden("Account is blocked".to_string()));
        }

        let token = self.issue_access_token(&user)?;
        Ok(AuthSession { token, user })
    }

    /// Resolve an access token to an active user.
    pub async fn authenticate(&self, token: &str) -> AppResult<user::Model> {
        let claims = self.tokens.verify(token)?;
        if claims.purpose != TokenPurpose::Access {
            return Err(AppError::Unauthorized);
        }

        let user = self
            .user_repo
            .find_by_id(&claims.sub)
            .await?
            .filter(|u| !u.is_deleted)
            .ok_or(AppError::Unauthorized)?;

        if user.is_blocked {
            return Err(AppError::Forbidden("Account is blocked".to_string()));
        }
        Ok(user)
    }

    /// Public profile of a live user, as seen by `viewer_id`.
    pub async fn get_profile(&self, viewer_id: &str, user_id: &str) -> AppResult<UserProfile> {
        let user = self.user_repo.get_existing(user_id).await?;

        let followers_count = self.following_repo.count_followers(user_id).await?;
        let following_count = self.following_repo.count_following(user_id).await?;
        let posts_count = self.post_repo.count_by_user(user_id).await?;
        let is_following = viewer_id != user_id
            && self
                .following_repo
                .is_following(viewer_id, user_id)
                .await?;

        Ok(UserProfile {
            id: user.id,
            username: user.username,
            name: user.name,
            bio: user.bio,
            avatar_url: user.avatar_url,
            role: user.role,
            is_premium: user.is_premium,
            followers_count,
            following_count,
            posts_count,
            is_following,
            created_at: user.created_at,
        })
    }

    /// Update display name and bio.
    pub async fn update_profile(
        &self,
        user_id: &str,
        input: UpdateProfileInput,
    ) -> AppResult<user::Model> {
        input.validate()?;
        let user = self.user_repo.get_existing(user_id).await?;

        let mut active = user.into_active_model();
        if let Some(name) = input.name {
            let name = name.trim().to_string();
            active.name = Set((!name.is_empty()).then_some(name));
        }
        if let Some(bio) = input.bio {
            let bio = bio.trim().to_string();
            active.bio = Set((!bio.is_empty()).then_some(bio));
        }
        active.updated_at = Set(Some(Utc::now().fixed_offset()));

        self.user_repo.update(active).await
    }

    /// Replace the user's avatar. The previous file is removed afterwards.
    pub async fn update_avatar(
        &self,
        user_id: &str,
        data: &[u8],
        content_type: &str,
    ) -> AppResult<user::Model> {
        if !content_type.starts_with("image/") || !is_supported_media(content_type) {
            return Err(AppError::InvalidOperation(format!(
                "Unsupported avatar type: {content_type}"
            )));
        }

        let user = self.user_repo.get_existing(user_id).await?;
        let previous = user.avatar_id.clone();

        let stored = self.storage.upload(data, AVATAR_FOLDER, content_type).await?;

        let mut active = user.into_active_model();
        active.avatar_url = Set(Some(stored.url));
        active.avatar_id = Set(Some(stored.id.clone()));
        active.updated_at = Set(Some(Utc::now().fixed_offset()));

        let updated = match self.user_repo.update(active).await {
            Ok(updated) => updated,
            Err(e) => {
                if let Err(cleanup) = self.storage.delete(&stored.id).await {
                    tracing::warn!(error = %cleanup, media_id = %stored.id, "Failed to remove orphaned avatar");
                }
                return Err(e);
            }
        };

        if let Some(old) = previous
            && let Err(e) = self.storage.delete(&old).await
        {
            tracing::warn!(error = %e, media_id = %old, "Failed to remove previous avatar");
        }

        Ok(updated)
    }

    /// Soft-delete an account.
    pub async fn delete_account(&self, user_id: &str) -> AppResult<()> {
        let user = self.user_repo.get_existing(user_id).await?;

        let mut active = user.into_active_model();
        active.is_deleted = Set(true);
        active.updated_at = Set(Some(Utc::now().fixed_offset()));
        self.user_repo.update(active).await?;

        tracing::info!(user_id = %user_id, "Deleted account");
        Ok(())
    }

    /// Mail a password reset token. Unknown addresses succeed silently.
    pub async fn request_password_reset(&self, email: &str) -> AppResult<()> {
        let Some(user) = self
            .user_repo
            .find_by_email(email.trim())
            .await?
            .filter(|u| !u.is_deleted)
        else {
            tracing::debug!("Password reset requested for unknown email");
            return Ok(());
        };

        let token = self.tokens.issue(
            Claims::new(&user.id, role_name(&user), TokenPurpose::PasswordReset)
                .with_fingerprint(credential_fingerprint(&user.password_hash)),
            self.reset_ttl,
        )?;

        self.send_mail(
            &user.email,
            "Reset your LiveNest password",
            &format!(
                "Use this code to reset your password. It expires in {} minutes.\n\n{token}",
                self.reset_ttl.num_minutes()
            ),
        )
        .await;

        Ok(())
    }

    /// Set a new password using a reset token.
    pub async fn reset_password(&self, input: ResetPasswordInput) -> AppResult<()> {
        input.validate()?;

        let claims = self.tokens.verify(&input.token)?;
        if claims.purpose != TokenPurpose::PasswordReset {
            return Err(AppError::Unauthorized);
        }

        let user = self.user_repo.get_existing(&claims.sub).await?;
        // Single use: the fingerprint stops matching once the password changes.
        let current = credential_fingerprint(&user.password_hash);
        if claims.fingerprint.as_deref() != Some(current.as_str()) {
            tracing::debug!(user_id = %claims.sub, "Stale password reset token");
            return Err(AppError::Unauthorized);
        }
        let password_hash = self.credentials.hash(&input.new_password).await?;

        let mut active = user.into_active_model();
        active.password_hash = Set(password_hash);
        active.updated_at = Set(Some(Utc::now().fixed_offset()));
        self.user_repo.update(active).await?;

        tracing::info!(user_id = %claims.sub, "Password reset");
        Ok(())
    }

    /// Users following `user_id`, most recent first.
    pub async fn followers(&self, user_id: &str, cursor: &Cursor) -> AppResult<Vec<AuthorSummary>> {
        self.user_repo.get_existing(user_id).await?;
        let edges = self
            .following_repo
            .find_followers(user_id, cursor.limit(), cursor.until_id.as_deref())
            .await?;
        let ids: Vec<String> = edges.into_iter().map(|e| e.follower_id).collect();
        self.summaries(&ids).await
    }

    /// Users `user_id` follows, most recent first.
    pub async fn following(&self, user_id: &str, cursor: &Cursor) -> AppResult<Vec<AuthorSummary>> {
        self.user_repo.get_existing(user_id).await?;
        let edges = self
            .following_repo
            .find_following(user_id, cursor.limit(), cursor.until_id.as_deref())
            .await?;
        let ids: Vec<String> = edges.into_iter().map(|e| e.followee_id).collect();
        self.summaries(&ids).await
    }

    async fn summaries(&self, ids: &[String]) -> AppResult<Vec<AuthorSummary>> {
        let users = self.user_repo.find_by_ids(ids).await?;
        Ok(ids
            .iter()
            .filter_map(|id| users.iter().find(|u| &u.id == id && !u.is_deleted))
            .map(AuthorSummary::from)
            .collect())
    }

    fn issue_access_token(&self, user: &user::Model) -> AppResult<String> {
        self.tokens.issue(
            Claims::new(&user.id, role_name(user), TokenPurpose::Access),
            self.access_ttl,
        )
    }

    async fn send_mail(&self, to: &str, subject: &str, body: &str) {
        if let Some(ref mail) = self.mail
            && let Err(e) = mail.send(to, subject, body).await
        {
            tracing::warn!(error = %e, to = to, "Failed to send mail");
        }
    }
}

const fn role_name(user: &user::Model) -> &'static str {
    match user.role {
        user::UserRole::Admin => "admin",
        user::UserRole::User => "user",
    }
}

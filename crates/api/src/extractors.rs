//! Request extractors.

use axum::{
    extract::{
        FromRequestParts,
        multipart::{Field, Multipart},
    },
    http::request::Parts,
};
use livenest_common::{AppError, AppResult};
use livenest_core::{MediaUpload, Viewer};
use livenest_db::entities::user;

/// Authenticated user extractor.
#[derive(Debug, Clone)]
pub struct AuthUser(pub user::Model);

impl AuthUser {
    /// The identity this request acts as.
    #[must_use]
    pub fn viewer(&self) -> Viewer {
        Viewer::from(&self.0)
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Set by auth middleware
        parts
            .extensions
            .get::<user::Model>()
            .cloned()
            .map(AuthUser)
            .ok_or(AppError::Unauthorized)
    }
}

/// Read one multipart file part into memory.
pub(crate) async fn read_upload(field: Field<'_>) -> AppResult<MediaUpload> {
    let content_type = field
        .content_type()
        .map(str::to_string)
        .ok_or_else(|| AppError::InvalidOperation("File part has no content type".to_string()))?;
    let data = field
        .bytes()
        .await
        .map_err(|e| AppError::InvalidOperation(e.to_string()))?
        .to_vec();

    Ok(MediaUpload { data, content_type })
}

/// Read a multipart text part.
pub(crate) async fn read_text(field: Field<'_>) -> AppResult<String> {
    field
        .text()
        .await
        .map_err(|e| AppError::InvalidOperation(e.to_string()))
}

/// Advance to the next multipart part.
pub(crate) async fn next_field(multipart: &mut Multipart) -> AppResult<Option<Field<'_>>> {
    multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidOperation(e.to_string()))
}

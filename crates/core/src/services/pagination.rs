//! Page size handling shared by listing operations.

use serde::Deserialize;

/// Page size used when the caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: u64 = 20;

/// Largest page any listing returns.
pub const MAX_PAGE_SIZE: u64 = 100;

/// Clamp a requested page size to `1..=MAX_PAGE_SIZE`.
#[must_use]
pub fn clamp_limit(requested: Option<u64>) -> u64 {
    requested
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE)
}

/// Offset-based page request.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Page {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl Page {
    /// Clamped limit.
    #[must_use]
    pub fn limit(&self) -> u64 {
        clamp_limit(self.limit)
    }

    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset.unwrap_or_default()
    }
}

/// Cursor-based page request, for ID-ordered listings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cursor {
    pub limit: Option<u64>,
    pub until_id: Option<String>,
}

impl Cursor {
    /// Clamped limit.
    #[must_use]
    pub fn limit(&self) -> u64 {
        clamp_limit(self.limit)
    }
}

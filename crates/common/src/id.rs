//! ID generation utilities.

use ulid::Ulid;

/// Length of a textual ULID.
pub const ID_LEN: usize = 26;

/// ID generator for entities.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    _private: (),
}

impl IdGenerator {
    /// Create a new ID generator.
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }

    /// Generate a new ULID-based ID.
    ///
    /// IDs are lowercase, 26 characters long and sort by creation time,
    /// which keeps `ORDER BY id` close to `ORDER BY created_at`.
    #[must_use]
    pub fn generate(&self) -> String {
        Ulid::new().to_string().to_lowercase()
    }

    /// Check whether a client-supplied string is shaped like an entity ID.
    #[must_use]
    pub fn is_valid(id: &str) -> bool {
        id.len() == ID_LEN && Ulid::from_string(&id.to_uppercase()).is_ok()
    }
}

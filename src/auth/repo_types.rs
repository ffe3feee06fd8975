use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    /// Lowercased, unique.
    pub username: String,
    pub full_name: String,
    /// Lowercased, unique.
    pub email: String,
    /// Argon2 PHC string.
    pub password_hash: String,
    /// SHA-256 of the active refresh token.
    pub refresh_token_hash: Option<String>,
    pub refresh_token_expires_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

impl User {
    /// True if `digest` is the stored refresh token digest and it has not expired at `now`.
    pub fn has_active_session(&self, digest: &str, now: OffsetDateTime) -> bool {
        match (&self.refresh_token_hash, self.refresh_token_expires_at) {
            (Some(stored), Some(expires_at)) => stored == digest && expires_at > now,
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub password_hash: String,
}

/// Full replacement of a user's profile columns.
#[derive(Debug, Clone)]
pub struct UserChanges {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub password_hash: String,
}

impl From<&User> for UserChanges {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            username: u.username.clone(),
            full_name: u.full_name.clone(),
            email: u.email.clone(),
            password_hash: u.password_hash.clone(),
        }
    }
}

/// Refresh token state persisted against the user row.
#[derive(Debug, Clone)]
pub struct StoredToken {
    pub hash: String,
    pub expires_at: OffsetDateTime,
}

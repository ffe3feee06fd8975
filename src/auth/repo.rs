use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    auth::repo_types::{NewUser, StoredToken, User, UserChanges},
    repository::RepoError,
};

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create_user(&self, new: NewUser) -> Result<User, RepoError>;
    async fn get_user(&self, id: Uuid) -> Result<User, RepoError>;
    async fn get_user_by_email(&self, email: &str) -> Result<User, RepoError>;
    async fn get_user_by_username(&self, username: &str) -> Result<User, RepoError>;
    async fn list_users(&self, limit: i64, offset: i64) -> Result<Vec<User>, RepoError>;
    async fn update_user(&self, changes: UserChanges) -> Result<User, RepoError>;
    /// `None` clears the session.
    async fn update_user_token(
        &self,
        id: Uuid,
        token: Option<StoredToken>,
    ) -> Result<(), RepoError>;
    async fn delete_user(&self, id: Uuid) -> Result<(), RepoError>;
}

const USER_COLUMNS: &str = "id, username, full_name, email, password_hash, \
                            refresh_token_hash, refresh_token_expires_at, created_at";

#[derive(Clone)]
pub struct PgUserRepository {
    db: PgPool,
}

impl PgUserRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn find_one(&self, filter: &str, value: &str) -> Result<User, RepoError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE {filter} = $1"
        ))
        .bind(value)
        .fetch_optional(&self.db)
        .await?;
        user.ok_or(RepoError::NotFound)
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create_user(&self, new: NewUser) -> Result<User, RepoError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, username, full_name, email, password_hash)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&new.username)
        .bind(&new.full_name)
        .bind(&new.email)
        .bind(&new.password_hash)
        .fetch_one(&self.db)
        .await?;
        Ok(user)
    }

    async fn get_user(&self, id: Uuid) -> Result<User, RepoError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        user.ok_or(RepoError::NotFound)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<User, RepoError> {
        self.find_one("email", email).await
    }

    async fn get_user_by_username(&self, username: &str) -> Result<User, RepoError> {
        self.find_one("username", username).await
    }

    async fn list_users(&self, limit: i64, offset: i64) -> Result<Vec<User>, RepoError> {
        let rows = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            ORDER BY created_at DESC, id
            LIMIT $1 OFFSET $2
            "#
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn update_user(&self, changes: UserChanges) -> Result<User, RepoError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET username = $2, full_name = $3, email = $4, password_hash = $5
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(changes.id)
        .bind(&changes.username)
        .bind(&changes.full_name)
        .bind(&changes.email)
        .bind(&changes.password_hash)
        .fetch_optional(&self.db)
        .await?;
        user.ok_or(RepoError::NotFound)
    }

    async fn update_user_token(
        &self,
        id: Uuid,
        token: Option<StoredToken>,
    ) -> Result<(), RepoError> {
        let (hash, expires_at) = match token {
            Some(t) => (Some(t.hash), Some(t.expires_at)),
            None => (None, None),
        };
        let result = sqlx::query(
            r#"
            UPDATE users
            SET refresh_token_hash = $2, refresh_token_expires_at = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(hash)
        .bind(expires_at)
        .execute(&self.db)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}

use async_trait::async_trait;
use sqlx::PgPool;

use crate::auth::repo_types::{User, UserId};
use crate::error::{AppError, AppResult};

/// Persistence for user identities. Usernames are case-sensitive unique keys.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create_user(&self, username: &str, password_hash: &str) -> AppResult<User>;
    async fn find_by_username(&self, username: &str) -> AppResult<User>;
    async fn find_by_id(&self, id: UserId) -> AppResult<User>;
}

#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create_user(&self, username: &str, password_hash: &str) -> AppResult<User> {
        let res = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, password_hash)
            VALUES ($1, $2)
            RETURNING id, username, password_hash, created_at
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await;

        match res {
            Ok(user) => Ok(user),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(AppError::Conflict("username already taken"))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_username(&self, username: &str) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, password_hash, created_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::NotFound("user not found"))
    }

    async fn find_by_id(&self, id: UserId) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            r#"SELECT id, username, password_hash, created_at FROM users WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::NotFound("user not found"))
    }
}

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::user::User;

use super::UserStore;

pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        PgUserStore { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn insert(&self, user: &User) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO users (user_id, username, email, phone_number, full_name, password, refresh_token, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(user.user_id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.phone_number)
        .bind(&user.full_name)
        .bind(&user.password)
        .bind(&user.refresh_token)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_by_emails(&self, emails: &[String]) -> Result<Vec<User>, AppError> {
        let users = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ANY($1)")
            .bind(emails)
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    async fn exists_with_identity(
        &self,
        username: &str,
        email: &str,
        phone_number: &str,
    ) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(
                 SELECT 1 FROM users
                 WHERE LOWER(username) = LOWER($1)
                    OR LOWER(email) = LOWER($2)
                    OR phone_number = $3
             )",
        )
        .bind(username)
        .bind(email)
        .bind(phone_number)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn set_refresh_token(
        &self,
        user_id: Uuid,
        refresh_token: Option<&str>,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET refresh_token = $2, updated_at = $3 WHERE user_id = $1")
            .bind(user_id)
            .bind(refresh_token)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_password(&self, user_id: Uuid, password_hash: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET password = $2, updated_at = $3 WHERE user_id = $1")
            .bind(user_id)
            .bind(password_hash)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

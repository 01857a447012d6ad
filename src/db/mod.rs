use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::file::FileRecord;
use crate::models::user::User;

mod files;
mod users;

pub use files::PgFileStore;
pub use users::PgUserStore;

pub async fn create_pool(database_url: &str) -> PgPool {
    PgPool::connect(database_url)
        .await
        .expect("Failed to connect to the database")
}

/// Repository over persisted user records.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert(&self, user: &User) -> Result<(), AppError>;

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>, AppError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    /// Resolves a batch of email addresses; addresses with no matching user
    /// simply produce no row.
    async fn find_by_emails(&self, emails: &[String]) -> Result<Vec<User>, AppError>;

    async fn exists_with_identity(
        &self,
        username: &str,
        email: &str,
        phone_number: &str,
    ) -> Result<bool, AppError>;

    /// Overwrites the single stored refresh token slot; `None` clears it.
    async fn set_refresh_token(
        &self,
        user_id: Uuid,
        refresh_token: Option<&str>,
    ) -> Result<(), AppError>;

    async fn set_password(&self, user_id: Uuid, password_hash: &str) -> Result<(), AppError>;
}

/// Repository over persisted file records.
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn insert(&self, file: &FileRecord) -> Result<(), AppError>;

    async fn find_by_id(&self, file_id: Uuid) -> Result<Option<FileRecord>, AppError>;

    async fn find_by_share_token(&self, token: &str) -> Result<Option<FileRecord>, AppError>;

    async fn list_owned(&self, owner_id: Uuid) -> Result<Vec<FileRecord>, AppError>;

    async fn list_shared_with(&self, user_id: Uuid) -> Result<Vec<FileRecord>, AppError>;

    async fn set_shared_with(&self, file_id: Uuid, shared_with: &[Uuid]) -> Result<(), AppError>;

    async fn set_share_token(
        &self,
        file_id: Uuid,
        token: Option<&str>,
        expiry: Option<DateTime<Utc>>,
    ) -> Result<(), AppError>;
}

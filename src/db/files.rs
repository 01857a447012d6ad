use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::file::FileRecord;

use super::FileStore;

pub struct PgFileStore {
    pool: PgPool,
}

impl PgFileStore {
    pub fn new(pool: PgPool) -> Self {
        PgFileStore { pool }
    }
}

#[async_trait]
impl FileStore for PgFileStore {
    async fn insert(&self, file: &FileRecord) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO files (file_id, filename, mime_type, size_bytes, url, storage_key, format, owner_id, shared_with, share_token, share_token_expiry, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(file.file_id)
        .bind(&file.filename)
        .bind(&file.mime_type)
        .bind(file.size_bytes)
        .bind(&file.url)
        .bind(&file.storage_key)
        .bind(&file.format)
        .bind(file.owner_id)
        .bind(&file.shared_with)
        .bind(&file.share_token)
        .bind(file.share_token_expiry)
        .bind(file.created_at)
        .bind(file.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_id(&self, file_id: Uuid) -> Result<Option<FileRecord>, AppError> {
        let file = sqlx::query_as::<_, FileRecord>("SELECT * FROM files WHERE file_id = $1")
            .bind(file_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(file)
    }

    async fn find_by_share_token(&self, token: &str) -> Result<Option<FileRecord>, AppError> {
        let file = sqlx::query_as::<_, FileRecord>("SELECT * FROM files WHERE share_token = $1")
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;
        Ok(file)
    }

    async fn list_owned(&self, owner_id: Uuid) -> Result<Vec<FileRecord>, AppError> {
        let files = sqlx::query_as::<_, FileRecord>(
            "SELECT * FROM files WHERE owner_id = $1 ORDER BY created_at DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(files)
    }

    async fn list_shared_with(&self, user_id: Uuid) -> Result<Vec<FileRecord>, AppError> {
        let files = sqlx::query_as::<_, FileRecord>(
            "SELECT * FROM files WHERE $1 = ANY(shared_with) ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(files)
    }

    async fn set_shared_with(&self, file_id: Uuid, shared_with: &[Uuid]) -> Result<(), AppError> {
        sqlx::query("UPDATE files SET shared_with = $2, updated_at = $3 WHERE file_id = $1")
            .bind(file_id)
            .bind(shared_with)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_share_token(
        &self,
        file_id: Uuid,
        token: Option<&str>,
        expiry: Option<DateTime<Utc>>,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE files SET share_token = $2, share_token_expiry = $3, updated_at = $4 WHERE file_id = $1",
        )
        .bind(file_id)
        .bind(token)
        .bind(expiry)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

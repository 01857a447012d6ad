use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::config::Config;
use crate::db::{FileStore, UserStore};
use crate::errors::AppError;
use crate::middleware::AuthenticatedUser;
use crate::models::file::{FileAccess, FileRecord, SharedFileMeta};
use crate::storage::BlobStore;
use crate::utils::validation::validate_payload;

const UPLOAD_FIELD_NAME: &str = "addFiles";
const SHARE_TOKEN_LEN: usize = 48;

#[derive(Deserialize, Validate)]
pub struct ShareRequest {
    #[validate(length(min = 1))]
    emails: Vec<String>,
}

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RemoveSharedUsersRequest {
    #[validate(length(min = 1))]
    user_ids: Vec<Uuid>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareLinkRequest {
    expire_date_time: String,
}

#[derive(Serialize)]
pub struct UploadResponse {
    files: Vec<String>,
}

#[derive(Serialize)]
pub struct FilesResponse {
    files: Vec<FileRecord>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedFilesResponse {
    file_metadata: Vec<SharedFileMeta>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedUsersResponse {
    shared_with: Vec<Uuid>,
}

#[derive(Serialize)]
pub struct ShareLinkResponse {
    url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareTokenResponse {
    token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct SignedUrlResponse {
    url: String,
}

#[derive(Serialize)]
pub struct MessageResponse {
    message: String,
}

fn parse_expiry(value: &str) -> Result<DateTime<Utc>, AppError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| {
            AppError::Validation("expireDateTime must be an RFC 3339 timestamp".to_string())
        })
}

fn share_link_path(file_id: Uuid, expiry: DateTime<Utc>) -> String {
    format!("/files/open/{}/{}", file_id, expiry.timestamp())
}

fn generate_share_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SHARE_TOKEN_LEN)
        .map(char::from)
        .collect()
}

async fn load_file(files: &dyn FileStore, file_id: Uuid) -> Result<FileRecord, AppError> {
    files
        .find_by_id(file_id)
        .await?
        .ok_or_else(|| AppError::NotFound("File not found".to_string()))
}

pub async fn register_files(
    auth: AuthenticatedUser,
    mut payload: Multipart,
    files: web::Data<dyn FileStore>,
    store: web::Data<dyn BlobStore>,
    config: web::Data<Config>,
) -> Result<HttpResponse, actix_web::Error> {
    let mut created: Vec<String> = Vec::new();

    while let Some(item) = payload.next().await {
        let mut field =
            item.map_err(|e| AppError::Validation(format!("Invalid multipart payload: {}", e)))?;

        if field.name() != UPLOAD_FIELD_NAME {
            return Err(AppError::Validation(format!("Unexpected field {}", field.name())).into());
        }
        if created.len() >= config.max_files_per_upload {
            return Err(AppError::Validation(format!(
                "At most {} files can be uploaded at once",
                config.max_files_per_upload
            ))
            .into());
        }

        let filename = field
            .content_disposition()
            .get_filename()
            .unwrap_or("unknown_file")
            .to_string();
        let declared_mime = field.content_type().map(|mime| mime.to_string());

        let mut data: Vec<u8> = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk
                .map_err(|e| AppError::Validation(format!("Failed to read {}: {}", filename, e)))?;
            if data.len() + chunk.len() > config.max_file_size_bytes {
                return Err(
                    AppError::Validation(format!("File {} exceeds size limit", filename)).into(),
                );
            }
            data.extend_from_slice(&chunk);
        }
        if data.is_empty() {
            return Err(AppError::Validation(format!("Invalid file provided: {}", filename)).into());
        }

        let sniffed = infer::get(&data);
        let mime_type = declared_mime
            .or_else(|| sniffed.map(|t| t.mime_type().to_string()))
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let format = sniffed.map(|t| t.extension().to_string());

        let file_id = Uuid::new_v4();
        let storage_key = match &format {
            Some(ext) => format!("{}.{}", file_id, ext),
            None => file_id.to_string(),
        };

        let size_bytes = data.len() as i64;
        let locator = store
            .put(&storage_key, data, &mime_type)
            .await
            .map_err(|e| {
                log::error!("Blob store upload failed: {}", e);
                AppError::StorageError(format!("Upload failed for {}", filename))
            })?;

        let now = Utc::now();
        let record = FileRecord {
            file_id,
            filename: filename.clone(),
            mime_type,
            size_bytes,
            url: locator.url,
            storage_key: locator.key,
            format,
            owner_id: auth.0.user_id,
            shared_with: Vec::new(),
            share_token: None,
            share_token_expiry: None,
            created_at: now,
            updated_at: now,
        };
        files.insert(&record).await?;
        created.push(filename);
    }

    if created.is_empty() {
        return Err(AppError::Validation("Provide files to upload".to_string()).into());
    }

    Ok(HttpResponse::Created().json(UploadResponse { files: created }))
}

pub async fn owned_files(
    auth: AuthenticatedUser,
    files: web::Data<dyn FileStore>,
) -> Result<HttpResponse, actix_web::Error> {
    let files = files.list_owned(auth.0.user_id).await?;
    Ok(HttpResponse::Ok().json(FilesResponse { files }))
}

pub async fn shared_files(
    auth: AuthenticatedUser,
    files: web::Data<dyn FileStore>,
) -> Result<HttpResponse, actix_web::Error> {
    let files = files.list_shared_with(auth.0.user_id).await?;
    let file_metadata = files.iter().map(SharedFileMeta::from).collect();
    Ok(HttpResponse::Ok().json(SharedFilesResponse { file_metadata }))
}

pub async fn share_with_users(
    auth: AuthenticatedUser,
    path: web::Path<Uuid>,
    body: web::Json<ShareRequest>,
    files: web::Data<dyn FileStore>,
    users: web::Data<dyn UserStore>,
) -> Result<HttpResponse, actix_web::Error> {
    validate_payload(&body.0)?;
    let file_id = path.into_inner();

    let mut file = load_file(files.get_ref(), file_id).await?;
    if file.classify(auth.0.user_id) != FileAccess::Owner {
        return Err(AppError::Forbidden("Only the owner can share the file".to_string()).into());
    }

    // addresses that resolve to no user are silently dropped; the owner is
    // dropped by the union itself
    let resolved = users.find_by_emails(&body.emails).await?;
    let user_ids: Vec<Uuid> = resolved.iter().map(|u| u.user_id).collect();
    file.add_shared_users(&user_ids);

    files.set_shared_with(file_id, &file.shared_with).await?;

    Ok(HttpResponse::Ok().json(SharedUsersResponse {
        shared_with: file.shared_with,
    }))
}

pub async fn remove_shared_users(
    auth: AuthenticatedUser,
    path: web::Path<Uuid>,
    body: web::Json<RemoveSharedUsersRequest>,
    files: web::Data<dyn FileStore>,
) -> Result<HttpResponse, actix_web::Error> {
    validate_payload(&body.0)?;
    let file_id = path.into_inner();

    let mut file = load_file(files.get_ref(), file_id).await?;
    if file.classify(auth.0.user_id) != FileAccess::Owner {
        return Err(
            AppError::Forbidden("Only the owner can modify shared users".to_string()).into(),
        );
    }

    file.remove_shared_users(&body.user_ids);
    files.set_shared_with(file_id, &file.shared_with).await?;

    Ok(HttpResponse::Ok().json(SharedUsersResponse {
        shared_with: file.shared_with,
    }))
}

pub async fn get_file(
    auth: AuthenticatedUser,
    path: web::Path<Uuid>,
    files: web::Data<dyn FileStore>,
    store: web::Data<dyn BlobStore>,
) -> Result<HttpResponse, actix_web::Error> {
    let file = load_file(files.get_ref(), path.into_inner()).await?;
    if file.classify(auth.0.user_id) == FileAccess::None {
        return Err(AppError::Forbidden("Forbidden".to_string()).into());
    }

    let download = store.stream(&file.storage_key).await?;
    let content_type = download
        .content_type
        .unwrap_or_else(|| file.mime_type.clone());

    Ok(HttpResponse::Ok()
        .content_type(content_type)
        .streaming(download.stream))
}

pub async fn get_signed_url(
    auth: AuthenticatedUser,
    path: web::Path<Uuid>,
    files: web::Data<dyn FileStore>,
    store: web::Data<dyn BlobStore>,
) -> Result<HttpResponse, actix_web::Error> {
    let file = load_file(files.get_ref(), path.into_inner()).await?;
    if file.classify(auth.0.user_id) == FileAccess::None {
        return Err(AppError::Forbidden("Forbidden".to_string()).into());
    }

    let url = store.signed_url(&file.storage_key).await?;
    Ok(HttpResponse::Ok().json(SignedUrlResponse { url }))
}

pub async fn create_share_link(
    auth: AuthenticatedUser,
    path: web::Path<Uuid>,
    body: web::Json<ShareLinkRequest>,
    files: web::Data<dyn FileStore>,
    config: web::Data<Config>,
) -> Result<HttpResponse, actix_web::Error> {
    let expires_at = parse_expiry(&body.expire_date_time)?;

    let file = load_file(files.get_ref(), path.into_inner()).await?;
    if file.classify(auth.0.user_id) != FileAccess::Owner {
        return Err(
            AppError::Forbidden("Only the owner can create share links".to_string()).into(),
        );
    }

    let url = format!(
        "{}{}",
        config.base_url.trim_end_matches('/'),
        share_link_path(file.file_id, expires_at)
    );
    Ok(HttpResponse::Ok().json(ShareLinkResponse { url }))
}

pub async fn open_shared_link(
    _auth: AuthenticatedUser,
    path: web::Path<(Uuid, i64)>,
    files: web::Data<dyn FileStore>,
    store: web::Data<dyn BlobStore>,
) -> Result<HttpResponse, actix_web::Error> {
    let (file_id, expiry_ts) = path.into_inner();

    // the expiry embedded in the link is enforced here; anyone with a live
    // link and a session may open the file
    if expiry_ts < Utc::now().timestamp() {
        return Err(AppError::Gone("Link expired".to_string()).into());
    }

    let file = load_file(files.get_ref(), file_id).await?;
    let download = store.stream(&file.storage_key).await?;
    let content_type = download
        .content_type
        .unwrap_or_else(|| file.mime_type.clone());

    Ok(HttpResponse::Ok()
        .content_type(content_type)
        .streaming(download.stream))
}

pub async fn create_share_token(
    auth: AuthenticatedUser,
    path: web::Path<Uuid>,
    body: web::Json<ShareLinkRequest>,
    files: web::Data<dyn FileStore>,
) -> Result<HttpResponse, actix_web::Error> {
    let expires_at = parse_expiry(&body.expire_date_time)?;

    let file = load_file(files.get_ref(), path.into_inner()).await?;
    if file.classify(auth.0.user_id) != FileAccess::Owner {
        return Err(
            AppError::Forbidden("Only the owner can create share links".to_string()).into(),
        );
    }

    let token = generate_share_token();
    files
        .set_share_token(file.file_id, Some(&token), Some(expires_at))
        .await?;

    Ok(HttpResponse::Ok().json(ShareTokenResponse { token, expires_at }))
}

pub async fn access_by_share_token(
    _auth: AuthenticatedUser,
    path: web::Path<String>,
    files: web::Data<dyn FileStore>,
    store: web::Data<dyn BlobStore>,
) -> Result<HttpResponse, actix_web::Error> {
    let token = path.into_inner();

    let file = files
        .find_by_share_token(&token)
        .await?
        .ok_or_else(|| AppError::NotFound("Invalid or expired token".to_string()))?;

    if file.share_token_expired(Utc::now()) {
        return Err(AppError::Gone("Link expired".to_string()).into());
    }

    let url = store.signed_url(&file.storage_key).await?;
    Ok(HttpResponse::Ok().json(SignedUrlResponse { url }))
}

pub async fn revoke_share_link(
    auth: AuthenticatedUser,
    path: web::Path<Uuid>,
    files: web::Data<dyn FileStore>,
) -> Result<HttpResponse, actix_web::Error> {
    let file = load_file(files.get_ref(), path.into_inner()).await?;
    if file.classify(auth.0.user_id) != FileAccess::Owner {
        return Err(
            AppError::Forbidden("Only the owner can revoke the share link".to_string()).into(),
        );
    }

    files.set_share_token(file.file_id, None, None).await?;

    Ok(HttpResponse::Ok().json(MessageResponse {
        message: "Share link revoked".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn share_link_path_embeds_id_and_unix_expiry() {
        let file_id = Uuid::new_v4();
        let expiry = Utc::now() + Duration::hours(1);

        let path = share_link_path(file_id, expiry);
        assert_eq!(
            path,
            format!("/files/open/{}/{}", file_id, expiry.timestamp())
        );
        assert!(expiry.timestamp() > Utc::now().timestamp());
    }

    #[test]
    fn expiry_must_be_rfc3339() {
        assert!(parse_expiry("2026-09-01T12:00:00Z").is_ok());
        assert!(parse_expiry("2026-09-01T12:00:00+05:30").is_ok());
        assert!(parse_expiry("tomorrow").is_err());
        assert!(parse_expiry("").is_err());
    }

    #[test]
    fn parsed_expiry_is_normalized_to_utc() {
        let parsed = parse_expiry("2026-09-01T12:00:00+02:00").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2026-09-01T10:00:00+00:00");
    }

    #[test]
    fn share_tokens_are_opaque_and_fixed_length() {
        let a = generate_share_token();
        let b = generate_share_token();

        assert_eq!(a.len(), SHARE_TOKEN_LEN);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }
}

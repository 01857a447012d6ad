use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub file_id: Uuid,
    pub filename: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub url: String,
    pub storage_key: String,
    pub format: Option<String>,
    pub owner_id: Uuid,
    pub shared_with: Vec<Uuid>,
    pub share_token: Option<String>,
    pub share_token_expiry: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// How a requester relates to a file. Exactly one of these holds for any
/// (file, requester) pair; the owner is never also counted as shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAccess {
    Owner,
    Shared,
    None,
}

impl FileRecord {
    pub fn classify(&self, requester: Uuid) -> FileAccess {
        if self.owner_id == requester {
            FileAccess::Owner
        } else if self.shared_with.contains(&requester) {
            FileAccess::Shared
        } else {
            FileAccess::None
        }
    }

    /// Unions the given ids into the shared set. The owner and ids already
    /// present are skipped, so re-sharing is a no-op.
    pub fn add_shared_users(&mut self, user_ids: &[Uuid]) {
        for id in user_ids {
            if *id != self.owner_id && !self.shared_with.contains(id) {
                self.shared_with.push(*id);
            }
        }
    }

    /// Removes the given ids from the shared set; ids not present are ignored.
    pub fn remove_shared_users(&mut self, user_ids: &[Uuid]) {
        self.shared_with.retain(|id| !user_ids.contains(id));
    }

    pub fn share_token_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.share_token_expiry, Some(expiry) if expiry < now)
    }
}

/// Lightweight view returned for files shared with the caller. No locator.
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SharedFileMeta {
    pub id: Uuid,
    pub filename: String,
    pub size_bytes: i64,
    pub created_at: DateTime<Utc>,
}

impl From<&FileRecord> for SharedFileMeta {
    fn from(file: &FileRecord) -> Self {
        SharedFileMeta {
            id: file.file_id,
            filename: file.filename.clone(),
            size_bytes: file.size_bytes,
            created_at: file.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_file(owner: Uuid, shared: Vec<Uuid>) -> FileRecord {
        FileRecord {
            file_id: Uuid::new_v4(),
            filename: "report.pdf".to_string(),
            mime_type: "application/pdf".to_string(),
            size_bytes: 5 * 1024 * 1024,
            url: "https://bucket.s3.amazonaws.com/key".to_string(),
            storage_key: "key".to_string(),
            format: Some("pdf".to_string()),
            owner_id: owner,
            shared_with: shared,
            share_token: None,
            share_token_expiry: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn classify_is_total_and_exclusive() {
        let owner = Uuid::new_v4();
        let shared = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let file = sample_file(owner, vec![shared]);

        assert_eq!(file.classify(owner), FileAccess::Owner);
        assert_eq!(file.classify(shared), FileAccess::Shared);
        assert_eq!(file.classify(stranger), FileAccess::None);
    }

    #[test]
    fn owner_is_never_counted_as_shared() {
        let owner = Uuid::new_v4();
        // even a corrupted shared set must not demote the owner
        let file = sample_file(owner, vec![owner]);
        assert_eq!(file.classify(owner), FileAccess::Owner);
    }

    #[test]
    fn sharing_is_idempotent() {
        let owner = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let mut file = sample_file(owner, vec![bob]);

        file.add_shared_users(&[bob]);
        assert_eq!(file.shared_with, vec![bob]);
    }

    #[test]
    fn sharing_with_the_owner_is_dropped() {
        let owner = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let mut file = sample_file(owner, vec![]);

        file.add_shared_users(&[owner, bob]);
        assert_eq!(file.shared_with, vec![bob]);
    }

    #[test]
    fn removing_absent_users_is_a_no_op() {
        let owner = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let mut file = sample_file(owner, vec![bob]);

        file.remove_shared_users(&[Uuid::new_v4()]);
        assert_eq!(file.shared_with, vec![bob]);

        file.remove_shared_users(&[bob]);
        assert!(file.shared_with.is_empty());
    }

    #[test]
    fn share_token_expiry_is_checked_against_now() {
        let now = Utc::now();
        let mut file = sample_file(Uuid::new_v4(), vec![]);

        file.share_token = Some("token".to_string());
        file.share_token_expiry = Some(now + Duration::hours(1));
        assert!(!file.share_token_expired(now));

        file.share_token_expiry = Some(now - Duration::seconds(1));
        assert!(file.share_token_expired(now));

        // no expiry recorded means the token does not lapse
        file.share_token_expiry = None;
        assert!(!file.share_token_expired(now));
    }

    #[test]
    fn shared_file_meta_serializes_without_locator() {
        let file = sample_file(Uuid::new_v4(), vec![]);
        let value = serde_json::to_value(SharedFileMeta::from(&file)).unwrap();
        let body = value.as_object().unwrap();
        assert!(body.contains_key("filename"));
        assert!(body.contains_key("sizeBytes"));
        assert!(!body.contains_key("url"));
        assert!(!body.contains_key("storageKey"));
    }
}

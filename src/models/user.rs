use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct User {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub phone_number: String,
    pub full_name: String,
    pub password: String,
    pub refresh_token: Option<String>,
    pub created_at: chrono::DateTime<Utc>,
    pub updated_at: chrono::DateTime<Utc>,
}

/// Outward-facing projection of a user. Never carries the password hash
/// or the stored refresh token.
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub phone_number: String,
    pub full_name: String,
    pub created_at: chrono::DateTime<Utc>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        UserResponse {
            user_id: user.user_id,
            username: user.username.clone(),
            email: user.email.clone(),
            phone_number: user.phone_number.clone(),
            full_name: user.full_name.clone(),
            created_at: user.created_at,
        }
    }
}

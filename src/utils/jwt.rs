use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::config::Config;
use crate::models::user::User;

/// Claims carried by short-lived access tokens.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String, // User id
    pub email: String,
    pub username: String,
    pub exp: usize, // Expiration timestamp
}

/// Claims carried by long-lived refresh tokens. Identity id only.
#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: String,
    pub exp: usize,
}

pub fn generate_access_token(
    user: &User,
    config: &Config,
) -> Result<String, jsonwebtoken::errors::Error> {
    let expiration = (OffsetDateTime::now_utc()
        + Duration::minutes(config.access_token_expiry_minutes))
    .unix_timestamp() as usize;

    let claims = AccessClaims {
        sub: user.user_id.to_string(),
        email: user.email.clone(),
        username: user.username.clone(),
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.access_token_secret.as_bytes()),
    )
}

pub fn generate_refresh_token(
    user_id: Uuid,
    config: &Config,
) -> Result<String, jsonwebtoken::errors::Error> {
    let expiration = (OffsetDateTime::now_utc()
        + Duration::days(config.refresh_token_expiry_days))
    .unix_timestamp() as usize;

    let claims = RefreshClaims {
        sub: user_id.to_string(),
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.refresh_token_secret.as_bytes()),
    )
}

pub fn verify_access_token(
    token: &str,
    secret: &str,
) -> Result<AccessClaims, jsonwebtoken::errors::Error> {
    decode::<AccessClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(jsonwebtoken::Algorithm::HS256),
    )
    .map(|data| data.claims)
}

pub fn verify_refresh_token(
    token: &str,
    secret: &str,
) -> Result<RefreshClaims, jsonwebtoken::errors::Error> {
    decode::<RefreshClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(jsonwebtoken::Algorithm::HS256),
    )
    .map(|data| data.claims)
}

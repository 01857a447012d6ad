use actix_web::cookie::{time::Duration as CookieDuration, Cookie};
use actix_web::{web, HttpRequest, HttpResponse};
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::config::Config;
use crate::db::UserStore;
use crate::errors::AppError;
use crate::middleware::AuthenticatedUser;
use crate::models::user::{User, UserResponse};
use crate::utils::jwt;
use crate::utils::validation::validate_payload;

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 32))]
    username: String,
    #[validate(email)]
    email: String,
    #[validate(custom = "validate_phone_number")]
    phone_number: String,
    #[validate(length(min = 1, max = 64))]
    full_name: String,
    #[validate(length(min = 8, max = 64))]
    password: String,
}

#[derive(Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    email: String,
    #[validate(length(min = 1))]
    password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    refresh_token: Option<String>,
}

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1))]
    old_password: String,
    #[validate(length(min = 8, max = 64))]
    new_password: String,
    #[validate(length(min = 1))]
    confirm_password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    user: UserResponse,
    access_token: String,
    refresh_token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPairResponse {
    access_token: String,
    refresh_token: String,
}

#[derive(Serialize)]
pub struct MessageResponse {
    message: String,
}

fn validate_phone_number(phone: &str) -> Result<(), validator::ValidationError> {
    if phone.len() != 10 || !phone.chars().all(|c| c.is_ascii_digit()) {
        return Err(validator::ValidationError::new("Invalid phone number"));
    }
    Ok(())
}

fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AppError::InternalServerError("Hashing error".to_string()))
}

fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|_| AppError::InternalServerError("Invalid password hash".to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Issues an access + refresh pair and overwrites the stored refresh slot.
async fn issue_token_pair(
    user: &User,
    users: &dyn UserStore,
    config: &Config,
) -> Result<(String, String), AppError> {
    let access_token = jwt::generate_access_token(user, config)
        .map_err(|_| AppError::InternalServerError("Token generation error".to_string()))?;
    let refresh_token = jwt::generate_refresh_token(user.user_id, config)
        .map_err(|_| AppError::InternalServerError("Token generation error".to_string()))?;

    users
        .set_refresh_token(user.user_id, Some(&refresh_token))
        .await?;

    Ok((access_token, refresh_token))
}

fn auth_cookie(name: &'static str, value: &str, max_age: CookieDuration) -> Cookie<'static> {
    Cookie::build(name, value.to_string())
        .path("/")
        .http_only(true)
        .secure(true)
        .max_age(max_age)
        .finish()
}

fn expired_cookie(name: &'static str) -> Cookie<'static> {
    Cookie::build(name, "")
        .path("/")
        .http_only(true)
        .secure(true)
        .max_age(CookieDuration::ZERO)
        .finish()
}

pub async fn register(
    body: web::Json<RegisterRequest>,
    users: web::Data<dyn UserStore>,
) -> Result<HttpResponse, actix_web::Error> {
    validate_payload(&body.0)?;
    let body = body.into_inner();

    if users
        .exists_with_identity(&body.username, &body.email, &body.phone_number)
        .await?
    {
        return Err(AppError::Conflict(format!(
            "User with username {}, email {} or phone number {} already exists",
            body.username, body.email, body.phone_number
        ))
        .into());
    }

    let now = Utc::now();
    let user = User {
        user_id: Uuid::new_v4(),
        username: body.username.to_lowercase(),
        email: body.email,
        phone_number: body.phone_number,
        full_name: body.full_name,
        password: hash_password(&body.password)?,
        refresh_token: None,
        created_at: now,
        updated_at: now,
    };
    users.insert(&user).await?;

    Ok(HttpResponse::Created().json(UserResponse::from(&user)))
}

pub async fn login(
    body: web::Json<LoginRequest>,
    users: web::Data<dyn UserStore>,
    config: web::Data<Config>,
) -> Result<HttpResponse, actix_web::Error> {
    validate_payload(&body.0)?;
    let body = body.into_inner();

    let user = users
        .find_by_email(&body.email)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if !verify_password(&body.password, &user.password)? {
        return Err(AppError::Unauthorized("Incorrect password".to_string()).into());
    }

    let (access_token, refresh_token) = issue_token_pair(&user, users.get_ref(), &config).await?;

    Ok(HttpResponse::Ok()
        .cookie(auth_cookie(
            "accessToken",
            &access_token,
            CookieDuration::minutes(config.access_token_expiry_minutes),
        ))
        .cookie(auth_cookie(
            "refreshToken",
            &refresh_token,
            CookieDuration::days(config.refresh_token_expiry_days),
        ))
        .json(LoginResponse {
            user: UserResponse::from(&user),
            access_token,
            refresh_token,
        }))
}

pub async fn logout(
    auth: AuthenticatedUser,
    users: web::Data<dyn UserStore>,
) -> Result<HttpResponse, actix_web::Error> {
    users.set_refresh_token(auth.0.user_id, None).await?;

    Ok(HttpResponse::Ok()
        .cookie(expired_cookie("accessToken"))
        .cookie(expired_cookie("refreshToken"))
        .json(MessageResponse {
            message: "User logged out".to_string(),
        }))
}

pub async fn refresh_access_token(
    req: HttpRequest,
    body: Option<web::Json<RefreshRequest>>,
    users: web::Data<dyn UserStore>,
    config: web::Data<Config>,
) -> Result<HttpResponse, actix_web::Error> {
    let presented = req
        .cookie("refreshToken")
        .map(|c| c.value().to_string())
        .or_else(|| body.as_ref().and_then(|b| b.refresh_token.clone()))
        .ok_or_else(|| AppError::Unauthorized("No refresh token found".to_string()))?;

    let claims = jwt::verify_refresh_token(&presented, &config.refresh_token_secret)
        .map_err(|_| AppError::Unauthorized("Invalid refresh token".to_string()))?;
    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| AppError::Unauthorized("Invalid refresh token".to_string()))?;

    let user = users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid refresh token".to_string()))?;

    // the stored slot is the revocation mechanism: logout clears it, a later
    // login overwrites it
    if user.refresh_token.as_deref() != Some(presented.as_str()) {
        return Err(AppError::Unauthorized("Refresh token has been revoked".to_string()).into());
    }

    let (access_token, refresh_token) = issue_token_pair(&user, users.get_ref(), &config).await?;

    Ok(HttpResponse::Ok()
        .cookie(auth_cookie(
            "accessToken",
            &access_token,
            CookieDuration::minutes(config.access_token_expiry_minutes),
        ))
        .cookie(auth_cookie(
            "refreshToken",
            &refresh_token,
            CookieDuration::days(config.refresh_token_expiry_days),
        ))
        .json(TokenPairResponse {
            access_token,
            refresh_token,
        }))
}

pub async fn change_password(
    auth: AuthenticatedUser,
    body: web::Json<ChangePasswordRequest>,
    users: web::Data<dyn UserStore>,
) -> Result<HttpResponse, actix_web::Error> {
    validate_payload(&body.0)?;
    let body = body.into_inner();

    if body.new_password != body.confirm_password {
        return Err(AppError::Validation(
            "New password and confirm password do not match".to_string(),
        )
        .into());
    }

    if !verify_password(&body.old_password, &auth.0.password)? {
        return Err(AppError::Unauthorized("Provide the correct password".to_string()).into());
    }

    users
        .set_password(auth.0.user_id, &hash_password(&body.new_password)?)
        .await?;

    Ok(HttpResponse::Created().json(MessageResponse {
        message: "Password changed successfully".to_string(),
    }))
}

pub async fn get_user_details(auth: AuthenticatedUser) -> Result<HttpResponse, actix_web::Error> {
    Ok(HttpResponse::Ok().json(UserResponse::from(&auth.0)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use actix_web::body::to_bytes;
    use async_trait::async_trait;

    struct MemUserStore {
        users: Mutex<HashMap<Uuid, User>>,
    }

    impl MemUserStore {
        fn new() -> Self {
            MemUserStore {
                users: Mutex::new(HashMap::new()),
            }
        }

        fn get(&self, user_id: Uuid) -> Option<User> {
            self.users.lock().unwrap().get(&user_id).cloned()
        }
    }

    #[async_trait]
    impl UserStore for MemUserStore {
        async fn insert(&self, user: &User) -> Result<(), AppError> {
            self.users
                .lock()
                .unwrap()
                .insert(user.user_id, user.clone());
            Ok(())
        }

        async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>, AppError> {
            Ok(self.get(user_id))
        }

        async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .values()
                .find(|u| u.email.eq_ignore_ascii_case(email))
                .cloned())
        }

        async fn find_by_emails(&self, emails: &[String]) -> Result<Vec<User>, AppError> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .values()
                .filter(|u| emails.contains(&u.email))
                .cloned()
                .collect())
        }

        async fn exists_with_identity(
            &self,
            username: &str,
            email: &str,
            phone_number: &str,
        ) -> Result<bool, AppError> {
            Ok(self.users.lock().unwrap().values().any(|u| {
                u.username.eq_ignore_ascii_case(username)
                    || u.email.eq_ignore_ascii_case(email)
                    || u.phone_number == phone_number
            }))
        }

        async fn set_refresh_token(
            &self,
            user_id: Uuid,
            refresh_token: Option<&str>,
        ) -> Result<(), AppError> {
            if let Some(user) = self.users.lock().unwrap().get_mut(&user_id) {
                user.refresh_token = refresh_token.map(str::to_string);
            }
            Ok(())
        }

        async fn set_password(&self, user_id: Uuid, password_hash: &str) -> Result<(), AppError> {
            if let Some(user) = self.users.lock().unwrap().get_mut(&user_id) {
                user.password = password_hash.to_string();
            }
            Ok(())
        }
    }

    fn test_config() -> Config {
        Config {
            port: 8080,
            base_url: "http://localhost:8080".to_string(),
            database_url: "postgres://localhost/test".to_string(),
            access_token_secret: "access-secret".to_string(),
            refresh_token_secret: "refresh-secret".to_string(),
            access_token_expiry_minutes: 15,
            refresh_token_expiry_days: 7,
            s3_bucket: "test-bucket".to_string(),
            max_file_size_bytes: 20 * 1024 * 1024,
            max_files_per_upload: 10,
        }
    }

    fn register_body() -> RegisterRequest {
        RegisterRequest {
            username: "alice".to_string(),
            email: "alice@x.com".to_string(),
            phone_number: "9999999999".to_string(),
            full_name: "Alice".to_string(),
            password: "password123".to_string(),
        }
    }

    #[test]
    fn password_hash_round_trips() {
        let hash = hash_password("password123").unwrap();
        assert!(verify_password("password123", &hash).unwrap());
        assert!(!verify_password("wrong-password", &hash).unwrap());
    }

    #[test]
    fn phone_numbers_must_be_ten_digits() {
        assert!(validate_phone_number("9999999999").is_ok());
        assert!(validate_phone_number("999999999").is_err());
        assert!(validate_phone_number("99999999990").is_err());
        assert!(validate_phone_number("99999x9999").is_err());
    }

    #[actix_web::test]
    async fn register_creates_a_user_without_leaking_credentials() {
        let users = web::Data::from(
            std::sync::Arc::new(MemUserStore::new()) as std::sync::Arc<dyn UserStore>
        );

        let response = register(web::Json(register_body()), users)
            .await
            .unwrap();
        assert_eq!(response.status(), actix_web::http::StatusCode::CREATED);

        let body = to_bytes(response.into_body()).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["username"], "alice");
        assert!(value.get("password").is_none());
        assert!(value.get("refreshToken").is_none());
    }

    #[actix_web::test]
    async fn duplicate_registration_conflicts() {
        let users = web::Data::from(
            std::sync::Arc::new(MemUserStore::new()) as std::sync::Arc<dyn UserStore>
        );

        register(web::Json(register_body()), users.clone())
            .await
            .unwrap();
        let err = register(web::Json(register_body()), users)
            .await
            .unwrap_err();
        assert_eq!(
            err.as_response_error().error_response().status(),
            actix_web::http::StatusCode::CONFLICT
        );
    }

    #[actix_web::test]
    async fn login_sets_cookies_and_returns_a_verifiable_identity() {
        let store = std::sync::Arc::new(MemUserStore::new());
        let users = web::Data::from(store.clone() as std::sync::Arc<dyn UserStore>);
        let config = web::Data::new(test_config());

        register(web::Json(register_body()), users.clone())
            .await
            .unwrap();

        let response = login(
            web::Json(LoginRequest {
                email: "alice@x.com".to_string(),
                password: "password123".to_string(),
            }),
            users,
            config.clone(),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), actix_web::http::StatusCode::OK);

        let cookies: Vec<_> = response.cookies().collect();
        assert_eq!(cookies.len(), 2);
        assert!(cookies.iter().all(|c| c.http_only() == Some(true)));

        let body = to_bytes(response.into_body()).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();

        // logging in then resolving the access token yields the same user
        let claims = jwt::verify_access_token(
            value["accessToken"].as_str().unwrap(),
            &config.access_token_secret,
        )
        .unwrap();
        assert_eq!(claims.sub, value["user"]["userId"].as_str().unwrap());

        // the refresh slot now holds the issued token
        let user_id = Uuid::parse_str(value["user"]["userId"].as_str().unwrap()).unwrap();
        assert_eq!(
            store.get(user_id).unwrap().refresh_token.as_deref(),
            value["refreshToken"].as_str()
        );
    }

    #[actix_web::test]
    async fn login_with_the_wrong_password_is_unauthorized() {
        let users = web::Data::from(
            std::sync::Arc::new(MemUserStore::new()) as std::sync::Arc<dyn UserStore>
        );
        let config = web::Data::new(test_config());

        register(web::Json(register_body()), users.clone())
            .await
            .unwrap();

        let err = login(
            web::Json(LoginRequest {
                email: "alice@x.com".to_string(),
                password: "not-the-password".to_string(),
            }),
            users,
            config,
        )
        .await
        .unwrap_err();
        assert_eq!(
            err.as_response_error().error_response().status(),
            actix_web::http::StatusCode::UNAUTHORIZED
        );
    }

    #[actix_web::test]
    async fn logout_clears_the_refresh_slot() {
        let store = std::sync::Arc::new(MemUserStore::new());
        let users = web::Data::from(store.clone() as std::sync::Arc<dyn UserStore>);
        let config = web::Data::new(test_config());

        register(web::Json(register_body()), users.clone())
            .await
            .unwrap();
        let user = store
            .users
            .lock()
            .unwrap()
            .values()
            .next()
            .cloned()
            .unwrap();

        login(
            web::Json(LoginRequest {
                email: "alice@x.com".to_string(),
                password: "password123".to_string(),
            }),
            users.clone(),
            config,
        )
        .await
        .unwrap();
        assert!(store.get(user.user_id).unwrap().refresh_token.is_some());

        let refreshed = store.get(user.user_id).unwrap();
        let response = logout(AuthenticatedUser(refreshed), users).await.unwrap();
        assert_eq!(response.status(), actix_web::http::StatusCode::OK);
        assert!(store.get(user.user_id).unwrap().refresh_token.is_none());
    }
}

use std::future::Future;
use std::pin::Pin;

use actix_web::{dev::Payload, http::header, web, FromRequest, HttpRequest};
use uuid::Uuid;

use crate::config::Config;
use crate::db::UserStore;
use crate::errors::AppError;
use crate::models::user::User;
use crate::utils::jwt;

/// The identity resolved for the current request. Populated once per request
/// from the `accessToken` cookie or the `Authorization: Bearer` header, then
/// handed to the handler as an argument.
pub struct AuthenticatedUser(pub User);

fn extract_token(req: &HttpRequest) -> Option<String> {
    if let Some(cookie) = req.cookie("accessToken") {
        return Some(cookie.value().to_string());
    }
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|auth_header| auth_header.to_str().ok())
        .and_then(|auth_value| auth_value.strip_prefix("Bearer ").map(str::to_string))
}

impl FromRequest for AuthenticatedUser {
    type Error = AppError;
    type Future = Pin<Box<dyn Future<Output = Result<Self, Self::Error>>>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let req = req.clone();
        Box::pin(async move {
            let token = extract_token(&req)
                .ok_or_else(|| AppError::Unauthorized("Missing access token".to_string()))?;

            let config = req
                .app_data::<web::Data<Config>>()
                .ok_or_else(|| {
                    AppError::InternalServerError("Configuration not available".to_string())
                })?;

            let claims = jwt::verify_access_token(&token, &config.access_token_secret)
                .map_err(|_| AppError::Unauthorized("Invalid access token".to_string()))?;

            let user_id = Uuid::parse_str(&claims.sub)
                .map_err(|_| AppError::Unauthorized("Invalid access token".to_string()))?;

            let users = req.app_data::<web::Data<dyn UserStore>>().ok_or_else(|| {
                AppError::InternalServerError("User store not available".to_string())
            })?;

            // the token may outlive the account it was minted for
            let user = users
                .find_by_id(user_id)
                .await?
                .ok_or_else(|| AppError::Unauthorized("Invalid access token".to_string()))?;

            Ok(AuthenticatedUser(user))
        })
    }
}

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use serde::Deserialize;
use tracing::{error, info};

use crate::auth::principal::AuthenticatedPrincipal;
use crate::auth::service::{removal_cookies, session_cookies};
use crate::auth::token::{TokenError, TOKEN_PREFIX};
use crate::auth::{ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AuthRequest {
    pub email: String,
    pub password: String,
}

impl AuthRequest {
    /// Shape checks on the login body. An empty email is left for the
    /// credential verifier, which answers user-not-found for it.
    fn validate(&self) -> Result<(), AppError> {
        if !self.email.is_empty() && !email_shaped(&self.email) {
            return Err(AppError::ValidationError(
                "Email address is not valid".to_string(),
            ));
        }
        if !password_shaped(&self.password) {
            return Err(AppError::ValidationError(
                "Password must be 8-16 characters and contain letters and numbers".to_string(),
            ));
        }
        Ok(())
    }
}

fn email_shaped(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.contains(char::is_whitespace)
}

fn password_shaped(password: &str) -> bool {
    (8..=16).contains(&password.len())
        && password.chars().any(|c| c.is_ascii_alphabetic())
        && password.chars().any(|c| c.is_ascii_digit())
}

/// Login endpoint: verifies credentials and answers with the cookie pair,
/// empty body.
pub async fn login(
    req: web::Json<AuthRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    info!("Received login request for email: {}", req.email);
    req.validate()?;

    match state
        .auth_service
        .verify_credentials(&req.email, &req.password)
        .await
    {
        Ok(user) => {
            let tokens = state.auth_service.issue_session(&user, Utc::now()).await?;
            info!("Login successful for email: {}", req.email);
            let (access, refresh) = session_cookies(&tokens);
            Ok(HttpResponse::Ok().cookie(access).cookie(refresh).finish())
        }
        Err(e) => {
            error!("Login failed for email: {}: {}", req.email, e);
            Err(e)
        }
    }
}

/// Explicit invalidation: deletes the refresh session named by the cookie
/// pair and expires both cookies. An expired access token still identifies
/// its owner here.
pub async fn logout(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let access = req.cookie(ACCESS_TOKEN_COOKIE).map(|c| c.value().to_string());
    let refresh = req.cookie(REFRESH_TOKEN_COOKIE).map(|c| c.value().to_string());

    if let (Some(access), Some(refresh)) = (access, refresh) {
        let token = access.strip_prefix(TOKEN_PREFIX).unwrap_or(&access);
        let subject = match state.auth_service.codec().verify(token, Utc::now()) {
            Ok(claims) => claims.user_id(),
            Err(TokenError::Expired(claims)) => claims.user_id(),
            Err(_) => None,
        };

        if let Some(user_id) = subject {
            if state.auth_service.revoke_session(user_id, &refresh).await? {
                info!("Revoked refresh session for user {}", user_id);
            }
        }
    }

    let (access, refresh) = removal_cookies();
    Ok(HttpResponse::Ok()
        .cookie(access)
        .cookie(refresh)
        .json(serde_json::json!({
            "message": "Successfully logged out"
        })))
}

/// Identity echo for authenticated callers; the extractor answers 401 when
/// no principal was attached.
pub async fn current_user(principal: AuthenticatedPrincipal) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "id": principal.user_id,
        "name": principal.name,
        "authorities": principal.authorities,
    }))
}

use std::future::{ready, Ready};
use std::rc::Rc;

use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::error::ErrorInternalServerError;
use actix_web::{web, Error, HttpMessage};
use chrono::{DateTime, Duration, Utc};
use futures::future::LocalBoxFuture;
use tracing::debug;

use crate::auth::principal::AuthenticatedPrincipal;
use crate::auth::service::{session_cookies, AuthService, IssuedTokens};
use crate::auth::token::{TokenError, TOKEN_PREFIX};
use crate::auth::{ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
use crate::error::AppError;
use crate::AppState;

/// A refresh session entering the final week before its expiry gets a new
/// token value and a full TTL when it renews an access token.
pub(crate) const ROTATION_WINDOW_DAYS: i64 = 7;

/// What a single pass through the authenticator produced: possibly a
/// principal, and possibly a fresh cookie pair to hand back to the client.
pub struct AuthOutcome {
    pub principal: Option<AuthenticatedPrincipal>,
    pub reissued: Option<IssuedTokens>,
}

impl AuthOutcome {
    fn anonymous() -> Self {
        Self {
            principal: None,
            reissued: None,
        }
    }
}

/// The per-request authentication gate. Single pass, no retry: the request
/// either authenticates on its access token, renews once through its
/// refresh token, or continues with no principal attached. Only store
/// failures surface as errors.
pub(crate) async fn authenticate_request(
    auth: &AuthService,
    access_token: Option<&str>,
    refresh_token: Option<&str>,
    now: DateTime<Utc>,
) -> Result<AuthOutcome, AppError> {
    let Some(raw) = access_token else {
        return Ok(AuthOutcome::anonymous());
    };
    let token = raw.strip_prefix(TOKEN_PREFIX).unwrap_or(raw);

    let expired_claims = match auth.codec.verify(token, now) {
        Ok(claims) => {
            return Ok(AuthOutcome {
                principal: AuthenticatedPrincipal::from_claims(claims),
                reissued: None,
            });
        }
        Err(TokenError::Expired(claims)) => claims,
        Err(_) => {
            // Tampered or unparseable tokens never reach the renewal path.
            debug!("Discarding unverifiable access token");
            return Ok(AuthOutcome::anonymous());
        }
    };

    // Expired but genuinely ours: try a refresh-token renewal.
    let Some(user_id) = expired_claims.user_id() else {
        return Ok(AuthOutcome::anonymous());
    };
    let Some(refresh_token) = refresh_token else {
        return Ok(AuthOutcome::anonymous());
    };
    let Some(user) = auth.users.find_by_id(user_id).await? else {
        return Ok(AuthOutcome::anonymous());
    };
    let Some(mut session) = auth.sessions.find_session(user_id, refresh_token).await? else {
        return Ok(AuthOutcome::anonymous());
    };

    if session.is_expired(now) {
        // The refresh token itself ran out; the row is dead weight.
        auth.sessions.delete(&session).await?;
        debug!("Refresh session for user {} expired; login required", user_id);
        return Ok(AuthOutcome::anonymous());
    }

    if auth.config.rotate_refresh && session.within_rotation_window(now, ROTATION_WINDOW_DAYS) {
        session.refresh_token = auth.token_source.generate();
        session.expires_at = now + Duration::days(auth.config.refresh_expiry_days);
        session = auth.sessions.save(session).await?;
        debug!("Rotated refresh token for user {}", user_id);
    }

    let access_token = auth.codec.mint(&user, now)?;
    let claims = auth.codec.verify(&access_token, now).map_err(|e| {
        AppError::InternalError(format!("Freshly minted token failed verification: {}", e))
    })?;

    let reissued = IssuedTokens {
        access_token,
        refresh_token: session.refresh_token.clone(),
        max_age_secs: auth.config.refresh_expiry_days * 24 * 60 * 60,
    };

    Ok(AuthOutcome {
        principal: AuthenticatedPrincipal::from_claims(claims),
        reissued: Some(reissued),
    })
}

/// Actix middleware wrapping every route with `authenticate_request`.
/// Attaches the principal to request extensions and, after the inner
/// service responds, sets the renewed cookie pair when one was issued.
pub struct Authentication;

impl<S, B> Transform<S, ServiceRequest> for Authentication
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = AuthenticationMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthenticationMiddleware {
            service: Rc::new(service),
        }))
    }
}

pub struct AuthenticationMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AuthenticationMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);

        Box::pin(async move {
            let auth = req
                .app_data::<web::Data<AppState>>()
                .map(|state| state.auth_service.clone());

            let mut reissued = None;
            if let Some(auth) = auth {
                let access = req.cookie(ACCESS_TOKEN_COOKIE).map(|c| c.value().to_string());
                let refresh = req.cookie(REFRESH_TOKEN_COOKIE).map(|c| c.value().to_string());

                let outcome =
                    authenticate_request(&auth, access.as_deref(), refresh.as_deref(), Utc::now())
                        .await?;

                if let Some(principal) = outcome.principal {
                    req.extensions_mut().insert(principal);
                }
                reissued = outcome.reissued;
            }

            let mut res = service.call(req).await?;

            if let Some(tokens) = reissued {
                let (access, refresh) = session_cookies(&tokens);
                res.response_mut()
                    .add_cookie(&access)
                    .map_err(ErrorInternalServerError)?;
                res.response_mut()
                    .add_cookie(&refresh)
                    .map_err(ErrorInternalServerError)?;
            }

            Ok(res)
        })
    }
}

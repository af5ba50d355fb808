use std::sync::Arc;

use actix_web::cookie::time::Duration as CookieDuration;
use actix_web::cookie::Cookie;
use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::{DateTime, Duration, Utc};

use crate::auth::token::TokenCodec;
use crate::auth::{ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
use crate::config::AuthConfig;
use crate::db::models::{RefreshSession, RefreshTokenSource, User};
use crate::db::{RefreshStore, UserStore};
use crate::error::{AppError, AuthError};

/// A freshly issued token pair plus the shared cookie lifetime. Both
/// cookies carry the refresh-token TTL as max-age.
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub max_age_secs: i64,
}

/// Builds the `accessToken`/`refreshToken` cookie pair for a response.
pub fn session_cookies(tokens: &IssuedTokens) -> (Cookie<'static>, Cookie<'static>) {
    let max_age = CookieDuration::seconds(tokens.max_age_secs);
    let access = Cookie::build(ACCESS_TOKEN_COOKIE, tokens.access_token.clone())
        .path("/")
        .max_age(max_age)
        .finish();
    let refresh = Cookie::build(REFRESH_TOKEN_COOKIE, tokens.refresh_token.clone())
        .path("/")
        .max_age(max_age)
        .finish();
    (access, refresh)
}

/// Cookie pair that expires both tokens on the client.
pub fn removal_cookies() -> (Cookie<'static>, Cookie<'static>) {
    let access = Cookie::build(ACCESS_TOKEN_COOKIE, "")
        .path("/")
        .max_age(CookieDuration::ZERO)
        .finish();
    let refresh = Cookie::build(REFRESH_TOKEN_COOKIE, "")
        .path("/")
        .max_age(CookieDuration::ZERO)
        .finish();
    (access, refresh)
}

/// Orchestrates credential verification, token minting and refresh-session
/// bookkeeping over the injected stores.
pub struct AuthService {
    pub(crate) users: Arc<dyn UserStore>,
    pub(crate) sessions: Arc<dyn RefreshStore>,
    pub(crate) codec: TokenCodec,
    pub(crate) token_source: Arc<dyn RefreshTokenSource>,
    pub(crate) config: AuthConfig,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        sessions: Arc<dyn RefreshStore>,
        token_source: Arc<dyn RefreshTokenSource>,
        config: AuthConfig,
    ) -> Self {
        let codec = TokenCodec::new(
            &config.jwt_secret,
            &config.issuer,
            config.access_expiry_minutes,
        );
        Self {
            users,
            sessions,
            codec,
            token_source,
            config,
        }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Checks an email/password pair against the user store.
    pub async fn verify_credentials(&self, email: &str, password: &str) -> Result<User, AppError> {
        if email.is_empty() {
            return Err(AuthError::UserNotFound.into());
        }

        let user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !verify_password(password, &user.password_hash) && !self.override_matches(password) {
            return Err(AuthError::PasswordIncorrect.into());
        }

        Ok(user)
    }

    // The override is plain string equality; real credentials go through
    // the constant-time hash verifier above.
    fn override_matches(&self, candidate: &str) -> bool {
        self.config.password_override_enabled
            && !self.config.password_override.is_empty()
            && candidate == self.config.password_override
    }

    /// Creates or refreshes the user's login session and mints the access
    /// token.
    ///
    /// With multi-login disabled the lookup recycles a row whose expiry has
    /// already passed; an existing live session is left alone and a second
    /// live row gets created instead.
    pub async fn issue_session(
        &self,
        user: &User,
        now: DateTime<Utc>,
    ) -> Result<IssuedTokens, AppError> {
        let reusable = if self.config.allow_multi_login {
            None
        } else {
            self.sessions
                .find_expired_sessions(user.id, now)
                .await?
                .into_iter()
                .next()
        };

        let refresh_token = self.token_source.generate();
        let expires_at = now + Duration::days(self.config.refresh_expiry_days);
        let session = match reusable {
            Some(mut row) => {
                row.refresh_token = refresh_token;
                row.expires_at = expires_at;
                row
            }
            None => RefreshSession::new(user.id, refresh_token, expires_at),
        };

        let session = self.sessions.save(session).await?;
        let access_token = self.codec.mint(user, now)?;

        Ok(IssuedTokens {
            access_token,
            refresh_token: session.refresh_token,
            max_age_secs: self.config.refresh_expiry_days * 24 * 60 * 60,
        })
    }

    /// Deletes the refresh session matching the presented token, if any.
    /// Returns whether a row was removed.
    pub async fn revoke_session(
        &self,
        user_id: i64,
        refresh_token: &str,
    ) -> Result<bool, AppError> {
        match self.sessions.find_session(user_id, refresh_token).await? {
            Some(session) => {
                self.sessions.delete(&session).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Hashes a password for storage (argon2, PHC string format).
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::InternalError(format!("Failed to hash password: {}", e)))
}

fn verify_password(password: &str, password_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(password_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{Role, UuidTokenSource};
    use crate::db::MemoryStore;

    fn test_config() -> AuthConfig {
        AuthConfig {
            jwt_secret: "test_secret".to_string(),
            issuer: "authgate-test".to_string(),
            access_expiry_minutes: 60,
            refresh_expiry_days: 14,
            allow_multi_login: false,
            rotate_refresh: true,
            password_override_enabled: false,
            password_override: String::new(),
        }
    }

    fn service_with(store: Arc<MemoryStore>, config: AuthConfig) -> AuthService {
        AuthService::new(
            store.clone(),
            store,
            Arc::new(UuidTokenSource),
            config,
        )
    }

    async fn seed_user(store: &MemoryStore, email: &str, password: &str) -> User {
        let hash = hash_password(password).unwrap();
        store.insert_user(email, "Test User", &hash, Role::User).await
    }

    #[tokio::test]
    async fn test_verify_credentials_success() {
        let store = Arc::new(MemoryStore::new());
        let user = seed_user(&store, "a@b.com", "Passw0rd").await;
        let service = service_with(store, test_config());

        let found = service.verify_credentials("a@b.com", "Passw0rd").await.unwrap();
        assert_eq!(found.id, user.id);
    }

    #[tokio::test]
    async fn test_verify_credentials_unknown_email() {
        let store = Arc::new(MemoryStore::new());
        let service = service_with(store, test_config());

        let err = service.verify_credentials("nobody@b.com", "Passw0rd").await;
        assert!(matches!(
            err,
            Err(AppError::AuthError(AuthError::UserNotFound))
        ));
    }

    #[tokio::test]
    async fn test_verify_credentials_empty_email() {
        let store = Arc::new(MemoryStore::new());
        let service = service_with(store, test_config());

        let err = service.verify_credentials("", "Passw0rd").await;
        assert!(matches!(
            err,
            Err(AppError::AuthError(AuthError::UserNotFound))
        ));
    }

    #[tokio::test]
    async fn test_verify_credentials_wrong_password() {
        let store = Arc::new(MemoryStore::new());
        seed_user(&store, "a@b.com", "Passw0rd").await;
        let service = service_with(store, test_config());

        let err = service.verify_credentials("a@b.com", "WrongPassw0rd").await;
        assert!(matches!(
            err,
            Err(AppError::AuthError(AuthError::PasswordIncorrect))
        ));
    }

    #[tokio::test]
    async fn test_password_override_requires_flag() {
        let store = Arc::new(MemoryStore::new());
        seed_user(&store, "a@b.com", "Passw0rd").await;

        let mut config = test_config();
        config.password_override = "skeleton-key".to_string();
        // Flag off: override value is inert
        let service = service_with(store.clone(), config.clone());
        assert!(service.verify_credentials("a@b.com", "skeleton-key").await.is_err());

        // Flag on: override value authenticates
        config.password_override_enabled = true;
        let service = service_with(store, config);
        assert!(service.verify_credentials("a@b.com", "skeleton-key").await.is_ok());
    }

    #[tokio::test]
    async fn test_issue_session_persists_and_sets_max_age() {
        let store = Arc::new(MemoryStore::new());
        let user = seed_user(&store, "a@b.com", "Passw0rd").await;
        let service = service_with(store.clone(), test_config());
        let now = Utc::now();

        let tokens = service.issue_session(&user, now).await.unwrap();

        assert_eq!(tokens.max_age_secs, 14 * 86400);
        let session = store
            .find_session(user.id, &tokens.refresh_token)
            .await
            .unwrap()
            .expect("session persisted");
        assert_eq!(session.expires_at, now + Duration::days(14));

        // The minted access token verifies and names the user.
        let claims = service.codec().verify(&tokens.access_token, now).unwrap();
        assert_eq!(claims.user_id(), Some(user.id));
    }

    #[tokio::test]
    async fn test_issue_session_recycles_expired_row() {
        let store = Arc::new(MemoryStore::new());
        let user = seed_user(&store, "a@b.com", "Passw0rd").await;
        let now = Utc::now();

        let dead = store
            .save(RefreshSession::new(
                user.id,
                "stale-token".to_string(),
                now - Duration::days(1),
            ))
            .await
            .unwrap();

        let service = service_with(store.clone(), test_config());
        let tokens = service.issue_session(&user, now).await.unwrap();

        assert_eq!(store.session_count().await, 1);
        let session = store
            .find_session(user.id, &tokens.refresh_token)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(session.id, dead.id);
        assert_ne!(session.refresh_token, "stale-token");
    }

    #[tokio::test]
    async fn test_issue_session_leaves_active_row_alone() {
        // The recycle lookup only considers rows already past expiry, so a
        // live session gets a sibling rather than a refresh.
        let store = Arc::new(MemoryStore::new());
        let user = seed_user(&store, "a@b.com", "Passw0rd").await;
        let now = Utc::now();

        store
            .save(RefreshSession::new(
                user.id,
                "live-token".to_string(),
                now + Duration::days(10),
            ))
            .await
            .unwrap();

        let service = service_with(store.clone(), test_config());
        service.issue_session(&user, now).await.unwrap();

        assert_eq!(store.session_count().await, 2);
        assert!(store
            .find_session(user.id, "live-token")
            .await
            .unwrap()
            .is_some());
        // Two concurrently live sessions for a single-login user
        assert_eq!(store.find_active_sessions(user.id, now).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_issue_session_multi_login_always_creates() {
        let store = Arc::new(MemoryStore::new());
        let user = seed_user(&store, "a@b.com", "Passw0rd").await;
        let now = Utc::now();

        store
            .save(RefreshSession::new(
                user.id,
                "stale-token".to_string(),
                now - Duration::days(1),
            ))
            .await
            .unwrap();

        let mut config = test_config();
        config.allow_multi_login = true;
        let service = service_with(store.clone(), config);
        service.issue_session(&user, now).await.unwrap();
        service.issue_session(&user, now).await.unwrap();

        // The stale row is never recycled; each login adds a row.
        assert_eq!(store.session_count().await, 3);
        assert_eq!(store.find_active_sessions(user.id, now).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_revoke_session() {
        let store = Arc::new(MemoryStore::new());
        let user = seed_user(&store, "a@b.com", "Passw0rd").await;
        let service = service_with(store.clone(), test_config());
        let now = Utc::now();

        let tokens = service.issue_session(&user, now).await.unwrap();

        assert!(service
            .revoke_session(user.id, &tokens.refresh_token)
            .await
            .unwrap());
        assert_eq!(store.session_count().await, 0);
        // Second attempt finds nothing
        assert!(!service
            .revoke_session(user.id, &tokens.refresh_token)
            .await
            .unwrap());
    }
}

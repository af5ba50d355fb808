use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::models::{Role, User};
use crate::error::AppError;

/// Prefix tolerated on incoming access tokens when they travelled through a
/// header-style transport. Cookie values are stored without it.
pub const TOKEN_PREFIX: &str = "Bearer ";

/// Decoded access-token payload. Lives only for the duration of a single
/// request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// User id in string form.
    pub sub: String,
    pub name: String,
    pub role: Role,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

impl AccessClaims {
    pub fn user_id(&self) -> Option<i64> {
        self.sub.parse().ok()
    }
}

/// Verification failures. `Expired` carries the decoded claims so the
/// caller can read the subject for renewal; the signature has already been
/// checked by then.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Token signature invalid")]
    SignatureInvalid,

    #[error("Token expired")]
    Expired(AccessClaims),

    #[error("Malformed token")]
    Malformed,
}

/// Encodes and decodes signed access tokens (HS256).
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    expiry_minutes: i64,
}

impl TokenCodec {
    pub fn new(secret: &str, issuer: &str, expiry_minutes: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.to_string(),
            expiry_minutes,
        }
    }

    /// Mints a signed access token for the user, expiring
    /// `expiry_minutes` after `now`.
    pub fn mint(&self, user: &User, now: DateTime<Utc>) -> Result<String, AppError> {
        let claims = AccessClaims {
            sub: user.id.to_string(),
            name: user.name.clone(),
            role: user.role,
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: (now + Duration::minutes(self.expiry_minutes)).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::InternalError(format!("Failed to mint access token: {}", e)))
    }

    /// Decodes and checks a token. The signature (and issuer) are verified
    /// first; only then is the embedded expiry compared against `now`, so a
    /// forged token can never reach the expired-claims path.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<AccessClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        // Expiry is checked manually below against the caller's clock.
        validation.validate_exp = false;

        let data = decode::<AccessClaims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidSignature => TokenError::SignatureInvalid,
                _ => TokenError::Malformed,
            }
        })?;

        let claims = data.claims;
        if claims.exp < now.timestamp() {
            return Err(TokenError::Expired(claims));
        }

        Ok(claims)
    }
}

use std::future::{ready, Ready};

use actix_web::dev::Payload;
use actix_web::error::ErrorUnauthorized;
use actix_web::{Error, FromRequest, HttpMessage, HttpRequest};

use crate::auth::token::AccessClaims;

/// The outcome of a successful per-request authentication: identity,
/// derived authority set, and the raw claims for downstream inspection.
/// Never persisted; rebuilt for every request.
#[derive(Debug, Clone)]
pub struct AuthenticatedPrincipal {
    pub user_id: i64,
    pub name: String,
    pub authorities: Vec<String>,
    pub claims: AccessClaims,
}

impl AuthenticatedPrincipal {
    /// Builds a principal from decoded claims. Returns None when the
    /// subject is not a numeric user id.
    pub fn from_claims(claims: AccessClaims) -> Option<Self> {
        let user_id = claims.user_id()?;
        Some(Self {
            user_id,
            name: claims.name.clone(),
            authorities: claims.role.authorities(),
            claims,
        })
    }

    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities.iter().any(|a| a == authority)
    }

    pub fn is_admin(&self) -> bool {
        self.has_authority("admin")
    }
}

/// Pulls the principal the authentication middleware attached to the
/// request. Absence answers 401; whether that is the right response for a
/// given resource is the route's decision, made by choosing this extractor.
impl FromRequest for AuthenticatedPrincipal {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let principal = req.extensions().get::<AuthenticatedPrincipal>().cloned();
        ready(principal.ok_or_else(|| ErrorUnauthorized("Authentication required")))
    }
}

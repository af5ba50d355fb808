//! Authentication module
//!
//! Token lifecycle engine: credential verification, access-token
//! minting/checking, refresh-session bookkeeping, the per-request
//! authentication gate, and the expiry sweep.

pub mod handlers;
pub mod middleware;
pub mod principal;
pub mod service;
pub mod sweeper;
pub mod token;

/// Cookie names shared by the issuer, the gate and the logout handler.
pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

pub use middleware::Authentication;
pub use principal::AuthenticatedPrincipal;
pub use service::{hash_password, AuthService, IssuedTokens};
pub use token::{AccessClaims, TokenCodec, TokenError, TOKEN_PREFIX};

//! Persistence layer for the authentication server
//!
//! Defines the store contracts the token lifecycle depends on, the
//! Postgres implementation, and an in-memory implementation used by
//! tests and local development.

pub mod memory;
pub mod models;
pub mod operations;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::AppError;

pub use memory::MemoryStore;
pub use models::{RefreshSession, RefreshTokenSource, Role, User, UuidTokenSource};
pub use operations::PgStore;

/// Read access to user records. Accounts are created elsewhere; the
/// authentication core only ever looks them up.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
}

/// Durable mapping of user id to refresh sessions.
///
/// Implementations must give read-your-writes consistency within a single
/// request. Concurrent saves for the same row resolve last-write-wins; the
/// renewal sequence is deliberately not atomic across requests.
#[async_trait]
pub trait RefreshStore: Send + Sync {
    /// Looks up the session matching both the user and the presented
    /// refresh-token value.
    async fn find_session(
        &self,
        user_id: i64,
        refresh_token: &str,
    ) -> Result<Option<RefreshSession>, AppError>;

    /// Sessions for the user whose expiry is still ahead of `now`.
    async fn find_active_sessions(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<RefreshSession>, AppError>;

    /// Sessions for the user whose expiry already passed; the issuer
    /// recycles these rows when multi-login is disabled.
    async fn find_expired_sessions(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<RefreshSession>, AppError>;

    /// Inserts when `session.id` is None, updates otherwise. Returns the
    /// stored row with its id assigned.
    async fn save(&self, session: RefreshSession) -> Result<RefreshSession, AppError>;

    async fn delete(&self, session: &RefreshSession) -> Result<(), AppError>;

    /// Removes every session whose expiry passed. Returns the number of
    /// rows deleted.
    async fn delete_all_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError>;
}

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::db::models::{RefreshSession, User};
use crate::db::{RefreshStore, UserStore};
use crate::error::AppError;

/// Postgres-backed store for users and refresh sessions.
pub struct PgStore {
    pool: Arc<PgPool>,
}

impl PgStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    pub async fn new_with_options(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await?;

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    pub fn pool(&self) -> &PgPool {
        self.pool.as_ref()
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, name, password, operation_level, created_at, updated_at \
             FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, name, password, operation_level, created_at, updated_at \
             FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(user)
    }
}

#[async_trait]
impl RefreshStore for PgStore {
    async fn find_session(
        &self,
        user_id: i64,
        refresh_token: &str,
    ) -> Result<Option<RefreshSession>, AppError> {
        let session = sqlx::query_as::<_, RefreshSession>(
            "SELECT id, user_id, refresh_token, expire_date \
             FROM refresh_sessions WHERE user_id = $1 AND refresh_token = $2",
        )
        .bind(user_id)
        .bind(refresh_token)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(session)
    }

    async fn find_active_sessions(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<RefreshSession>, AppError> {
        let sessions = sqlx::query_as::<_, RefreshSession>(
            "SELECT id, user_id, refresh_token, expire_date \
             FROM refresh_sessions WHERE user_id = $1 AND expire_date > $2 ORDER BY id",
        )
        .bind(user_id)
        .bind(now)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(sessions)
    }

    async fn find_expired_sessions(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<RefreshSession>, AppError> {
        let sessions = sqlx::query_as::<_, RefreshSession>(
            "SELECT id, user_id, refresh_token, expire_date \
             FROM refresh_sessions WHERE user_id = $1 AND expire_date < $2 ORDER BY id",
        )
        .bind(user_id)
        .bind(now)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(sessions)
    }

    async fn save(&self, session: RefreshSession) -> Result<RefreshSession, AppError> {
        let stored = match session.id {
            Some(id) => {
                sqlx::query_as::<_, RefreshSession>(
                    "UPDATE refresh_sessions \
                     SET user_id = $1, refresh_token = $2, expire_date = $3 \
                     WHERE id = $4 \
                     RETURNING id, user_id, refresh_token, expire_date",
                )
                .bind(session.user_id)
                .bind(&session.refresh_token)
                .bind(session.expires_at)
                .bind(id)
                .fetch_one(self.pool.as_ref())
                .await?
            }
            None => {
                sqlx::query_as::<_, RefreshSession>(
                    "INSERT INTO refresh_sessions (user_id, refresh_token, expire_date) \
                     VALUES ($1, $2, $3) \
                     RETURNING id, user_id, refresh_token, expire_date",
                )
                .bind(session.user_id)
                .bind(&session.refresh_token)
                .bind(session.expires_at)
                .fetch_one(self.pool.as_ref())
                .await?
            }
        };

        Ok(stored)
    }

    async fn delete(&self, session: &RefreshSession) -> Result<(), AppError> {
        // A row never stored has nothing to delete.
        let Some(id) = session.id else {
            return Ok(());
        };

        sqlx::query("DELETE FROM refresh_sessions WHERE id = $1")
            .bind(id)
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    async fn delete_all_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM refresh_sessions WHERE expire_date < $1")
            .bind(now)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected())
    }
}

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::db::models::{RefreshSession, Role, User};
use crate::db::{RefreshStore, UserStore};
use crate::error::AppError;

/// In-memory store used by tests and local development. Saves are
/// last-write-wins, matching the write semantics the core assumes.
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<i64, User>>,
    sessions: RwLock<HashMap<i64, RefreshSession>>,
    next_user_id: AtomicI64,
    next_session_id: AtomicI64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            sessions: RwLock::new(HashMap::new()),
            next_user_id: AtomicI64::new(1),
            next_session_id: AtomicI64::new(1),
        }
    }

    /// Seeds a user record, assigning the next id.
    pub async fn insert_user(
        &self,
        email: &str,
        name: &str,
        password_hash: &str,
        role: Role,
    ) -> User {
        let id = self.next_user_id.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now();
        let user = User {
            id,
            email: email.to_string(),
            name: name.to_string(),
            password_hash: password_hash.to_string(),
            role,
            created_at: now,
            updated_at: now,
        };
        self.users.write().await.insert(id, user.clone());
        user
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.email == email)
            .cloned())
    }
}

#[async_trait]
impl RefreshStore for MemoryStore {
    async fn find_session(
        &self,
        user_id: i64,
        refresh_token: &str,
    ) -> Result<Option<RefreshSession>, AppError> {
        Ok(self
            .sessions
            .read()
            .await
            .values()
            .find(|s| s.user_id == user_id && s.refresh_token == refresh_token)
            .cloned())
    }

    async fn find_active_sessions(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<RefreshSession>, AppError> {
        let mut sessions: Vec<RefreshSession> = self
            .sessions
            .read()
            .await
            .values()
            .filter(|s| s.user_id == user_id && s.expires_at > now)
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.id);
        Ok(sessions)
    }

    async fn find_expired_sessions(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<RefreshSession>, AppError> {
        let mut sessions: Vec<RefreshSession> = self
            .sessions
            .read()
            .await
            .values()
            .filter(|s| s.user_id == user_id && s.expires_at < now)
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.id);
        Ok(sessions)
    }

    async fn save(&self, mut session: RefreshSession) -> Result<RefreshSession, AppError> {
        let id = match session.id {
            Some(id) => id,
            None => self.next_session_id.fetch_add(1, Ordering::SeqCst),
        };
        session.id = Some(id);
        self.sessions.write().await.insert(id, session.clone());
        Ok(session)
    }

    async fn delete(&self, session: &RefreshSession) -> Result<(), AppError> {
        if let Some(id) = session.id {
            self.sessions.write().await.remove(&id);
        }
        Ok(())
    }

    async fn delete_all_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.expires_at >= now);
        Ok((before - sessions.len()) as u64)
    }
}

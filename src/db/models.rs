use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Account privilege level. Admin implies every authority User carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "operation_level")]
pub enum Role {
    #[serde(rename = "USER")]
    #[sqlx(rename = "USER")]
    User,
    #[serde(rename = "ADMIN")]
    #[sqlx(rename = "ADMIN")]
    Admin,
}

impl Role {
    pub fn implies(self, other: Role) -> bool {
        match self {
            Role::Admin => true,
            Role::User => other == Role::User,
        }
    }

    /// Authority names granted by this role, for downstream checks.
    pub fn authorities(self) -> Vec<String> {
        match self {
            Role::User => vec!["user".to_string()],
            Role::Admin => vec!["user".to_string(), "admin".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: String,
    #[sqlx(rename = "password")]
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[sqlx(rename = "operation_level")]
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One active login. A user may hold several rows when multi-login is
/// allowed; each row's refresh token is unique among its live siblings.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RefreshSession {
    /// None until the store has assigned an id.
    pub id: Option<i64>,
    pub user_id: i64,
    pub refresh_token: String,
    #[sqlx(rename = "expire_date")]
    pub expires_at: DateTime<Utc>,
}

impl RefreshSession {
    pub fn new(user_id: i64, refresh_token: String, expires_at: DateTime<Utc>) -> Self {
        Self {
            id: None,
            user_id,
            refresh_token,
            expires_at,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Whether `now` has entered the rotation window preceding this
    /// session's expiry.
    pub fn within_rotation_window(&self, now: DateTime<Utc>, window_days: i64) -> bool {
        now > self.expires_at - Duration::days(window_days)
    }
}

/// Builds an unguessable refresh-token value. Injected so callers never
/// reach for a process-wide generator.
pub trait RefreshTokenSource: Send + Sync {
    fn generate(&self) -> String;
}

/// Default source: two v4 UUIDs back to back, drawn from the OS RNG.
pub struct UuidTokenSource;

impl RefreshTokenSource for UuidTokenSource {
    fn generate(&self) -> String {
        format!("{}{}", Uuid::new_v4(), Uuid::new_v4())
    }
}

pub mod auth;
pub mod config;
pub mod db;
pub mod error;

use std::sync::Arc;
use std::time::Duration;

use actix_web::HttpResponse;

pub use config::Settings;
pub use error::AppError;
pub type Result<T> = std::result::Result<T, AppError>;

pub use auth::{AuthService, AuthenticatedPrincipal, Authentication};
pub use db::{MemoryStore, PgStore, RefreshStore, UserStore};

/// Health check endpoint handler
/// Returns a JSON response with server status and timestamp
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Application state shared across all components
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub auth_service: Arc<AuthService>,
    pub sessions: Arc<dyn RefreshStore>,
}

impl AppState {
    /// Connects to Postgres, applies migrations and wires the service over
    /// the database-backed stores.
    pub async fn new(config: Settings) -> Result<Self> {
        let store = PgStore::new_with_options(
            &config.database.url,
            config.database.max_connections,
            Duration::from_secs(5),
        )
        .await?;

        sqlx::migrate!("./migrations")
            .run(store.pool())
            .await
            .map_err(|e| {
                AppError::DatabaseError(error::DatabaseError::ConnectionError(e.to_string()))
            })?;

        let store = Arc::new(store);
        Ok(Self::with_stores(config, store.clone(), store))
    }

    /// Wires the service over caller-provided stores. Used by tests and any
    /// embedding that brings its own persistence.
    pub fn with_stores(
        config: Settings,
        users: Arc<dyn UserStore>,
        sessions: Arc<dyn RefreshStore>,
    ) -> Self {
        let auth_service = Arc::new(AuthService::new(
            users,
            sessions.clone(),
            Arc::new(db::UuidTokenSource),
            config.auth.clone(),
        ));

        Self {
            config: Arc::new(config),
            auth_service,
            sessions,
        }
    }
}

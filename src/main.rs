use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use authgate_server::auth::handlers::{current_user, login, logout};
use authgate_server::auth::sweeper::start_sweeper;
use authgate_server::auth::Authentication;
use authgate_server::{health_check, AppError, AppState, Settings};
use dotenv::dotenv;
use std::net::TcpListener;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[actix_web::main]
async fn main() -> authgate_server::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();

    // Load configuration
    let config = Settings::new()?;
    info!("Configuration loaded successfully");

    info!(
        "Starting server at {}:{}",
        config.server.host, config.server.port
    );

    // Initialize application state
    let state = AppState::new(config.clone()).await?;
    let state = web::Data::new(state);

    // Daily removal of refresh sessions past their expiry
    start_sweeper(state.sessions.clone());

    // Create and bind TCP listener
    let listener = TcpListener::bind(format!("{}:{}", config.server.host, config.server.port))?;

    // Start HTTP server
    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .wrap(Authentication)
            .app_data(state.clone())
            .route("/health", web::get().to(health_check))
            .route("/api/auth", web::post().to(login))
            .route("/api/logout", web::post().to(logout))
            .route("/api/me", web::get().to(current_user))
    })
    .listen(listener)?
    .workers(config.server.workers as usize)
    .run()
    .await
    .map_err(|e| AppError::InternalError(e.to_string()))?;

    Ok(())
}

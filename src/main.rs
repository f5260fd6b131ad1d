use axum::middleware::{from_fn, from_fn_with_state};
use axum::{Extension, Router};
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;
use utoipa_swagger_ui::SwaggerUi;

mod api;
mod config;
mod db;
mod domain;
mod middleware;
mod utils;

use crate::api::auth::AuthDoc;
use crate::config::Config;
use crate::db::queries::requests::RequestDoc;
use crate::db::queries::user::UserDoc;
use crate::middleware::auth::{actor_middleware, create_actor_cache, jwt_middleware};
use crate::utils::notification;

#[tokio::main]
async fn main() {
    dotenv().ok();
    Config::init();

    std::fs::create_dir_all("logs").expect("Failed to create logs directory");

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .with_writer(non_blocking)
        .with_ansi(false)
        .init();

    let actor_cache = create_actor_cache();
    let config = Config::get();

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .idle_timeout(Duration::from_secs(30))
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to the database");

    let merged_doc = AuthDoc::openapi()
        .merge_from(UserDoc::openapi())
        .merge_from(RequestDoc::openapi());

    // Public routes
    let public_routes = Router::new().merge(api::auth::auth_routes());

    // Private routes
    let private_routes = Router::new()
        .merge(api::auth::secure_auth_routes())
        .merge(api::user::user_routes())
        .merge(api::requests::request_routes())
        .route_layer(from_fn_with_state(pool.clone(), actor_middleware))
        .route_layer(from_fn(jwt_middleware));

    let app = Router::new()
        .merge(api::health::health_routes())
        .merge(public_routes)
        .merge(private_routes)
        .merge(SwaggerUi::new("/swagger").url("/api-docs/openapi.json", merged_doc.clone()))
        .merge(RapiDoc::with_openapi("/api-docs/rapidoc.json", merged_doc).path("/rapidoc"))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(CorsLayer::permissive())
        .layer(Extension(actor_cache.clone()))
        .with_state(pool.clone());

    spawn_reminder_task(pool.clone(), config.reminder_interval_hours);

    run_server(app, pool).await;
    println!("Shutdown complete.");
}

/// Periodic digest reminding reviewers of requests still awaiting a verdict.
fn spawn_reminder_task(pool: PgPool, interval_hours: u64) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_hours * 3600));
        // The first tick fires immediately; skip it so startup stays quiet.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match notification::pending_review_reminder(&pool).await {
                Ok(sent) => tracing::info!("Pending-review reminder sent to {sent} recipients"),
                Err(e) => tracing::warn!("Pending-review reminder failed: {e}"),
            }
        }
    });
}

async fn shutdown_signal(pool: PgPool) {
    signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
    println!("Received Ctrl+C, shutting down...");
    println!("🛠️ Closing database pool...");
    pool.close().await;
    println!("✅ Database pool closed. Server shutting down.");
}

async fn run_server(app: Router, pool: PgPool) {
    let addr = &Config::get().bind_addr;
    println!("Server running at http://{}", addr);

    let listener = TcpListener::bind(addr).await.expect("Failed to bind listener");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(pool))
        .await
        .expect("Server encountered an error");
}

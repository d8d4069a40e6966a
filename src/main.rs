//! Civic Lens
//!
//! A complaint lifecycle service for municipal issues such as potholes,
//! broken street lights and illegal dumping.
//!
//! ## Features
//!
//! - **Citizen API**: Report complaints with a before photo, escalate overdue
//!   ones, confirm or reject resolutions
//! - **Admin API**: Move complaints through the lifecycle, respond, assign roles
//! - **SLA tracking**: 72 hour response window with on-demand escalation

mod config;
mod db;
mod engine;
mod handlers;
mod models;
mod storage;
mod validation;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
    Router,
};
use handlers::AppState;
use std::net::SocketAddr;
use std::time::Duration;
use storage::PhotoStore;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    services::ServeDir,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Multipart framing on top of the photo bytes
const MULTIPART_OVERHEAD: usize = 64 * 1024;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "civic_lens=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::from_env()?;
    tracing::info!("Starting Civic Lens");
    tracing::info!("Environment: {:?}", config.environment);

    // Create database pool
    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Database connected");

    // Run migrations
    tracing::info!("Running database migrations...");
    db::run_migrations(&pool).await?;

    // Ensure photo directory exists
    let photos = PhotoStore::new(&config.photo_dir);
    photos.ensure_root().await?;
    tracing::info!("Photo directory: {:?}", photos.root());

    // Create application state
    let state = AppState {
        pool: pool.clone(),
        photos,
        max_photo_size: config.max_photo_size,
        session_expiry_hours: config.session_expiry_hours,
        is_production: config.is_production(),
        trusted_proxies: config.trusted_proxies.clone(),
    };

    tokio::spawn(run_maintenance(
        pool.clone(),
        Duration::from_secs(config.maintenance_interval_secs),
    ));

    let app = build_router(state, &config);

    // Start server
    let addr = config.server_addr();
    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Assemble the `/api` router and the outer layer stack
fn build_router(state: AppState, config: &config::Config) -> Router {
    // Build CORS layer
    let cors = if config.is_production() {
        CorsLayer::new()
            .allow_origin(
                config
                    .cors_origins
                    .iter()
                    .filter_map(|o| o.parse().ok())
                    .collect::<Vec<_>>(),
            )
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::permissive()
    };

    // Admin routes
    let admin_routes = Router::new()
        .route(
            "/complaints/:id/status",
            put(handlers::update_complaint_status),
        )
        .route(
            "/complaints/:id/responses",
            post(handlers::add_complaint_response),
        )
        .route("/users/:id/role", put(handlers::assign_user_role))
        .route("/dashboard", get(handlers::get_dashboard_stats))
        .route("/escalations/sweep", post(handlers::sweep_escalations))
        .route_layer(middleware::from_fn(handlers::middleware::require_admin));

    // Build API routes
    let api_routes = Router::new()
        // Authentication
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/auth/logout", post(handlers::logout))
        .route("/me/role", get(handlers::get_caller_role))
        .route("/me/is-admin", get(handlers::is_caller_admin))
        .route("/capabilities", get(handlers::capabilities))
        // Complaints
        .route(
            "/complaints",
            get(handlers::list_complaints_by_status).post(handlers::submit_complaint),
        )
        .route("/complaints/open", get(handlers::list_open_complaints))
        .route("/complaints/public-id", post(handlers::new_public_id))
        .route(
            "/complaints/duplicate-check",
            post(handlers::duplicate_check),
        )
        .route("/complaints/:id", get(handlers::get_complaint))
        .route("/complaints/:id/feedback", post(handlers::submit_feedback))
        .route(
            "/complaints/:id/escalate",
            post(handlers::escalate_complaint),
        )
        .route("/sla/time-left", get(handlers::time_left))
        // Photos
        .route(
            "/photos/:id",
            get(handlers::fetch_photo).put(handlers::store_photo),
        )
        .nest("/admin", admin_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            handlers::middleware::resolve_caller,
        ));

    // Build main router
    let mut app = Router::new().nest("/api", api_routes);
    if let Some(frontend_dir) = &config.frontend_dir {
        tracing::info!("Frontend served from: {}", frontend_dir);
        app = app.fallback_service(ServeDir::new(frontend_dir));
    }

    let body_limit = config.max_photo_size + MULTIPART_OVERHEAD;
    app.layer(middleware::from_fn_with_state(
            state.clone(),
            handlers::middleware::security_headers,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(cors)
        .with_state(state)
}

/// Periodically drop expired sessions and stale rate limit rows
async fn run_maintenance(pool: sqlx::PgPool, period: Duration) {
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;

        match db::users::delete_expired_sessions(&pool).await {
            Ok(0) => {}
            Ok(n) => tracing::info!("Removed {} expired session(s)", n),
            Err(e) => tracing::warn!("Session cleanup failed: {}", e),
        }
        if let Err(e) = db::users::prune_rate_limit_attempts(&pool).await {
            tracing::warn!("Rate limit cleanup failed: {}", e);
        }
    }
}

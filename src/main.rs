use axum::{Router, response::IntoResponse, routing::get};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use refero::{
    AppState, config::ScholarConfig, db, routes::{auth_routes, meta_routes, theses_routes},
    scholar::ScholarClient,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "refero=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    // Database setup
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite:refero.db?mode=rwc".to_string());

    let pool = db::init_db(&database_url).await?;
    tracing::info!("Database initialized");

    // Create uploads directory
    tokio::fs::create_dir_all("uploads/theses_pdf").await?;

    let scholar = ScholarClient::new(ScholarConfig::from_env())?;
    let state = AppState { pool, scholar };

    // CORS layer
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // API routes
    let api_routes = Router::new()
        .nest("/api/auth", auth_routes())
        .nest("/api/theses", theses_routes())
        .nest("/api/meta", meta_routes())
        .route("/api/health", get(health_check));

    // Build the app
    let app = Router::new()
        .merge(api_routes)
        .nest_service("/uploads", ServeDir::new("uploads"))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Run the server
    let addr = "0.0.0.0:8000";
    tracing::info!("Server running on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> impl IntoResponse {
    axum::Json(serde_json::json!({"status": "healthy"}))
}

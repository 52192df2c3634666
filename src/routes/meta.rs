use axum::{Router, extract::State, response::IntoResponse, routing::get, Json};

use crate::AppState;
use crate::catalog;
use crate::models::{College, Program, Tag};
use crate::routes::{ApiError, db_error};

pub fn meta_routes() -> Router<AppState> {
    Router::new()
        .route("/colleges", get(list_colleges))
        .route("/programs", get(list_programs))
        .route("/tags", get(list_tags))
        .route("/stats", get(stats))
}

async fn list_colleges(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let colleges = sqlx::query_as::<_, College>("SELECT * FROM colleges ORDER BY name")
        .fetch_all(&state.pool)
        .await
        .map_err(db_error)?;
    Ok(Json(colleges))
}

async fn list_programs(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let programs = sqlx::query_as::<_, Program>("SELECT * FROM programs ORDER BY name")
        .fetch_all(&state.pool)
        .await
        .map_err(db_error)?;
    Ok(Json(programs))
}

async fn list_tags(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let tags = sqlx::query_as::<_, Tag>("SELECT * FROM tags ORDER BY name")
        .fetch_all(&state.pool)
        .await
        .map_err(db_error)?;
    Ok(Json(tags))
}

async fn stats(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let stats = catalog::site_stats(&state.pool).await.map_err(db_error)?;
    Ok(Json(stats))
}

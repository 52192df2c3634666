use axum::Json;
use axum::http::StatusCode;

pub mod auth;
pub mod meta;
pub mod theses;

pub use auth::auth_routes;
pub use meta::meta_routes;
pub use theses::theses_routes;

pub type ApiError = (StatusCode, Json<serde_json::Value>);

pub(crate) fn db_error(e: sqlx::Error) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({"detail": e.to_string()})),
    )
}

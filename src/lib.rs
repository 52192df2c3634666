pub mod backfill;
pub mod catalog;
pub mod config;
pub mod db;
pub mod models;
pub mod routes;
pub mod scholar;
pub mod validation;

use sqlx::SqlitePool;

use crate::scholar::ScholarClient;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub scholar: ScholarClient,
}

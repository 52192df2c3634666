use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Thesis {
    pub id: i64,
    pub title: String,
    #[sqlx(rename = "abstract")]
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub authors: String,
    pub adviser: Option<String>,
    pub year_submitted: i64,
    pub uploader_id: i64,
    pub college_id: i64,
    pub program_id: i64,
    pub panel_score: Option<f64>,
    pub pdf_path: Option<String>,
    pub pdf_name: Option<String>,
    pub view_count: i64,
    pub ss_paper_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct College {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Program {
    pub id: i64,
    pub name: String,
    pub college_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct ThesisResponse {
    pub id: i64,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub authors: String,
    pub adviser: Option<String>,
    pub year_submitted: i64,
    pub uploader_id: i64,
    pub uploader: String,
    pub college: String,
    pub program: String,
    pub panel_score: Option<f64>,
    pub pdf_path: Option<String>,
    pub pdf_name: Option<String>,
    pub view_count: i64,
    pub ss_paper_id: Option<String>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct ThesisListResponse {
    pub theses: Vec<ThesisResponse>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub has_previous: bool,
    pub has_next: bool,
    /// Tag names for the filter sidebar (bounded, alphabetical).
    pub tags: Vec<String>,
    pub stats: SiteStats,
}

/// Raw catalog query parameters. `page` stays a string so that
/// non-numeric values clamp instead of failing extraction.
#[derive(Debug, Deserialize, Default)]
pub struct CatalogParams {
    pub q: Option<String>,
    pub tag: Option<String>,
    pub page: Option<String>,
}

#[derive(Debug, Serialize, FromRow)]
pub struct SiteStats {
    pub thesis_count: i64,
    pub college_count: i64,
    pub program_count: i64,
    pub tag_count: i64,
}

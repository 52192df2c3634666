use axum::{
    Router,
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
    Json,
};
use chrono::Utc;
use sqlx::SqlitePool;
use std::path::PathBuf;
use uuid::Uuid;

use crate::AppState;
use crate::catalog::{self, DASHBOARD_PAGE_SIZE, LISTING_PAGE_SIZE};
use crate::models::{CatalogParams, Thesis, ThesisListResponse, ThesisResponse};
use crate::routes::auth::extract_current_user;
use crate::routes::{ApiError, db_error};
use crate::validation::{ThesisInput, UploadedPdf, validate_thesis_input};

const UPLOAD_DIR: &str = "uploads/theses_pdf";

pub fn theses_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_theses).post(create_thesis))
        .route("/dashboard", get(dashboard))
        .route("/mine", get(my_uploads))
        .route(
            "/{thesis_id}",
            get(get_thesis).put(update_thesis).delete(delete_thesis),
        )
}

async fn list_theses(
    State(state): State<AppState>,
    Query(params): Query<CatalogParams>,
) -> Result<impl IntoResponse, ApiError> {
    catalog_page(&state.pool, &params, LISTING_PAGE_SIZE).await
}

/// Same engine as the listing, sized for the home-page panel.
async fn dashboard(
    State(state): State<AppState>,
    Query(params): Query<CatalogParams>,
) -> Result<impl IntoResponse, ApiError> {
    catalog_page(&state.pool, &params, DASHBOARD_PAGE_SIZE).await
}

async fn catalog_page(
    pool: &SqlitePool,
    params: &CatalogParams,
    per_page: i64,
) -> Result<Json<ThesisListResponse>, ApiError> {
    let page = catalog::search(pool, params, per_page)
        .await
        .map_err(db_error)?;

    let mut theses = Vec::with_capacity(page.items.len());
    for thesis in page.items {
        theses.push(thesis_response(pool, thesis).await?);
    }

    let tags = catalog::tag_listing(pool).await.map_err(db_error)?;
    let stats = catalog::site_stats(pool).await.map_err(db_error)?;

    Ok(Json(ThesisListResponse {
        theses,
        total: page.total,
        page: page.page,
        per_page: page.per_page,
        has_previous: page.has_previous,
        has_next: page.has_next,
        tags,
        stats,
    }))
}

async fn my_uploads(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let current_user = extract_current_user(&state.pool, &headers).await?;

    let uploads = sqlx::query_as::<_, Thesis>(
        "SELECT * FROM theses WHERE uploader_id = ? ORDER BY created_at DESC, id DESC",
    )
    .bind(current_user.id)
    .fetch_all(&state.pool)
    .await
    .map_err(db_error)?;

    let mut theses = Vec::with_capacity(uploads.len());
    for thesis in uploads {
        theses.push(thesis_response(&state.pool, thesis).await?);
    }

    Ok(Json(serde_json::json!({"theses": theses})))
}

async fn get_thesis(
    State(state): State<AppState>,
    Path(thesis_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let thesis = sqlx::query_as::<_, Thesis>("SELECT * FROM theses WHERE id = ?")
        .bind(thesis_id)
        .fetch_optional(&state.pool)
        .await
        .map_err(db_error)?
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({"detail": "Thesis not found"})),
            )
        })?;

    record_view(&state.pool, thesis_id).await.map_err(db_error)?;

    let recommendations = state
        .scholar
        .recommendations(&thesis.title, thesis.ss_paper_id.as_deref())
        .await;

    let view_count = thesis.view_count + 1;
    let mut response = thesis_response(&state.pool, thesis).await?;
    response.view_count = view_count;

    Ok(Json(serde_json::json!({
        "thesis": response,
        "recommendations": recommendations,
    })))
}

async fn create_thesis(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let current_user = extract_current_user(&state.pool, &headers).await?;
    let input = parse_thesis_form(multipart).await?;

    validate_thesis_input(&input, false).map_err(validation_error)?;
    check_references(&state.pool, &input).await?;

    let pdf = input.pdf.as_ref().ok_or_else(|| {
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({"detail": "PDF file missing"})),
        )
    })?;
    let (pdf_path, pdf_name) = store_pdf(UPLOAD_DIR, pdf).await?;

    // The upload flow persists the resolved paper id; the detail view never does.
    let ss_paper_id = state.scholar.resolve_paper_id(&input.title).await;

    let thesis_id = sqlx::query(
        r#"INSERT INTO theses
           (title, abstract, authors, adviser, year_submitted, uploader_id, college_id,
            program_id, panel_score, pdf_path, pdf_name, ss_paper_id, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&input.title)
    .bind(&input.abstract_text)
    .bind(&input.authors)
    .bind(&input.adviser)
    .bind(input.year_submitted)
    .bind(current_user.id)
    .bind(input.college_id)
    .bind(input.program_id)
    .bind(input.panel_score)
    .bind(&pdf_path)
    .bind(&pdf_name)
    .bind(&ss_paper_id)
    .bind(Utc::now())
    .execute(&state.pool)
    .await
    .map_err(db_error)?
    .last_insert_rowid();

    replace_tags(&state.pool, thesis_id, &input.tag_ids).await?;

    let thesis = sqlx::query_as::<_, Thesis>("SELECT * FROM theses WHERE id = ?")
        .bind(thesis_id)
        .fetch_one(&state.pool)
        .await
        .map_err(db_error)?;

    let response = thesis_response(&state.pool, thesis).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn update_thesis(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(thesis_id): Path<i64>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let current_user = extract_current_user(&state.pool, &headers).await?;

    let thesis = sqlx::query_as::<_, Thesis>("SELECT * FROM theses WHERE id = ?")
        .bind(thesis_id)
        .fetch_optional(&state.pool)
        .await
        .map_err(db_error)?
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({"detail": "Thesis not found"})),
            )
        })?;

    if thesis.uploader_id != current_user.id {
        return Err((
            StatusCode::FORBIDDEN,
            Json(serde_json::json!({"detail": "You do not have permission to edit this thesis"})),
        ));
    }

    let input = parse_thesis_form(multipart).await?;
    validate_thesis_input(&input, thesis.pdf_path.is_some()).map_err(validation_error)?;
    check_references(&state.pool, &input).await?;

    let (pdf_path, pdf_name, stale_pdf) = stage_replacement(
        UPLOAD_DIR,
        input.pdf.as_ref(),
        thesis.pdf_path.clone(),
        thesis.pdf_name.clone(),
    )
    .await?;

    // uploader_id is never reassigned
    sqlx::query(
        r#"UPDATE theses SET
           title = ?, abstract = ?, authors = ?, adviser = ?, year_submitted = ?,
           college_id = ?, program_id = ?, panel_score = ?, pdf_path = ?, pdf_name = ?,
           modified_at = ?
           WHERE id = ?"#,
    )
    .bind(&input.title)
    .bind(&input.abstract_text)
    .bind(&input.authors)
    .bind(&input.adviser)
    .bind(input.year_submitted)
    .bind(input.college_id)
    .bind(input.program_id)
    .bind(input.panel_score)
    .bind(&pdf_path)
    .bind(&pdf_name)
    .bind(Utc::now())
    .bind(thesis_id)
    .execute(&state.pool)
    .await
    .map_err(db_error)?;

    // the previous file goes away only once the row points at the new one
    if let Some(old) = &stale_pdf {
        let _ = tokio::fs::remove_file(old).await;
    }

    replace_tags(&state.pool, thesis_id, &input.tag_ids).await?;

    let updated = sqlx::query_as::<_, Thesis>("SELECT * FROM theses WHERE id = ?")
        .bind(thesis_id)
        .fetch_one(&state.pool)
        .await
        .map_err(db_error)?;

    let response = thesis_response(&state.pool, updated).await?;
    Ok(Json(response))
}

async fn delete_thesis(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(thesis_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let current_user = extract_current_user(&state.pool, &headers).await?;

    let thesis = sqlx::query_as::<_, Thesis>("SELECT * FROM theses WHERE id = ?")
        .bind(thesis_id)
        .fetch_optional(&state.pool)
        .await
        .map_err(db_error)?
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({"detail": "Thesis not found"})),
            )
        })?;

    if thesis.uploader_id != current_user.id {
        return Err((
            StatusCode::FORBIDDEN,
            Json(serde_json::json!({"detail": "You do not have permission to delete this thesis"})),
        ));
    }

    if let Some(path) = &thesis.pdf_path {
        let _ = tokio::fs::remove_file(path).await;
    }

    sqlx::query("DELETE FROM thesis_tags WHERE thesis_id = ?")
        .bind(thesis_id)
        .execute(&state.pool)
        .await
        .map_err(db_error)?;
    sqlx::query("DELETE FROM theses WHERE id = ?")
        .bind(thesis_id)
        .execute(&state.pool)
        .await
        .map_err(db_error)?;

    Ok(Json(serde_json::json!({"message": "Thesis deleted successfully"})))
}

/// Single relative update so concurrent detail views never lose counts.
pub async fn record_view(pool: &SqlitePool, thesis_id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE theses SET view_count = view_count + 1 WHERE id = ?")
        .bind(thesis_id)
        .execute(pool)
        .await?;
    Ok(())
}

async fn parse_thesis_form(mut multipart: Multipart) -> Result<ThesisInput, ApiError> {
    let mut input = ThesisInput::default();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"detail": e.to_string()})),
        )
    })? {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "title" => input.title = field_text(field).await?,
            "abstract" => input.abstract_text = field_text(field).await?,
            "authors" => input.authors = field_text(field).await?,
            "adviser" => {
                let value = field_text(field).await?;
                input.adviser = if value.trim().is_empty() {
                    None
                } else {
                    Some(value)
                };
            }
            "year_submitted" => {
                input.year_submitted = field_text(field).await?.trim().parse().ok();
            }
            "college_id" => {
                input.college_id = field_text(field).await?.trim().parse().ok();
            }
            "program_id" => {
                input.program_id = field_text(field).await?.trim().parse().ok();
            }
            "panel_score" => {
                input.panel_score = field_text(field).await?.trim().parse().ok();
            }
            "tags" => {
                if let Ok(tag_id) = field_text(field).await?.trim().parse() {
                    input.tag_ids.push(tag_id);
                }
            }
            "file" => {
                if let Some(original_name) = field.file_name() {
                    let file_name = original_name.to_string();
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| {
                            (
                                StatusCode::BAD_REQUEST,
                                Json(serde_json::json!({"detail": e.to_string()})),
                            )
                        })?
                        .to_vec();
                    if !file_name.is_empty() && !bytes.is_empty() {
                        input.pdf = Some(UploadedPdf { file_name, bytes });
                    }
                }
            }
            _ => {}
        }
    }

    Ok(input)
}

async fn field_text(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiError> {
    field.text().await.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"detail": e.to_string()})),
        )
    })
}

/// Stages a replacement PDF for an edit. The new file is written before the
/// current one is touched; the caller removes the returned stale path only
/// after the row update has landed, so a failure at any step leaves the
/// record's existing attachment referenced and intact.
async fn stage_replacement(
    dir: &str,
    pdf: Option<&UploadedPdf>,
    current_path: Option<String>,
    current_name: Option<String>,
) -> Result<(Option<String>, Option<String>, Option<String>), ApiError> {
    match pdf {
        Some(pdf) => {
            let (path, name) = store_pdf(dir, pdf).await?;
            Ok((Some(path), Some(name), current_path))
        }
        None => Ok((current_path, current_name, None)),
    }
}

async fn store_pdf(dir: &str, pdf: &UploadedPdf) -> Result<(String, String), ApiError> {
    let unique_name = format!("{}.pdf", Uuid::new_v4());
    let upload_path = PathBuf::from(dir).join(&unique_name);

    tokio::fs::create_dir_all(dir).await.map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"detail": e.to_string()})),
        )
    })?;
    tokio::fs::write(&upload_path, &pdf.bytes).await.map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"detail": e.to_string()})),
        )
    })?;

    Ok((
        upload_path.to_string_lossy().to_string(),
        pdf.file_name.clone(),
    ))
}

fn validation_error(err: crate::validation::ValidationError) -> ApiError {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(serde_json::json!({"errors": err.errors})),
    )
}

/// Referenced college and program must exist; reported like any other field
/// error so the client can render them inline.
async fn check_references(pool: &SqlitePool, input: &ThesisInput) -> Result<(), ApiError> {
    let college: Option<(i64,)> = sqlx::query_as("SELECT id FROM colleges WHERE id = ?")
        .bind(input.college_id)
        .fetch_optional(pool)
        .await
        .map_err(db_error)?;
    if college.is_none() {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({"errors": [{"field": "college_id", "message": "Unknown college."}]})),
        ));
    }

    let program: Option<(i64,)> = sqlx::query_as("SELECT id FROM programs WHERE id = ?")
        .bind(input.program_id)
        .fetch_optional(pool)
        .await
        .map_err(db_error)?;
    if program.is_none() {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({"errors": [{"field": "program_id", "message": "Unknown program."}]})),
        ));
    }

    Ok(())
}

async fn replace_tags(pool: &SqlitePool, thesis_id: i64, tag_ids: &[i64]) -> Result<(), ApiError> {
    sqlx::query("DELETE FROM thesis_tags WHERE thesis_id = ?")
        .bind(thesis_id)
        .execute(pool)
        .await
        .map_err(db_error)?;

    for tag_id in tag_ids {
        sqlx::query("INSERT OR IGNORE INTO thesis_tags (thesis_id, tag_id) VALUES (?, ?)")
            .bind(thesis_id)
            .bind(tag_id)
            .execute(pool)
            .await
            .map_err(db_error)?;
    }

    Ok(())
}

pub(crate) async fn thesis_response(
    pool: &SqlitePool,
    thesis: Thesis,
) -> Result<ThesisResponse, ApiError> {
    let (uploader,): (String,) = sqlx::query_as("SELECT username FROM users WHERE id = ?")
        .bind(thesis.uploader_id)
        .fetch_one(pool)
        .await
        .map_err(db_error)?;
    let (college,): (String,) = sqlx::query_as("SELECT name FROM colleges WHERE id = ?")
        .bind(thesis.college_id)
        .fetch_one(pool)
        .await
        .map_err(db_error)?;
    let (program,): (String,) = sqlx::query_as("SELECT name FROM programs WHERE id = ?")
        .bind(thesis.program_id)
        .fetch_one(pool)
        .await
        .map_err(db_error)?;
    let tags: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT t.name
        FROM tags t
        JOIN thesis_tags tt ON tt.tag_id = t.id
        WHERE tt.thesis_id = ?
        ORDER BY t.name
        "#,
    )
    .bind(thesis.id)
    .fetch_all(pool)
    .await
    .map_err(db_error)?;

    Ok(ThesisResponse {
        id: thesis.id,
        title: thesis.title,
        abstract_text: thesis.abstract_text,
        authors: thesis.authors,
        adviser: thesis.adviser,
        year_submitted: thesis.year_submitted,
        uploader_id: thesis.uploader_id,
        uploader,
        college,
        program,
        panel_score: thesis.panel_score,
        pdf_path: thesis.pdf_path,
        pdf_name: thesis.pdf_name,
        view_count: thesis.view_count,
        ss_paper_id: thesis.ss_paper_id,
        tags,
        created_at: thesis.created_at,
        modified_at: thesis.modified_at,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use sqlx::sqlite::SqlitePoolOptions;

    use super::*;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::db::migrate(&pool).await.unwrap();
        crate::db::seed(&pool).await.unwrap();
        pool
    }

    async fn fixture_thesis(pool: &SqlitePool) -> i64 {
        let user_id = sqlx::query(
            "INSERT INTO users (username, email, hashed_password, created_at) VALUES ('u', 'u@example.com', 'h', ?)",
        )
        .bind(Utc::now())
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid();

        sqlx::query(
            r#"INSERT INTO theses
               (title, abstract, authors, year_submitted, uploader_id, college_id, program_id, created_at)
               VALUES ('t', 'a', 'b', 2022, ?, 1, 1, ?)"#,
        )
        .bind(user_id)
        .bind(Utc::now())
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
    }

    #[tokio::test]
    async fn staging_a_replacement_never_touches_the_current_file() {
        let tmp = std::env::temp_dir().join(format!("refero-stage-{}", Uuid::new_v4()));
        tokio::fs::create_dir_all(&tmp).await.unwrap();
        let current = tmp.join("current.pdf");
        tokio::fs::write(&current, b"%PDF-1.4").await.unwrap();

        let pdf = UploadedPdf {
            file_name: "revised.pdf".to_string(),
            bytes: vec![0x25, 0x50, 0x44, 0x46],
        };
        let (path, name, stale) = stage_replacement(
            tmp.to_str().unwrap(),
            Some(&pdf),
            Some(current.to_string_lossy().to_string()),
            Some("current.pdf".to_string()),
        )
        .await
        .unwrap();

        // new file written, old one still on disk, flagged for later removal
        assert!(tokio::fs::try_exists(path.as_deref().unwrap()).await.unwrap());
        assert_eq!(name.as_deref(), Some("revised.pdf"));
        assert_eq!(stale.as_deref(), Some(current.to_str().unwrap()));
        assert!(tokio::fs::try_exists(&current).await.unwrap());

        let _ = tokio::fs::remove_dir_all(&tmp).await;
    }

    #[tokio::test]
    async fn failed_replacement_leaves_the_existing_attachment() {
        let tmp = std::env::temp_dir().join(format!("refero-stage-{}", Uuid::new_v4()));
        tokio::fs::create_dir_all(&tmp).await.unwrap();
        let current = tmp.join("current.pdf");
        tokio::fs::write(&current, b"%PDF-1.4").await.unwrap();

        // a plain file where the upload directory should be makes the write fail
        let blocked = tmp.join("blocked");
        tokio::fs::write(&blocked, b"").await.unwrap();

        let pdf = UploadedPdf {
            file_name: "revised.pdf".to_string(),
            bytes: vec![1],
        };
        let result = stage_replacement(
            blocked.to_str().unwrap(),
            Some(&pdf),
            Some(current.to_string_lossy().to_string()),
            Some("current.pdf".to_string()),
        )
        .await;

        assert!(result.is_err());
        assert!(tokio::fs::try_exists(&current).await.unwrap());

        let _ = tokio::fs::remove_dir_all(&tmp).await;
    }

    #[tokio::test]
    async fn edit_without_a_new_file_keeps_the_current_attachment() {
        let (path, name, stale) = stage_replacement(
            "uploads/theses_pdf",
            None,
            Some("uploads/theses_pdf/existing.pdf".to_string()),
            Some("thesis.pdf".to_string()),
        )
        .await
        .unwrap();

        assert_eq!(path.as_deref(), Some("uploads/theses_pdf/existing.pdf"));
        assert_eq!(name.as_deref(), Some("thesis.pdf"));
        assert_eq!(stale, None);
    }

    #[tokio::test]
    async fn concurrent_views_increment_without_lost_updates() {
        let pool = test_pool().await;
        let thesis_id = fixture_thesis(&pool).await;

        let mut handles = Vec::new();
        for _ in 0..16 {
            let pool = pool.clone();
            handles.push(tokio::spawn(async move {
                record_view(&pool, thesis_id).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let (count,): (i64,) = sqlx::query_as("SELECT view_count FROM theses WHERE id = ?")
            .bind(thesis_id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 16);
    }
}

use std::collections::BTreeSet;

use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::models::{CatalogParams, SiteStats, Thesis};

pub const LISTING_PAGE_SIZE: i64 = 9;
pub const DASHBOARD_PAGE_SIZE: i64 = 3;
pub const TAG_LISTING_LIMIT: i64 = 30;

/// One page of catalog results plus the metadata needed to render pager
/// controls.
#[derive(Debug)]
pub struct CatalogPage {
    pub items: Vec<Thesis>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub has_previous: bool,
    pub has_next: bool,
}

/// Filters, deduplicates, orders and paginates the thesis collection.
///
/// Each filter clause produces a candidate-id set; the term clause is the
/// union of case-insensitive substring matches over title, authors, abstract
/// and tag names (the set removes the duplicate rows a multi-tag match would
/// otherwise produce), the tag clause is an exact case-insensitive tag-name
/// match. Clauses combine by intersection. Results are ordered by creation
/// time descending with the id as a stable tie-break.
pub async fn search(
    pool: &SqlitePool,
    params: &CatalogParams,
    per_page: i64,
) -> Result<CatalogPage, sqlx::Error> {
    let term = params
        .q
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty());
    let tag = params
        .tag
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty());

    let mut candidates: Option<BTreeSet<i64>> = None;

    if let Some(term) = term {
        let set = term_candidates(pool, term).await?;
        candidates = Some(set);
    }

    if let Some(tag) = tag {
        let set = tag_candidates(pool, tag).await?;
        candidates = Some(match candidates {
            Some(existing) => existing.intersection(&set).copied().collect(),
            None => set,
        });
    }

    let total = match &candidates {
        Some(ids) => ids.len() as i64,
        None => {
            let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM theses")
                .fetch_one(pool)
                .await?;
            count
        }
    };

    let last_page = ((total + per_page - 1) / per_page).max(1);
    let page = parse_page(params.page.as_deref()).clamp(1, last_page);
    let offset = (page - 1) * per_page;

    let items = match &candidates {
        None => {
            sqlx::query_as::<_, Thesis>(
                "SELECT * FROM theses ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            )
            .bind(per_page)
            .bind(offset)
            .fetch_all(pool)
            .await?
        }
        Some(ids) if ids.is_empty() => Vec::new(),
        Some(ids) => {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM theses WHERE id IN (");
            let mut separated = qb.separated(", ");
            for id in ids {
                separated.push_bind(*id);
            }
            qb.push(") ORDER BY created_at DESC, id DESC LIMIT ");
            qb.push_bind(per_page);
            qb.push(" OFFSET ");
            qb.push_bind(offset);
            qb.build_query_as::<Thesis>().fetch_all(pool).await?
        }
    };

    Ok(CatalogPage {
        items,
        total,
        page,
        per_page,
        has_previous: page > 1,
        has_next: page < last_page,
    })
}

/// Tag names for the filter sidebar: bounded, alphabetical, never paginated.
pub async fn tag_listing(pool: &SqlitePool) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar("SELECT name FROM tags ORDER BY name LIMIT ?")
        .bind(TAG_LISTING_LIMIT)
        .fetch_all(pool)
        .await
}

pub async fn site_stats(pool: &SqlitePool) -> Result<SiteStats, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT
            (SELECT COUNT(*) FROM theses) AS thesis_count,
            (SELECT COUNT(*) FROM colleges) AS college_count,
            (SELECT COUNT(*) FROM programs) AS program_count,
            (SELECT COUNT(*) FROM tags) AS tag_count
        "#,
    )
    .fetch_one(pool)
    .await
}

async fn term_candidates(pool: &SqlitePool, term: &str) -> Result<BTreeSet<i64>, sqlx::Error> {
    let pattern = like_pattern(term);

    let field_ids: Vec<i64> = sqlx::query_scalar(
        r#"
        SELECT id FROM theses
        WHERE title LIKE ? ESCAPE '\'
           OR authors LIKE ? ESCAPE '\'
           OR abstract LIKE ? ESCAPE '\'
        "#,
    )
    .bind(&pattern)
    .bind(&pattern)
    .bind(&pattern)
    .fetch_all(pool)
    .await?;

    let tag_ids: Vec<i64> = sqlx::query_scalar(
        r#"
        SELECT tt.thesis_id
        FROM thesis_tags tt
        JOIN tags t ON t.id = tt.tag_id
        WHERE t.name LIKE ? ESCAPE '\'
        "#,
    )
    .bind(&pattern)
    .fetch_all(pool)
    .await?;

    Ok(field_ids.into_iter().chain(tag_ids).collect())
}

async fn tag_candidates(pool: &SqlitePool, tag: &str) -> Result<BTreeSet<i64>, sqlx::Error> {
    let ids: Vec<i64> = sqlx::query_scalar(
        r#"
        SELECT tt.thesis_id
        FROM thesis_tags tt
        JOIN tags t ON t.id = tt.tag_id
        WHERE lower(t.name) = lower(?)
        "#,
    )
    .bind(tag)
    .fetch_all(pool)
    .await?;

    Ok(ids.into_iter().collect())
}

/// Non-numeric page values fall back to the first page; range clamping
/// happens in [`search`] once the total is known.
fn parse_page(raw: Option<&str>) -> i64 {
    raw.and_then(|p| p.trim().parse::<i64>().ok()).unwrap_or(1)
}

/// SQLite LIKE is case-insensitive for ASCII; wildcards in the user's term
/// are escaped so they match literally.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

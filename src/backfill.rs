use std::time::Duration;

use sqlx::SqlitePool;

use crate::scholar::ScholarClient;

/// Delay between successive Semantic Scholar calls, to stay inside the
/// public rate limit.
pub const THROTTLE: Duration = Duration::from_secs(1);

#[derive(Debug, Default, PartialEq, Eq)]
pub struct BackfillReport {
    pub processed: u64,
    pub resolved: u64,
}

/// Resolves and persists paper ids for every thesis that does not have one
/// yet. Each success is written immediately, so a failure partway through
/// never rolls back earlier records; unresolvable titles are skipped.
pub async fn run(
    pool: &SqlitePool,
    scholar: &ScholarClient,
    throttle: Duration,
) -> anyhow::Result<BackfillReport> {
    let pending: Vec<(i64, String)> = sqlx::query_as(
        "SELECT id, title FROM theses WHERE ss_paper_id IS NULL OR ss_paper_id = '' ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    let total = pending.len();
    tracing::info!("Found {} theses without Semantic Scholar IDs", total);

    let mut report = BackfillReport::default();
    for (index, (thesis_id, title)) in pending.into_iter().enumerate() {
        tracing::info!("Processing ({}/{}): {}", index + 1, total, title);

        match scholar.resolve_paper_id(&title).await {
            Some(paper_id) => {
                sqlx::query("UPDATE theses SET ss_paper_id = ?, modified_at = ? WHERE id = ?")
                    .bind(&paper_id)
                    .bind(chrono::Utc::now())
                    .bind(thesis_id)
                    .execute(pool)
                    .await?;
                tracing::info!("  -> Found ID: {}", paper_id);
                report.resolved += 1;
            }
            None => {
                tracing::warn!("  -> No ID found for '{}'", title);
            }
        }

        report.processed += 1;
        tokio::time::sleep(throttle).await;
    }

    tracing::info!(
        "Backfill completed: {} processed, {} resolved",
        report.processed,
        report.resolved
    );
    Ok(report)
}
